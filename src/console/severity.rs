//! Output classification by log-level markers.

/// Display class of a chunk of process output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Severity {
    Error,
    Warning,
    Debug,
    Verbose,
    #[default]
    Normal,
}

/// Markers in precedence order
const MARKERS: [(&str, Severity); 4] = [
    (" err ", Severity::Error),
    (" wrn ", Severity::Warning),
    (" dbg ", Severity::Debug),
    (" vrb ", Severity::Verbose),
];

impl Severity {
    /// Classify text by the first marker, in precedence order, that it contains.
    /// Matching ignores case.
    pub fn classify(text: &str) -> Self {
        let lower = text.to_lowercase();
        MARKERS
            .iter()
            .find(|(marker, _)| lower.contains(marker))
            .map(|(_, severity)| *severity)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_normal() {
        assert_eq!(Severity::classify("hello world\n"), Severity::Normal);
        assert_eq!(Severity::classify(""), Severity::Normal);
    }

    #[test]
    fn test_markers_are_case_insensitive() {
        assert_eq!(Severity::classify("12:00 ERR disk full"), Severity::Error);
        assert_eq!(Severity::classify("12:00 Wrn low space"), Severity::Warning);
        assert_eq!(Severity::classify("12:00 DBG state=1"), Severity::Debug);
        assert_eq!(Severity::classify("12:00 vRb tick"), Severity::Verbose);
    }

    #[test]
    fn test_error_beats_warning() {
        assert_eq!(Severity::classify("a wrn b ERR c"), Severity::Error);
        assert_eq!(Severity::classify("x dbg y wrn z"), Severity::Warning);
    }

    #[test]
    fn test_marker_needs_surrounding_spaces() {
        assert_eq!(Severity::classify("error: nope"), Severity::Normal);
        assert_eq!(Severity::classify("ERR at start "), Severity::Normal);
    }
}
