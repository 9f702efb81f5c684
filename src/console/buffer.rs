//! Console document model.
//!
//! The document is split at the *input start* position: everything before it
//! is history (process output, diagnostics, submitted input) and can only be
//! appended to; everything after it is the line the user is currently typing.
//! All positions are char offsets into the whole document.

use std::ops::Range;

use super::severity::Severity;

/// How a run of text should be displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextKind {
    /// Process stdout, classified by markers
    Output(Severity),
    /// Process stderr
    StdErr,
    /// Start/exit banners
    Diagnostic,
    /// Text typed by the user
    Input,
}

/// A run of history text sharing one kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub kind: TextKind,
}

/// Where a logical line of history begins
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct LineStart {
    /// Document position
    pos: usize,
    /// Segment holding the first char of the line
    seg: usize,
    /// Byte offset of that char in the segment (may equal its length)
    byte: usize,
}

/// The visible text of a console
#[derive(Debug, Clone)]
pub struct ConsoleBuffer {
    history: Vec<Segment>,
    /// Char length of history, which is also the input start
    history_len: usize,
    /// Start of every history line, kept up to date by appends
    history_lines: Vec<LineStart>,
    /// Pending (editable) input
    input: String,
    caret: usize,
    /// Selection anchor; the other end is the caret
    anchor: Option<usize>,
}

/// Byte offset of the `idx`-th char, or the string length
fn byte_index(s: &str, idx: usize) -> usize {
    s.char_indices().nth(idx).map(|(i, _)| i).unwrap_or(s.len())
}

impl Default for ConsoleBuffer {
    fn default() -> Self {
        Self {
            history: Vec::new(),
            history_len: 0,
            history_lines: vec![LineStart::default()],
            input: String::new(),
            caret: 0,
            anchor: None,
        }
    }
}

impl ConsoleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total length in chars
    pub fn len(&self) -> usize {
        self.history_len + self.input.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Boundary between history and pending input
    pub fn input_start(&self) -> usize {
        self.history_len
    }

    pub fn caret(&self) -> usize {
        self.caret
    }

    /// Whether the caret sits inside history
    pub fn caret_in_history(&self) -> bool {
        self.caret < self.history_len
    }

    /// Text typed since the input start
    pub fn pending_input(&self) -> &str {
        &self.input
    }

    pub fn history(&self) -> &[Segment] {
        &self.history
    }

    /// Full document text
    pub fn text(&self) -> String {
        let mut out = String::with_capacity(self.input.len() + 64);
        for seg in &self.history {
            out.push_str(&seg.text);
        }
        out.push_str(&self.input);
        out
    }

    /// Text between two char positions
    pub fn slice(&self, range: Range<usize>) -> String {
        self.text()
            .chars()
            .skip(range.start)
            .take(range.end.saturating_sub(range.start))
            .collect()
    }

    fn push_history(&mut self, text: &str, kind: TextKind) {
        if text.is_empty() {
            return;
        }
        let seg = match self.history.last() {
            Some(last) if last.kind == kind => self.history.len() - 1,
            _ => {
                self.history.push(Segment {
                    text: String::new(),
                    kind,
                });
                self.history.len() - 1
            }
        };
        let base = self.history[seg].text.len();
        let mut pos = self.history_len;
        for (byte, ch) in text.char_indices() {
            pos += 1;
            if ch == '\n' {
                self.history_lines.push(LineStart {
                    pos,
                    seg,
                    byte: base + byte + 1,
                });
            }
        }
        self.history[seg].text.push_str(text);
        self.history_len = pos;
    }

    /// Append text at the end of the document.
    ///
    /// Pending input becomes part of history, the input start moves to the
    /// new end and the caret follows it.
    pub fn append(&mut self, text: &str, kind: TextKind) {
        if !self.input.is_empty() {
            let pending = std::mem::take(&mut self.input);
            self.push_history(&pending, TextKind::Input);
        }
        self.push_history(text, kind);
        self.caret = self.len();
        self.anchor = None;
    }

    /// Submit pending input up to `upto` (a document position).
    ///
    /// The submitted text and a newline move into history; anything after
    /// `upto` stays pending on the new line. Returns the submitted text.
    pub fn commit_input(&mut self, upto: usize) -> String {
        let rel = upto.clamp(self.history_len, self.len()) - self.history_len;
        let split = byte_index(&self.input, rel);
        let rest = self.input.split_off(split);
        let submitted = std::mem::replace(&mut self.input, rest);

        self.push_history(&submitted, TextKind::Input);
        self.push_history("\n", TextKind::Input);
        self.caret = self.history_len;
        self.anchor = None;
        submitted
    }

    /// Drop everything
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Selected range, if non-empty
    pub fn selection_range(&self) -> Option<Range<usize>> {
        let anchor = self.anchor?;
        if anchor == self.caret {
            return None;
        }
        Some(anchor.min(self.caret)..anchor.max(self.caret))
    }

    /// Start of the selection, or the caret when nothing is selected
    pub fn selection_start(&self) -> usize {
        self.selection_range().map(|r| r.start).unwrap_or(self.caret)
    }

    pub fn selected_text(&self) -> Option<String> {
        self.selection_range().map(|r| self.slice(r))
    }

    pub fn clear_selection(&mut self) {
        self.anchor = None;
    }

    pub fn select_all(&mut self) {
        self.anchor = Some(0);
        self.caret = self.len();
    }

    /// A selection that reaches into history blocks editing
    fn selection_blocked(&self) -> bool {
        matches!(self.selection_range(), Some(r) if r.start < self.history_len)
    }

    /// Remove the selection if it lies entirely in the input region
    fn delete_selection(&mut self) -> bool {
        let Some(range) = self.selection_range() else {
            return false;
        };
        if range.start < self.history_len {
            return false;
        }
        let start = byte_index(&self.input, range.start - self.history_len);
        let end = byte_index(&self.input, range.end - self.history_len);
        self.input.replace_range(start..end, "");
        self.caret = range.start;
        self.anchor = None;
        true
    }

    /// Insert text at the caret. Refused when the caret is in history.
    pub fn insert_str(&mut self, text: &str) -> bool {
        if self.caret_in_history() || self.selection_blocked() {
            return false;
        }
        self.delete_selection();
        let at = byte_index(&self.input, self.caret - self.history_len);
        self.input.insert_str(at, text);
        self.caret += text.chars().count();
        self.anchor = None;
        true
    }

    /// Delete the char before the caret, never crossing the input start
    pub fn backspace(&mut self) -> bool {
        if self.selection_blocked() {
            return false;
        }
        if self.delete_selection() {
            return true;
        }
        if self.caret <= self.history_len {
            return false;
        }
        let at = byte_index(&self.input, self.caret - self.history_len - 1);
        self.input.remove(at);
        self.caret -= 1;
        true
    }

    /// Delete the char under the caret
    pub fn delete(&mut self) -> bool {
        if self.selection_blocked() {
            return false;
        }
        if self.delete_selection() {
            return true;
        }
        if self.caret_in_history() || self.caret >= self.len() {
            return false;
        }
        let at = byte_index(&self.input, self.caret - self.history_len);
        self.input.remove(at);
        true
    }

    fn move_to(&mut self, pos: usize, extend: bool) {
        if extend {
            if self.anchor.is_none() {
                self.anchor = Some(self.caret);
            }
        } else {
            self.anchor = None;
        }
        self.caret = pos.min(self.len());
    }

    pub fn set_caret(&mut self, pos: usize) {
        self.move_to(pos, false);
    }

    pub fn move_left(&mut self, extend: bool) {
        self.move_to(self.caret.saturating_sub(1), extend);
    }

    pub fn move_right(&mut self, extend: bool) {
        self.move_to(self.caret + 1, extend);
    }

    /// Start of the caret's line, or the input start when on the input line
    pub fn move_home(&mut self, extend: bool) {
        let (line, _) = self.line_col(self.caret);
        let mut target = self.line_start(line);
        if self.caret >= self.history_len && target < self.history_len {
            target = self.history_len;
        }
        self.move_to(target, extend);
    }

    pub fn move_end(&mut self, extend: bool) {
        let (line, _) = self.line_col(self.caret);
        let target = self.line_start(line) + self.line_len(line);
        self.move_to(target, extend);
    }

    pub fn move_up(&mut self, extend: bool) {
        let (line, col) = self.line_col(self.caret);
        if line == 0 {
            self.move_to(0, extend);
            return;
        }
        let target = self.line_start(line - 1) + col.min(self.line_len(line - 1));
        self.move_to(target, extend);
    }

    pub fn move_down(&mut self, extend: bool) {
        let (line, col) = self.line_col(self.caret);
        if line + 1 >= self.line_count() {
            self.move_to(self.len(), extend);
            return;
        }
        let target = self.line_start(line + 1) + col.min(self.line_len(line + 1));
        self.move_to(target, extend);
    }

    pub fn move_to_end(&mut self) {
        self.move_to(self.len(), false);
    }

    /// Starts of the lines opened by newlines in the pending input
    fn input_line_starts(&self) -> Vec<usize> {
        self.input
            .chars()
            .enumerate()
            .filter(|(_, ch)| *ch == '\n')
            .map(|(i, _)| self.history_len + i + 1)
            .collect()
    }

    pub fn line_count(&self) -> usize {
        self.history_lines.len() + self.input.matches('\n').count()
    }

    /// Document position where `line` begins
    pub fn line_start(&self, line: usize) -> usize {
        match self.history_lines.get(line) {
            Some(start) => start.pos,
            None => self
                .input_line_starts()
                .get(line - self.history_lines.len())
                .copied()
                .unwrap_or_else(|| self.len()),
        }
    }

    fn line_len(&self, line: usize) -> usize {
        let start = self.line_start(line);
        let end = if line + 1 < self.line_count() {
            self.line_start(line + 1) - 1
        } else {
            self.len()
        };
        end.saturating_sub(start)
    }

    /// Logical (line, column) of a document position
    pub fn line_col(&self, pos: usize) -> (usize, usize) {
        let pos = pos.min(self.len());
        let in_history = self.history_lines.partition_point(|start| start.pos <= pos);
        let in_input = self
            .input_line_starts()
            .iter()
            .filter(|start| **start <= pos)
            .count();
        let line = (in_history + in_input).saturating_sub(1);
        (line, pos - self.line_start(line))
    }

    /// Styled text from the start of `line` to the end of the document.
    ///
    /// Returns the document position of the first char and the runs after
    /// it, without walking the history that precedes the line.
    pub fn runs_from_line(&self, line: usize) -> (usize, Vec<(&str, TextKind)>) {
        let mut runs = Vec::new();
        if let Some(start) = self.history_lines.get(line) {
            if let Some(first) = self.history.get(start.seg) {
                runs.push((&first.text[start.byte..], first.kind));
                for seg in &self.history[start.seg + 1..] {
                    runs.push((seg.text.as_str(), seg.kind));
                }
            }
            runs.push((self.input.as_str(), TextKind::Input));
            return (start.pos, runs);
        }

        let pos = self.line_start(line);
        let byte = byte_index(&self.input, pos - self.history_len);
        runs.push((&self.input[byte..], TextKind::Input));
        (pos, runs)
    }

    /// Styled logical lines for rendering
    pub fn lines(&self) -> Vec<Vec<(String, TextKind)>> {
        let mut lines: Vec<Vec<(String, TextKind)>> = vec![Vec::new()];
        let runs = self
            .history
            .iter()
            .map(|seg| (seg.text.as_str(), seg.kind))
            .chain(std::iter::once((self.input.as_str(), TextKind::Input)));

        for (text, kind) in runs {
            for (i, part) in text.split('\n').enumerate() {
                if i > 0 {
                    lines.push(Vec::new());
                }
                if part.is_empty() {
                    continue;
                }
                if let Some(line) = lines.last_mut() {
                    line.push((part.to_string(), kind));
                }
            }
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn out() -> TextKind {
        TextKind::Output(Severity::Normal)
    }

    #[test]
    fn test_append_moves_input_start() {
        let mut buf = ConsoleBuffer::new();
        buf.append("hello\n", out());
        assert_eq!(buf.input_start(), 6);
        assert_eq!(buf.caret(), 6);
        assert_eq!(buf.text(), "hello\n");
    }

    #[test]
    fn test_typing_and_commit() {
        let mut buf = ConsoleBuffer::new();
        buf.append("$ ", out());
        assert!(buf.insert_str("ls -l"));
        assert_eq!(buf.pending_input(), "ls -l");

        let submitted = buf.commit_input(buf.selection_start());
        assert_eq!(submitted, "ls -l");
        assert_eq!(buf.text(), "$ ls -l\n");
        assert_eq!(buf.input_start(), buf.len());
        assert_eq!(buf.pending_input(), "");
    }

    #[test]
    fn test_commit_keeps_text_after_caret() {
        let mut buf = ConsoleBuffer::new();
        buf.insert_str("abcdef");
        buf.set_caret(3);
        assert_eq!(buf.commit_input(buf.selection_start()), "abc");
        assert_eq!(buf.pending_input(), "def");
        assert_eq!(buf.caret(), buf.input_start());
    }

    #[test]
    fn test_history_is_immutable() {
        let mut buf = ConsoleBuffer::new();
        buf.append("history\n", out());
        buf.set_caret(3);

        assert!(!buf.insert_str("x"));
        assert!(!buf.backspace());
        assert!(!buf.delete());
        assert_eq!(buf.text(), "history\n");
    }

    #[test]
    fn test_backspace_stops_at_input_start() {
        let mut buf = ConsoleBuffer::new();
        buf.append("> ", out());
        buf.insert_str("ab");
        assert!(buf.backspace());
        assert!(buf.backspace());
        assert!(!buf.backspace());
        assert_eq!(buf.text(), "> ");
    }

    #[test]
    fn test_output_absorbs_pending_input() {
        let mut buf = ConsoleBuffer::new();
        buf.insert_str("typed");
        buf.append("late output\n", out());
        assert_eq!(buf.text(), "typedlate output\n");
        assert_eq!(buf.pending_input(), "");
        assert_eq!(buf.input_start(), buf.len());
        assert_eq!(buf.history()[0].kind, TextKind::Input);
    }

    #[test]
    fn test_input_start_never_decreases() {
        let mut buf = ConsoleBuffer::new();
        let mut last = buf.input_start();
        buf.append("a\n", out());
        for step in 0..4 {
            buf.insert_str("xy");
            buf.backspace();
            if step % 2 == 0 {
                buf.commit_input(buf.caret());
            } else {
                buf.append("out\n", TextKind::StdErr);
            }
            assert!(buf.input_start() >= last);
            assert!(buf.input_start() <= buf.len());
            last = buf.input_start();
        }
    }

    #[test]
    fn test_selection_and_delete() {
        let mut buf = ConsoleBuffer::new();
        buf.append("> ", out());
        buf.insert_str("hello");
        buf.move_left(true);
        buf.move_left(true);
        assert_eq!(buf.selected_text().as_deref(), Some("lo"));
        assert!(buf.backspace());
        assert_eq!(buf.pending_input(), "hel");
    }

    #[test]
    fn test_selection_reaching_history_is_not_deleted() {
        let mut buf = ConsoleBuffer::new();
        buf.append("> ", out());
        buf.insert_str("ab");
        buf.move_home(false);
        buf.move_left(false);
        buf.move_right(true);
        buf.move_right(true);
        assert!(buf.selection_range().is_some());
        assert!(!buf.delete());
        assert_eq!(buf.text(), "> ab");
    }

    #[test]
    fn test_vertical_movement() {
        let mut buf = ConsoleBuffer::new();
        buf.append("first line\nab\n", out());
        buf.insert_str("xyz");
        buf.move_up(false);
        assert_eq!(buf.line_col(buf.caret()), (1, 2));
        buf.move_up(false);
        assert_eq!(buf.line_col(buf.caret()), (0, 2));
        buf.move_down(false);
        buf.move_down(false);
        assert_eq!(buf.line_col(buf.caret()), (2, 2));
    }

    #[test]
    fn test_home_stops_at_input_start() {
        let mut buf = ConsoleBuffer::new();
        buf.append("prompt> ", out());
        buf.insert_str("cmd");
        buf.move_home(false);
        assert_eq!(buf.caret(), buf.input_start());
    }

    #[test]
    fn test_lines_keep_kinds() {
        let mut buf = ConsoleBuffer::new();
        buf.append("ok\n", out());
        buf.append("bad\n", TextKind::StdErr);
        buf.insert_str("in");
        let lines = buf.lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], vec![("ok".to_string(), out())]);
        assert_eq!(lines[1], vec![("bad".to_string(), TextKind::StdErr)]);
        assert_eq!(lines[2], vec![("in".to_string(), TextKind::Input)]);
    }

    #[test]
    fn test_multibyte_editing() {
        let mut buf = ConsoleBuffer::new();
        buf.append("→ ", out());
        buf.insert_str("日本");
        buf.move_left(false);
        buf.insert_str("x");
        assert_eq!(buf.pending_input(), "日x本");
        assert!(buf.backspace());
        assert_eq!(buf.pending_input(), "日本");
    }

    #[test]
    fn test_line_index_spans_segments_and_input() {
        let mut buf = ConsoleBuffer::new();
        buf.append("one\ntw", out());
        buf.append("o\nthree\n", TextKind::StdErr);
        buf.insert_str("in\nput");

        assert_eq!(buf.line_count(), 5);
        assert_eq!(buf.line_start(1), 4);
        assert_eq!(buf.line_start(2), 8);
        assert_eq!(buf.line_start(4), buf.input_start() + 3);
        assert_eq!(buf.line_col(5), (1, 1));
        assert_eq!(buf.line_col(buf.len()), (4, 3));
    }

    #[test]
    fn test_runs_from_line() {
        let mut buf = ConsoleBuffer::new();
        buf.append("a\nbc", out());
        buf.append("d\n", TextKind::StdErr);
        buf.insert_str("x");

        let (pos, runs) = buf.runs_from_line(1);
        assert_eq!(pos, 2);
        assert_eq!(
            runs,
            vec![("bc", out()), ("d\n", TextKind::StdErr), ("x", TextKind::Input)]
        );

        // A line that starts right at a segment boundary
        let (pos, runs) = buf.runs_from_line(2);
        assert_eq!(pos, 6);
        assert_eq!(runs, vec![("", TextKind::StdErr), ("x", TextKind::Input)]);
    }

    #[test]
    fn test_long_history_line_math() {
        let mut buf = ConsoleBuffer::new();
        for _ in 0..10_000 {
            buf.append("y\n", out());
        }
        buf.insert_str("end");
        assert_eq!(buf.line_count(), 10_001);
        buf.move_up(false);
        assert_eq!(buf.line_col(buf.caret()), (9_999, 1));
        buf.move_end(false);
        assert_eq!(buf.caret(), buf.line_start(9_999) + 1);
    }

    #[test]
    fn test_clear_resets_line_index() {
        let mut buf = ConsoleBuffer::new();
        buf.append("a\nb\n", out());
        buf.clear();
        assert_eq!(buf.line_count(), 1);
        assert_eq!(buf.line_col(0), (0, 0));
    }

    #[test]
    fn test_clear() {
        let mut buf = ConsoleBuffer::new();
        buf.append("abc", out());
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.input_start(), 0);
    }
}
