//! Console renderer using crossterm
//!
//! Lays the console document out into screen rows (wrapping at the terminal
//! width, expanding tabs) and draws it with a status bar and an optional
//! new-process prompt on top.

use std::io::{self, Write};
use std::ops::Range;

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute,
    style::{Attribute, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType, DisableLineWrap, EnableLineWrap, EnterAlternateScreen, LeaveAlternateScreen},
};
use unicode_width::UnicodeWidthChar;

use super::prompt::{NewProcessPrompt, PromptField};
use crate::config::ColorScheme;
use crate::console::{ConsoleBuffer, ConsoleControl, TextKind};

/// Tab stops every this many columns
pub const TAB_WIDTH: usize = 8;

const SHORTCUTS: &str = "F2:Shell F3:Run F4:Stop F5:Clear F10:Quit";

/// One displayed character (a tab becomes several spaces)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Glyph {
    pub text: String,
    pub kind: TextKind,
    /// Document position of the source char
    pub pos: usize,
    pub width: usize,
}

/// A console document broken into screen rows
#[derive(Debug, Default)]
pub struct ScreenLayout {
    pub rows: Vec<Vec<Glyph>>,
    /// Row and column of the caret, when it falls inside the laid out lines
    pub caret: Option<(usize, usize)>,
}

impl ScreenLayout {
    /// Wrap the whole buffer at `width` columns
    pub fn build(buffer: &ConsoleBuffer, width: usize) -> Self {
        Self::build_lines(buffer, width, 0..buffer.line_count())
    }

    /// Wrap only the logical lines in `lines` at `width` columns.
    ///
    /// Row 0 is the first row of `lines.start`; glyph positions stay
    /// document positions.
    pub fn build_lines(buffer: &ConsoleBuffer, width: usize, lines: Range<usize>) -> Self {
        let width = width.max(1);
        let caret_pos = buffer.caret();
        let first = lines.start.min(buffer.line_count().saturating_sub(1));
        let last = lines.end.max(first + 1);
        let end = if last < buffer.line_count() {
            buffer.line_start(last) - 1
        } else {
            buffer.len()
        };

        let (mut pos, runs) = buffer.runs_from_line(first);
        let mut layout = ScreenLayout {
            rows: vec![Vec::new()],
            caret: None,
        };
        let mut col = 0;

        'runs: for (text, kind) in runs {
            for ch in text.chars() {
                if pos >= end {
                    break 'runs;
                }
                if ch == '\n' {
                    if pos == caret_pos {
                        layout.caret = Some((layout.rows.len() - 1, col));
                    }
                    layout.rows.push(Vec::new());
                    col = 0;
                    pos += 1;
                    continue;
                }

                let (glyph_text, w) = match ch {
                    '\t' => {
                        let w = TAB_WIDTH - col % TAB_WIDTH;
                        (" ".repeat(w), w)
                    }
                    c if c.is_control() => (String::new(), 0),
                    c => (c.to_string(), c.width().unwrap_or(0)),
                };

                if col + w > width && col > 0 {
                    layout.rows.push(Vec::new());
                    col = 0;
                }
                if pos == caret_pos {
                    layout.caret = Some((layout.rows.len() - 1, col));
                }

                if let Some(row) = layout.rows.last_mut() {
                    row.push(Glyph {
                        text: glyph_text,
                        kind,
                        pos,
                        width: w,
                    });
                }
                col += w;
                pos += 1;
            }
        }

        if pos == caret_pos {
            layout.caret = Some((layout.rows.len() - 1, col));
        }
        // A caret past the right edge starts the next row
        if let Some((row, col)) = layout.caret {
            if col >= width {
                layout.caret = Some((row + 1, 0));
                while layout.rows.len() <= row + 1 {
                    layout.rows.push(Vec::new());
                }
            }
        }
        layout
    }
}

/// Logical lines worth laying out for one frame.
///
/// Every logical line takes at least one row, so the last
/// `visible + offset` lines always cover the screen. An unscrolled view
/// whose caret sits above them starts at the caret's line instead.
pub fn frame_lines(line_count: usize, caret_line: usize, visible: usize, offset: usize) -> Range<usize> {
    let first = line_count.saturating_sub(visible.saturating_add(offset));
    if offset == 0 && caret_line < first {
        caret_line..(caret_line + visible).min(line_count)
    } else {
        first..line_count
    }
}

/// First visible row given the scroll offset (rows up from the bottom)
pub fn visible_top(total: usize, visible: usize, offset: usize, caret_row: usize) -> usize {
    let bottom_top = total.saturating_sub(visible);
    let top = bottom_top.saturating_sub(offset);
    // Unscrolled, the view follows a caret moved up into history
    if offset == 0 && caret_row < top {
        caret_row
    } else {
        top
    }
}

/// Console renderer
pub struct Renderer {
    initialized: bool,
    pub color_scheme: ColorScheme,
    pub status_bar_visible: bool,
    /// Rows scrolled up from the bottom
    scroll_offset: usize,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self::with_color_scheme(ColorScheme::default())
    }

    pub fn with_color_scheme(color_scheme: ColorScheme) -> Self {
        Self {
            initialized: false,
            color_scheme,
            status_bar_visible: true,
            scroll_offset: 0,
        }
    }

    /// Initialize the terminal for rendering
    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;

        let mut stdout = io::stdout();
        execute!(
            stdout,
            EnterAlternateScreen,
            crossterm::event::EnableBracketedPaste,
            DisableLineWrap,
            Clear(ClearType::All),
            MoveTo(0, 0)
        )?;
        stdout.flush()?;
        self.initialized = true;
        Ok(())
    }

    /// Cleanup the terminal
    pub fn cleanup(&mut self) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }
        self.initialized = false;

        let mut stdout = io::stdout();

        // End synchronized update (if active)
        write!(stdout, "\x1b[?2026l")?;

        let _ = execute!(stdout, ResetColor, SetAttribute(Attribute::Reset));
        let _ = execute!(stdout, Show);
        let _ = execute!(stdout, EnableLineWrap);
        let _ = execute!(stdout, crossterm::event::DisableBracketedPaste);
        let _ = execute!(stdout, LeaveAlternateScreen);
        let _ = stdout.flush();

        terminal::disable_raw_mode()?;
        Ok(())
    }

    /// Get terminal size
    pub fn size() -> io::Result<(u16, u16)> {
        terminal::size()
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn scroll_up(&mut self, rows: usize) {
        self.scroll_offset = self.scroll_offset.saturating_add(rows);
    }

    pub fn scroll_down(&mut self, rows: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(rows);
    }

    /// Return to the bottom of the document
    pub fn reset_scroll(&mut self) {
        self.scroll_offset = 0;
    }

    /// Rows available for console text
    pub fn text_rows(&self, rows: u16) -> usize {
        let reserved = if self.status_bar_visible { 1 } else { 0 };
        (rows as usize).saturating_sub(reserved).max(1)
    }

    /// Render the console, with the prompt on top when it is open
    pub fn render(&mut self, control: &ConsoleControl, prompt: Option<&NewProcessPrompt>) -> io::Result<()> {
        let (cols, rows) = Self::size()?;
        let width = cols.max(1) as usize;
        let visible = self.text_rows(rows);

        let buffer = control.buffer();
        let (caret_line, _) = buffer.line_col(buffer.caret());
        let lines = frame_lines(buffer.line_count(), caret_line, visible, self.scroll_offset);
        let layout = ScreenLayout::build_lines(buffer, width, lines.clone());
        if lines.start == 0 {
            // Scrolled to the top of the document
            let max_offset = layout.rows.len().saturating_sub(visible);
            self.scroll_offset = self.scroll_offset.min(max_offset);
        }
        let caret_row = layout.caret.map_or(0, |(row, _)| row);
        let top = visible_top(layout.rows.len(), visible, self.scroll_offset, caret_row);
        let selection = buffer.selection_range();

        let stdout = io::stdout();
        let mut out = io::BufWriter::with_capacity(65536, stdout.lock());

        // Begin synchronized update (reduces flicker)
        write!(out, "\x1b[?2026h")?;
        execute!(out, Hide)?;

        for screen_row in 0..visible {
            execute!(out, MoveTo(0, screen_row as u16))?;
            execute!(out, ResetColor, SetAttribute(Attribute::Reset))?;
            write!(out, "\x1b[K")?;
            if let Some(row) = layout.rows.get(top + screen_row) {
                self.render_row(&mut out, row, selection.as_ref())?;
            }
        }

        if self.scroll_offset > 0 {
            execute!(out, MoveTo(0, 0), ResetColor, SetAttribute(Attribute::Reset))?;
            write!(out, "[↑ {} lines]", self.scroll_offset)?;
        }

        if self.status_bar_visible {
            self.render_status_bar(&mut out, control, cols, rows)?;
        }

        execute!(out, ResetColor, SetAttribute(Attribute::Reset))?;

        let cursor = match prompt {
            Some(prompt) => Some(self.render_prompt(&mut out, prompt, cols, rows)?),
            None => match layout.caret {
                Some((caret_row, caret_col)) if caret_row >= top && caret_row < top + visible => {
                    Some(((caret_col.min(width - 1)) as u16, (caret_row - top) as u16))
                }
                _ => None,
            },
        };
        if let Some((x, y)) = cursor {
            execute!(out, MoveTo(x, y), Show)?;
        }

        // End synchronized update
        write!(out, "\x1b[?2026l")?;
        out.flush()?;
        Ok(())
    }

    /// Draw one row, batching runs of equal style
    fn render_row<W: Write>(&self, out: &mut W, row: &[Glyph], selection: Option<&Range<usize>>) -> io::Result<()> {
        let mut line_buffer = String::with_capacity(256);
        let mut current: Option<(TextKind, bool)> = None;

        for glyph in row {
            let selected = selection.map_or(false, |r| r.contains(&glyph.pos));
            let style = (glyph.kind, selected);
            if current != Some(style) {
                if let Some((kind, sel)) = current {
                    self.apply_style(out, kind, sel)?;
                    write!(out, "{}", line_buffer)?;
                    line_buffer.clear();
                }
                current = Some(style);
            }
            line_buffer.push_str(&glyph.text);
        }

        if let Some((kind, sel)) = current {
            if !line_buffer.is_empty() {
                self.apply_style(out, kind, sel)?;
                write!(out, "{}", line_buffer)?;
            }
        }
        Ok(())
    }

    fn apply_style<W: Write>(&self, out: &mut W, kind: TextKind, selected: bool) -> io::Result<()> {
        let cs = &self.color_scheme;
        execute!(out, SetAttribute(Attribute::Reset), ResetColor)?;
        if selected {
            execute!(
                out,
                SetBackgroundColor(cs.selection_bg.to_crossterm()),
                SetForegroundColor(cs.selection_fg.to_crossterm())
            )?;
        } else {
            execute!(out, SetForegroundColor(cs.color_for(kind).to_crossterm()))?;
        }
        Ok(())
    }

    /// Render the status bar
    fn render_status_bar<W: Write>(&self, out: &mut W, control: &ConsoleControl, cols: u16, rows: u16) -> io::Result<()> {
        let cs = &self.color_scheme;
        let status_y = rows.saturating_sub(1);
        execute!(out, MoveTo(0, status_y))?;

        let status = status_text(control);
        let (bg, fg) = if control.is_running() {
            (cs.status_running_bg, cs.status_running_fg)
        } else {
            (cs.status_bar_bg, cs.status_bar_fg)
        };
        execute!(out, SetBackgroundColor(bg.to_crossterm()), SetForegroundColor(fg.to_crossterm()))?;

        let width = cols as usize;
        let left_len = status.chars().count();
        let right_len = SHORTCUTS.len();
        if left_len + right_len + 2 <= width {
            let padding = width - (left_len + right_len + 2);
            write!(out, " {}{:padding$}{} ", status, "", SHORTCUTS, padding = padding)?;
        } else {
            let clipped: String = status.chars().take(width.saturating_sub(1)).collect();
            write!(out, " {:<w$}", clipped, w = width.saturating_sub(1))?;
        }

        execute!(out, ResetColor)?;
        Ok(())
    }

    /// Render the prompt box; returns where the cursor goes
    fn render_prompt<W: Write>(&self, out: &mut W, prompt: &NewProcessPrompt, cols: u16, rows: u16) -> io::Result<(u16, u16)> {
        let cs = &self.color_scheme;
        let box_width = 60.min(cols.saturating_sub(4)).max(20) as usize;
        let box_height = 7;
        let start_x = ((cols as usize).saturating_sub(box_width) / 2) as u16;
        let start_y = ((rows as usize).saturating_sub(box_height) / 2) as u16;
        let inner = box_width - 2;
        let label_width = 11;
        let field_width = inner.saturating_sub(label_width + 2);

        execute!(
            out,
            SetBackgroundColor(cs.prompt_bg.to_crossterm()),
            SetForegroundColor(cs.prompt_border.to_crossterm())
        )?;

        let title = "─ Run Process ";
        execute!(out, MoveTo(start_x, start_y))?;
        write!(out, "┌{}{}┐", title, "─".repeat(inner.saturating_sub(title.chars().count())))?;
        for dy in 1..box_height as u16 - 1 {
            execute!(out, MoveTo(start_x, start_y + dy))?;
            write!(out, "│{:inner$}│", "", inner = inner)?;
        }
        let help = " Tab:Next  Enter:Run  Esc:Cancel ";
        let help_len = help.chars().count();
        let left = inner.saturating_sub(help_len) / 2;
        let right = inner.saturating_sub(help_len + left);
        execute!(out, MoveTo(start_x, start_y + box_height as u16 - 1))?;
        write!(out, "└{}{}{}┘", "─".repeat(left), help, "─".repeat(right))?;

        let mut cursor = (start_x + 1, start_y + 2);
        let fields = [
            (PromptField::File, "Program:", prompt.file.as_str(), 2u16),
            (PromptField::Arguments, "Arguments:", prompt.arguments.as_str(), 4u16),
        ];
        for (field, label, value, dy) in fields {
            let y = start_y + dy;
            execute!(
                out,
                MoveTo(start_x + 2, y),
                SetBackgroundColor(cs.prompt_bg.to_crossterm()),
                SetForegroundColor(cs.prompt_fg.to_crossterm())
            )?;
            write!(out, "{:<w$}", label, w = label_width)?;

            let shown = tail_to_width(value, field_width.saturating_sub(1));
            execute!(out, SetBackgroundColor(cs.prompt_field_bg.to_crossterm()))?;
            write!(out, "{}", shown)?;
            let used: usize = shown.chars().map(|c| c.width().unwrap_or(0)).sum();
            write!(out, "{:w$}", "", w = field_width.saturating_sub(used))?;

            if prompt.focus == field {
                let x = start_x as usize + 2 + label_width + used;
                cursor = (x.min(u16::MAX as usize) as u16, y);
            }
        }

        execute!(out, ResetColor)?;
        Ok(cursor)
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

/// Status bar text for a console
pub fn status_text(control: &ConsoleControl) -> String {
    if !control.is_running() {
        return "Not Running".to_string();
    }
    match control.process_file_name() {
        Some(file) => format!("Running {}", file.display()),
        None => "Running".to_string(),
    }
}

/// Longest suffix of `text` that fits in `width` columns
fn tail_to_width(text: &str, width: usize) -> &str {
    let mut used = 0;
    let mut start = text.len();
    for (i, ch) in text.char_indices().rev() {
        let w = ch.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        start = i;
    }
    &text[start..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::Severity;

    fn out() -> TextKind {
        TextKind::Output(Severity::Normal)
    }

    fn row_text(row: &[Glyph]) -> String {
        row.iter().map(|g| g.text.as_str()).collect()
    }

    #[test]
    fn test_layout_wraps_long_lines() {
        let mut buffer = ConsoleBuffer::new();
        buffer.append("abcdefgh\nxy", out());
        let layout = ScreenLayout::build(&buffer, 5);
        let rows: Vec<String> = layout.rows.iter().map(|r| row_text(r)).collect();
        assert_eq!(rows, vec!["abcde", "fgh", "xy"]);
        assert_eq!(layout.caret, Some((2, 2)));
    }

    #[test]
    fn test_layout_expands_tabs() {
        let mut buffer = ConsoleBuffer::new();
        buffer.append("a\tb", out());
        let layout = ScreenLayout::build(&buffer, 80);
        assert_eq!(row_text(&layout.rows[0]), format!("a{}b", " ".repeat(TAB_WIDTH - 1)));
        assert_eq!(layout.caret, Some((0, TAB_WIDTH + 1)));
    }

    #[test]
    fn test_layout_skips_carriage_returns() {
        let mut buffer = ConsoleBuffer::new();
        buffer.append("dir\r\n", out());
        let layout = ScreenLayout::build(&buffer, 80);
        assert_eq!(row_text(&layout.rows[0]), "dir");
        assert_eq!(layout.caret, Some((1, 0)));
    }

    #[test]
    fn test_wide_chars_wrap_whole() {
        let mut buffer = ConsoleBuffer::new();
        buffer.append("ab日本", out());
        let layout = ScreenLayout::build(&buffer, 5);
        let rows: Vec<String> = layout.rows.iter().map(|r| row_text(r)).collect();
        assert_eq!(rows, vec!["ab日", "本"]);
    }

    #[test]
    fn test_caret_at_right_edge_moves_down() {
        let mut buffer = ConsoleBuffer::new();
        buffer.append("abcde", out());
        let layout = ScreenLayout::build(&buffer, 5);
        assert_eq!(layout.caret, Some((1, 0)));
        assert_eq!(layout.rows.len(), 2);
    }

    #[test]
    fn test_input_glyphs_are_input_kind() {
        let mut buffer = ConsoleBuffer::new();
        buffer.append("$ ", out());
        buffer.insert_str("ls");
        let layout = ScreenLayout::build(&buffer, 80);
        let kinds: Vec<TextKind> = layout.rows[0].iter().map(|g| g.kind).collect();
        assert_eq!(kinds, vec![out(), out(), TextKind::Input, TextKind::Input]);
        assert_eq!(layout.rows[0][3].pos, 3);
    }

    #[test]
    fn test_layout_of_middle_lines() {
        let mut buffer = ConsoleBuffer::new();
        buffer.append("a\nb\nc\n", out());
        let layout = ScreenLayout::build_lines(&buffer, 80, 1..2);
        let rows: Vec<String> = layout.rows.iter().map(|r| row_text(r)).collect();
        assert_eq!(rows, vec!["b"]);
        assert_eq!(layout.rows[0][0].pos, 2);
        // The caret is on the last line, outside the range
        assert_eq!(layout.caret, None);

        let tail = ScreenLayout::build_lines(&buffer, 80, 2..4);
        let rows: Vec<String> = tail.rows.iter().map(|r| row_text(r)).collect();
        assert_eq!(rows, vec!["c", ""]);
        assert_eq!(tail.caret, Some((1, 0)));
    }

    #[test]
    fn test_frame_lines() {
        // Bottom of a long document
        assert_eq!(frame_lines(10_000, 9_999, 20, 0), 9_980..10_000);
        // Scrolled up a page
        assert_eq!(frame_lines(10_000, 9_999, 20, 20), 9_960..10_000);
        // Caret moved far up into history
        assert_eq!(frame_lines(10_000, 100, 20, 0), 100..120);
        // Short document
        assert_eq!(frame_lines(5, 4, 20, 0), 0..5);
    }

    #[test]
    fn test_visible_top() {
        // Bottom of a long document
        assert_eq!(visible_top(100, 20, 0, 99), 80);
        // Scrolled up
        assert_eq!(visible_top(100, 20, 5, 99), 75);
        // Short document
        assert_eq!(visible_top(10, 20, 0, 9), 0);
        // Caret moved into history
        assert_eq!(visible_top(100, 20, 0, 40), 40);
    }

    #[test]
    fn test_status_text() {
        let control = ConsoleControl::default();
        assert_eq!(status_text(&control), "Not Running");
    }

    #[test]
    fn test_tail_to_width() {
        assert_eq!(tail_to_width("hello", 3), "llo");
        assert_eq!(tail_to_width("hi", 10), "hi");
        assert_eq!(tail_to_width("日本語", 4), "本語");
    }
}
