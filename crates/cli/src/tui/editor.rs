use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// What a key press did to the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EditOutcome {
    /// Text changed; the caller should write it back to the playground.
    Changed,
    /// Only the cursor moved.
    Moved,
    /// Key is not an editing key.
    Ignored,
}

/// Line-based text buffer with a cursor.
///
/// Splitting on `\n` and joining back is lossless (a trailing newline becomes
/// a trailing empty line, `\r` stays inside its line), so `text()` on a freshly
/// loaded editor returns exactly what was loaded.
#[derive(Debug, Clone)]
pub(crate) struct TextEditor {
    lines: Vec<String>,
    cursor_row: usize,
    /// Cursor column in chars, not bytes
    cursor_col: usize,
    scroll_row: usize,
    tab_width: usize,
}

impl TextEditor {
    pub(crate) fn new(text: &str, tab_width: usize) -> Self {
        let mut editor = Self {
            lines: Vec::new(),
            cursor_row: 0,
            cursor_col: 0,
            scroll_row: 0,
            tab_width: tab_width.max(1),
        };
        editor.load(text);
        editor
    }

    /// Replace contents, moving the cursor to the start.
    pub(crate) fn load(&mut self, text: &str) {
        self.lines = text.split('\n').map(str::to_string).collect();
        self.cursor_row = 0;
        self.cursor_col = 0;
        self.scroll_row = 0;
    }

    pub(crate) fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub(crate) fn lines(&self) -> &[String] {
        &self.lines
    }

    pub(crate) fn cursor(&self) -> (usize, usize) {
        (self.cursor_row, self.cursor_col)
    }

    pub(crate) fn scroll_row(&self) -> usize {
        self.scroll_row
    }

    pub(crate) fn handle_key(&mut self, key: KeyEvent) -> EditOutcome {
        // AltGr arrives as Ctrl+Alt on Windows
        let alt_gr = matches!(key.code, KeyCode::Char(_))
            && key.modifiers.contains(KeyModifiers::CONTROL | KeyModifiers::ALT);
        if !alt_gr
            && key
                .modifiers
                .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER)
        {
            return EditOutcome::Ignored;
        }
        match key.code {
            KeyCode::Char(c) => {
                self.insert_char(c);
                EditOutcome::Changed
            }
            KeyCode::Enter => {
                self.insert_newline();
                EditOutcome::Changed
            }
            KeyCode::Tab => {
                for _ in 0..self.tab_width {
                    self.insert_char(' ');
                }
                EditOutcome::Changed
            }
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            KeyCode::Up => self.move_vertical(-1),
            KeyCode::Down => self.move_vertical(1),
            KeyCode::PageUp => self.move_vertical(-20),
            KeyCode::PageDown => self.move_vertical(20),
            KeyCode::Home => {
                self.cursor_col = 0;
                EditOutcome::Moved
            }
            KeyCode::End => {
                self.cursor_col = self.line_len(self.cursor_row);
                EditOutcome::Moved
            }
            _ => EditOutcome::Ignored,
        }
    }

    pub(crate) fn adjust_scroll(&mut self, viewport_height: usize) {
        if viewport_height == 0 {
            return;
        }
        if self.cursor_row < self.scroll_row {
            self.scroll_row = self.cursor_row;
        }
        if self.cursor_row >= self.scroll_row + viewport_height {
            self.scroll_row = self.cursor_row + 1 - viewport_height;
        }
    }

    fn line_len(&self, row: usize) -> usize {
        self.lines.get(row).map(|l| l.chars().count()).unwrap_or(0)
    }

    fn byte_offset(&self, row: usize, col: usize) -> usize {
        let line = &self.lines[row];
        line.char_indices()
            .nth(col)
            .map(|(i, _)| i)
            .unwrap_or(line.len())
    }

    fn insert_char(&mut self, c: char) {
        let at = self.byte_offset(self.cursor_row, self.cursor_col);
        self.lines[self.cursor_row].insert(at, c);
        self.cursor_col += 1;
    }

    fn insert_newline(&mut self) {
        let at = self.byte_offset(self.cursor_row, self.cursor_col);
        let rest = self.lines[self.cursor_row].split_off(at);
        self.lines.insert(self.cursor_row + 1, rest);
        self.cursor_row += 1;
        self.cursor_col = 0;
    }

    fn backspace(&mut self) -> EditOutcome {
        if self.cursor_col > 0 {
            let start = self.byte_offset(self.cursor_row, self.cursor_col - 1);
            let end = self.byte_offset(self.cursor_row, self.cursor_col);
            self.lines[self.cursor_row].replace_range(start..end, "");
            self.cursor_col -= 1;
            EditOutcome::Changed
        } else if self.cursor_row > 0 {
            let line = self.lines.remove(self.cursor_row);
            self.cursor_row -= 1;
            self.cursor_col = self.line_len(self.cursor_row);
            self.lines[self.cursor_row].push_str(&line);
            EditOutcome::Changed
        } else {
            EditOutcome::Moved
        }
    }

    fn delete(&mut self) -> EditOutcome {
        let len = self.line_len(self.cursor_row);
        if self.cursor_col < len {
            let start = self.byte_offset(self.cursor_row, self.cursor_col);
            let end = self.byte_offset(self.cursor_row, self.cursor_col + 1);
            self.lines[self.cursor_row].replace_range(start..end, "");
            EditOutcome::Changed
        } else if self.cursor_row + 1 < self.lines.len() {
            let next = self.lines.remove(self.cursor_row + 1);
            self.lines[self.cursor_row].push_str(&next);
            EditOutcome::Changed
        } else {
            EditOutcome::Moved
        }
    }

    fn move_left(&mut self) -> EditOutcome {
        if self.cursor_col > 0 {
            self.cursor_col -= 1;
        } else if self.cursor_row > 0 {
            self.cursor_row -= 1;
            self.cursor_col = self.line_len(self.cursor_row);
        }
        EditOutcome::Moved
    }

    fn move_right(&mut self) -> EditOutcome {
        if self.cursor_col < self.line_len(self.cursor_row) {
            self.cursor_col += 1;
        } else if self.cursor_row + 1 < self.lines.len() {
            self.cursor_row += 1;
            self.cursor_col = 0;
        }
        EditOutcome::Moved
    }

    fn move_vertical(&mut self, delta: isize) -> EditOutcome {
        let last = self.lines.len().saturating_sub(1) as isize;
        self.cursor_row = (self.cursor_row as isize + delta).clamp(0, last) as usize;
        self.cursor_col = self.cursor_col.min(self.line_len(self.cursor_row));
        EditOutcome::Moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_str(editor: &mut TextEditor, s: &str) {
        for c in s.chars() {
            editor.handle_key(key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn test_load_text_is_lossless() {
        for text in ["", "a", "a\n", "\n\n", "  <p>\r\n\tx</p>\n", "ünï\ncode"] {
            assert_eq!(TextEditor::new(text, 4).text(), text);
        }
    }

    #[test]
    fn test_insert_and_newline() {
        let mut e = TextEditor::new("", 4);
        type_str(&mut e, "<p>");
        e.handle_key(key(KeyCode::Enter));
        type_str(&mut e, "hi");
        assert_eq!(e.text(), "<p>\nhi");
        assert_eq!(e.cursor(), (1, 2));
    }

    #[test]
    fn test_backspace_joins_lines() {
        let mut e = TextEditor::new("ab\ncd", 4);
        e.handle_key(key(KeyCode::Down));
        assert_eq!(e.handle_key(key(KeyCode::Backspace)), EditOutcome::Changed);
        assert_eq!(e.text(), "abcd");
        assert_eq!(e.cursor(), (0, 2));
    }

    #[test]
    fn test_backspace_at_start_changes_nothing() {
        let mut e = TextEditor::new("x", 4);
        assert_eq!(e.handle_key(key(KeyCode::Backspace)), EditOutcome::Moved);
        assert_eq!(e.text(), "x");
    }

    #[test]
    fn test_multibyte_editing() {
        let mut e = TextEditor::new("héllo", 4);
        e.handle_key(key(KeyCode::Right));
        e.handle_key(key(KeyCode::Right));
        e.handle_key(key(KeyCode::Backspace));
        assert_eq!(e.text(), "hllo");
        e.handle_key(key(KeyCode::Delete));
        assert_eq!(e.text(), "hlo");
    }

    #[test]
    fn test_tab_inserts_spaces() {
        let mut e = TextEditor::new("", 2);
        e.handle_key(key(KeyCode::Tab));
        assert_eq!(e.text(), "  ");
    }

    #[test]
    fn test_control_keys_are_not_text() {
        let mut e = TextEditor::new("", 4);
        let ctrl_r = KeyEvent::new(KeyCode::Char('r'), KeyModifiers::CONTROL);
        assert_eq!(e.handle_key(ctrl_r), EditOutcome::Ignored);
        assert_eq!(e.text(), "");
    }

    #[test]
    fn test_altgr_characters_are_typed() {
        let mut e = TextEditor::new("", 4);
        let alt_gr = KeyModifiers::CONTROL | KeyModifiers::ALT;
        for c in ['{', '[', '@'] {
            assert_eq!(e.handle_key(KeyEvent::new(KeyCode::Char(c), alt_gr)), EditOutcome::Changed);
        }
        assert_eq!(e.text(), "{[@");

        let alt_left = KeyEvent::new(KeyCode::Left, alt_gr);
        assert_eq!(e.handle_key(alt_left), EditOutcome::Ignored);
        let alt_x = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::ALT);
        assert_eq!(e.handle_key(alt_x), EditOutcome::Ignored);
    }

    #[test]
    fn test_scroll_follows_cursor() {
        let text = (0..50).map(|i| i.to_string()).collect::<Vec<_>>().join("\n");
        let mut e = TextEditor::new(&text, 4);
        e.handle_key(key(KeyCode::PageDown));
        e.adjust_scroll(10);
        assert_eq!(e.scroll_row(), 11);
        e.handle_key(key(KeyCode::PageUp));
        e.adjust_scroll(10);
        assert_eq!(e.scroll_row(), 0);
    }
}
