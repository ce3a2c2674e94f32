//! Single-line text input used by the form fields.

/// A text input with a char-indexed cursor and placeholder text.
///
/// The cursor counts characters, not bytes, so edits stay on char
/// boundaries with multi-byte input.
#[derive(Debug, Clone)]
pub struct InputField {
    pub value: String,
    pub cursor: usize,
    pub placeholder: &'static str,
}

impl InputField {
    /// Create an empty field with the given placeholder.
    pub fn new(placeholder: &'static str) -> Self {
        Self {
            value: String::new(),
            cursor: 0,
            placeholder,
        }
    }

    /// Create a field seeded with a value, cursor at the end.
    pub fn with_value(placeholder: &'static str, value: &str) -> Self {
        Self {
            value: value.to_string(),
            cursor: value.chars().count(),
            placeholder,
        }
    }

    fn byte_index(&self) -> usize {
        self.value
            .char_indices()
            .nth(self.cursor)
            .map(|(i, _)| i)
            .unwrap_or(self.value.len())
    }

    /// Insert a character at the cursor.
    pub fn handle_char(&mut self, c: char) {
        let at = self.byte_index();
        self.value.insert(at, c);
        self.cursor += 1;
    }

    /// Delete the character before the cursor.
    pub fn handle_backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let at = self.byte_index();
            self.value.remove(at);
        }
    }

    /// Delete the character at the cursor.
    pub fn handle_delete(&mut self) {
        if self.cursor < self.value.chars().count() {
            let at = self.byte_index();
            self.value.remove(at);
        }
    }

    /// Move cursor one position to the left.
    pub fn move_cursor_left(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
        }
    }

    /// Move cursor one position to the right.
    pub fn move_cursor_right(&mut self) {
        if self.cursor < self.value.chars().count() {
            self.cursor += 1;
        }
    }

    /// Value with surrounding whitespace trimmed, as validation sees it.
    pub fn trimmed(&self) -> &str {
        self.value.trim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edits_stay_on_char_boundaries() {
        let mut f = InputField::with_value("", "héllo");
        f.move_cursor_left();
        f.handle_backspace(); // removes the second 'l'
        assert_eq!(f.value, "hélo");
        f.handle_char('L');
        assert_eq!(f.value, "héLlo");
    }

    #[test]
    fn backspace_at_start_and_delete_at_end_are_no_ops() {
        let mut f = InputField::new("Name");
        f.handle_backspace();
        f.handle_delete();
        assert_eq!(f.value, "");
        assert_eq!(f.cursor, 0);
    }
}
