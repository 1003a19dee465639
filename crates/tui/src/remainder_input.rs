//! UTF-8 safe input state for the nested path of a reference.
//!
//! Besides the usual cursor primitives the input knows about the `.`
//! separator so whole path segments can be removed at once.

use unicode_width::UnicodeWidthStr;

/// Path separator inside a remainder.
const SEGMENT_SEPARATOR: char = '.';

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemainderInput {
    /// The underlying text buffer
    input: String,
    /// Cursor byte index into `input` (always on a UTF-8 boundary)
    cursor: usize,
}

impl RemainderInput {
    /// Input pre-filled with `text`, cursor at the end.
    pub fn new(text: impl Into<String>) -> Self {
        let input = text.into();
        let cursor = input.len();
        Self { input, cursor }
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Display column of the cursor.
    pub fn cursor_column(&self) -> usize {
        self.input[..self.cursor].width()
    }

    pub fn is_empty(&self) -> bool {
        self.input.trim().is_empty()
    }

    /// Move cursor one Unicode scalar to the left.
    pub fn move_left(&mut self) {
        if let Some(previous) = self.input[..self.cursor].chars().next_back() {
            self.cursor -= previous.len_utf8();
        }
    }

    /// Move cursor one Unicode scalar to the right.
    pub fn move_right(&mut self) {
        if let Some(next) = self.input[self.cursor..].chars().next() {
            self.cursor += next.len_utf8();
        }
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.input.len();
    }

    pub fn insert_char(&mut self, c: char) {
        self.input.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    /// Backspace the char immediately before the cursor.
    pub fn backspace(&mut self) {
        if let Some(previous) = self.input[..self.cursor].chars().next_back() {
            let start = self.cursor - previous.len_utf8();
            self.input.drain(start..self.cursor);
            self.cursor = start;
        }
    }

    /// Delete the char under the cursor.
    pub fn delete(&mut self) {
        if let Some(next) = self.input[self.cursor..].chars().next() {
            self.input.drain(self.cursor..self.cursor + next.len_utf8());
        }
    }

    /// Remove the path segment before the cursor together with the
    /// separator that precedes it: `rows.0.na|me` becomes `rows.0|me`.
    pub fn delete_segment(&mut self) {
        let before = &self.input[..self.cursor];
        let trimmed = before.strip_suffix(SEGMENT_SEPARATOR).unwrap_or(before);
        let start = trimmed.rfind(SEGMENT_SEPARATOR).unwrap_or(0);
        self.input.drain(start..self.cursor);
        self.cursor = start;
    }
}
