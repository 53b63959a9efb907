#![forbid(unsafe_code)]

//! The editable query line.
//!
//! The buffer is a sequence of codepoints with a cursor measured in
//! codepoints, so every edit removes or moves over whole characters no
//! matter how many bytes they take in UTF-8.

use sieve_text::char_width;

/// Query text plus cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryBuffer {
    chars: Vec<char>,
    cursor: usize,
}

impl QueryBuffer {
    /// An empty query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A query holding `text`, with the cursor at the end.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let cursor = chars.len();
        Self { chars, cursor }
    }

    /// The query as a string.
    #[must_use]
    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }

    /// The query codepoints.
    #[must_use]
    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    /// Cursor position in codepoints.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Number of codepoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// Display width of the text left of the cursor.
    #[must_use]
    pub fn cursor_width(&self) -> usize {
        self.chars[..self.cursor].iter().copied().map(char_width).sum()
    }

    /// Insert `ch` at the cursor.
    pub fn insert(&mut self, ch: char) {
        self.chars.insert(self.cursor, ch);
        self.cursor += 1;
    }

    /// Delete the codepoint before the cursor.
    pub fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        self.chars.remove(self.cursor);
        true
    }

    /// Delete the codepoint under the cursor.
    pub fn delete_forward(&mut self) -> bool {
        if self.cursor == self.chars.len() {
            return false;
        }
        self.chars.remove(self.cursor);
        true
    }

    /// Delete whitespace before the cursor, then the word before that.
    pub fn delete_word_back(&mut self) -> bool {
        let end = self.cursor;
        let mut start = end;
        while start > 0 && self.chars[start - 1].is_whitespace() {
            start -= 1;
        }
        while start > 0 && !self.chars[start - 1].is_whitespace() {
            start -= 1;
        }
        if start == end {
            return false;
        }
        self.chars.drain(start..end);
        self.cursor = start;
        true
    }

    /// Delete everything before the cursor.
    pub fn clear_to_start(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.chars.drain(..self.cursor);
        self.cursor = 0;
        true
    }

    pub fn home(&mut self) -> bool {
        std::mem::replace(&mut self.cursor, 0) != 0
    }

    pub fn end(&mut self) -> bool {
        let end = self.chars.len();
        std::mem::replace(&mut self.cursor, end) != end
    }

    pub fn left(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        true
    }

    pub fn right(&mut self) -> bool {
        if self.cursor == self.chars.len() {
            return false;
        }
        self.cursor += 1;
        true
    }
}
