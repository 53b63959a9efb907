#![forbid(unsafe_code)]

//! Width measurement and width-safe truncation.
//!
//! Widths are measured in terminal cells. Control characters cannot be
//! printed verbatim without moving the cursor, so they are measured (and
//! rendered) as a one-cell [`placeholder`].

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthChar;

const PLACEHOLDER: char = '?';

/// Whether `ch` would disturb the terminal if written verbatim.
#[inline]
#[must_use]
pub fn is_control(ch: char) -> bool {
    ch.is_control()
}

/// The character printed in place of a control character.
#[inline]
#[must_use]
pub const fn placeholder() -> char {
    PLACEHOLDER
}

/// Display width of one codepoint in cells.
#[inline]
#[must_use]
pub fn char_width(ch: char) -> usize {
    if is_control(ch) {
        1
    } else {
        ch.width().unwrap_or(0)
    }
}

/// Display width of `text` in cells.
#[must_use]
pub fn display_width(text: &str) -> usize {
    if text.is_ascii() && !text.bytes().any(|b| b < 0x20 || b == 0x7f) {
        return text.len();
    }
    text.chars().map(char_width).sum()
}

/// Longest prefix of `text` that fits in `max_width` cells.
///
/// Cuts only at grapheme boundaries, so a wide character or a base
/// character with its combining marks is never split.
#[must_use]
pub fn truncate_to_width(text: &str, max_width: usize) -> &str {
    let mut width = 0;
    for (idx, grapheme) in text.grapheme_indices(true) {
        let w: usize = grapheme.chars().map(char_width).sum();
        if width + w > max_width {
            return &text[..idx];
        }
        width += w;
    }
    text
}

/// One grapheme of a line, with its codepoint offset and width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    /// Index of the first codepoint of the grapheme within the line.
    pub first_char: usize,
    /// Number of codepoints in the grapheme.
    pub char_count: usize,
    /// Display width in cells.
    pub width: usize,
    /// The grapheme text.
    pub text: &'a str,
}

impl Segment<'_> {
    /// Whether the grapheme contains codepoint `index`.
    #[must_use]
    pub fn contains_char(&self, index: usize) -> bool {
        index >= self.first_char && index < self.first_char + self.char_count
    }

    /// Whether the grapheme has a control character that needs a placeholder.
    #[must_use]
    pub fn needs_placeholder(&self) -> bool {
        self.text.chars().any(is_control)
    }
}

/// Split `text` into graphemes with codepoint offsets.
pub fn segments(text: &str) -> impl Iterator<Item = Segment<'_>> {
    let mut first_char = 0;
    text.graphemes(true).map(move |g| {
        let char_count = g.chars().count();
        let seg = Segment {
            first_char,
            char_count,
            width: g.chars().map(char_width).sum(),
            text: g,
        };
        first_char += char_count;
        seg
    })
}
