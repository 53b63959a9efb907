//! Property tests for width-safe truncation.
//!
//! 1. Truncated text never exceeds the requested width.
//! 2. Truncated text is a prefix of the input.
//! 3. Truncation is maximal: the next grapheme would not fit.

use proptest::prelude::*;
use sieve_text::{display_width, segments, truncate_to_width};

fn mixed_text() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            "[a-z ]",
            Just("中".to_string()),
            Just("é".to_string()),
            Just("e\u{301}".to_string()),
            Just("\t".to_string()),
        ],
        0..20,
    )
    .prop_map(|parts| parts.concat())
}

proptest! {
    #[test]
    fn truncated_fits(text in mixed_text(), width in 0usize..30) {
        let cut = truncate_to_width(&text, width);
        prop_assert!(display_width(cut) <= width);
        prop_assert!(text.starts_with(cut));
    }

    #[test]
    fn truncation_is_maximal(text in mixed_text(), width in 0usize..30) {
        let cut = truncate_to_width(&text, width);
        if cut.len() < text.len() {
            let next = segments(&text[cut.len()..]).next().map(|s| s.width).unwrap_or(0);
            prop_assert!(display_width(cut) + next > width);
        }
    }
}
