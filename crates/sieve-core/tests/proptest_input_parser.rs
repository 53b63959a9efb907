//! Property tests for input decoding.
//!
//! 1. Arbitrary bytes never panic, and a flush always returns to ground.
//! 2. Typed UTF-8 text decodes to one key per codepoint, however it is split.
//! 3. Pasted text comes back verbatim.

use proptest::prelude::*;
use sieve_core::{Event, InputParser, KeyCode, PasteEvent};

proptest! {
    #[test]
    fn arbitrary_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let mut parser = InputParser::new();
        let _ = parser.parse(&bytes);
        let _ = parser.flush_pending();
        // Ground state is reachable unless a paste is still open.
        let after = parser.parse(b"\x1b[201~z");
        let ok = after.iter().any(|e| matches!(e, Event::Key(k) if k.code == KeyCode::Char('z')));
        prop_assert!(ok);
    }

    #[test]
    fn typed_text_decodes_per_codepoint(text in "[a-zA-Z0-9 é中ß]{0,32}", split in 0usize..64) {
        let bytes = text.as_bytes();
        let cut = split.min(bytes.len());
        let mut parser = InputParser::new();
        let mut events = parser.parse(&bytes[..cut]);
        events.extend(parser.parse(&bytes[cut..]));
        let chars: Vec<char> = events
            .iter()
            .filter_map(|e| match e {
                Event::Key(k) => match k.code {
                    KeyCode::Char(c) => Some(c),
                    _ => None,
                },
                _ => None,
            })
            .collect();
        prop_assert_eq!(chars, text.chars().collect::<Vec<_>>());
    }

    #[test]
    fn paste_is_verbatim(text in "[ -~\t\r\n]{0,64}") {
        prop_assume!(!text.contains("\x1b[201~"));
        let mut input = b"\x1b[200~".to_vec();
        input.extend_from_slice(text.as_bytes());
        input.extend_from_slice(b"\x1b[201~");
        let mut parser = InputParser::new();
        prop_assert_eq!(parser.parse(&input), vec![Event::Paste(PasteEvent::new(text))]);
    }
}
