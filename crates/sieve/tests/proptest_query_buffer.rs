//! Property tests for query editing.
//!
//! Edits move and delete whole codepoints: after any sequence of edits the
//! buffer agrees with a plain `Vec<char>` model and the cursor stays on a
//! codepoint boundary.

use proptest::prelude::*;
use sieve::query::QueryBuffer;

#[derive(Debug, Clone)]
enum Edit {
    Insert(char),
    Backspace,
    DeleteForward,
    DeleteWordBack,
    ClearToStart,
    Home,
    End,
    Left,
    Right,
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        4 => prop_oneof![
            prop::char::range('a', 'e'),
            Just(' '),
            Just('é'),
            Just('中'),
            Just('😀'),
        ]
        .prop_map(Edit::Insert),
        1 => Just(Edit::Backspace),
        1 => Just(Edit::DeleteForward),
        1 => Just(Edit::DeleteWordBack),
        1 => Just(Edit::ClearToStart),
        1 => Just(Edit::Home),
        1 => Just(Edit::End),
        2 => Just(Edit::Left),
        2 => Just(Edit::Right),
    ]
}

/// Reference model: characters plus cursor.
fn model_apply(chars: &mut Vec<char>, cursor: &mut usize, edit: &Edit) {
    match *edit {
        Edit::Insert(c) => {
            chars.insert(*cursor, c);
            *cursor += 1;
        }
        Edit::Backspace => {
            if *cursor > 0 {
                *cursor -= 1;
                chars.remove(*cursor);
            }
        }
        Edit::DeleteForward => {
            if *cursor < chars.len() {
                chars.remove(*cursor);
            }
        }
        Edit::DeleteWordBack => {
            let mut start = *cursor;
            while start > 0 && chars[start - 1] == ' ' {
                start -= 1;
            }
            while start > 0 && chars[start - 1] != ' ' {
                start -= 1;
            }
            chars.drain(start..*cursor);
            *cursor = start;
        }
        Edit::ClearToStart => {
            chars.drain(..*cursor);
            *cursor = 0;
        }
        Edit::Home => *cursor = 0,
        Edit::End => *cursor = chars.len(),
        Edit::Left => *cursor = cursor.saturating_sub(1),
        Edit::Right => *cursor = (*cursor + 1).min(chars.len()),
    }
}

fn buffer_apply(q: &mut QueryBuffer, edit: &Edit) -> bool {
    match *edit {
        Edit::Insert(c) => {
            q.insert(c);
            true
        }
        Edit::Backspace => q.backspace(),
        Edit::DeleteForward => q.delete_forward(),
        Edit::DeleteWordBack => q.delete_word_back(),
        Edit::ClearToStart => q.clear_to_start(),
        Edit::Home => q.home(),
        Edit::End => q.end(),
        Edit::Left => q.left(),
        Edit::Right => q.right(),
    }
}

proptest! {
    #[test]
    fn edits_agree_with_char_model(edits in prop::collection::vec(edit(), 0..64)) {
        let mut q = QueryBuffer::new();
        let mut chars = Vec::new();
        let mut cursor = 0;
        for e in &edits {
            let before = (q.text(), q.cursor());
            let changed = buffer_apply(&mut q, e);
            model_apply(&mut chars, &mut cursor, e);

            prop_assert_eq!(q.chars(), chars.as_slice());
            prop_assert_eq!(q.cursor(), cursor);
            prop_assert!(q.cursor() <= q.len());
            prop_assert_eq!(changed, before != (q.text(), q.cursor()));
        }
        let text = q.text();
        prop_assert_eq!(text.chars().count(), q.len());
        prop_assert_eq!(text, chars.iter().collect::<String>());
    }

    #[test]
    fn backspace_removes_exactly_one_codepoint(text in "[a-c中😀é]{1,16}") {
        let mut q = QueryBuffer::from_text(&text);
        let expected: String = {
            let mut chars: Vec<char> = text.chars().collect();
            chars.pop();
            chars.into_iter().collect()
        };
        prop_assert!(q.backspace());
        prop_assert_eq!(q.text(), expected);
    }
}
