#![forbid(unsafe_code)]

//! Core: key events, input decoding, and the key → action map.

pub mod event;
pub mod input_parser;
pub mod keymap;

pub use event::{Event, KeyCode, KeyEvent, Modifiers, PasteEvent};
pub use input_parser::InputParser;
pub use keymap::{Action, Keymap, KeymapOptions};
