#![forbid(unsafe_code)]

//! Terminal display width of text.

pub mod width;

pub use width::{
    Segment, char_width, display_width, is_control, placeholder, segments, truncate_to_width,
};
