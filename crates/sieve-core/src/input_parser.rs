#![forbid(unsafe_code)]

//! Input parser state machine.
//!
//! Decodes control-terminal bytes into [`crate::event::Event`] values.
//!
//! # Design
//!
//! The parser is a byte-at-a-time state machine that handles:
//! - ASCII characters and control codes
//! - UTF-8 multi-byte sequences (invalid input decodes to U+FFFD)
//! - CSI sequences (`ESC [`), including the `CSI 1;5H` modifier form
//! - SS3 sequences (`ESC O`), the "application cursor" arrow encoding
//! - Bracketed paste (`CSI 200~` ... `CSI 201~`)
//!
//! A lone `ESC` cannot be told apart from the start of a sequence until more
//! bytes arrive, so it stays pending. The owner of the byte stream calls
//! [`InputParser::flush_pending`] once the key timeout expires.
//!
//! # DoS Protection
//!
//! - CSI sequences: 256 bytes max
//! - Paste content: 1MB max (excess is dropped, the end marker is still seen)

use crate::event::{Event, KeyCode, KeyEvent, Modifiers, PasteEvent};

/// DoS protection: maximum CSI sequence length.
const MAX_CSI_LEN: usize = 256;

/// DoS protection: maximum paste content length.
const MAX_PASTE_LEN: usize = 1024 * 1024; // 1MB

/// Bracketed paste terminator.
const PASTE_END: &[u8] = b"\x1b[201~";

/// Parser state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ParserState {
    /// Normal character input.
    #[default]
    Ground,
    /// After ESC (0x1B).
    Escape,
    /// After ESC [ (CSI introducer).
    Csi,
    /// Collecting CSI parameters.
    CsiParam,
    /// After ESC O (SS3 introducer).
    Ss3,
    /// Collecting UTF-8 multi-byte sequence.
    Utf8 {
        /// Bytes collected so far.
        collected: u8,
        /// Total bytes expected.
        expected: u8,
    },
}

/// Terminal input parser with DoS protection.
///
/// ```
/// use sieve_core::{Event, InputParser, KeyCode};
///
/// let mut parser = InputParser::new();
/// let events = parser.parse(b"\x1b[A");
/// assert!(matches!(events[0], Event::Key(k) if k.code == KeyCode::Up));
/// ```
#[derive(Debug)]
pub struct InputParser {
    /// Current parser state.
    state: ParserState,
    /// Buffer for accumulating sequence bytes.
    buffer: Vec<u8>,
    /// Buffer for collecting paste content.
    paste_buffer: Vec<u8>,
    /// UTF-8 bytes collected so far.
    utf8_buffer: [u8; 4],
    /// Whether we're inside a bracketed paste.
    in_paste: bool,
}

impl Default for InputParser {
    fn default() -> Self {
        Self::new()
    }
}

impl InputParser {
    /// Create a new input parser.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ParserState::Ground,
            buffer: Vec::with_capacity(64),
            paste_buffer: Vec::new(),
            utf8_buffer: [0; 4],
            in_paste: false,
        }
    }

    /// Parse input bytes and return any completed events.
    pub fn parse(&mut self, input: &[u8]) -> Vec<Event> {
        let mut events = Vec::new();
        for &byte in input {
            self.process_byte(byte, &mut events);
        }
        events
    }

    /// Whether a partial sequence is waiting for more bytes.
    ///
    /// Paste content is not counted: a paste only ends with its marker.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.in_paste && self.state != ParserState::Ground
    }

    /// Resolve a partial sequence after the key timeout.
    ///
    /// A lone `ESC` (or an `ESC` followed by an unfinished sequence) becomes
    /// an Escape key press; an unfinished UTF-8 sequence becomes U+FFFD.
    pub fn flush_pending(&mut self) -> Option<Event> {
        if self.in_paste {
            return None;
        }
        let state = std::mem::take(&mut self.state);
        self.buffer.clear();
        match state {
            ParserState::Ground => None,
            ParserState::Escape | ParserState::Csi | ParserState::CsiParam | ParserState::Ss3 => {
                Some(Event::Key(KeyEvent::new(KeyCode::Escape)))
            }
            ParserState::Utf8 { .. } => Some(Self::replacement()),
        }
    }

    fn replacement() -> Event {
        Event::Key(KeyEvent::new(KeyCode::Char(char::REPLACEMENT_CHARACTER)))
    }

    /// Process a single byte, pushing any completed events.
    fn process_byte(&mut self, byte: u8, events: &mut Vec<Event>) {
        // In paste mode, collect bytes until end sequence
        if self.in_paste {
            if let Some(event) = self.process_paste_byte(byte) {
                events.push(event);
            }
            return;
        }

        let event = match self.state {
            ParserState::Ground => self.process_ground(byte),
            // ESC followed by a control byte (or a non-ASCII lead): the ESC
            // was a lone press and the byte is parsed on its own.
            ParserState::Escape if Self::ends_escape(byte) => {
                self.state = ParserState::Ground;
                events.push(Event::Key(KeyEvent::new(KeyCode::Escape)));
                self.process_ground(byte)
            }
            ParserState::Escape => self.process_escape(byte),
            ParserState::Csi => self.process_csi(byte),
            ParserState::CsiParam => self.process_csi_param(byte),
            ParserState::Ss3 => self.process_ss3(byte),
            ParserState::Utf8 {
                collected,
                expected,
            } => {
                if (byte & 0xC0) != 0x80 {
                    // Broken sequence: emit a placeholder, then reparse the
                    // byte that interrupted it.
                    self.state = ParserState::Ground;
                    events.push(Self::replacement());
                    self.process_ground(byte)
                } else {
                    self.process_utf8(byte, collected, expected)
                }
            }
        };
        if let Some(event) = event {
            events.push(event);
        }
    }

    /// Process byte in ground state.
    fn process_ground(&mut self, byte: u8) -> Option<Event> {
        match byte {
            // ESC - start escape sequence
            0x1B => {
                self.state = ParserState::Escape;
                None
            }
            // NUL - Ctrl+Space or Ctrl+@
            0x00 => Some(Event::Key(KeyEvent::ctrl_char(' '))),
            // Tab (Ctrl+I) - check before generic Ctrl range
            0x09 => Some(Event::Key(KeyEvent::new(KeyCode::Tab))),
            // Enter (Ctrl+M) - check before generic Ctrl range
            0x0D => Some(Event::Key(KeyEvent::new(KeyCode::Enter))),
            // Other Ctrl+A through Ctrl+Z (0x01-0x1A excluding Tab and Enter)
            0x01..=0x08 | 0x0A..=0x0C | 0x0E..=0x1A => {
                let c = (byte + b'a' - 1) as char;
                Some(Event::Key(KeyEvent::ctrl_char(c)))
            }
            // Ctrl+\ Ctrl+] Ctrl+^ Ctrl+_
            0x1C..=0x1F => None,
            // Backspace (DEL)
            0x7F => Some(Event::Key(KeyEvent::new(KeyCode::Backspace))),
            // Printable ASCII
            0x20..=0x7E => Some(Event::Key(KeyEvent::new(KeyCode::Char(byte as char)))),
            // UTF-8 lead bytes
            0xC2..=0xDF => self.begin_utf8(byte, 2),
            0xE0..=0xEF => self.begin_utf8(byte, 3),
            0xF0..=0xF4 => self.begin_utf8(byte, 4),
            // Stray continuation bytes and invalid leads
            _ => Some(Self::replacement()),
        }
    }

    /// Bytes that cannot continue an escape sequence.
    fn ends_escape(byte: u8) -> bool {
        !matches!(byte, b'[' | b'O' | 0x1B | 0x20..=0x7F)
    }

    fn begin_utf8(&mut self, byte: u8, expected: u8) -> Option<Event> {
        self.utf8_buffer[0] = byte;
        self.state = ParserState::Utf8 {
            collected: 1,
            expected,
        };
        None
    }

    /// Process byte after ESC.
    fn process_escape(&mut self, byte: u8) -> Option<Event> {
        match byte {
            // CSI introducer
            b'[' => {
                self.state = ParserState::Csi;
                self.buffer.clear();
                None
            }
            // SS3 introducer
            b'O' => {
                self.state = ParserState::Ss3;
                None
            }
            // ESC ESC: the first one was a lone press, the second stays pending.
            0x1B => Some(Event::Key(KeyEvent::new(KeyCode::Escape))),
            // Alt+letter or Alt+char
            0x20..=0x7E => {
                self.state = ParserState::Ground;
                Some(Event::Key(
                    KeyEvent::new(KeyCode::Char(byte as char)).with_modifiers(Modifiers::ALT),
                ))
            }
            // Alt+Backspace
            0x7F => {
                self.state = ParserState::Ground;
                Some(Event::Key(
                    KeyEvent::new(KeyCode::Backspace).with_modifiers(Modifiers::ALT),
                ))
            }
            _ => {
                self.state = ParserState::Ground;
                None
            }
        }
    }

    /// Process byte at start of CSI sequence.
    fn process_csi(&mut self, byte: u8) -> Option<Event> {
        self.buffer.push(byte);

        match byte {
            // Parameter bytes - continue collecting
            b'0'..=b'9' | b';' | b':' | b'<' | b'=' | b'>' | b'?' => {
                self.state = ParserState::CsiParam;
                None
            }
            // Final byte - parse and return
            b'A'..=b'Z' | b'a'..=b'z' | b'~' | b'^' => {
                self.state = ParserState::Ground;
                self.parse_csi_sequence()
            }
            // Invalid
            _ => {
                self.state = ParserState::Ground;
                self.buffer.clear();
                None
            }
        }
    }

    /// Process byte while collecting CSI parameters.
    fn process_csi_param(&mut self, byte: u8) -> Option<Event> {
        // DoS protection
        if self.buffer.len() >= MAX_CSI_LEN {
            tracing::trace!(len = self.buffer.len(), "dropping oversized CSI sequence");
            self.state = ParserState::Ground;
            self.buffer.clear();
            return None;
        }

        self.buffer.push(byte);

        match byte {
            // Continue collecting parameters
            b'0'..=b'9' | b';' | b':' => None,
            // Final byte - parse and return
            b'A'..=b'Z' | b'a'..=b'z' | b'~' | b'^' => {
                self.state = ParserState::Ground;
                self.parse_csi_sequence()
            }
            // Invalid
            _ => {
                self.state = ParserState::Ground;
                self.buffer.clear();
                None
            }
        }
    }

    /// Parse a complete CSI sequence from the buffer.
    fn parse_csi_sequence(&mut self) -> Option<Event> {
        let seq = std::mem::take(&mut self.buffer);
        let (&final_byte, params) = seq.split_last()?;

        // Bracketed paste
        match (params, final_byte) {
            (b"200", b'~') => {
                self.in_paste = true;
                self.paste_buffer.clear();
                return None;
            }
            // A stray end marker outside a paste is ignored.
            (b"201", b'~') => return None,
            _ => {}
        }

        let mut mods = Self::parse_modifier_param(params);
        let code = match final_byte {
            b'A' => KeyCode::Up,
            b'B' => KeyCode::Down,
            b'C' => KeyCode::Right,
            b'D' => KeyCode::Left,
            b'H' => KeyCode::Home,
            b'F' => KeyCode::End,
            b'Z' => KeyCode::BackTab,
            b'~' => Self::parse_tilde_code(params)?,
            // rxvt reports Ctrl with a `^` final byte instead of a parameter.
            b'^' => {
                mods |= Modifiers::CTRL;
                Self::parse_tilde_code(params)?
            }
            _ => return None,
        };

        Some(Event::Key(KeyEvent::new(code).with_modifiers(mods)))
    }

    /// Key for CSI sequences ending in `~`.
    fn parse_tilde_code(params: &[u8]) -> Option<KeyCode> {
        let s = std::str::from_utf8(params).ok()?;
        let num: u32 = s.split(';').next()?.parse().ok()?;
        match num {
            1 | 7 => Some(KeyCode::Home),
            2 => Some(KeyCode::Insert),
            3 => Some(KeyCode::Delete),
            4 | 8 => Some(KeyCode::End),
            5 => Some(KeyCode::PageUp),
            6 => Some(KeyCode::PageDown),
            _ => None,
        }
    }

    /// Parse modifier parameter (second param in CSI sequences).
    fn parse_modifier_param(params: &[u8]) -> Modifiers {
        let Ok(s) = std::str::from_utf8(params) else {
            return Modifiers::NONE;
        };

        let modifier_value: u32 = s
            .split(';')
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);

        // xterm modifier encoding: value = 1 + modifier_bits
        // Shift=1, Alt=2, Ctrl=4
        let bits = modifier_value.saturating_sub(1);
        let mut mods = Modifiers::NONE;
        if bits & 1 != 0 {
            mods |= Modifiers::SHIFT;
        }
        if bits & 2 != 0 {
            mods |= Modifiers::ALT;
        }
        if bits & 4 != 0 {
            mods |= Modifiers::CTRL;
        }
        mods
    }

    /// Process SS3 (ESC O) sequences.
    fn process_ss3(&mut self, byte: u8) -> Option<Event> {
        self.state = ParserState::Ground;

        let code = match byte {
            b'A' => KeyCode::Up,
            b'B' => KeyCode::Down,
            b'C' => KeyCode::Right,
            b'D' => KeyCode::Left,
            b'H' => KeyCode::Home,
            b'F' => KeyCode::End,
            _ => return None,
        };

        Some(Event::Key(KeyEvent::new(code)))
    }

    /// Process UTF-8 continuation bytes.
    fn process_utf8(&mut self, byte: u8, collected: u8, expected: u8) -> Option<Event> {
        self.utf8_buffer[collected as usize] = byte;
        let new_collected = collected + 1;

        if new_collected < expected {
            self.state = ParserState::Utf8 {
                collected: new_collected,
                expected,
            };
            return None;
        }

        self.state = ParserState::Ground;
        let c = std::str::from_utf8(&self.utf8_buffer[..expected as usize])
            .ok()
            .and_then(|s| s.chars().next())
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        Some(Event::Key(KeyEvent::new(KeyCode::Char(c))))
    }

    /// Process bytes while in paste mode.
    fn process_paste_byte(&mut self, byte: u8) -> Option<Event> {
        // DoS protection: past the limit keep only a rolling window wide
        // enough to recognize the end marker.
        if self.paste_buffer.len() >= MAX_PASTE_LEN {
            self.paste_buffer.remove(MAX_PASTE_LEN - PASTE_END.len());
        }
        self.paste_buffer.push(byte);

        if self.paste_buffer.ends_with(PASTE_END) {
            self.in_paste = false;
            let content_len = self.paste_buffer.len() - PASTE_END.len();
            let content = String::from_utf8_lossy(&self.paste_buffer[..content_len]).into_owned();
            self.paste_buffer.clear();
            return Some(Event::Paste(PasteEvent::new(content)));
        }

        None
    }
}
