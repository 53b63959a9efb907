#![forbid(unsafe_code)]

//! Validated run configuration.

use std::path::PathBuf;
use std::time::Duration;

use sieve_core::KeymapOptions;
use sieve_tty::{DEFAULT_KEY_TIMEOUT, TtyOptions};

/// Requested number of result rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCount {
    /// At most this many rows.
    Count(usize),
    /// As many rows as the terminal has room for.
    Max,
}

impl LineCount {
    /// Rows to show on a terminal `height` rows tall, with `chrome` rows
    /// taken by the prompt and info line.
    #[must_use]
    pub fn resolve(self, height: u16, chrome: usize) -> usize {
        let room = usize::from(height).saturating_sub(chrome);
        match self {
            Self::Count(n) => n.min(room),
            Self::Max => room,
        }
    }
}

/// Context rows kept around the selection when scrolling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollOff {
    /// Half of the visible rows.
    Auto,
    /// A fixed number of rows.
    Rows(usize),
}

/// Record separator on input and output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    /// `\n`
    Newline,
    /// `\0`
    Nul,
}

impl Delimiter {
    /// The separator byte.
    #[must_use]
    pub const fn byte(self) -> u8 {
        match self {
            Self::Newline => b'\n',
            Self::Nul => 0,
        }
    }
}

/// Everything a run needs, already parsed and validated.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Result rows.
    pub lines: LineCount,
    /// Prompt shown before the query.
    pub prompt: String,
    /// Initial query.
    pub query: String,
    /// Worker threads used for ranking.
    pub workers: usize,
    /// Show the score column.
    pub show_scores: bool,
    /// Show the `matched/total` line.
    pub show_info: bool,
    /// Input record separator.
    pub input_delimiter: Delimiter,
    /// Control terminal device.
    pub tty: PathBuf,
    /// Non-interactive query (`-e`).
    pub filter: Option<String>,
    /// Tab marks entries.
    pub multi: bool,
    /// Cap on the number of candidates read.
    pub max_items: Option<usize>,
    /// Left padding of every row.
    pub pad: usize,
    /// Selection wraps around.
    pub cycle: bool,
    /// Shown in front of the highlighted row.
    pub pointer: String,
    /// Shown in front of marked rows.
    pub marker: String,
    /// Leave the last frame on screen on exit.
    pub no_clear: bool,
    /// Emit SGR colors.
    pub color: bool,
    /// Rank by score; when off, results stay in input order.
    pub sort: bool,
    /// Output records end with NUL.
    pub print_null: bool,
    /// Scroll context.
    pub scroll_off: ScrollOff,
    /// Tab confirms.
    pub tab_accepts: bool,
    /// Right arrow confirms.
    pub right_accepts: bool,
    /// Left arrow cancels.
    pub left_aborts: bool,
    /// Wait before a lone `ESC` is the Escape key.
    pub key_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lines: LineCount::Count(10),
            prompt: "> ".into(),
            query: String::new(),
            workers: std::thread::available_parallelism().map_or(1, |n| n.get()),
            show_scores: false,
            show_info: false,
            input_delimiter: Delimiter::Newline,
            tty: PathBuf::from("/dev/tty"),
            filter: None,
            multi: false,
            max_items: None,
            pad: 0,
            cycle: false,
            pointer: ">".into(),
            marker: "*".into(),
            no_clear: false,
            color: true,
            sort: true,
            print_null: false,
            scroll_off: ScrollOff::Auto,
            tab_accepts: false,
            right_accepts: false,
            left_aborts: false,
            key_timeout: DEFAULT_KEY_TIMEOUT,
        }
    }
}

impl Config {
    /// Output record terminator.
    #[must_use]
    pub const fn output_delimiter(&self) -> u8 {
        if self.print_null { 0 } else { b'\n' }
    }

    /// Rows taken by the prompt and the optional info line.
    #[must_use]
    pub fn chrome_rows(&self) -> usize {
        1 + usize::from(self.show_info)
    }

    /// Key binding switches.
    #[must_use]
    pub fn keymap_options(&self) -> KeymapOptions {
        KeymapOptions {
            multi: self.multi,
            tab_accepts: self.tab_accepts,
            right_accepts: self.right_accepts,
            left_aborts: self.left_aborts,
        }
    }

    /// How to open the control terminal.
    #[must_use]
    pub fn tty_options(&self) -> TtyOptions {
        TtyOptions {
            path: self.tty.clone(),
            key_timeout: self.key_timeout,
            ..TtyOptions::default()
        }
    }
}
