#![forbid(unsafe_code)]

//! Inline frame rendering.
//!
//! A frame is drawn below the cursor and looks like this:
//!
//! ```text
//! > query                  prompt row (cursor stays here)
//!   12/340 (2)             info row, optional
//! [ 0.89] > foo            result rows, `rows` of them
//! [ 0.71]  *foobar
//! ```
//!
//! Every row is rewritten in full and cleared to the end of the line, with
//! auto-wrap off so an overlong row cannot scroll the screen. After the last
//! row the cursor moves back up to the prompt row at the query cursor.

use std::io::{self, Write};

use sieve_match::{Query, SCORE_MAX, SCORE_MIN, Scorer};
use sieve_search::{ResultSet, ScoredMatch};
use sieve_text::{Segment, display_width, placeholder, segments, truncate_to_width};
use sieve_tty::{AUTOWRAP_DISABLE, AUTOWRAP_ENABLE, CURSOR_HIDE, CURSOR_SHOW};

use crate::config::{Config, ScrollOff};
use crate::query::QueryBuffer;

const CLEAR_LINE: &[u8] = b"\x1b[K";
const CLEAR_BELOW: &[u8] = b"\x1b[J";
const RESET: &[u8] = b"\x1b[0m";
const SELECTED: &[u8] = b"\x1b[7m";
const MATCH_ON: &[u8] = b"\x1b[1;35m";
const MATCH_OFF: &[u8] = b"\x1b[22;39m";
const SCORE_COLUMN_WIDTH: usize = 8;

/// Presentation switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub prompt: String,
    pub pointer: String,
    pub marker: String,
    pub pad: usize,
    pub show_scores: bool,
    pub show_info: bool,
    pub color: bool,
    pub scroll_off: ScrollOff,
}

impl RenderOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            prompt: config.prompt.clone(),
            pointer: config.pointer.clone(),
            marker: config.marker.clone(),
            pad: config.pad,
            show_scores: config.show_scores,
            show_info: config.show_info,
            color: config.color,
            scroll_off: config.scroll_off,
        }
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// What to draw.
#[derive(Debug, Clone, Copy)]
pub struct View<'a> {
    /// Query and cursor.
    pub query: &'a QueryBuffer,
    /// Latest completed results.
    pub results: &'a ResultSet,
    /// Highlighted rank.
    pub selection: usize,
    /// Candidate indices of marked entries.
    pub marks: &'a [usize],
    /// Candidates received so far.
    pub total: usize,
    /// Terminal width in columns.
    pub width: u16,
    /// Result rows to draw.
    pub rows: usize,
}

/// First rank shown so the selection keeps its scroll context.
#[must_use]
pub fn window_start(
    selection: usize,
    available: usize,
    rows: usize,
    scroll_off: ScrollOff,
) -> usize {
    let (items, off) = match scroll_off {
        ScrollOff::Auto => {
            let items = rows.min(available);
            (items, items / 2)
        }
        ScrollOff::Rows(n) => (rows, n.min(rows / 2)),
    };
    if items == 0 || selection + off < items {
        return 0;
    }
    let start = selection + off + 1 - items;
    if start + items >= available {
        available.saturating_sub(items)
    } else {
        start
    }
}

/// Format the score column for `score`.
#[must_use]
pub fn score_column(score: f64) -> String {
    if score == SCORE_MIN {
        "[     ] ".to_string()
    } else if score == SCORE_MAX {
        "[  inf] ".to_string()
    } else {
        format!("[{score:5.2}] ")
    }
}

/// Draws frames onto a terminal.
#[derive(Debug)]
pub struct Renderer {
    options: RenderOptions,
    scorer: Scorer,
    highlight: Option<Query>,
    drawn: bool,
    /// Rows below the prompt in the last frame.
    below: usize,
    buf: Vec<u8>,
}

impl Renderer {
    #[must_use]
    pub fn new(options: RenderOptions) -> Self {
        Self {
            options,
            scorer: Scorer::new(),
            highlight: None,
            drawn: false,
            below: 0,
            buf: Vec::with_capacity(4096),
        }
    }

    #[must_use]
    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Screen column (1-based) of the text cursor.
    #[must_use]
    pub fn cursor_column(&self, query: &QueryBuffer) -> usize {
        self.options.pad + display_width(&self.options.prompt) + query.cursor_width() + 1
    }

    /// Draw `view` and flush `out`.
    pub fn draw(&mut self, out: &mut impl Write, view: &View<'_>) -> io::Result<()> {
        let mut buf = std::mem::take(&mut self.buf);
        buf.clear();
        self.compose(&mut buf, view);
        let result = out.write_all(&buf).and_then(|()| out.flush());
        self.buf = buf;
        result?;
        self.drawn = true;
        self.below = view.rows + usize::from(self.options.show_info);
        Ok(())
    }

    /// Leave the last frame on screen and move the cursor below it.
    pub fn release(&mut self, out: &mut impl Write) -> io::Result<()> {
        if !self.drawn {
            return Ok(());
        }
        self.drawn = false;
        if self.below > 0 {
            out.write_all(format!("\x1b[{}B", self.below).as_bytes())?;
        }
        out.write_all(b"\r\n")?;
        out.flush()
    }

    /// Erase the last drawn frame.
    pub fn clear(&mut self, out: &mut impl Write) -> io::Result<()> {
        if !self.drawn {
            return Ok(());
        }
        self.drawn = false;
        out.write_all(b"\r")?;
        out.write_all(CLEAR_BELOW)?;
        out.write_all(AUTOWRAP_ENABLE)?;
        out.write_all(CURSOR_SHOW)?;
        out.flush()
    }

    fn compose(&mut self, buf: &mut Vec<u8>, view: &View<'_>) {
        let width = usize::from(view.width);
        let pad = self.options.pad;
        buf.extend_from_slice(CURSOR_HIDE);
        buf.extend_from_slice(AUTOWRAP_DISABLE);

        // Prompt row.
        start_row(buf, pad);
        let room = width.saturating_sub(pad);
        let used = push_text(buf, &self.options.prompt, room);
        let query: String = view.query.chars().iter().collect();
        push_text(buf, &query, room.saturating_sub(used));
        buf.extend_from_slice(CLEAR_LINE);

        if self.options.show_info {
            buf.push(b'\n');
            start_row(buf, pad);
            let mut info = format!("{}/{}", view.results.matched, view.total);
            if !view.marks.is_empty() {
                info.push_str(&format!(" ({})", view.marks.len()));
            }
            push_text(buf, &info, room);
            buf.extend_from_slice(CLEAR_LINE);
        }

        self.prepare_highlight(&view.results.query);
        let start = window_start(
            view.selection,
            view.results.len(),
            view.rows,
            self.options.scroll_off,
        );
        for rank in start..start + view.rows {
            buf.push(b'\n');
            start_row(buf, pad);
            if let Some(m) = view.results.get(rank) {
                let marked = view.marks.contains(&m.index);
                self.push_entry(buf, m, rank == view.selection, marked, room);
            }
            buf.extend_from_slice(CLEAR_LINE);
        }
        buf.extend_from_slice(CLEAR_BELOW);

        let below = view.rows + usize::from(self.options.show_info);
        if below > 0 {
            buf.extend_from_slice(format!("\x1b[{below}A").as_bytes());
        }
        let column = self.cursor_column(view.query);
        buf.extend_from_slice(format!("\x1b[{column}G").as_bytes());
        buf.extend_from_slice(AUTOWRAP_ENABLE);
        buf.extend_from_slice(CURSOR_SHOW);
    }

    fn prepare_highlight(&mut self, query: &str) {
        if !self.options.color || query.is_empty() {
            self.highlight = None;
        } else if self.highlight.as_ref().is_none_or(|q| q.as_str() != query) {
            self.highlight = Some(Query::new(query));
        }
    }

    fn push_entry(
        &mut self,
        buf: &mut Vec<u8>,
        m: &ScoredMatch,
        current: bool,
        marked: bool,
        room: usize,
    ) {
        let color = self.options.color;
        if color && current {
            buf.extend_from_slice(SELECTED);
        }
        let mut used = 0;
        if self.options.show_scores {
            buf.extend_from_slice(score_column(m.score).as_bytes());
            used += SCORE_COLUMN_WIDTH;
        }
        used += push_gutter(buf, &self.options.pointer, current);
        used += push_gutter(buf, &self.options.marker, marked);

        let positions = match self.highlight.as_ref() {
            Some(query) => self
                .scorer
                .score_with_positions(query, &m.text)
                .map(|r| r.positions)
                .unwrap_or_default(),
            None => Vec::new(),
        };

        let shown = truncate_to_width(&m.text, room.saturating_sub(used));
        let mut lit = false;
        for seg in segments(shown) {
            let hit = {
                let k = positions.partition_point(|&p| p < seg.first_char);
                positions.get(k).is_some_and(|&p| seg.contains_char(p))
            };
            if hit != lit {
                buf.extend_from_slice(if hit { MATCH_ON } else { MATCH_OFF });
                lit = hit;
            }
            push_segment(buf, &seg);
        }
        if color && (lit || current) {
            buf.extend_from_slice(RESET);
        }
    }
}

fn start_row(buf: &mut Vec<u8>, pad: usize) {
    buf.push(b'\r');
    buf.resize(buf.len() + pad, b' ');
}

/// `mark` when `on`, else blanks of the same width.
fn push_gutter(buf: &mut Vec<u8>, mark: &str, on: bool) -> usize {
    let width = display_width(mark);
    if on {
        buf.extend_from_slice(mark.as_bytes());
    } else {
        buf.resize(buf.len() + width, b' ');
    }
    width
}

/// Write as much of `text` as fits in `room` columns; returns the width used.
fn push_text(buf: &mut Vec<u8>, text: &str, room: usize) -> usize {
    let shown = truncate_to_width(text, room);
    for seg in segments(shown) {
        push_segment(buf, &seg);
    }
    display_width(shown)
}

/// Control characters become one placeholder cell each.
fn push_segment(buf: &mut Vec<u8>, seg: &Segment<'_>) {
    if seg.needs_placeholder() {
        for _ in 0..seg.char_count {
            push_char(buf, placeholder());
        }
    } else {
        buf.extend_from_slice(seg.text.as_bytes());
    }
}

fn push_char(buf: &mut Vec<u8>, ch: char) {
    let mut tmp = [0u8; 4];
    buf.extend_from_slice(ch.encode_utf8(&mut tmp).as_bytes());
}
