#![forbid(unsafe_code)]

//! The interactive session loop.
//!
//! One thread multiplexes two sources: the control terminal and the channel
//! of candidate batches from the reader thread. Each pass through the loop
//! waits briefly for terminal input, then
//!
//! 1. moves newly read candidates into the store,
//! 2. collects finished search reports,
//! 3. applies decoded key actions,
//! 4. resubmits the search when the query changed (at once) or the store
//!    grew (once the running generation is done),
//! 5. redraws if anything visible changed.
//!
//! The wait is short while input streams or a search runs, so neither source
//! can starve the other.

use std::sync::mpsc::{self, TryRecvError};
use std::time::Duration;

use sieve_core::{Action, Event, Keymap};
use sieve_search::{CandidateStore, Coordinator, ResultSet};
use sieve_tty::Tty;

use crate::config::{Config, LineCount};
use crate::error::Error;
use crate::query::QueryBuffer;
use crate::render::{RenderOptions, Renderer, View};

const BUSY_POLL: Duration = Duration::from_millis(10);
const IDLE_POLL: Duration = Duration::from_millis(100);
/// Upper bound on batches moved into the store per pass.
const MAX_BATCHES_PER_PASS: usize = 64;

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The highlighted entry, or every marked entry in mark order.
    Selected(Vec<String>),
    /// Confirmed with nothing to select: the typed query.
    Query(String),
    /// Aborted by the user or by terminal input closing.
    Cancelled,
}

/// State of one interactive run.
pub struct Session {
    tty: Tty,
    coordinator: Coordinator,
    store: CandidateStore,
    lines: Option<mpsc::Receiver<Vec<String>>>,
    keymap: Keymap,
    query: QueryBuffer,
    /// Query of the most recent submission.
    submitted: Option<String>,
    selection: usize,
    marks: Vec<usize>,
    renderer: Renderer,
    line_count: LineCount,
    chrome: usize,
    rows: usize,
    cycle: bool,
    multi: bool,
    clear_on_exit: bool,
    resubmit: bool,
    dirty: bool,
    actions: Vec<Action>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("query", &self.query)
            .field("selection", &self.selection)
            .field("marks", &self.marks)
            .field("rows", &self.rows)
            .field("streaming", &self.lines.is_some())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Set up a session over `coordinator`'s store.
    ///
    /// `lines` feeds the store while the session runs; `None` means the
    /// store is already complete.
    #[must_use]
    pub fn new(
        tty: Tty,
        mut coordinator: Coordinator,
        lines: Option<mpsc::Receiver<Vec<String>>>,
        config: &Config,
    ) -> Self {
        let store = coordinator.store().clone();
        let chrome = config.chrome_rows();
        let rows = config.lines.resolve(tty.size().1, chrome);
        coordinator.set_limit(Some(rows.max(1)));
        Self {
            tty,
            coordinator,
            store,
            lines,
            keymap: Keymap::new(config.keymap_options()),
            query: QueryBuffer::from_text(&config.query),
            submitted: None,
            selection: 0,
            marks: Vec::new(),
            renderer: Renderer::new(RenderOptions::from_config(config)),
            line_count: config.lines,
            chrome,
            rows,
            cycle: config.cycle,
            multi: config.multi,
            clear_on_exit: !config.no_clear,
            resubmit: false,
            dirty: true,
            actions: Vec::new(),
        }
    }

    /// Run until the user confirms or cancels.
    pub fn run(mut self) -> Result<Outcome, Error> {
        tracing::debug!(rows = self.rows, "session started");
        self.drain_lines();
        self.submit()?;
        self.draw()?;
        loop {
            let busy = self.lines.is_some() || self.coordinator.in_flight();
            self.tty
                .poll_event(if busy { BUSY_POLL } else { IDLE_POLL })?;

            self.drain_lines();
            if self.coordinator.poll()? {
                self.clamp_selection();
                self.dirty = true;
            }

            while let Some(event) = self.tty.read_event() {
                if let Some(outcome) = self.handle_event(&event)? {
                    tracing::debug!(?outcome, "session finished");
                    return Ok(outcome);
                }
            }
            if self.tty.is_closed() {
                tracing::debug!("terminal input closed; cancelling");
                return Ok(Outcome::Cancelled);
            }

            self.maybe_resubmit()?;
            if self.dirty {
                self.draw()?;
            }
        }
    }

    fn results(&self) -> &ResultSet {
        self.coordinator.current_results()
    }

    fn drain_lines(&mut self) {
        let Some(rx) = self.lines.as_ref() else {
            return;
        };
        let mut closed = false;
        for _ in 0..MAX_BATCHES_PER_PASS {
            match rx.try_recv() {
                Ok(batch) => {
                    self.store.extend(batch);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    closed = true;
                    break;
                }
            }
        }
        if closed {
            self.lines = None;
            tracing::debug!(candidates = self.store.len(), "candidate input complete");
        }
        if self.store.len() > self.coordinator.searched_len() {
            self.dirty |= self.renderer.options().show_info;
        }
    }

    fn submit(&mut self) -> Result<(), Error> {
        let text = self.query.text();
        self.coordinator.submit(&text)?;
        self.submitted = Some(text);
        self.resubmit = false;
        Ok(())
    }

    fn maybe_resubmit(&mut self) -> Result<(), Error> {
        let query_changed = self.submitted.as_deref() != Some(self.query.text().as_str());
        let grew = self.store.len() > self.coordinator.searched_len();
        if query_changed || self.resubmit || (grew && !self.coordinator.in_flight()) {
            self.submit()?;
        }
        Ok(())
    }

    fn handle_event(&mut self, event: &Event) -> Result<Option<Outcome>, Error> {
        if let Event::Resize { height, .. } = *event {
            self.resize(height);
            return Ok(None);
        }
        let mut actions = std::mem::take(&mut self.actions);
        actions.clear();
        self.keymap.translate(event, &mut actions);
        let mut outcome = None;
        for &action in &actions {
            outcome = self.apply(action)?;
            if outcome.is_some() {
                break;
            }
        }
        self.actions = actions;
        Ok(outcome)
    }

    fn resize(&mut self, height: u16) {
        let rows = self.line_count.resolve(height, self.chrome);
        if rows != self.rows {
            self.rows = rows;
            self.coordinator.set_limit(Some(rows.max(1)));
            self.resubmit = true;
        }
        self.dirty = true;
    }

    fn apply(&mut self, action: Action) -> Result<Option<Outcome>, Error> {
        if moves_selection(action) {
            self.settle()?;
        }
        let changed = match action {
            Action::InsertChar(ch) | Action::PasteChar(ch) => {
                self.query.insert(ch);
                true
            }
            Action::Backspace => self.query.backspace(),
            Action::DeleteForward => self.query.delete_forward(),
            Action::DeleteForwardOrCancel => {
                if self.query.is_empty() {
                    return Ok(Some(Outcome::Cancelled));
                }
                self.query.delete_forward()
            }
            Action::DeleteWordBack => self.query.delete_word_back(),
            Action::ClearQuery => self.query.clear_to_start(),
            Action::CursorHome => self.query.home(),
            Action::CursorEnd => self.query.end(),
            Action::CursorLeft => self.query.left(),
            Action::CursorRight => self.query.right(),
            Action::SelectionUp => self.select_prev(1, self.cycle),
            Action::SelectionDown => self.select_next(1, self.cycle),
            Action::PageUp => self.select_prev(self.rows.max(1), false),
            Action::PageDown => self.select_next(self.rows.max(1), false),
            Action::SelectFirst => self.select_prev(usize::MAX, false),
            Action::SelectLast => self.select_next(usize::MAX, false),
            Action::ToggleMarkDown => {
                let toggled = self.toggle_mark();
                self.select_next(1, self.cycle) || toggled
            }
            Action::ToggleMarkUp => {
                let toggled = self.toggle_mark();
                self.select_prev(1, self.cycle) || toggled
            }
            Action::Confirm => return self.confirm().map(Some),
            Action::Cancel => return Ok(Some(Outcome::Cancelled)),
        };
        if changed && action.edits_query() {
            self.selection = 0;
        }
        self.dirty |= changed;
        Ok(None)
    }

    fn select_next(&mut self, step: usize, wrap: bool) -> bool {
        let Some(last) = self.results().len().checked_sub(1) else {
            return false;
        };
        let next = if self.selection == last && wrap {
            0
        } else {
            self.selection.saturating_add(step).min(last)
        };
        std::mem::replace(&mut self.selection, next) != next
    }

    fn select_prev(&mut self, step: usize, wrap: bool) -> bool {
        let Some(last) = self.results().len().checked_sub(1) else {
            return false;
        };
        let prev = if self.selection == 0 && wrap {
            last
        } else {
            self.selection.saturating_sub(step)
        };
        std::mem::replace(&mut self.selection, prev) != prev
    }

    fn clamp_selection(&mut self) {
        let len = self.results().len();
        if self.selection >= len {
            self.selection = len.saturating_sub(1);
        }
    }

    fn toggle_mark(&mut self) -> bool {
        if !self.multi {
            return false;
        }
        let Some(index) = self.results().get(self.selection).map(|m| m.index) else {
            return false;
        };
        match self.marks.iter().position(|&i| i == index) {
            Some(pos) => {
                self.marks.remove(pos);
            }
            None => self.marks.push(index),
        }
        true
    }

    /// Wait until the shown results cover the typed query and every
    /// candidate received so far.
    fn settle(&mut self) -> Result<(), Error> {
        self.drain_lines();
        let stale_query = self.submitted.as_deref() != Some(self.query.text().as_str());
        let grew = self.store.len() > self.coordinator.searched_len();
        if self.resubmit || stale_query || grew {
            self.submit()?;
        }
        if self.coordinator.in_flight() {
            self.coordinator.wait_idle()?;
            self.clamp_selection();
            self.dirty = true;
        }
        Ok(())
    }

    fn confirm(&mut self) -> Result<Outcome, Error> {
        self.settle()?;

        if !self.marks.is_empty() {
            let picked = self
                .marks
                .iter()
                .filter_map(|&i| self.store.get(i))
                .map(|text| text.to_string())
                .collect();
            return Ok(Outcome::Selected(picked));
        }
        Ok(match self.results().get(self.selection) {
            Some(m) => Outcome::Selected(vec![m.text.to_string()]),
            None => Outcome::Query(self.query.text()),
        })
    }

    fn draw(&mut self) -> Result<(), Error> {
        let (width, _) = self.tty.size();
        let view = View {
            query: &self.query,
            results: self.coordinator.current_results(),
            selection: self.selection,
            marks: &self.marks,
            total: self.store.len(),
            width,
            rows: self.rows,
        };
        self.renderer.draw(&mut self.tty, &view)?;
        self.dirty = false;
        Ok(())
    }
}

/// Keys typed ahead of a search act on its results, not on older ones.
fn moves_selection(action: Action) -> bool {
    matches!(
        action,
        Action::SelectionUp
            | Action::SelectionDown
            | Action::PageUp
            | Action::PageDown
            | Action::SelectFirst
            | Action::SelectLast
            | Action::ToggleMarkDown
            | Action::ToggleMarkUp
    )
}

impl Drop for Session {
    fn drop(&mut self) {
        let result = if self.clear_on_exit {
            self.renderer.clear(&mut self.tty)
        } else {
            self.renderer.release(&mut self.tty)
        };
        if let Err(err) = result {
            tracing::warn!(error = %err, "failed to clear the frame");
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use sieve_search::{SearchConfig, SearchError};
    use std::fs::File;
    use std::io::Write;
    use std::os::unix::net::UnixStream;

    fn pipe_pair() -> (File, UnixStream) {
        let (a, b) = UnixStream::pair().unwrap();
        let reader: File = std::os::fd::OwnedFd::from(a).into();
        (reader, b)
    }

    fn session(lines: &[&str], config: &Config) -> (Session, UnixStream) {
        let (reader, keys) = pipe_pair();
        let tty = Tty::headless(reader, Box::new(std::io::sink()), 80, 24);
        let store = CandidateStore::new();
        store.extend(lines.iter().copied());
        let coordinator = Coordinator::new(
            store,
            SearchConfig {
                workers: 2,
                ..SearchConfig::default()
            },
        )
        .unwrap();
        (Session::new(tty, coordinator, None, config), keys)
    }

    fn run_with(lines: &[&str], config: &Config, input: &[u8]) -> Outcome {
        let (session, mut keys) = session(lines, config);
        keys.write_all(input).unwrap();
        drop(keys);
        session.run().unwrap()
    }

    #[test]
    fn worker_panic_ends_the_session_with_an_error() {
        let (reader, _keys) = pipe_pair();
        let tty = Tty::headless(reader, Box::new(std::io::sink()), 80, 24);
        let store = CandidateStore::new();
        store.extend(["a"]);
        let coordinator = Coordinator::new(
            store,
            SearchConfig {
                workers: 1,
                ..SearchConfig::default()
            },
        )
        .unwrap();
        assert!(coordinator.inject_worker_fault(0));
        let err = Session::new(tty, coordinator, None, &Config::default())
            .run()
            .unwrap_err();
        assert!(
            matches!(err, Error::Search(SearchError::WorkerLost { worker: 0 })),
            "{err:?}"
        );
    }

    #[test]
    fn enter_selects_best_match() {
        let out = run_with(&["xfoo", "foo", "bar"], &Config::default(), b"fo\r");
        assert_eq!(out, Outcome::Selected(vec!["foo".into()]));
    }

    #[test]
    fn empty_result_confirms_query() {
        let out = run_with(&["test", "foo"], &Config::default(), b"tz\r");
        assert_eq!(out, Outcome::Query("tz".into()));
    }

    #[test]
    fn ctrl_c_cancels() {
        let out = run_with(&["a"], &Config::default(), b"a\x03");
        assert_eq!(out, Outcome::Cancelled);
    }

    #[test]
    fn closed_terminal_cancels() {
        let out = run_with(&["a"], &Config::default(), b"");
        assert_eq!(out, Outcome::Cancelled);
    }

    #[test]
    fn ctrl_d_cancels_only_on_empty_query() {
        let out = run_with(&["ab", "b"], &Config::default(), b"ba\x1b[D\x04\r");
        assert_eq!(out, Outcome::Selected(vec!["b".into()]));
        let out = run_with(&["ab"], &Config::default(), b"\x04");
        assert_eq!(out, Outcome::Cancelled);
    }

    #[test]
    fn arrows_move_selection() {
        let out = run_with(&["a1", "a2", "a3"], &Config::default(), b"\x1b[B\x1bOB\x1b[A\r");
        assert_eq!(out, Outcome::Selected(vec!["a2".into()]));
    }

    #[test]
    fn rxvt_ctrl_end_and_home_jump_to_the_ends() {
        let out = run_with(&["a1", "a2", "a3"], &Config::default(), b"\x1b[8^\r");
        assert_eq!(out, Outcome::Selected(vec!["a3".into()]));
        let out = run_with(&["a1", "a2", "a3"], &Config::default(), b"\x1b[6^\x1b[7^\r");
        assert_eq!(out, Outcome::Selected(vec!["a1".into()]));
    }

    #[test]
    fn ctrl_f_and_ctrl_b_follow_arrow_switches() {
        let config = Config {
            right_accepts: true,
            left_aborts: true,
            ..Config::default()
        };
        let out = run_with(&["a1", "a2"], &config, b"\x1b[B\x06");
        assert_eq!(out, Outcome::Selected(vec!["a2".into()]));
        let out = run_with(&["a1", "a2"], &config, b"a\x02");
        assert_eq!(out, Outcome::Cancelled);
    }

    #[test]
    fn selection_stops_at_ends_without_cycle() {
        let out = run_with(&["a1", "a2"], &Config::default(), b"\x1b[A\r");
        assert_eq!(out, Outcome::Selected(vec!["a1".into()]));

        let config = Config {
            cycle: true,
            ..Config::default()
        };
        let out = run_with(&["a1", "a2"], &config, b"\x1b[A\r");
        assert_eq!(out, Outcome::Selected(vec!["a2".into()]));
    }

    #[test]
    fn query_edit_resets_selection() {
        let out = run_with(&["ab", "abc", "abcd"], &Config::default(), b"\x0e\x0eab\r");
        assert_eq!(out, Outcome::Selected(vec!["ab".into()]));
    }

    #[test]
    fn paste_is_inserted_literally() {
        let out = run_with(&["x"], &Config::default(), b"\x1b[200~a\rb\x1b[201~\r");
        assert_eq!(out, Outcome::Query("a\rb".into()));
    }

    #[test]
    fn initial_query_is_used() {
        let config = Config {
            query: "ba".into(),
            ..Config::default()
        };
        let out = run_with(&["foo", "bar"], &config, b"\r");
        assert_eq!(out, Outcome::Selected(vec!["bar".into()]));
    }

    #[test]
    fn multi_select_returns_marks_in_order() {
        let config = Config {
            multi: true,
            ..Config::default()
        };
        // Mark a2 then a1 (moving back up), then confirm.
        let out = run_with(&["a1", "a2", "a3"], &config, b"\x1b[B\t\x1b[A\x1b[A\t\r");
        assert_eq!(out, Outcome::Selected(vec!["a2".into(), "a1".into()]));
    }

    #[test]
    fn unmarking_removes_entry() {
        let config = Config {
            multi: true,
            ..Config::default()
        };
        // Mark a1, mark a2 moving up, unmark a1.
        let out = run_with(&["a1", "a2"], &config, b"\t\x1b[Z\t\r");
        assert_eq!(out, Outcome::Selected(vec!["a2".into()]));
    }

    #[test]
    fn tab_accepts_when_enabled() {
        let config = Config {
            tab_accepts: true,
            ..Config::default()
        };
        let out = run_with(&["one", "two"], &config, b"tw\t");
        assert_eq!(out, Outcome::Selected(vec!["two".into()]));
    }

    #[test]
    fn confirm_sees_candidates_received_after_last_search() {
        let (reader, _keys) = pipe_pair();
        let tty = Tty::headless(reader, Box::new(std::io::sink()), 80, 24);
        let coordinator = Coordinator::new(CandidateStore::new(), SearchConfig::default()).unwrap();
        let (tx, rx) = mpsc::channel();
        let mut session = Session::new(tty, coordinator, Some(rx), &Config::default());
        session.submit().unwrap();
        session.coordinator.wait_idle().unwrap();
        assert!(session.results().is_empty());

        tx.send(vec!["apple".to_string()]).unwrap();
        session.drain_lines();
        assert_eq!(
            session.confirm().unwrap(),
            Outcome::Selected(vec!["apple".into()])
        );
    }

    #[test]
    fn confirm_drains_pending_batches() {
        let (reader, _keys) = pipe_pair();
        let tty = Tty::headless(reader, Box::new(std::io::sink()), 80, 24);
        let coordinator = Coordinator::new(CandidateStore::new(), SearchConfig::default()).unwrap();
        let (tx, rx) = mpsc::channel();
        let mut session = Session::new(tty, coordinator, Some(rx), &Config::default());
        session.submit().unwrap();
        tx.send(vec!["pear".to_string()]).unwrap();
        assert_eq!(
            session.confirm().unwrap(),
            Outcome::Selected(vec!["pear".into()])
        );
    }

    #[test]
    fn rows_follow_terminal_height() {
        let (reader, _keys) = pipe_pair();
        let tty = Tty::headless(reader, Box::new(std::io::sink()), 80, 6);
        let coordinator = Coordinator::new(CandidateStore::new(), SearchConfig::default()).unwrap();
        let config = Config {
            lines: LineCount::Max,
            show_info: true,
            ..Config::default()
        };
        let session = Session::new(tty, coordinator, None, &config);
        assert_eq!(session.rows, 4);
        assert_eq!(session.coordinator.config().limit, Some(4));
    }
}
