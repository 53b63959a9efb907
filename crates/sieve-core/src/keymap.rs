#![forbid(unsafe_code)]

//! Key bindings.
//!
//! Translates decoded [`Event`]s into logical [`Action`]s. The table follows
//! the readline/emacs conventions familiar from shells:
//!
//! | Keys                         | Action             |
//! |------------------------------|--------------------|
//! | printable                    | `InsertChar`       |
//! | Backspace, Ctrl+H            | `Backspace`        |
//! | Ctrl+W                       | `DeleteWordBack`   |
//! | Ctrl+U                       | `ClearQuery`       |
//! | Ctrl+A / Home                | `CursorHome`       |
//! | Ctrl+E / End                 | `CursorEnd`        |
//! | Ctrl+B / Left                | `CursorLeft`, or `Cancel` with left-aborts |
//! | Ctrl+F / Right               | `CursorRight`, or `Confirm` with right-accepts |
//! | Ctrl+P / Ctrl+K / Up         | `SelectionUp`      |
//! | Ctrl+N / Ctrl+J / Down       | `SelectionDown`    |
//! | PageUp / PageDown            | `PageUp`/`PageDown`|
//! | Ctrl+Home, Ctrl+PageUp       | `SelectFirst`      |
//! | Ctrl+End, Ctrl+PageDown      | `SelectLast`       |
//! | Enter                        | `Confirm`          |
//! | Esc / Ctrl+C / Ctrl+G        | `Cancel`           |
//! | Ctrl+D                       | `DeleteForwardOrCancel` |
//! | Delete                       | `DeleteForward`    |
//! | Tab / Shift+Tab              | mark (multi) or `Confirm` (tab-accepts) |

use crate::event::{Event, KeyCode, KeyEvent};

/// A logical edit or navigation command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Insert a typed codepoint at the cursor.
    InsertChar(char),
    /// Insert a pasted codepoint at the cursor.
    PasteChar(char),
    /// Delete the codepoint before the cursor.
    Backspace,
    /// Delete the codepoint under the cursor.
    DeleteForward,
    /// Delete forward, or cancel when the query is empty.
    DeleteForwardOrCancel,
    /// Delete back to the previous whitespace boundary.
    DeleteWordBack,
    /// Delete everything before the cursor.
    ClearQuery,
    /// Move the cursor to the start of the query.
    CursorHome,
    /// Move the cursor to the end of the query.
    CursorEnd,
    /// Move the cursor one codepoint left.
    CursorLeft,
    /// Move the cursor one codepoint right.
    CursorRight,
    /// Highlight the previous result.
    SelectionUp,
    /// Highlight the next result.
    SelectionDown,
    /// Move the highlight up by one screen.
    PageUp,
    /// Move the highlight down by one screen.
    PageDown,
    /// Highlight the first result.
    SelectFirst,
    /// Highlight the last result.
    SelectLast,
    /// Toggle the mark on the highlighted result and move down.
    ToggleMarkDown,
    /// Toggle the mark on the highlighted result and move up.
    ToggleMarkUp,
    /// Emit the selection and end the session.
    Confirm,
    /// End the session without output.
    Cancel,
}

impl Action {
    /// Whether the action changes the query text.
    #[must_use]
    pub const fn edits_query(self) -> bool {
        matches!(
            self,
            Self::InsertChar(_)
                | Self::PasteChar(_)
                | Self::Backspace
                | Self::DeleteForward
                | Self::DeleteForwardOrCancel
                | Self::DeleteWordBack
                | Self::ClearQuery
        )
    }
}

/// Behavior switches that change what a key means.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeymapOptions {
    /// Tab and Shift+Tab toggle marks.
    pub multi: bool,
    /// Tab confirms (ignored when `multi` is set).
    pub tab_accepts: bool,
    /// Right arrow confirms.
    pub right_accepts: bool,
    /// Left arrow cancels.
    pub left_aborts: bool,
}

/// Event → action translation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Keymap {
    options: KeymapOptions,
}

impl Keymap {
    /// Create a keymap with the given switches.
    #[must_use]
    pub const fn new(options: KeymapOptions) -> Self {
        Self { options }
    }

    /// Append the actions for `event` to `out`.
    ///
    /// A paste expands to one [`Action::PasteChar`] per codepoint, so control
    /// bytes inside a paste are inserted rather than interpreted.
    pub fn translate(&self, event: &Event, out: &mut Vec<Action>) {
        match event {
            Event::Key(key) => out.extend(self.action_for_key(*key)),
            Event::Paste(paste) => out.extend(paste.text.chars().map(Action::PasteChar)),
            Event::Resize { .. } => {}
        }
    }

    /// The action bound to `key`, if any.
    #[must_use]
    pub fn action_for_key(&self, key: KeyEvent) -> Option<Action> {
        let opts = self.options;
        if key.ctrl() {
            if let KeyCode::Char(c) = key.code {
                return self.ctrl_char(c);
            }
            return match key.code {
                KeyCode::Home | KeyCode::PageUp => Some(Action::SelectFirst),
                KeyCode::End | KeyCode::PageDown => Some(Action::SelectLast),
                _ => None,
            };
        }
        if key.alt() {
            return None;
        }
        match key.code {
            KeyCode::Char(c) => Some(Action::InsertChar(c)),
            KeyCode::Backspace => Some(Action::Backspace),
            KeyCode::Delete => Some(Action::DeleteForward),
            KeyCode::Enter => Some(Action::Confirm),
            KeyCode::Escape => Some(Action::Cancel),
            KeyCode::Home => Some(Action::CursorHome),
            KeyCode::End => Some(Action::CursorEnd),
            KeyCode::Left => Some(self.left()),
            KeyCode::Right => Some(self.right()),
            KeyCode::Up => Some(Action::SelectionUp),
            KeyCode::Down => Some(Action::SelectionDown),
            KeyCode::PageUp => Some(Action::PageUp),
            KeyCode::PageDown => Some(Action::PageDown),
            KeyCode::Tab if opts.multi => Some(Action::ToggleMarkDown),
            KeyCode::Tab if opts.tab_accepts => Some(Action::Confirm),
            KeyCode::BackTab if opts.multi => Some(Action::ToggleMarkUp),
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Insert => None,
        }
    }

    /// Left arrow and Ctrl-B.
    fn left(&self) -> Action {
        if self.options.left_aborts {
            Action::Cancel
        } else {
            Action::CursorLeft
        }
    }

    /// Right arrow and Ctrl-F.
    fn right(&self) -> Action {
        if self.options.right_accepts {
            Action::Confirm
        } else {
            Action::CursorRight
        }
    }

    fn ctrl_char(&self, c: char) -> Option<Action> {
        match c {
            'a' => Some(Action::CursorHome),
            'b' => Some(self.left()),
            'c' | 'g' => Some(Action::Cancel),
            'd' => Some(Action::DeleteForwardOrCancel),
            'e' => Some(Action::CursorEnd),
            'f' => Some(self.right()),
            'h' => Some(Action::Backspace),
            'j' | 'n' => Some(Action::SelectionDown),
            'k' | 'p' => Some(Action::SelectionUp),
            'u' => Some(Action::ClearQuery),
            'w' => Some(Action::DeleteWordBack),
            _ => None,
        }
    }
}
