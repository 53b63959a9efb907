#![forbid(unsafe_code)]

//! Scoring constants.
//!
//! Displayed scores are part of the observable behavior, so the constants
//! are grouped in a named, versioned table instead of being tunable knobs.

/// Score given to the empty query and to exact-length matches.
pub const SCORE_MAX: f64 = f64::INFINITY;

/// Score given to candidates too long to score.
pub const SCORE_MIN: f64 = f64::NEG_INFINITY;

/// Candidates longer than this (in codepoints) still match but score [`SCORE_MIN`].
pub const MATCH_MAX_LEN: usize = 1024;

/// Bonus and penalty constants used by the scorer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreTable {
    /// Penalty per skipped codepoint before the first match.
    pub gap_leading: f64,
    /// Penalty per skipped codepoint after the last match.
    pub gap_trailing: f64,
    /// Penalty per skipped codepoint between matches.
    pub gap_inner: f64,
    /// Bonus for extending a run of consecutive matches.
    pub match_consecutive: f64,
    /// Bonus for a match right after `/`.
    pub match_slash: f64,
    /// Bonus for a match right after `-`, `_` or a space.
    pub match_word: f64,
    /// Bonus for an uppercase match right after a lowercase letter.
    pub match_capital: f64,
    /// Bonus for a match right after `.`.
    pub match_dot: f64,
}

impl ScoreTable {
    /// The fzy table. `score("f", "foo") == 0.89`.
    pub const FZY_V1: Self = Self {
        gap_leading: -0.005,
        gap_trailing: -0.005,
        gap_inner: -0.01,
        match_consecutive: 1.0,
        match_slash: 0.9,
        match_word: 0.8,
        match_capital: 0.7,
        match_dot: 0.6,
    };
}

impl Default for ScoreTable {
    fn default() -> Self {
        Self::FZY_V1
    }
}
