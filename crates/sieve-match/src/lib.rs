#![forbid(unsafe_code)]

//! Fuzzy matching and scoring.
//!
//! A candidate matches a query when every codepoint of the query appears in
//! the candidate, in order, ignoring case. Matching candidates are ranked with
//! a dynamic-programming scorer that rewards consecutive runs and matches at
//! word starts, and penalizes gaps.
//!
//! ```
//! use sieve_match::{Query, Scorer};
//!
//! let mut scorer = Scorer::new();
//! let query = Query::new("f");
//! let score = scorer.score(&query, "foo").unwrap();
//! assert!((score - 0.89).abs() < 1e-9);
//! assert!(scorer.score(&query, "bar").is_none());
//! ```

mod bonus;
pub mod score;
pub mod table;

pub use score::{MatchResult, Query, Scorer, has_match};
pub use table::{MATCH_MAX_LEN, SCORE_MAX, SCORE_MIN, ScoreTable};
