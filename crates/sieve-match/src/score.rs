#![forbid(unsafe_code)]

//! Subsequence test and dynamic-programming scorer.
//!
//! # Model
//!
//! For a query `q` of `n` codepoints and a candidate `c` of `m` codepoints the
//! scorer fills two `n × m` matrices:
//!
//! - `D[i][j]`: best score of a match of `q[..=i]` that ends with `q[i]`
//!   matched exactly at `c[j]`.
//! - `M[i][j]`: best score of a match of `q[..=i]` inside `c[..=j]`.
//!
//! ```text
//! D[0][j] = j * gap_leading + bonus[j]
//! D[i][j] = max(M[i-1][j-1] + bonus[j], D[i-1][j-1] + consecutive)
//! M[i][j] = max(D[i][j], M[i][j-1] + gap)
//! ```
//!
//! where `gap` is the trailing penalty on the last query row and the inner
//! penalty otherwise. The final score is `M[n-1][m-1]`.
//!
//! Matching runs over the lowercased forms of query and candidate. A codepoint
//! whose lowercase form has several codepoints (`İ` becomes `i` plus a
//! combining dot) contributes all of them. Reported positions are indices of
//! candidate codepoints as typed; a multi-byte character is one position.

use crate::bonus::compute_bonus;
use crate::table::{MATCH_MAX_LEN, SCORE_MAX, SCORE_MIN, ScoreTable};

/// Full lowercase mapping of `text`, one or more codepoints per input codepoint.
fn fold(text: &str) -> impl Iterator<Item = char> + '_ {
    text.chars().flat_map(char::to_lowercase)
}

/// A query prepared for repeated scoring.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Query {
    text: String,
    folded: Vec<char>,
}

impl Query {
    /// Prepare `text` for matching.
    #[must_use]
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            folded: fold(text).collect(),
        }
    }

    /// The query as typed.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether the query has no codepoints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.folded.is_empty()
    }

    /// Length of the lowercased query in codepoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.folded.len()
    }

    /// Case-insensitive subsequence test against `candidate`.
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        let mut needle = self.folded.iter().peekable();
        for ch in fold(candidate) {
            match needle.peek() {
                Some(&&want) if want == ch => {
                    needle.next();
                }
                Some(_) => {}
                None => break,
            }
        }
        needle.peek().is_none()
    }
}

/// Case-insensitive subsequence test.
#[must_use]
pub fn has_match(query: &str, candidate: &str) -> bool {
    Query::new(query).matches(candidate)
}

/// Score and matched positions for one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    /// Score; higher is better.
    pub score: f64,
    /// Ascending codepoint indices of the matched candidate characters.
    pub positions: Vec<usize>,
}

/// Scorer with reusable scratch buffers.
///
/// A `Scorer` is cheap to create but allocates on first use; workers keep
/// one alive for a whole shard.
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    table: ScoreTable,
    haystack: Vec<char>,
    folded: Vec<char>,
    /// Index into `haystack` of each `folded` codepoint.
    origin: Vec<usize>,
    bonus: Vec<f64>,
    d_prev: Vec<f64>,
    m_prev: Vec<f64>,
    d_cur: Vec<f64>,
    m_cur: Vec<f64>,
}

impl Scorer {
    /// Scorer using [`ScoreTable::FZY_V1`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_table(ScoreTable::FZY_V1)
    }

    /// Scorer using a custom constant table.
    #[must_use]
    pub fn with_table(table: ScoreTable) -> Self {
        Self {
            table,
            ..Self::default()
        }
    }

    /// The constant table in use.
    #[must_use]
    pub fn table(&self) -> &ScoreTable {
        &self.table
    }

    /// Score `candidate`, or `None` if it does not match.
    pub fn score(&mut self, query: &Query, candidate: &str) -> Option<f64> {
        if query.is_empty() {
            return Some(SCORE_MAX);
        }
        if !query.matches(candidate) {
            return None;
        }
        self.load(candidate);
        let n = query.len();
        let m = self.folded.len();
        if m > MATCH_MAX_LEN || n > m {
            return Some(SCORE_MIN);
        }
        if n == m {
            return Some(SCORE_MAX);
        }
        Some(self.score_rows(query))
    }

    /// Score `candidate` and recover which codepoints matched.
    pub fn score_with_positions(&mut self, query: &Query, candidate: &str) -> Option<MatchResult> {
        if query.is_empty() {
            return Some(MatchResult {
                score: SCORE_MAX,
                positions: Vec::new(),
            });
        }
        if !query.matches(candidate) {
            return None;
        }
        self.load(candidate);
        let n = query.len();
        let m = self.folded.len();
        if m > MATCH_MAX_LEN || n > m {
            return Some(MatchResult {
                score: SCORE_MIN,
                positions: Vec::new(),
            });
        }
        if n == m {
            return Some(MatchResult {
                score: SCORE_MAX,
                positions: (0..self.haystack.len()).collect(),
            });
        }
        Some(self.score_matrix(query))
    }

    fn load(&mut self, candidate: &str) {
        self.haystack.clear();
        self.folded.clear();
        self.origin.clear();
        for (j, ch) in candidate.chars().enumerate() {
            self.haystack.push(ch);
            for lower in ch.to_lowercase() {
                self.folded.push(lower);
                self.origin.push(j);
            }
        }
    }

    /// Bonus of every folded position; expansions share their source's bonus.
    fn load_bonus(&mut self) {
        compute_bonus(&self.table, &self.haystack, &mut self.bonus);
        if self.folded.len() != self.haystack.len() {
            let per_char = std::mem::take(&mut self.bonus);
            self.bonus.extend(self.origin.iter().map(|&j| per_char[j]));
        }
    }

    /// Two-row evaluation of the recurrence; O(m) memory.
    fn score_rows(&mut self, query: &Query) -> f64 {
        let t = self.table;
        let n = query.len();
        let m = self.folded.len();
        self.load_bonus();

        for row in [
            &mut self.d_prev,
            &mut self.m_prev,
            &mut self.d_cur,
            &mut self.m_cur,
        ] {
            row.clear();
            row.resize(m, SCORE_MIN);
        }

        for (i, &qc) in query.folded.iter().enumerate() {
            let gap = if i == n - 1 {
                t.gap_trailing
            } else {
                t.gap_inner
            };
            let mut prev_score = SCORE_MIN;
            for j in 0..m {
                if qc == self.folded[j] {
                    let score = if i == 0 {
                        (j as f64) * t.gap_leading + self.bonus[j]
                    } else if j > 0 {
                        (self.m_prev[j - 1] + self.bonus[j])
                            .max(self.d_prev[j - 1] + t.match_consecutive)
                    } else {
                        SCORE_MIN
                    };
                    self.d_cur[j] = score;
                    prev_score = score.max(prev_score + gap);
                } else {
                    self.d_cur[j] = SCORE_MIN;
                    prev_score += gap;
                }
                self.m_cur[j] = prev_score;
            }
            std::mem::swap(&mut self.d_prev, &mut self.d_cur);
            std::mem::swap(&mut self.m_prev, &mut self.m_cur);
        }

        self.m_prev[m - 1]
    }

    /// Full-matrix evaluation followed by a backtrace for positions.
    fn score_matrix(&mut self, query: &Query) -> MatchResult {
        let t = self.table;
        let n = query.len();
        let m = self.folded.len();
        self.load_bonus();

        let mut d = vec![SCORE_MIN; n * m];
        let mut mm = vec![SCORE_MIN; n * m];
        let at = |i: usize, j: usize| i * m + j;

        for (i, &qc) in query.folded.iter().enumerate() {
            let gap = if i == n - 1 {
                t.gap_trailing
            } else {
                t.gap_inner
            };
            let mut prev_score = SCORE_MIN;
            for j in 0..m {
                if qc == self.folded[j] {
                    let score = if i == 0 {
                        (j as f64) * t.gap_leading + self.bonus[j]
                    } else if j > 0 {
                        (mm[at(i - 1, j - 1)] + self.bonus[j])
                            .max(d[at(i - 1, j - 1)] + t.match_consecutive)
                    } else {
                        SCORE_MIN
                    };
                    d[at(i, j)] = score;
                    prev_score = score.max(prev_score + gap);
                } else {
                    prev_score += gap;
                }
                mm[at(i, j)] = prev_score;
            }
        }

        // Walk back from the last cell, preferring the cell that produced M.
        let mut positions = vec![0usize; n];
        let mut match_required = false;
        let mut j = m;
        for i in (0..n).rev() {
            while j > 0 {
                j -= 1;
                let here = d[at(i, j)];
                if here != SCORE_MIN && (match_required || here == mm[at(i, j)]) {
                    match_required = i > 0
                        && j > 0
                        && mm[at(i, j)] == d[at(i - 1, j - 1)] + t.match_consecutive;
                    positions[i] = self.origin[j];
                    break;
                }
            }
        }
        positions.dedup();

        MatchResult {
            score: mm[at(n - 1, m - 1)],
            positions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn score(q: &str, c: &str) -> Option<f64> {
        Scorer::new().score(&Query::new(q), c)
    }

    fn positions(q: &str, c: &str) -> Vec<usize> {
        Scorer::new()
            .score_with_positions(&Query::new(q), c)
            .expect("should match")
            .positions
    }

    // ---------------------------------------------------------------------
    // Subsequence
    // ---------------------------------------------------------------------

    #[test]
    fn subsequence_is_case_insensitive() {
        assert!(has_match("a", "A"));
        assert!(has_match("A", "a"));
        assert!(has_match("fb", "FooBar"));
        assert!(!has_match("bf", "FooBar"));
    }

    #[test]
    fn empty_query_matches_everything() {
        assert!(has_match("", ""));
        assert!(has_match("", "anything"));
    }

    #[test]
    fn query_longer_than_candidate_never_matches() {
        assert!(!has_match("abcd", "abc"));
    }

    #[test]
    fn multibyte_codepoints_are_single_units() {
        assert!(has_match("é", "café"));
        assert!(has_match("ÉZ", "éz"));
        assert!(!has_match("ée", "é"));
    }

    #[test]
    fn multi_codepoint_lowercase_is_matched_in_full() {
        // 'İ' lowercases to "i\u{307}".
        assert!(has_match("i\u{307}", "İ"));
        assert!(has_match("i", "İ"));
        assert!(!has_match("İ", "i"));
        assert!(has_match("İ", "xi\u{307}"));
    }

    #[test]
    fn expanded_lowercase_maps_back_to_typed_positions() {
        assert_eq!(positions("i\u{307}b", "İab"), vec![0, 2]);
        assert_eq!(positions("i\u{307}", "İ"), vec![0]);
        assert_eq!(positions("ib", "xİb"), vec![1, 2]);
        assert_eq!(score("i\u{307}", "İ"), Some(SCORE_MAX));
        let a = score("ib", "xİb").unwrap();
        let b = Scorer::new()
            .score_with_positions(&Query::new("ib"), "xİb")
            .unwrap()
            .score;
        assert!((a - b).abs() < EPS);
    }

    // ---------------------------------------------------------------------
    // Reference values
    // ---------------------------------------------------------------------

    #[test]
    fn empty_query_scores_max() {
        assert_eq!(score("", "foo"), Some(SCORE_MAX));
    }

    #[test]
    fn single_char_prefix_of_three_letter_word() {
        let s = score("f", "foo").unwrap();
        assert!((s - 0.89).abs() < EPS, "got {s}");
    }

    #[test]
    fn no_match_returns_none() {
        assert_eq!(score("f", "bar"), None);
        assert_eq!(score("tz", "test"), None);
    }

    #[test]
    fn exact_length_match_scores_max() {
        assert_eq!(score("abc", "ABC"), Some(SCORE_MAX));
        assert_eq!(score("34", "34"), Some(SCORE_MAX));
    }

    #[test]
    fn overlong_candidate_matches_with_min_score() {
        let long = "a".repeat(MATCH_MAX_LEN + 1);
        assert_eq!(score("a", &long), Some(SCORE_MIN));
    }

    #[test]
    fn numeric_prefix_scores() {
        let s = score("34", "340").unwrap();
        assert!((s - 1.895).abs() < EPS, "got {s}");
        assert!(score("34", "1340").unwrap() < s);
        assert!(score("34", "3400").unwrap() < s);
    }

    // ---------------------------------------------------------------------
    // Relative ordering
    // ---------------------------------------------------------------------

    #[test]
    fn prefers_word_starts() {
        assert!(score("amor", "app/models/order").unwrap() > score("amor", "app/models/zrder").unwrap());
        assert!(score("amo", "app/m/foo").unwrap() < score("amo", "app/models/foo").unwrap());
    }

    #[test]
    fn prefers_consecutive() {
        assert!(score("file", "file").unwrap() > score("file", "filter").unwrap());
        assert!(score("abc", "xabcx").unwrap() > score("abc", "axbxcx").unwrap());
    }

    #[test]
    fn prefers_shorter_candidates() {
        assert!(score("abc", "abcd").unwrap() > score("abc", "abcde").unwrap());
    }

    #[test]
    fn prefers_start_of_candidate() {
        assert!(score("a", "abbb").unwrap() > score("a", "baaa").unwrap());
    }

    #[test]
    fn prefers_camel_case_boundaries() {
        assert!(score("fbb", "FooBarBaz").unwrap() > score("fbb", "foobarbaz").unwrap());
    }

    #[test]
    fn dot_bonus_is_below_word_bonus() {
        assert!(score("b", "a.b").unwrap() < score("b", "a-b").unwrap());
    }

    // ---------------------------------------------------------------------
    // Positions
    // ---------------------------------------------------------------------

    #[test]
    fn positions_consecutive() {
        assert_eq!(positions("amo", "app/m/foo"), vec![0, 4, 7]);
    }

    #[test]
    fn positions_prefer_word_start() {
        assert_eq!(positions("amor", "app/models/order"), vec![0, 4, 11, 12]);
    }

    #[test]
    fn positions_start_of_word() {
        assert_eq!(positions("as", "tags"), vec![1, 3]);
        assert_eq!(positions("as", "examples.txt"), vec![2, 7]);
    }

    #[test]
    fn positions_exact_length() {
        assert_eq!(positions("foo", "foo"), vec![0, 1, 2]);
    }

    #[test]
    fn positions_are_codepoint_indices() {
        assert_eq!(positions("éb", "xéyb"), vec![1, 3]);
    }

    #[test]
    fn row_and_matrix_scores_agree() {
        let cases = [
            ("f", "foo"),
            ("amor", "app/models/order"),
            ("fbb", "FooBarBaz"),
            ("34", "1340"),
            ("ab", "a-b.ab"),
        ];
        let mut scorer = Scorer::new();
        for (q, c) in cases {
            let q = Query::new(q);
            let a = scorer.score(&q, c).unwrap();
            let b = scorer.score_with_positions(&q, c).unwrap().score;
            assert!((a - b).abs() < EPS, "{c}: {a} vs {b}");
        }
    }
}
