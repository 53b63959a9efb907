#![forbid(unsafe_code)]

//! Ranking order, bounded top-k selection, and result sets.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;

/// Identifies one query/candidate-set version of a search.
///
/// Generation 0 is the state before any search completed.
pub type Generation = u64;

/// One matching candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMatch {
    /// Index of the candidate in arrival order.
    pub index: usize,
    /// Scorer output.
    pub score: f64,
    /// The candidate text.
    pub text: Arc<str>,
}

/// How matches are ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RankMode {
    /// Score descending, then input order.
    #[default]
    Score,
    /// Input order only.
    InputOrder,
}

impl RankMode {
    /// Compare two matches; `Less` means `a` ranks first.
    #[must_use]
    pub fn compare(self, a: &ScoredMatch, b: &ScoredMatch) -> Ordering {
        match self {
            Self::Score => b
                .score
                .total_cmp(&a.score)
                .then_with(|| a.index.cmp(&b.index)),
            Self::InputOrder => a.index.cmp(&b.index),
        }
    }

    /// Sort matches best-first.
    pub fn sort(self, matches: &mut [ScoredMatch]) {
        matches.sort_unstable_by(|a, b| self.compare(a, b));
    }
}

/// Heap entry ordered so that "greater" means "ranks worse".
#[derive(Debug)]
struct Ranked {
    mode: RankMode,
    m: ScoredMatch,
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.mode.compare(&self.m, &other.m)
    }
}

/// Keeps the best `limit` matches seen so far.
///
/// Backed by a max-heap on "worseness", so the entry to evict is always on
/// top. With no limit it keeps everything.
#[derive(Debug)]
pub struct TopK {
    mode: RankMode,
    limit: Option<usize>,
    heap: BinaryHeap<Ranked>,
}

impl TopK {
    /// Empty selection keeping at most `limit` matches.
    #[must_use]
    pub fn new(mode: RankMode, limit: Option<usize>) -> Self {
        let cap = limit.unwrap_or(0).min(4096);
        Self {
            mode,
            limit,
            heap: BinaryHeap::with_capacity(cap),
        }
    }

    /// Offer a match.
    pub fn push(&mut self, m: ScoredMatch) {
        let entry = Ranked {
            mode: self.mode,
            m,
        };
        match self.limit {
            Some(0) => {}
            Some(limit) if self.heap.len() >= limit => {
                if let Some(mut worst) = self.heap.peek_mut()
                    && entry < *worst
                {
                    *worst = entry;
                }
            }
            _ => self.heap.push(entry),
        }
    }

    /// Number of matches held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether no match is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// The held matches, best first.
    #[must_use]
    pub fn into_sorted_vec(self) -> Vec<ScoredMatch> {
        self.heap.into_sorted_vec().into_iter().map(|r| r.m).collect()
    }
}

/// Merge per-shard lists into one ranked list of at most `limit` entries.
pub(crate) fn merge(
    mode: RankMode,
    limit: Option<usize>,
    shards: impl IntoIterator<Item = Vec<ScoredMatch>>,
) -> Vec<ScoredMatch> {
    let mut all: Vec<ScoredMatch> = shards.into_iter().flatten().collect();
    mode.sort(&mut all);
    if let Some(limit) = limit {
        all.truncate(limit);
    }
    all
}

/// The ranked outcome of one completed generation.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// Generation that produced this set.
    pub generation: Generation,
    /// Query the set was computed for.
    pub query: String,
    /// Matches, best first, capped at the display limit.
    pub matches: Vec<ScoredMatch>,
    /// Number of matching candidates before capping.
    pub matched: usize,
    /// Number of candidates searched.
    pub total: usize,
}

impl ResultSet {
    /// The set shown before the first generation completes.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of matches held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// Whether no match is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Match at rank `i`.
    #[must_use]
    pub fn get(&self, i: usize) -> Option<&ScoredMatch> {
        self.matches.get(i)
    }

    /// Matched candidate texts, best first.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.matches.iter().map(|m| &*m.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(index: usize, score: f64) -> ScoredMatch {
        ScoredMatch {
            index,
            score,
            text: Arc::from(format!("c{index}")),
        }
    }

    fn indices(v: &[ScoredMatch]) -> Vec<usize> {
        v.iter().map(|m| m.index).collect()
    }

    #[test]
    fn higher_score_ranks_first() {
        assert_eq!(RankMode::Score.compare(&m(5, 2.0), &m(1, 1.0)), Ordering::Less);
    }

    #[test]
    fn ties_break_on_input_order() {
        assert_eq!(RankMode::Score.compare(&m(1, 1.0), &m(2, 1.0)), Ordering::Less);
        assert_eq!(
            RankMode::Score.compare(&m(1, f64::INFINITY), &m(2, f64::INFINITY)),
            Ordering::Less
        );
    }

    #[test]
    fn input_order_ignores_score() {
        assert_eq!(RankMode::InputOrder.compare(&m(1, 0.0), &m(2, 9.0)), Ordering::Less);
    }

    #[test]
    fn topk_keeps_best() {
        let mut top = TopK::new(RankMode::Score, Some(3));
        for (i, s) in [(0, 0.1), (1, 0.9), (2, 0.5), (3, 0.9), (4, 0.7), (5, 0.0)] {
            top.push(m(i, s));
        }
        assert_eq!(top.len(), 3);
        assert_eq!(indices(&top.into_sorted_vec()), vec![1, 3, 4]);
    }

    #[test]
    fn topk_equal_scores_keep_earliest() {
        let mut top = TopK::new(RankMode::Score, Some(2));
        for i in [4, 2, 7, 0, 9] {
            top.push(m(i, 1.0));
        }
        assert_eq!(indices(&top.into_sorted_vec()), vec![0, 2]);
    }

    #[test]
    fn topk_unbounded_keeps_all() {
        let mut top = TopK::new(RankMode::Score, None);
        for i in 0..100 {
            top.push(m(i, (i % 7) as f64));
        }
        let all = top.into_sorted_vec();
        assert_eq!(all.len(), 100);
        assert!(all.windows(2).all(|w| RankMode::Score.compare(&w[0], &w[1]) == Ordering::Less));
    }

    #[test]
    fn topk_zero_limit_keeps_nothing() {
        let mut top = TopK::new(RankMode::Score, Some(0));
        top.push(m(0, 1.0));
        assert!(top.is_empty());
    }

    #[test]
    fn merge_is_global_order() {
        let a = vec![m(0, 3.0), m(2, 1.0)];
        let b = vec![m(5, 3.0), m(6, 2.0)];
        let merged = merge(RankMode::Score, Some(3), [b, a]);
        assert_eq!(indices(&merged), vec![0, 5, 6]);
    }
}
