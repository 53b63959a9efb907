#![forbid(unsafe_code)]

//! Generation-based search coordination.
//!
//! # Lifecycle
//!
//! 1. [`Coordinator::submit`] bumps the generation, snapshots the store, and
//!    queues one contiguous shard per worker.
//! 2. Workers report shard-local top-`L` lists tagged with the generation.
//! 3. [`Coordinator::poll`] / [`Coordinator::wait`] collect reports. Reports
//!    from superseded generations are dropped; once every shard of the
//!    current generation has reported, the lists are merged and published.
//! 4. [`Coordinator::current_results`] always returns the latest published
//!    set (or an empty set before the first completion).
//!
//! There is no forced interruption: a superseded shard finishes and its
//! report is discarded.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::time::{Duration, Instant};

use sieve_match::Query;

use crate::error::SearchError;
use crate::rank::{Generation, RankMode, ResultSet, ScoredMatch, merge};
use crate::store::{CandidateStore, Snapshot};
use crate::worker::{Reply, ShardJob, ShardReport, Worker};

/// Coordinator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConfig {
    /// Number of worker threads (and shards per generation).
    pub workers: usize,
    /// Result set cap; `None` keeps every match.
    pub limit: Option<usize>,
    /// Ordering of results.
    pub mode: RankMode,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism().map_or(1, |n| n.get()),
            limit: Some(10),
            mode: RankMode::Score,
        }
    }
}

/// A generation whose shards are still arriving.
#[derive(Debug)]
struct Pending {
    generation: Generation,
    query: String,
    total: usize,
    expected: usize,
    matched: usize,
    shards: Vec<Vec<ScoredMatch>>,
    started: Instant,
}

/// Owns the worker pool and the published result set.
pub struct Coordinator {
    store: CandidateStore,
    config: SearchConfig,
    workers: Vec<Worker>,
    replies: mpsc::Receiver<Reply>,
    latest: Arc<AtomicU64>,
    generation: Generation,
    pending: Option<Pending>,
    current: ResultSet,
    searched_len: usize,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("config", &self.config)
            .field("workers", &self.workers.len())
            .field("generation", &self.generation)
            .field("in_flight", &self.pending.is_some())
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Spawn the worker pool.
    pub fn new(store: CandidateStore, config: SearchConfig) -> Result<Self, SearchError> {
        let config = SearchConfig {
            workers: config.workers.max(1),
            ..config
        };
        let (tx, rx) = mpsc::channel();
        let latest = Arc::new(AtomicU64::new(0));
        let workers = (0..config.workers)
            .map(|id| Worker::spawn(id, tx.clone(), Arc::clone(&latest)))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(workers = config.workers, "search pool started");
        Ok(Self {
            store,
            config,
            workers,
            replies: rx,
            latest,
            generation: 0,
            pending: None,
            current: ResultSet::empty(),
            searched_len: 0,
        })
    }

    /// The store being searched.
    #[must_use]
    pub fn store(&self) -> &CandidateStore {
        &self.store
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Change the result cap; applies from the next [`submit`](Self::submit).
    pub fn set_limit(&mut self, limit: Option<usize>) {
        if self.config.limit != limit {
            tracing::debug!(?limit, "result limit changed");
            self.config.limit = limit;
        }
    }

    /// Make `worker` panic on its next command.
    #[cfg(any(test, feature = "fault-injection"))]
    #[doc(hidden)]
    pub fn inject_worker_fault(&self, worker: usize) -> bool {
        self.workers.get(worker).is_some_and(Worker::inject_fault)
    }

    /// Latest generation handed out by [`submit`](Self::submit).
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Whether the latest generation is still being scored.
    #[must_use]
    pub fn in_flight(&self) -> bool {
        self.pending.is_some()
    }

    /// Candidate count covered by the latest submitted generation.
    #[must_use]
    pub fn searched_len(&self) -> usize {
        self.searched_len
    }

    /// The latest completed result set.
    #[must_use]
    pub fn current_results(&self) -> &ResultSet {
        &self.current
    }

    /// Start scoring `query` over the current store contents.
    pub fn submit(&mut self, query: &str) -> Result<Generation, SearchError> {
        self.generation += 1;
        let generation = self.generation;
        self.latest.store(generation, Ordering::Release);

        let lines = self.store.snapshot();
        let total = lines.len();
        self.searched_len = total;
        let shards = shard_ranges(total, self.workers.len());
        tracing::debug!(generation, query, total, shards = shards.len(), "search submitted");

        self.pending = Some(Pending {
            generation,
            query: query.to_owned(),
            total,
            expected: shards.len(),
            matched: 0,
            shards: Vec::with_capacity(shards.len()),
            started: Instant::now(),
        });

        let prepared = Arc::new(Query::new(query));
        for (shard, range) in shards.into_iter().enumerate() {
            let job = ShardJob {
                generation,
                shard,
                query: Arc::clone(&prepared),
                lines: lines.clone(),
                range,
                limit: self.config.limit,
                mode: self.config.mode,
            };
            if !self.workers[shard].send(job) {
                tracing::error!(worker = shard, "search worker is gone");
                return Err(SearchError::WorkerLost { worker: shard });
            }
        }

        // Nothing to score: complete synchronously.
        self.try_publish();
        Ok(generation)
    }

    /// Collect any reports that have arrived; returns whether a new result
    /// set was published.
    pub fn poll(&mut self) -> Result<bool, SearchError> {
        let mut published = false;
        loop {
            match self.replies.try_recv() {
                Ok(reply) => published |= self.accept(reply)?,
                Err(TryRecvError::Empty) => return Ok(published),
                Err(TryRecvError::Disconnected) => {
                    return Err(SearchError::WorkerLost { worker: 0 });
                }
            }
        }
    }

    /// Like [`poll`](Self::poll), but blocks up to `timeout` for the current
    /// generation to complete.
    pub fn wait(&mut self, timeout: Duration) -> Result<bool, SearchError> {
        let deadline = Instant::now() + timeout;
        let mut published = self.poll()?;
        while self.pending.is_some() {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }
            match self.replies.recv_timeout(left) {
                Ok(reply) => published |= self.accept(reply)?,
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(SearchError::WorkerLost { worker: 0 });
                }
            }
        }
        Ok(published)
    }

    /// Block until the current generation is published.
    pub fn wait_idle(&mut self) -> Result<(), SearchError> {
        while self.pending.is_some() {
            let reply = self
                .replies
                .recv()
                .map_err(|_| SearchError::WorkerLost { worker: 0 })?;
            self.accept(reply)?;
        }
        Ok(())
    }

    /// Submit `query` and block until its result set is published.
    pub fn search_blocking(&mut self, query: &str) -> Result<&ResultSet, SearchError> {
        self.submit(query)?;
        self.wait_idle()?;
        Ok(&self.current)
    }

    fn accept(&mut self, reply: Reply) -> Result<bool, SearchError> {
        match reply {
            Reply::Died { worker } => {
                tracing::error!(worker, "search worker panicked");
                Err(SearchError::WorkerLost { worker })
            }
            Reply::Shard(report) => Ok(self.accept_shard(report)),
        }
    }

    fn accept_shard(&mut self, report: ShardReport) -> bool {
        let Some(pending) = self.pending.as_mut() else {
            tracing::trace!(generation = report.generation, "dropping report with no pending search");
            return false;
        };
        if report.generation != pending.generation {
            tracing::trace!(
                generation = report.generation,
                current = pending.generation,
                shard = report.shard,
                "dropping stale shard report"
            );
            return false;
        }
        pending.matched += report.matched;
        pending.shards.push(report.matches);
        self.try_publish()
    }

    fn try_publish(&mut self) -> bool {
        let complete = self
            .pending
            .as_ref()
            .is_some_and(|p| p.shards.len() == p.expected);
        if !complete {
            return false;
        }
        let Some(pending) = self.pending.take() else {
            return false;
        };
        let matches = merge(self.config.mode, self.config.limit, pending.shards);
        tracing::debug!(
            generation = pending.generation,
            matched = pending.matched,
            total = pending.total,
            elapsed_us = pending.started.elapsed().as_micros() as u64,
            "search complete"
        );
        self.current = ResultSet {
            generation: pending.generation,
            query: pending.query,
            matches,
            matched: pending.matched,
            total: pending.total,
        };
        true
    }
}

/// Split `0..len` into at most `workers` contiguous, non-empty ranges.
fn shard_ranges(len: usize, workers: usize) -> Vec<std::ops::Range<usize>> {
    if len == 0 {
        return Vec::new();
    }
    let workers = workers.max(1);
    let chunk = len.div_ceil(workers);
    (0..workers)
        .map(|k| (k * chunk).min(len)..((k + 1) * chunk).min(len))
        .filter(|r| !r.is_empty())
        .collect()
}

/// Run one generation to completion and return every match.
///
/// This is the non-interactive path: the result is not capped.
pub fn search_all(
    lines: Snapshot,
    query: &str,
    workers: usize,
    mode: RankMode,
) -> Result<Vec<ScoredMatch>, SearchError> {
    let store = CandidateStore::new();
    store.extend(lines.as_slice().iter().cloned());
    let mut coordinator = Coordinator::new(
        store,
        SearchConfig {
            workers,
            limit: None,
            mode,
        },
    )?;
    coordinator.submit(query)?;
    coordinator.wait_idle()?;
    Ok(std::mem::take(&mut coordinator.current.matches))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(workers: usize, limit: usize) -> SearchConfig {
        SearchConfig {
            workers,
            limit: Some(limit),
            mode: RankMode::Score,
        }
    }

    fn texts(set: &ResultSet) -> Vec<&str> {
        set.texts().collect()
    }

    #[test]
    fn shard_ranges_cover_input() {
        assert!(shard_ranges(0, 4).is_empty());
        assert_eq!(shard_ranges(3, 8), vec![0..1, 1..2, 2..3]);
        assert_eq!(shard_ranges(10, 3), vec![0..4, 4..8, 8..10]);
        assert_eq!(shard_ranges(5, 1), vec![0..5]);
    }

    #[test]
    fn empty_before_first_completion() {
        let c = Coordinator::new(CandidateStore::new(), config(2, 10)).unwrap();
        assert_eq!(c.current_results().generation, 0);
        assert!(c.current_results().is_empty());
        assert!(!c.in_flight());
    }

    #[test]
    fn empty_store_completes_immediately() {
        let mut c = Coordinator::new(CandidateStore::new(), config(2, 10)).unwrap();
        let generation = c.submit("x").unwrap();
        assert!(!c.in_flight());
        assert_eq!(c.current_results().generation, generation);
        assert_eq!(c.current_results().total, 0);
    }

    #[test]
    fn empty_query_keeps_input_order() {
        let store = CandidateStore::new();
        store.extend(["c", "a", "b", "d"]);
        let mut c = Coordinator::new(store, config(3, 3)).unwrap();
        let set = c.search_blocking("").unwrap();
        assert_eq!(texts(set), vec!["c", "a", "b"]);
        assert_eq!(set.matched, 4);
        assert!(set.matches.iter().all(|m| m.score == f64::INFINITY));
    }

    #[test]
    fn non_matching_candidates_are_excluded() {
        let store = CandidateStore::new();
        store.extend(["foo", "bar"]);
        let mut c = Coordinator::new(store, config(2, 10)).unwrap();
        let set = c.search_blocking("f").unwrap();
        assert_eq!(texts(set), vec!["foo"]);
        assert!((set.matches[0].score - 0.89).abs() < 1e-9);
        assert_eq!((set.matched, set.total), (1, 2));
    }

    #[test]
    fn newer_generation_supersedes_older() {
        let store = CandidateStore::new();
        store.extend((0..5_000).map(|i| i.to_string()));
        let mut c = Coordinator::new(store, config(4, 5)).unwrap();
        let first = c.submit("1").unwrap();
        let second = c.submit("99").unwrap();
        assert!(second > first);
        c.wait_idle().unwrap();
        let set = c.current_results();
        assert_eq!(set.generation, second);
        assert_eq!(set.query, "99");
        assert!(set.texts().all(|t| sieve_match::has_match("99", t)));
        assert_eq!(set.texts().next(), Some("99"));
    }

    #[test]
    fn store_growth_is_seen_by_next_generation() {
        let store = CandidateStore::new();
        store.push("alpha");
        let mut c = Coordinator::new(store.clone(), config(2, 10)).unwrap();
        c.search_blocking("a").unwrap();
        assert_eq!(c.searched_len(), 1);
        store.push("beta");
        assert_eq!(c.search_blocking("a").unwrap().total, 2);
        assert_eq!(c.searched_len(), 2);
    }

    #[test]
    fn limit_change_applies_to_next_submit() {
        let store = CandidateStore::new();
        store.extend((0..50).map(|i| format!("a{i}")));
        let mut c = Coordinator::new(store, config(2, 3)).unwrap();
        assert_eq!(c.search_blocking("a").unwrap().len(), 3);
        c.set_limit(Some(20));
        assert_eq!(c.search_blocking("a").unwrap().len(), 20);
        c.set_limit(None);
        assert_eq!(c.search_blocking("a").unwrap().len(), 50);
    }

    #[test]
    fn worker_panic_is_fatal() {
        let store = CandidateStore::new();
        store.extend(["a", "b"]);
        let mut c = Coordinator::new(store, config(1, 10)).unwrap();
        assert!(c.inject_worker_fault(0));
        let err = match c.submit("a") {
            Err(err) => err,
            Ok(_) => c.wait_idle().unwrap_err(),
        };
        assert!(matches!(err, SearchError::WorkerLost { worker: 0 }), "{err:?}");
    }

    #[test]
    fn poll_reports_worker_panic() {
        let mut c = Coordinator::new(CandidateStore::new(), config(2, 10)).unwrap();
        assert!(c.inject_worker_fault(1));
        let deadline = Instant::now() + Duration::from_secs(10);
        let err = loop {
            match c.poll() {
                Err(err) => break err,
                Ok(_) => {
                    assert!(Instant::now() < deadline, "worker death never reported");
                    std::thread::sleep(Duration::from_millis(5));
                }
            }
        };
        assert!(matches!(err, SearchError::WorkerLost { worker: 1 }), "{err:?}");
    }

    #[test]
    fn wait_times_out_without_blocking_forever() {
        let store = CandidateStore::new();
        store.extend(["a"]);
        let mut c = Coordinator::new(store, config(1, 10)).unwrap();
        c.submit("a").unwrap();
        // Either completes quickly or returns after the timeout.
        let _ = c.wait(Duration::from_millis(500)).unwrap();
        c.wait_idle().unwrap();
        assert_eq!(c.current_results().len(), 1);
    }

    #[test]
    fn numbered_lines_scenario() {
        let store = CandidateStore::new();
        store.extend((1..=100_000).map(|i| i.to_string()));
        for workers in [1, 200] {
            let mut c = Coordinator::new(store.clone(), config(workers, 3)).unwrap();
            let set = c.search_blocking("34").unwrap();
            assert_eq!(texts(set), vec!["34", "340", "341"], "workers = {workers}");
        }
    }

    #[test]
    fn search_all_is_uncapped_and_sorted() {
        let lines = Snapshot::from_lines(["xfoo", "foo", "bar", "f"]);
        let all = search_all(lines, "f", 3, RankMode::Score).unwrap();
        let t: Vec<&str> = all.iter().map(|m| &*m.text).collect();
        assert_eq!(t, vec!["f", "foo", "xfoo"]);
    }

    #[test]
    fn search_all_input_order() {
        let lines = Snapshot::from_lines(["xfoo", "foo", "bar", "f"]);
        let all = search_all(lines, "f", 2, RankMode::InputOrder).unwrap();
        let idx: Vec<usize> = all.iter().map(|m| m.index).collect();
        assert_eq!(idx, vec![0, 1, 3]);
    }
}
