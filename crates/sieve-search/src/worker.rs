#![forbid(unsafe_code)]

//! Scoring worker threads.
//!
//! Each worker owns a job channel and a [`Scorer`]. Workers are pure
//! compute: they never touch the terminal and share no mutable scoring
//! state. A job whose generation is already stale when it is dequeued is
//! skipped; a job that has started always runs to completion.

use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use sieve_match::{Query, Scorer};

use crate::rank::{Generation, RankMode, ScoredMatch, TopK};
use crate::store::Snapshot;

/// One shard of one generation.
#[derive(Debug)]
pub(crate) struct ShardJob {
    pub generation: Generation,
    pub shard: usize,
    pub query: Arc<Query>,
    pub lines: Snapshot,
    pub range: Range<usize>,
    pub limit: Option<usize>,
    pub mode: RankMode,
}

/// Best matches of one shard.
#[derive(Debug)]
pub(crate) struct ShardReport {
    pub generation: Generation,
    pub shard: usize,
    pub matches: Vec<ScoredMatch>,
    pub matched: usize,
}

#[derive(Debug)]
pub(crate) enum Reply {
    Shard(ShardReport),
    Died { worker: usize },
}

enum Command {
    Run(ShardJob),
    #[cfg(any(test, feature = "fault-injection"))]
    Fault,
    Shutdown,
}

/// Score one shard into a bounded top-k list.
pub(crate) fn run_shard(scorer: &mut Scorer, job: &ShardJob) -> ShardReport {
    let mut top = TopK::new(job.mode, job.limit);
    let mut matched = 0;
    let lines = &job.lines.as_slice()[job.range.clone()];
    for (offset, text) in lines.iter().enumerate() {
        if let Some(score) = scorer.score(&job.query, text) {
            matched += 1;
            top.push(ScoredMatch {
                index: job.range.start + offset,
                score,
                text: Arc::clone(text),
            });
        }
    }
    ShardReport {
        generation: job.generation,
        shard: job.shard,
        matches: top.into_sorted_vec(),
        matched,
    }
}

/// Sends a death notice if the worker unwinds.
struct PanicNotice {
    worker: usize,
    replies: mpsc::Sender<Reply>,
}

impl Drop for PanicNotice {
    fn drop(&mut self) {
        if thread::panicking() {
            let _ = self.replies.send(Reply::Died {
                worker: self.worker,
            });
        }
    }
}

/// Handle to one worker thread; shuts it down on drop.
pub(crate) struct Worker {
    sender: mpsc::Sender<Command>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub(crate) fn spawn(
        id: usize,
        replies: mpsc::Sender<Reply>,
        latest: Arc<AtomicU64>,
    ) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<Command>();
        let handle = thread::Builder::new()
            .name(format!("sieve-worker-{id}"))
            .spawn(move || worker_loop(id, rx, replies, latest))?;
        Ok(Self {
            sender: tx,
            handle: Some(handle),
        })
    }

    /// Queue a job; returns `false` if the worker is gone.
    pub(crate) fn send(&self, job: ShardJob) -> bool {
        self.sender.send(Command::Run(job)).is_ok()
    }

    /// Make the worker panic when it dequeues this command.
    #[cfg(any(test, feature = "fault-injection"))]
    pub(crate) fn inject_fault(&self) -> bool {
        self.sender.send(Command::Fault).is_ok()
    }

    fn shutdown(&mut self) {
        let _ = self.sender.send(Command::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    id: usize,
    rx: mpsc::Receiver<Command>,
    replies: mpsc::Sender<Reply>,
    latest: Arc<AtomicU64>,
) {
    let _notice = PanicNotice {
        worker: id,
        replies: replies.clone(),
    };
    let mut scorer = Scorer::new();
    while let Ok(cmd) = rx.recv() {
        match cmd {
            Command::Run(job) => {
                if job.generation < latest.load(Ordering::Acquire) {
                    tracing::trace!(worker = id, generation = job.generation, "skipping stale shard");
                    continue;
                }
                let report = run_shard(&mut scorer, &job);
                if replies.send(Reply::Shard(report)).is_err() {
                    break;
                }
            }
            #[cfg(any(test, feature = "fault-injection"))]
            Command::Fault => panic!("injected fault in worker {id}"),
            Command::Shutdown => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(lines: &[&str], range: Range<usize>, query: &str, limit: Option<usize>) -> ShardJob {
        ShardJob {
            generation: 1,
            shard: 0,
            query: Arc::new(Query::new(query)),
            lines: Snapshot::from_lines(lines.iter().copied()),
            range,
            limit,
            mode: RankMode::Score,
        }
    }

    #[test]
    fn shard_indices_are_global() {
        let lines = ["xa", "a", "b", "ab", "a"];
        let report = run_shard(&mut Scorer::new(), &job(&lines, 2..5, "a", Some(10)));
        let idx: Vec<usize> = report.matches.iter().map(|m| m.index).collect();
        assert_eq!(idx, vec![4, 3]);
        assert_eq!(report.matched, 2);
    }

    #[test]
    fn shard_counts_matches_beyond_limit() {
        let lines = ["a1", "a2", "a3", "a4"];
        let report = run_shard(&mut Scorer::new(), &job(&lines, 0..4, "a", Some(2)));
        assert_eq!(report.matches.len(), 2);
        assert_eq!(report.matched, 4);
    }

    #[test]
    fn worker_reports_and_shuts_down() {
        let (tx, rx) = mpsc::channel();
        let latest = Arc::new(AtomicU64::new(1));
        let worker = Worker::spawn(0, tx, latest).unwrap();
        assert!(worker.send(job(&["foo", "bar"], 0..2, "f", None)));
        match rx.recv().unwrap() {
            Reply::Shard(report) => {
                assert_eq!(report.matches.len(), 1);
                assert_eq!(&*report.matches[0].text, "foo");
            }
            Reply::Died { .. } => panic!("worker died"),
        }
        drop(worker);
    }

    #[test]
    fn panicking_worker_reports_death() {
        let (tx, rx) = mpsc::channel();
        let worker = Worker::spawn(3, tx, Arc::new(AtomicU64::new(0))).unwrap();
        assert!(worker.inject_fault());
        match rx.recv().unwrap() {
            Reply::Died { worker } => assert_eq!(worker, 3),
            Reply::Shard(_) => panic!("unexpected report"),
        }
        // The thread is gone; later jobs cannot be delivered.
        drop(worker);
        assert!(rx.recv().is_err());
    }

    #[test]
    fn stale_jobs_are_skipped() {
        let (tx, rx) = mpsc::channel();
        let latest = Arc::new(AtomicU64::new(5));
        let worker = Worker::spawn(0, tx, latest).unwrap();
        assert!(worker.send(job(&["foo"], 0..1, "f", None)));
        drop(worker);
        assert!(rx.recv().is_err());
    }
}
