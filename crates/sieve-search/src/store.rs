#![forbid(unsafe_code)]

//! Append-only candidate store.
//!
//! One writer (the line reader) appends while any number of workers read.
//! Readers work on a [`Snapshot`]: an immutable prefix of the store taken at
//! submit time, so a worker never observes a partially written candidate and
//! the writer is never blocked behind a long scoring pass.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Immutable prefix of the store.
///
/// Cheap to clone; index `i` is candidate `i`.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    lines: Arc<[Arc<str>]>,
}

impl Snapshot {
    /// Build a snapshot from owned lines (used by tests and one-shot runs).
    #[must_use]
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of candidates in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Candidate `index`, if present.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Arc<str>> {
        self.lines.get(index)
    }

    /// All candidates as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Arc<str>] {
        &self.lines
    }
}

#[derive(Debug, Default)]
struct Inner {
    lines: RwLock<Vec<Arc<str>>>,
    /// Snapshot of the current contents, rebuilt lazily after appends.
    cached: Mutex<Option<Snapshot>>,
    max_items: Option<usize>,
}

/// Shared handle to the candidate list.
///
/// Candidate indices are dense and assigned in arrival order. Empty lines
/// are not candidates and are skipped on append.
#[derive(Debug, Clone, Default)]
pub struct CandidateStore {
    inner: Arc<Inner>,
}

impl CandidateStore {
    /// An unbounded store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that ignores appends once it holds `max_items` candidates.
    #[must_use]
    pub fn with_max_items(max_items: Option<usize>) -> Self {
        Self {
            inner: Arc::new(Inner {
                max_items,
                ..Inner::default()
            }),
        }
    }

    /// Append one line; returns whether it became a candidate.
    pub fn push(&self, line: impl Into<Arc<str>>) -> bool {
        self.extend(std::iter::once(line)) == 1
    }

    /// Append lines in order; returns how many became candidates.
    pub fn extend<I, S>(&self, lines: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        let mut added = 0;
        {
            let mut guard = self.inner.lines.write().unwrap_or_else(PoisonError::into_inner);
            for line in lines {
                if self.inner.max_items.is_some_and(|max| guard.len() >= max) {
                    break;
                }
                let line: Arc<str> = line.into();
                if line.is_empty() {
                    continue;
                }
                guard.push(line);
                added += 1;
            }
        }
        if added > 0 {
            *self.cached_slot() = None;
        }
        added
    }

    /// Number of candidates appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no candidate has been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Candidate `index`, if present.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Arc<str>> {
        self.inner
            .lines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(index)
            .cloned()
    }

    /// Immutable view of everything appended so far.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let mut cached = self.cached_slot();
        if let Some(snap) = cached.as_ref() {
            return snap.clone();
        }
        let lines: Arc<[Arc<str>]> = self
            .inner
            .lines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_slice()
            .into();
        let snap = Snapshot { lines };
        *cached = Some(snap.clone());
        snap
    }

    fn cached_slot(&self) -> std::sync::MutexGuard<'_, Option<Snapshot>> {
        self.inner
            .cached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_follow_arrival_order() {
        let store = CandidateStore::new();
        store.extend(["a", "b"]);
        store.push("c");
        assert_eq!(store.len(), 3);
        assert_eq!(store.get(0).as_deref(), Some("a"));
        assert_eq!(store.get(2).as_deref(), Some("c"));
        assert_eq!(store.get(3), None);
    }

    #[test]
    fn empty_lines_are_skipped() {
        let store = CandidateStore::new();
        assert_eq!(store.extend(["a", "", "b"]), 2);
        assert!(!store.push(""));
        assert_eq!(store.get(1).as_deref(), Some("b"));
    }

    #[test]
    fn max_items_caps_the_store() {
        let store = CandidateStore::with_max_items(Some(2));
        assert_eq!(store.extend(["a", "b", "c"]), 2);
        assert!(!store.push("d"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn snapshot_is_a_stable_prefix() {
        let store = CandidateStore::new();
        store.extend(["a", "b"]);
        let snap = store.snapshot();
        store.push("c");
        assert_eq!(snap.len(), 2);
        assert_eq!(store.snapshot().len(), 3);
        assert_eq!(snap.get(1).map(|s| &**s), Some("b"));
    }

    #[test]
    fn snapshot_is_reused_until_the_store_grows() {
        let store = CandidateStore::new();
        store.extend(["a", "b"]);
        let one = store.snapshot();
        let two = store.snapshot();
        assert!(Arc::ptr_eq(&one.lines, &two.lines));
        store.push("c");
        let three = store.snapshot();
        assert!(!Arc::ptr_eq(&one.lines, &three.lines));
    }

    #[test]
    fn concurrent_reader_sees_whole_lines() {
        let store = CandidateStore::new();
        let writer = store.clone();
        let handle = std::thread::spawn(move || {
            for i in 0..2_000 {
                writer.push(format!("line-{i}"));
            }
        });
        while store.len() < 2_000 {
            let snap = store.snapshot();
            for (i, line) in snap.as_slice().iter().enumerate() {
                assert_eq!(&**line, format!("line-{i}"));
            }
        }
        handle.join().unwrap();
        assert_eq!(store.len(), 2_000);
    }
}
