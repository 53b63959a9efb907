#![forbid(unsafe_code)]

//! Search errors.

use std::fmt;
use std::io;

/// Failures of the worker pool.
///
/// A scorer call cannot fail, so any error here means the pool itself is
/// broken and the session should end.
#[derive(Debug)]
pub enum SearchError {
    /// A worker thread could not be started.
    Spawn(io::Error),
    /// A worker panicked or exited while the coordinator still needed it.
    WorkerLost {
        /// Index of the worker.
        worker: usize,
    },
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn(e) => write!(f, "failed to start search worker: {e}"),
            Self::WorkerLost { worker } => write!(f, "search worker {worker} stopped unexpectedly"),
        }
    }
}

impl std::error::Error for SearchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn(e) => Some(e),
            Self::WorkerLost { .. } => None,
        }
    }
}

impl From<io::Error> for SearchError {
    fn from(e: io::Error) -> Self {
        Self::Spawn(e)
    }
}
