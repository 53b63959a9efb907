#![forbid(unsafe_code)]

use std::fmt;
use std::io;

use sieve_search::SearchError;
use sieve_tty::TtyError;

use crate::cli::CliError;

/// Everything that can end a run early.
#[derive(Debug)]
pub enum Error {
    /// Bad command line.
    Usage(CliError),
    /// Interactive mode was started with a terminal on stdin.
    NotPiped,
    /// The control terminal failed.
    Tty(TtyError),
    /// The ranking engine failed.
    Search(SearchError),
    /// Reading input or writing output failed.
    Io(io::Error),
}

impl Error {
    /// Process exit status for this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usage(err) => err.fmt(f),
            Self::NotPiped => f.write_str("expected piped input (e.g. 'ls | sieve')"),
            Self::Tty(err) => err.fmt(f),
            Self::Search(err) => err.fmt(f),
            Self::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Usage(err) => Some(err),
            Self::NotPiped => None,
            Self::Tty(err) => Some(err),
            Self::Search(err) => Some(err),
            Self::Io(err) => Some(err),
        }
    }
}

impl From<CliError> for Error {
    fn from(err: CliError) -> Self {
        Self::Usage(err)
    }
}

impl From<TtyError> for Error {
    fn from(err: TtyError) -> Self {
        Self::Tty(err)
    }
}

impl From<SearchError> for Error {
    fn from(err: SearchError) -> Self {
        Self::Search(err)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}
