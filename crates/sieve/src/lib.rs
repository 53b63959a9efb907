#![forbid(unsafe_code)]

//! Interactive fuzzy finder.
//!
//! Candidates are read from standard input while the query is typed on the
//! control terminal. Every edit re-ranks the candidates on a worker pool and
//! redraws the best matches inline below the cursor.
//!
//! # Example
//!
//! ```no_run
//! use sieve::{Config, Outcome};
//!
//! let config = Config::default();
//! match sieve::run_interactive(&config)? {
//!     Outcome::Selected(lines) => println!("{}", lines.join("\n")),
//!     Outcome::Query(query) => println!("{query}"),
//!     Outcome::Cancelled => {}
//! }
//! # Ok::<(), sieve::Error>(())
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod filter;
pub mod logging;
pub mod query;
pub mod reader;
pub mod render;
pub mod session;

use std::io::{self, IsTerminal};

use sieve_search::{CandidateStore, Coordinator, RankMode, SearchConfig};
use sieve_tty::Tty;

pub use config::{Config, Delimiter, LineCount, ScrollOff};
pub use error::Error;
pub use filter::run_filter;
pub use session::{Outcome, Session};

/// Run an interactive session: candidates from stdin, keys from the
/// configured terminal.
pub fn run_interactive(config: &Config) -> Result<Outcome, Error> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Err(Error::NotPiped);
    }

    let tty = Tty::open(&config.tty_options())?;

    let (lines, _reader) = reader::spawn_reader(stdin, config.input_delimiter)?;
    let store = CandidateStore::with_max_items(config.max_items);
    let coordinator = Coordinator::new(
        store,
        SearchConfig {
            workers: config.workers,
            // Sized from the terminal height by the session.
            limit: None,
            mode: if config.sort {
                RankMode::Score
            } else {
                RankMode::InputOrder
            },
        },
    )?;
    Session::new(tty, coordinator, Some(lines), config).run()
}
