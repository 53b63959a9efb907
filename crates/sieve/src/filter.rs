#![forbid(unsafe_code)]

//! Non-interactive mode: rank all input against one query and print it.

use std::io::{Read, Write};

use sieve_match::SCORE_MAX;
use sieve_search::{CandidateStore, RankMode, search_all};

use crate::config::Config;
use crate::error::Error;
use crate::reader;

/// Rank `input` against `query` and write every match to `out`.
///
/// Returns the number of matches written.
pub fn run_filter<R: Read>(
    config: &Config,
    query: &str,
    input: R,
    out: &mut impl Write,
) -> Result<usize, Error> {
    let store = CandidateStore::with_max_items(config.max_items);
    store.extend(reader::read_all(input, config.input_delimiter)?);

    let mode = if config.sort {
        RankMode::Score
    } else {
        RankMode::InputOrder
    };
    let matches = search_all(store.snapshot(), query, config.workers, mode)?;
    tracing::debug!(query, matched = matches.len(), total = store.len(), "filter complete");

    let delimiter = config.output_delimiter();
    for m in &matches {
        if config.show_scores {
            if m.score == SCORE_MAX {
                out.write_all(b"inf\t")?;
            } else {
                write!(out, "{:.6}\t", m.score)?;
            }
        }
        out.write_all(m.text.as_bytes())?;
        out.write_all(&[delimiter])?;
    }
    out.flush()?;
    Ok(matches.len())
}
