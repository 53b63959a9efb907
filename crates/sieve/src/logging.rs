#![forbid(unsafe_code)]

//! Diagnostic logging.
//!
//! The terminal belongs to the user interface, so logs never go to it. With
//! `SIEVE_LOG` set to a filter (for example `debug` or `sieve_search=trace`)
//! and `SIEVE_LOG_FILE` naming a file, events are appended to that file.
//! Otherwise no subscriber is installed.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

/// Install the file subscriber if the environment asks for one.
///
/// Returns whether logging was enabled.
pub fn init_from_env() -> bool {
    let filter = std::env::var("SIEVE_LOG").ok();
    let file = std::env::var_os("SIEVE_LOG_FILE");
    match (filter, file) {
        (Some(filter), Some(path)) => init(&filter, Path::new(&path)),
        _ => false,
    }
}

fn init(filter: &str, path: &Path) -> bool {
    let file = match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("sieve: cannot open log file {}: {err}", path.display());
            return false;
        }
    };
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_thread_names(true)
        .try_init()
        .is_ok()
}
