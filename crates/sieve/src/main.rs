#![forbid(unsafe_code)]

//! `sieve` binary entry point.

use std::io::{self, Write};
use std::process::ExitCode;

use sieve::cli::{self, Command};
use sieve::{Config, Error, Outcome};

/// Exit status after a cancelled session.
const EXIT_CANCELLED: u8 = 130;

fn main() -> ExitCode {
    let command = match cli::parse_from_env() {
        Ok(command) => command,
        Err(err) => {
            eprintln!("sieve: {err}");
            eprintln!("Try 'sieve --help' for more information.");
            return ExitCode::from(Error::from(err).exit_code());
        }
    };
    let config = match command {
        Command::Help => {
            print!("{}", cli::HELP_TEXT);
            return ExitCode::SUCCESS;
        }
        Command::Version => {
            println!("sieve {}", cli::VERSION);
            return ExitCode::SUCCESS;
        }
        Command::Run(config) => config,
    };

    sieve::logging::init_from_env();
    match run(&config) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %err, "fatal");
            eprintln!("sieve: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn run(config: &Config) -> Result<ExitCode, Error> {
    if let Some(query) = config.filter.as_deref() {
        let stdout = io::stdout();
        let matched = sieve::run_filter(config, query, io::stdin(), &mut stdout.lock())?;
        return Ok(if matched > 0 {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    // The session is gone (and the terminal restored) before anything is
    // printed.
    let outcome = sieve::run_interactive(config)?;
    let lines = match outcome {
        Outcome::Selected(lines) => lines,
        Outcome::Query(query) => vec![query],
        Outcome::Cancelled => return Ok(ExitCode::from(EXIT_CANCELLED)),
    };
    let delimiter = config.output_delimiter();
    let mut out = io::stdout().lock();
    for line in &lines {
        out.write_all(line.as_bytes())?;
        out.write_all(&[delimiter])?;
    }
    out.flush()?;
    Ok(ExitCode::SUCCESS)
}
