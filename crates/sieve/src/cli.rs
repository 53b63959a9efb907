#![forbid(unsafe_code)]

//! Command-line argument parsing.
//!
//! Arguments are parsed by hand. Long options take `--name=value` or
//! `--name value`; short options take `-l5` or `-l 5` and boolean short
//! options may be grouped (`-si`). `SIEVE_*` environment variables supply
//! defaults that explicit flags override.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{Config, Delimiter, LineCount, ScrollOff};

/// Crate version reported by `--version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Text printed by `--help`.
pub const HELP_TEXT: &str = "\
sieve - interactive fuzzy finder

USAGE:
    command | sieve [OPTIONS]

OPTIONS:
    -l, --lines=N            Show N result lines, or 'max' to fill the terminal (default: 10)
    -p, --prompt=STR         Prompt string (default: '> ')
    -q, --query=STR          Start with this query
    -e, --show-matches=QUERY Print every match for QUERY and exit
    -s, --show-scores        Show the score of each match
    -i, --show-info          Show the matched/total counter
    -0, --read-null          Read NUL-separated input
    -t, --tty=PATH           Terminal device for keyboard input (default: /dev/tty)
    -j, --workers=N          Ranking threads (default: available parallelism)
    -m, --multi              Mark entries with Tab / Shift-Tab
    -M, --max-items=N        Read at most N candidates
    -P, --pad=N              Left padding of every line
        --cycle              Wrap the selection around
        --pointer=STR        Highlighted-entry pointer (default: '>')
        --marker=STR         Marked-entry marker (default: '*')
        --scroll-off=N       Context lines around the selection, or 'auto'
        --no-clear           Leave the interface on screen on exit
        --no-color           Disable colors
        --no-sort            Keep matches in input order
        --print-null         End output records with NUL
        --tab-accepts        Tab accepts the highlighted entry
        --right-accepts      Right arrow accepts the highlighted entry
        --left-aborts        Left arrow cancels
    -h, --help               Show this help message
    -v, --version            Show version

KEYBINDINGS:
    Enter                    Accept
    Esc, Ctrl-C, Ctrl-G      Cancel
    Up/Down, Ctrl-P/Ctrl-N   Move the selection
    Ctrl-W / Ctrl-U          Delete word / delete to start

ENVIRONMENT VARIABLES:
    SIEVE_LINES              Default for --lines
    SIEVE_PROMPT             Default for --prompt
    SIEVE_WORKERS            Default for --workers
    SIEVE_TTY                Default for --tty
    SIEVE_KEY_TIMEOUT_MS     Escape key timeout in milliseconds (default: 25)
    SIEVE_NO_COLOR, NO_COLOR Disable colors
    SIEVE_LOG                Log filter, e.g. 'debug' (needs SIEVE_LOG_FILE)
    SIEVE_LOG_FILE           Log destination";

/// What the user asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Run with this configuration.
    Run(Box<Config>),
    /// Print [`HELP_TEXT`].
    Help,
    /// Print [`VERSION`].
    Version,
}

/// Bad command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliError {
    /// An argument that is not a known option.
    UnknownArgument(String),
    /// An option that needs a value came last.
    MissingValue(&'static str),
    /// An option value that does not parse.
    InvalidValue { option: &'static str, value: String },
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownArgument(arg) => write!(f, "unknown argument: {arg}"),
            Self::MissingValue(option) => write!(f, "option '--{option}' requires a value"),
            Self::InvalidValue { option, value } => {
                write!(f, "invalid value for '--{option}': {value}")
            }
        }
    }
}

impl std::error::Error for CliError {}

/// Parse the process arguments and environment.
pub fn parse_from_env() -> Result<Command, CliError> {
    parse(
        env::args_os()
            .skip(1)
            .map(|arg| arg.to_string_lossy().into_owned()),
        |name| env::var(name).ok(),
    )
}

/// Parse `args` (without the program name), reading defaults through `env`.
pub fn parse<I, S, E>(args: I, env: E) -> Result<Command, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
    E: Fn(&str) -> Option<String>,
{
    let mut config = Config::default();
    apply_env(&mut config, &env);

    let mut args = args.into_iter().map(Into::into);
    while let Some(arg) = args.next() {
        let done = if let Some(long) = arg.strip_prefix("--") {
            let (name, inline) = match long.split_once('=') {
                Some((name, value)) => (name, Some(value.to_string())),
                None => (long, None),
            };
            let Some(option) = lookup_long(name) else {
                return Err(CliError::UnknownArgument(arg));
            };
            let value = if option.takes_value {
                Some(match inline {
                    Some(value) => value,
                    None => args.next().ok_or(CliError::MissingValue(option.long))?,
                })
            } else if inline.is_some() {
                return Err(CliError::UnknownArgument(arg));
            } else {
                None
            };
            apply(&mut config, option.long, value)?
        } else if let Some(shorts) = arg.strip_prefix('-').filter(|s| !s.is_empty()) {
            let mut done = None;
            for (at, c) in shorts.char_indices() {
                let Some(option) = lookup_short(c) else {
                    return Err(CliError::UnknownArgument(format!("-{c}")));
                };
                if option.takes_value {
                    let rest = &shorts[at + c.len_utf8()..];
                    let value = if rest.is_empty() {
                        args.next().ok_or(CliError::MissingValue(option.long))?
                    } else {
                        rest.to_string()
                    };
                    done = apply(&mut config, option.long, Some(value))?;
                    break;
                }
                done = apply(&mut config, option.long, None)?;
                if done.is_some() {
                    break;
                }
            }
            done
        } else {
            return Err(CliError::UnknownArgument(arg));
        };
        if let Some(command) = done {
            return Ok(command);
        }
    }
    Ok(Command::Run(Box::new(config)))
}

struct OptionSpec {
    long: &'static str,
    short: Option<char>,
    takes_value: bool,
}

const fn opt(long: &'static str, short: Option<char>, takes_value: bool) -> OptionSpec {
    OptionSpec {
        long,
        short,
        takes_value,
    }
}

const OPTIONS: &[OptionSpec] = &[
    opt("read-null", Some('0'), false),
    opt("show-matches", Some('e'), true),
    opt("help", Some('h'), false),
    opt("show-info", Some('i'), false),
    opt("workers", Some('j'), true),
    opt("lines", Some('l'), true),
    opt("multi", Some('m'), false),
    opt("max-items", Some('M'), true),
    opt("prompt", Some('p'), true),
    opt("pad", Some('P'), true),
    opt("query", Some('q'), true),
    opt("show-scores", Some('s'), false),
    opt("tty", Some('t'), true),
    opt("version", Some('v'), false),
    opt("cycle", None, false),
    opt("marker", None, true),
    opt("no-clear", None, false),
    opt("no-color", None, false),
    opt("no-sort", None, false),
    opt("pointer", None, true),
    opt("print-null", None, false),
    opt("scroll-off", None, true),
    opt("tab-accepts", None, false),
    opt("right-accepts", None, false),
    opt("left-aborts", None, false),
];

fn lookup_long(name: &str) -> Option<&'static OptionSpec> {
    OPTIONS.iter().find(|o| o.long == name)
}

fn lookup_short(c: char) -> Option<&'static OptionSpec> {
    OPTIONS.iter().find(|o| o.short == Some(c))
}

fn apply(
    config: &mut Config,
    option: &'static str,
    value: Option<String>,
) -> Result<Option<Command>, CliError> {
    let value = value.unwrap_or_default();
    let invalid = |value: &str| CliError::InvalidValue {
        option,
        value: value.to_string(),
    };
    match option {
        "help" => return Ok(Some(Command::Help)),
        "version" => return Ok(Some(Command::Version)),
        "read-null" => config.input_delimiter = Delimiter::Nul,
        "show-matches" => config.filter = Some(value),
        "show-info" => config.show_info = true,
        "workers" => config.workers = parse_positive(&value).ok_or_else(|| invalid(&value))?,
        "lines" => config.lines = parse_lines(&value).ok_or_else(|| invalid(&value))?,
        "multi" => config.multi = true,
        "max-items" => {
            config.max_items = Some(parse_positive(&value).ok_or_else(|| invalid(&value))?);
        }
        "prompt" => config.prompt = value,
        "pad" => config.pad = value.parse().map_err(|_| invalid(&value))?,
        "query" => config.query = value,
        "show-scores" => config.show_scores = true,
        "tty" => config.tty = PathBuf::from(value),
        "cycle" => config.cycle = true,
        "marker" | "pointer" => {
            if value.is_empty() || value.chars().any(char::is_control) {
                return Err(invalid(&value));
            }
            if option == "marker" {
                config.marker = value;
            } else {
                config.pointer = value;
            }
        }
        "no-clear" => config.no_clear = true,
        "no-color" => config.color = false,
        "no-sort" => config.sort = false,
        "print-null" => config.print_null = true,
        "scroll-off" => {
            config.scroll_off = parse_scroll_off(&value).ok_or_else(|| invalid(&value))?;
        }
        "tab-accepts" => config.tab_accepts = true,
        "right-accepts" => config.right_accepts = true,
        "left-aborts" => config.left_aborts = true,
        _ => return Err(CliError::UnknownArgument(format!("--{option}"))),
    }
    Ok(None)
}

fn apply_env(config: &mut Config, env: &impl Fn(&str) -> Option<String>) {
    if let Some(val) = env("SIEVE_LINES")
        && let Some(lines) = parse_lines(&val)
    {
        config.lines = lines;
    }
    if let Some(val) = env("SIEVE_PROMPT") {
        config.prompt = val;
    }
    if let Some(val) = env("SIEVE_WORKERS")
        && let Some(n) = parse_positive(&val)
    {
        config.workers = n;
    }
    if let Some(val) = env("SIEVE_TTY")
        && !val.is_empty()
    {
        config.tty = PathBuf::from(val);
    }
    if let Some(val) = env("SIEVE_KEY_TIMEOUT_MS")
        && let Ok(ms) = val.parse()
    {
        config.key_timeout = Duration::from_millis(ms);
    }
    if env("SIEVE_NO_COLOR").is_some_and(|v| !v.is_empty())
        || env("NO_COLOR").is_some_and(|v| !v.is_empty())
    {
        config.color = false;
    }
}

fn parse_positive(value: &str) -> Option<usize> {
    value.parse().ok().filter(|&n| n > 0)
}

fn parse_lines(value: &str) -> Option<LineCount> {
    if value.eq_ignore_ascii_case("max") {
        return Some(LineCount::Max);
    }
    parse_positive(value).map(LineCount::Count)
}

fn parse_scroll_off(value: &str) -> Option<ScrollOff> {
    if value.eq_ignore_ascii_case("auto") {
        return Some(ScrollOff::Auto);
    }
    value.parse().ok().map(ScrollOff::Rows)
}
