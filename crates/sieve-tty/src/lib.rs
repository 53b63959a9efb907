#![forbid(unsafe_code)]
//! Control-terminal access for sieve.
//!
//! Candidates arrive on standard input, so keyboard input is read from a
//! separate terminal device (normally `/dev/tty`). [`Tty`] owns that device:
//! it enters raw mode, reports the window size, decodes input bytes into
//! [`Event`]s, and turns `SIGWINCH` into [`Event::Resize`].
//!
//! Everything is restored on drop, on every exit path that unwinds.
//!
//! ## Escape Sequence Reference
//!
//! | Feature           | Enable         | Disable        |
//! |-------------------|----------------|----------------|
//! | Bracketed paste   | `CSI ? 2004 h` | `CSI ? 2004 l` |
//! | Cursor show/hide  | `CSI ? 25 h`   | `CSI ? 25 l`   |
//! | Auto-wrap         | `CSI ? 7 h`    | `CSI ? 7 l`    |

use core::time::Duration;
use std::collections::VecDeque;
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Instant;

use sieve_core::{Event, InputParser};

#[cfg(unix)]
use std::sync::{Mutex, OnceLock, PoisonError};

#[cfg(unix)]
use signal_hook::consts::signal::{SIGINT, SIGTERM, SIGWINCH};
#[cfg(unix)]
use signal_hook::iterator::Signals;

// ── Escape Sequences ─────────────────────────────────────────────────────

/// Turn bracketed paste on.
pub const BRACKETED_PASTE_ENABLE: &[u8] = b"\x1b[?2004h";
/// Turn bracketed paste off.
pub const BRACKETED_PASTE_DISABLE: &[u8] = b"\x1b[?2004l";
/// Show the cursor.
pub const CURSOR_SHOW: &[u8] = b"\x1b[?25h";
/// Hide the cursor.
pub const CURSOR_HIDE: &[u8] = b"\x1b[?25l";
/// Turn auto-wrap on.
pub const AUTOWRAP_ENABLE: &[u8] = b"\x1b[?7h";
/// Turn auto-wrap off.
pub const AUTOWRAP_DISABLE: &[u8] = b"\x1b[?7l";

/// Size used when the device cannot report one.
pub const FALLBACK_SIZE: (u16, u16) = (80, 24);

/// Default wait before a lone `ESC` is taken as the Escape key.
pub const DEFAULT_KEY_TIMEOUT: Duration = Duration::from_millis(25);

// ── Errors ───────────────────────────────────────────────────────────────

/// Terminal failures.
#[derive(Debug)]
pub enum TtyError {
    /// The device could not be opened.
    Open { path: PathBuf, source: io::Error },
    /// Raw mode or another terminal setting could not be applied.
    Configure(io::Error),
    /// Reading or writing the device failed.
    Io(io::Error),
}

impl fmt::Display for TtyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { path, source } => {
                write!(f, "cannot open terminal {}: {source}", path.display())
            }
            Self::Configure(err) => write!(f, "cannot configure terminal: {err}"),
            Self::Io(err) => write!(f, "terminal i/o error: {err}"),
        }
    }
}

impl std::error::Error for TtyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Open { source, .. } => Some(source),
            Self::Configure(err) | Self::Io(err) => Some(err),
        }
    }
}

impl From<io::Error> for TtyError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

// ── Raw Mode Guard ───────────────────────────────────────────────────────

/// RAII guard that saves the original termios and restores it on drop.
#[cfg(unix)]
pub struct RawModeGuard {
    original_termios: nix::sys::termios::Termios,
    tty: File,
}

#[cfg(unix)]
impl RawModeGuard {
    /// Put `tty` into raw mode, returning a guard that restores the
    /// original settings on drop.
    pub fn enter(tty: &File) -> io::Result<Self> {
        let tty = tty.try_clone()?;
        let original_termios = nix::sys::termios::tcgetattr(&tty).map_err(io::Error::other)?;

        let mut raw = original_termios.clone();
        nix::sys::termios::cfmakeraw(&mut raw);
        nix::sys::termios::tcsetattr(&tty, nix::sys::termios::SetArg::TCSAFLUSH, &raw)
            .map_err(io::Error::other)?;

        Ok(Self {
            original_termios,
            tty,
        })
    }
}

#[cfg(unix)]
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = nix::sys::termios::tcsetattr(
            &self.tty,
            nix::sys::termios::SetArg::TCSAFLUSH,
            &self.original_termios,
        );
    }
}

// ── Emergency Restore ────────────────────────────────────────────────────

/// What a panic hook or termination signal needs to put the device back.
#[cfg(unix)]
struct EmergencyRestore {
    original_termios: nix::sys::termios::Termios,
    tty: File,
    bracketed_paste: bool,
}

#[cfg(unix)]
static EMERGENCY_RESTORE: Mutex<Option<EmergencyRestore>> = Mutex::new(None);

#[cfg(unix)]
fn arm_emergency_restore(restore: EmergencyRestore) {
    install_panic_hook();
    *EMERGENCY_RESTORE
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = Some(restore);
}

#[cfg(unix)]
fn disarm_emergency_restore() {
    EMERGENCY_RESTORE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
}

#[cfg(unix)]
fn install_panic_hook() {
    static HOOK: OnceLock<()> = OnceLock::new();
    HOOK.get_or_init(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            best_effort_cleanup();
            previous(info);
        }));
    });
}

/// Restore the device from any thread. Runs at most once per session.
#[cfg(unix)]
fn best_effort_cleanup() {
    let Ok(mut slot) = EMERGENCY_RESTORE.try_lock() else {
        return;
    };
    if let Some(mut restore) = slot.take() {
        let _ = write_cleanup_sequence(restore.bracketed_paste, &mut restore.tty);
        let _ = restore.tty.flush();
        let _ = nix::sys::termios::tcsetattr(
            &restore.tty,
            nix::sys::termios::SetArg::TCSAFLUSH,
            &restore.original_termios,
        );
    }
}

// ── Signals ──────────────────────────────────────────────────────────────

// Signals are handled on a dedicated signal-hook thread so no unsafe
// `sigaction` code is needed here.
#[cfg(unix)]
#[derive(Debug)]
struct SignalGuard {
    handle: signal_hook::iterator::Handle,
    thread: Option<std::thread::JoinHandle<()>>,
}

#[cfg(unix)]
impl SignalGuard {
    fn new(resize_tx: mpsc::SyncSender<()>) -> io::Result<Self> {
        let mut signals = Signals::new([SIGWINCH, SIGINT, SIGTERM]).map_err(io::Error::other)?;
        let handle = signals.handle();
        let thread = std::thread::Builder::new()
            .name("sieve-signals".into())
            .spawn(move || {
                for signal in signals.forever() {
                    match signal {
                        SIGWINCH => {
                            // One pending notification is enough; the size is re-read.
                            let _ = resize_tx.try_send(());
                        }
                        SIGINT | SIGTERM => {
                            tracing::warn!(signal, "termination signal received, cleaning up");
                            best_effort_cleanup();
                            std::process::exit(128 + signal);
                        }
                        _ => {}
                    }
                }
            })?;
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

#[cfg(unix)]
impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

// ── Options ──────────────────────────────────────────────────────────────

/// How to open the control terminal.
#[derive(Debug, Clone)]
pub struct TtyOptions {
    /// Device path.
    pub path: PathBuf,
    /// Wait before a lone `ESC` becomes the Escape key.
    pub key_timeout: Duration,
    /// Ask the terminal to bracket pasted text.
    pub bracketed_paste: bool,
}

impl Default for TtyOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/dev/tty"),
            key_timeout: DEFAULT_KEY_TIMEOUT,
            bracketed_paste: true,
        }
    }
}

// ── Tty ──────────────────────────────────────────────────────────────────

/// The control terminal.
///
/// Output written through the [`Write`] impl goes to the device (or to the
/// injected writer in headless mode). Input is read with
/// [`poll_event`](Self::poll_event) and [`read_event`](Self::read_event).
pub struct Tty {
    // Field order is drop order: the writer is flushed in `Drop::drop`,
    // then the signal thread stops, then raw mode is restored last.
    reader: File,
    writer: Box<dyn Write + Send>,
    parser: InputParser,
    queue: VecDeque<Event>,
    width: u16,
    height: u16,
    key_timeout: Duration,
    pending_since: Option<Instant>,
    closed: bool,
    bracketed_paste: bool,
    resize_rx: Option<mpsc::Receiver<()>>,
    #[cfg(unix)]
    _signals: Option<SignalGuard>,
    #[cfg(unix)]
    raw_mode: Option<RawModeGuard>,
}

impl fmt::Debug for Tty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tty")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("queued", &self.queue.len())
            .field("closed", &self.closed)
            .field("live", &self.is_live())
            .finish_non_exhaustive()
    }
}

impl Tty {
    /// Open the device, enter raw mode, and enable bracketed paste.
    ///
    /// Failure here is fatal for an interactive session and is not retried.
    pub fn open(options: &TtyOptions) -> Result<Self, TtyError> {
        let file = open_device(&options.path)?;
        let writer = file.try_clone().map_err(TtyError::Configure)?;

        #[cfg(unix)]
        let raw_mode = RawModeGuard::enter(&file).map_err(TtyError::Configure)?;

        let (width, height) = query_size(&file);

        #[cfg(unix)]
        arm_emergency_restore(EmergencyRestore {
            original_termios: raw_mode.original_termios.clone(),
            tty: file.try_clone().map_err(TtyError::Configure)?,
            bracketed_paste: options.bracketed_paste,
        });

        #[cfg(unix)]
        let (signals, resize_rx) = {
            let (tx, rx) = mpsc::sync_channel(1);
            match SignalGuard::new(tx) {
                Ok(guard) => (Some(guard), Some(rx)),
                Err(err) => {
                    tracing::warn!(error = %err, "signal handling unavailable");
                    (None, None)
                }
            }
        };
        #[cfg(not(unix))]
        let resize_rx = None;

        let mut tty = Self {
            reader: file,
            writer: Box::new(writer),
            parser: InputParser::new(),
            queue: VecDeque::new(),
            width,
            height,
            key_timeout: options.key_timeout,
            pending_since: None,
            closed: false,
            bracketed_paste: false,
            resize_rx,
            #[cfg(unix)]
            _signals: signals,
            #[cfg(unix)]
            raw_mode: Some(raw_mode),
        };
        if options.bracketed_paste {
            tty.writer.write_all(BRACKETED_PASTE_ENABLE)?;
            tty.writer.flush()?;
            tty.bracketed_paste = true;
        }
        tracing::debug!(path = %options.path.display(), width, height, "terminal opened");
        Ok(tty)
    }

    /// A terminal without a device: input comes from `reader`, output goes
    /// to `writer`, and no terminal settings are touched.
    #[must_use]
    pub fn headless(reader: File, writer: Box<dyn Write + Send>, width: u16, height: u16) -> Self {
        Self {
            reader,
            writer,
            parser: InputParser::new(),
            queue: VecDeque::new(),
            width,
            height,
            key_timeout: DEFAULT_KEY_TIMEOUT,
            pending_since: None,
            closed: false,
            bracketed_paste: false,
            resize_rx: None,
            #[cfg(unix)]
            _signals: None,
            #[cfg(unix)]
            raw_mode: None,
        }
    }

    /// Replace the lone-`ESC` timeout.
    #[must_use]
    pub fn with_key_timeout(mut self, key_timeout: Duration) -> Self {
        self.key_timeout = key_timeout;
        self
    }

    /// Deliver resize notifications from `rx` instead of `SIGWINCH`.
    #[must_use]
    pub fn with_resize_channel(mut self, rx: mpsc::Receiver<()>) -> Self {
        self.resize_rx = Some(rx);
        self
    }

    /// Whether raw mode is active on a real device.
    #[must_use]
    pub fn is_live(&self) -> bool {
        #[cfg(unix)]
        {
            self.raw_mode.is_some()
        }
        #[cfg(not(unix))]
        {
            false
        }
    }

    /// Current size as `(columns, rows)`.
    #[must_use]
    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    /// Whether the input side reached end of file.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Wait up to `timeout` for an event.
    ///
    /// Returns `true` when [`read_event`](Self::read_event) has something.
    /// A lone `ESC` is held back until `key_timeout` passes without a
    /// continuation byte; a later call resolves it if `timeout` ends first.
    pub fn poll_event(&mut self, timeout: Duration) -> Result<bool, TtyError> {
        let deadline = Instant::now() + timeout;
        let mut polled = false;
        loop {
            self.check_resize();
            if !self.queue.is_empty() {
                return Ok(true);
            }
            if self.closed {
                return Ok(false);
            }
            let now = Instant::now();
            let mut wait = deadline.saturating_duration_since(now);
            if let Some(since) = self.pending_since {
                let fire = since + self.key_timeout;
                if now >= fire {
                    self.flush_pending();
                    continue;
                }
                wait = wait.min(fire - now);
            }
            if polled && now >= deadline {
                return Ok(false);
            }
            self.poll_tty(wait)?;
            polled = true;
        }
    }

    /// Next decoded event, if any.
    pub fn read_event(&mut self) -> Option<Event> {
        self.queue.pop_front()
    }

    /// Re-read the window size from the device.
    pub fn refresh_size(&mut self) {
        if self.is_live() {
            (self.width, self.height) = query_size(&self.reader);
        }
    }

    fn check_resize(&mut self) {
        let Some(rx) = self.resize_rx.as_ref() else {
            return;
        };
        if rx.try_recv().is_ok() {
            self.refresh_size();
            tracing::debug!(width = self.width, height = self.height, "terminal resized");
            self.queue.push_back(Event::Resize {
                width: self.width,
                height: self.height,
            });
        }
    }

    fn flush_pending(&mut self) {
        self.pending_since = None;
        if let Some(event) = self.parser.flush_pending() {
            self.queue.push_back(event);
        }
    }

    /// Read available bytes and feed them to the parser.
    fn drain_available_bytes(&mut self) -> io::Result<()> {
        let mut buf = [0u8; 1024];
        match self.reader.read(&mut buf) {
            Ok(0) => {
                tracing::debug!("terminal input closed");
                self.closed = true;
                self.flush_pending();
                Ok(())
            }
            Ok(n) => {
                let events = self.parser.parse(&buf[..n]);
                self.queue.extend(events);
                if self.parser.has_pending() {
                    self.pending_since.get_or_insert_with(Instant::now);
                } else {
                    self.pending_since = None;
                }
                Ok(())
            }
            Err(ref e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Wait for the device to become readable using `poll(2)`.
    #[cfg(unix)]
    fn poll_tty(&mut self, timeout: Duration) -> io::Result<bool> {
        use std::os::fd::AsFd;
        let ready = {
            let mut poll_fds = [nix::poll::PollFd::new(
                self.reader.as_fd(),
                nix::poll::PollFlags::POLLIN,
            )];
            let millis = timeout.as_micros().div_ceil(1000);
            let timeout_ms: u16 = millis.try_into().unwrap_or(u16::MAX);
            match nix::poll::poll(&mut poll_fds, nix::poll::PollTimeout::from(timeout_ms)) {
                Ok(n) => n,
                Err(nix::errno::Errno::EINTR) => return Ok(false),
                Err(e) => return Err(io::Error::other(e)),
            }
        };
        if ready > 0 {
            self.drain_available_bytes()?;
        }
        Ok(ready > 0)
    }

    #[cfg(not(unix))]
    fn poll_tty(&mut self, timeout: Duration) -> io::Result<bool> {
        std::thread::sleep(timeout);
        Ok(false)
    }
}

impl Write for Tty {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.writer.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl Drop for Tty {
    fn drop(&mut self) {
        if self.is_live() || self.bracketed_paste {
            let _ = write_cleanup_sequence(self.bracketed_paste, &mut self.writer);
            let _ = self.writer.flush();
            self.bracketed_paste = false;
        }
        #[cfg(unix)]
        if self.is_live() {
            disarm_emergency_restore();
        }
        // RawModeGuard::drop() runs after this, restoring the original termios.
    }
}

/// Write the sequence that undoes every mode [`Tty::open`] or a frame may
/// have turned on.
pub fn write_cleanup_sequence(bracketed_paste: bool, writer: &mut impl Write) -> io::Result<()> {
    if bracketed_paste {
        writer.write_all(BRACKETED_PASTE_DISABLE)?;
    }
    writer.write_all(AUTOWRAP_ENABLE)?;
    writer.write_all(CURSOR_SHOW)?;
    Ok(())
}

fn open_device(path: &Path) -> Result<File, TtyError> {
    std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|source| TtyError::Open {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(unix)]
fn query_size(file: &File) -> (u16, u16) {
    match rustix::termios::tcgetwinsize(file) {
        Ok(ws) if ws.ws_col > 0 && ws.ws_row > 0 => (ws.ws_col, ws.ws_row),
        _ => FALLBACK_SIZE,
    }
}

#[cfg(not(unix))]
fn query_size(_file: &File) -> (u16, u16) {
    FALLBACK_SIZE
}

// ── Tests ────────────────────────────────────────────────────────────────
