#![forbid(unsafe_code)]

//! Candidate input: splits a byte stream into records.
//!
//! Records end with the configured delimiter; a final record without one is
//! still a record. Bytes that are not valid UTF-8 are replaced with U+FFFD.
//! A `\r` before `\n` is part of the record.

use std::io::{self, BufRead, BufReader, Read};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use crate::config::Delimiter;

/// Records per batch sent to the session.
pub const BATCH_SIZE: usize = 4096;

/// Read every record from `input`.
pub fn read_all<R: Read>(input: R, delimiter: Delimiter) -> io::Result<Vec<String>> {
    let mut all = Vec::new();
    read_batches(BufReader::new(input), delimiter, |batch| {
        all.extend(batch);
        true
    })?;
    Ok(all)
}

/// Read `input` on a background thread named `sieve-reader`.
///
/// Batches arrive in input order; the channel closes at end of input. A
/// partial batch is sent whenever the reader is about to block, so a slow
/// producer's lines show up without waiting for a full batch.
pub fn spawn_reader<R>(
    input: R,
    delimiter: Delimiter,
) -> io::Result<(mpsc::Receiver<Vec<String>>, JoinHandle<()>)>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let handle = thread::Builder::new()
        .name("sieve-reader".into())
        .spawn(move || {
            let mut total = 0usize;
            let result = read_batches(BufReader::new(input), delimiter, |batch| {
                total += batch.len();
                tx.send(batch).is_ok()
            });
            match result {
                Ok(()) => tracing::debug!(records = total, "input finished"),
                Err(err) => tracing::warn!(records = total, error = %err, "input read failed"),
            }
        })?;
    Ok((rx, handle))
}

/// Feed batches to `sink` until end of input or until `sink` returns false.
fn read_batches<R, F>(mut input: BufReader<R>, delimiter: Delimiter, mut sink: F) -> io::Result<()>
where
    R: Read,
    F: FnMut(Vec<String>) -> bool,
{
    let byte = delimiter.byte();
    let mut buf = Vec::new();
    let mut batch = Vec::new();
    loop {
        buf.clear();
        let n = match input.read_until(byte, &mut buf) {
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                if !batch.is_empty() {
                    sink(batch);
                }
                return Err(err);
            }
        };
        if n == 0 {
            break;
        }
        if buf.last() == Some(&byte) {
            buf.pop();
        }
        batch.push(decode(&buf));
        // An empty buffer means the next read may block.
        if (batch.len() >= BATCH_SIZE || input.buffer().is_empty())
            && !sink(std::mem::take(&mut batch))
        {
            return Ok(());
        }
    }
    if !batch.is_empty() {
        sink(batch);
    }
    Ok(())
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
