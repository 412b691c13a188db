//! In-memory stand-ins for the serial port.

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use crate::log::FlightLog;

pub type Chunk = Result<Vec<u8>, io::ErrorKind>;

/// Reader fed chunk by chunk from a channel. Dropping the sender is EOF.
pub struct ScriptedReader {
    rx: Receiver<Chunk>,
    pending: Vec<u8>,
    pos: usize,
}

impl ScriptedReader {
    pub fn new() -> (Self, Sender<Chunk>) {
        let (tx, rx) = mpsc::channel();
        (Self { rx, pending: Vec::new(), pos: 0 }, tx)
    }
}

impl Read for ScriptedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.pending.len() {
            match self.rx.recv() {
                Ok(Ok(bytes)) => {
                    self.pending = bytes;
                    self.pos = 0;
                }
                Ok(Err(kind)) => return Err(kind.into()),
                Err(_) => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len() - self.pos);
        buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[derive(Debug, Default)]
pub struct Wire {
    pub bytes: Vec<u8>,
    pub writes: usize,
    pub flushes: usize,
}

/// Writer recording everything into a shared [`Wire`].
#[derive(Debug, Clone, Default)]
pub struct RecordingWriter {
    pub wire: Arc<Mutex<Wire>>,
    /// Accept at most this many bytes per write.
    pub accept: Option<usize>,
}

impl RecordingWriter {
    pub fn snapshot(&self) -> (Vec<u8>, usize, usize) {
        let w = self.wire.lock().unwrap();
        (w.bytes.clone(), w.writes, w.flushes)
    }
}

impl Write for RecordingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.accept.map_or(buf.len(), |a| a.min(buf.len()));
        let mut w = self.wire.lock().unwrap();
        w.bytes.extend_from_slice(&buf[..n]);
        w.writes += 1;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.wire.lock().unwrap().flushes += 1;
        Ok(())
    }
}

pub struct NullLog;

impl FlightLog for NullLog {
    fn debug(&self, _: fmt::Arguments<'_>) {}
    fn info(&self, _: fmt::Arguments<'_>) {}
    fn warn(&self, _: fmt::Arguments<'_>) {}
    fn error(&self, _: fmt::Arguments<'_>) {}
}

/// Keeps `(level, message)` pairs.
#[derive(Default)]
pub struct RecordingLog {
    pub lines: Mutex<Vec<(&'static str, String)>>,
}

impl RecordingLog {
    fn push(&self, level: &'static str, args: fmt::Arguments<'_>) {
        self.lines.lock().unwrap().push((level, args.to_string()));
    }

    pub fn contains(&self, level: &str, needle: &str) -> bool {
        self.lines.lock().unwrap().iter().any(|(l, m)| *l == level && m.contains(needle))
    }
}

impl FlightLog for RecordingLog {
    fn debug(&self, args: fmt::Arguments<'_>) { self.push("debug", args) }
    fn info(&self, args: fmt::Arguments<'_>) { self.push("info", args) }
    fn warn(&self, args: fmt::Arguments<'_>) { self.push("warn", args) }
    fn error(&self, args: fmt::Arguments<'_>) { self.push("error", args) }
}
