use std::io::{self, BufRead, BufReader, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use heli_proto::READY_SIGNAL;

use crate::log::FlightLog;

/// Longest line kept while waiting for READY; longer lines are skipped.
pub const MAX_LINE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Pending,
    Ready,
    Failed,
}

impl ConnectionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ConnectionStatus::Pending)
    }
}

/// Shared view of the handshake outcome.
///
/// Cloning is cheap; every clone observes the same status. Only the monitor
/// thread resolves it, and only once.
#[derive(Debug, Clone)]
pub struct Readiness {
    inner: Arc<(Mutex<ConnectionStatus>, Condvar)>,
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}

impl Readiness {
    pub fn new() -> Self {
        Self { inner: Arc::new((Mutex::new(ConnectionStatus::Pending), Condvar::new())) }
    }

    fn lock(&self) -> MutexGuard<'_, ConnectionStatus> {
        self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.lock()
    }

    /// Blocks until the status leaves `Pending`.
    pub fn wait(&self) -> ConnectionStatus {
        let cvar = &self.inner.1;
        let guard = cvar
            .wait_while(self.lock(), |s| !s.is_terminal())
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`, returning `None`.
    /// The status itself is left `Pending` on expiry.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<ConnectionStatus> {
        let cvar = &self.inner.1;
        let (guard, _) = cvar
            .wait_timeout_while(self.lock(), timeout, |s| !s.is_terminal())
            .unwrap_or_else(PoisonError::into_inner);
        guard.is_terminal().then_some(*guard)
    }

    /// First terminal value wins. Returns whether this call changed the status.
    pub(crate) fn resolve(&self, to: ConnectionStatus) -> bool {
        debug_assert!(to.is_terminal());
        let mut st = self.lock();
        if st.is_terminal() {
            return false;
        }
        *st = to;
        self.inner.1.notify_all();
        true
    }
}

/// Owned handle on a running monitor thread.
pub struct MonitorHandle {
    thread: JoinHandle<()>,
    done: Receiver<()>,
}

impl MonitorHandle {
    pub fn join(self) -> thread::Result<()> {
        self.thread.join()
    }

    /// Joins if the thread exits within `grace`. Returns `None` and detaches
    /// it when the reader is still blocked and cannot be interrupted.
    pub fn join_within(self, grace: Duration) -> Option<thread::Result<()>> {
        match self.done.recv_timeout(grace) {
            Err(RecvTimeoutError::Timeout) => None,
            _ => Some(self.thread.join()),
        }
    }
}

/// Background reader that waits for the bridge's ready line.
pub struct ReadinessMonitor<R> {
    reader: BufReader<R>,
    readiness: Readiness,
    shutdown: Arc<AtomicBool>,
    log: Arc<dyn FlightLog>,
}

impl<R: Read + Send + 'static> ReadinessMonitor<R> {
    pub fn new(
        reader: R,
        readiness: Readiness,
        shutdown: Arc<AtomicBool>,
        log: Arc<dyn FlightLog>,
    ) -> Self {
        Self { reader: BufReader::new(reader), readiness, shutdown, log }
    }

    pub fn spawn(self) -> io::Result<MonitorHandle> {
        let (done_tx, done) = mpsc::channel::<()>();
        let thread = thread::Builder::new().name("heli-ready".into()).spawn(move || {
            // dropped on exit or unwind
            let _done = done_tx;
            self.run()
        })?;
        Ok(MonitorHandle { thread, done })
    }

    fn run(mut self) {
        let started = Instant::now();
        let mut line = Vec::with_capacity(64);
        let mut skipping = false;

        loop {
            if self.shutdown.load(Ordering::Acquire) {
                self.log.debug(format_args!("monitor: shutdown before handshake"));
                self.fail();
                return;
            }

            let room = (MAX_LINE - line.len()) as u64;
            match (&mut self.reader).take(room).read_until(b'\n', &mut line) {
                Ok(0) => {
                    self.log.warn(format_args!("monitor: link closed"));
                    self.fail();
                    return;
                }
                Ok(_) if line.len() >= MAX_LINE && !line.ends_with(b"\n") => {
                    if !skipping {
                        self.log.debug(format_args!("monitor: skipping line over {} bytes", MAX_LINE));
                    }
                    skipping = true;
                    line.clear();
                }
                Ok(_) if skipping => {
                    // tail of an oversized line
                    skipping = false;
                    line.clear();
                }
                Ok(_) => {
                    // no trailing newline means EOF; a final READY still counts
                    let raw = std::mem::take(&mut line);
                    match String::from_utf8(raw) {
                        Ok(text) => {
                            let text = text.trim();
                            self.log.debug(format_args!("ACK: {}", text));
                            if text == READY_SIGNAL {
                                if self.readiness.resolve(ConnectionStatus::Ready) {
                                    self.log.debug(format_args!(
                                        "monitor: handshake after {:?}",
                                        started.elapsed()
                                    ));
                                }
                                return;
                            }
                        }
                        Err(e) => {
                            self.log.warn(format_args!("monitor: malformed line: {}", e));
                            self.fail();
                            return;
                        }
                    }
                }
                Err(e) if is_poll_tick(&e) => continue,
                Err(e) => {
                    self.log.warn(format_args!("error while working with the serial connection: {}", e));
                    self.fail();
                    return;
                }
            }
        }
    }

    fn fail(&self) {
        if !self.readiness.resolve(ConnectionStatus::Failed) {
            self.log.debug(format_args!(
                "monitor: status already {:?}, ignoring failure",
                self.readiness.status()
            ));
        }
    }
}

fn is_poll_tick(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}
