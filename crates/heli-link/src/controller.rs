use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use heli_proto::SETTLE_DELAY_MS;

use crate::error::{HeliError, Result};
use crate::link::{Link, LinkWriter};
use crate::log::{FlightLog, TracingLog};
use crate::ready::{ConnectionStatus, MonitorHandle, Readiness, ReadinessMonitor};
use crate::state::FlightState;
use crate::LinkConfig;

/// How long `close` waits for the monitor before detaching it.
const CLOSE_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Handshake failed (or timed out); nothing was written.
    NotReady,
}

/// Drives an S107 over the serial bridge.
///
/// Mutate the desired state, then [`send`](Self::send) it. Every send waits
/// for the bridge's handshake first.
pub struct Controller {
    state: FlightState,
    writer: Option<LinkWriter>,
    readiness: Readiness,
    ready_timeout: Option<Duration>,
    settle: Duration,
    shutdown: Arc<AtomicBool>,
    monitor: Option<MonitorHandle>,
    close_grace: Duration,
    announced: AtomicBool,
    log: Arc<dyn FlightLog>,
}

impl Controller {
    /// Takes ownership of an open link and starts listening for READY.
    pub fn new(link: Link, log: Arc<dyn FlightLog>) -> Result<Self> {
        let (reader, writer) = link.split();
        let readiness = Readiness::new();
        let shutdown = Arc::new(AtomicBool::new(false));

        let monitor = ReadinessMonitor::new(reader, readiness.clone(), shutdown.clone(), log.clone())
            .spawn()
            .map_err(|e| HeliError::Construction { reason: format!("spawn monitor thread: {}", e) })?;

        Ok(Self {
            state: FlightState::default(),
            writer: Some(writer),
            readiness,
            ready_timeout: None,
            settle: Duration::from_millis(SETTLE_DELAY_MS),
            shutdown,
            monitor: Some(monitor),
            close_grace: CLOSE_GRACE,
            announced: AtomicBool::new(false),
            log,
        })
    }

    /// Opens the configured serial device and builds a controller on it.
    pub fn open(cfg: &LinkConfig) -> Result<Self> {
        let dev = cfg
            .serial_dev
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| HeliError::Construction { reason: "link.serial_dev not set".into() })?;

        let link = Link::open_serial(dev, cfg.baud(), cfg.read_timeout())?;
        let mut ctl = Self::new(link, Arc::new(TracingLog::new(dev)))?;
        ctl.close_grace = (cfg.read_timeout() * 2).max(CLOSE_GRACE);
        Ok(ctl.with_ready_timeout(cfg.ready_timeout()))
    }

    /// Bounds how long [`is_ready`](Self::is_ready) waits for the handshake.
    pub fn with_ready_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness.clone()
    }

    pub fn state(&self) -> &FlightState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut FlightState {
        &mut self.state
    }

    pub fn set_pitch(&mut self, v: u8) -> Result<()> { self.state.set_pitch(v) }
    pub fn set_yaw(&mut self, v: u8) -> Result<()> { self.state.set_yaw(v) }
    pub fn set_trim(&mut self, v: u8) -> Result<()> { self.state.set_trim(v) }
    pub fn set_throttle(&mut self, v: u8) -> Result<()> { self.state.set_throttle(v) }

    /// Neutral sticks, no throttle. Does not transmit.
    pub fn reset(&mut self) {
        self.state = FlightState::default();
    }

    /// Blocks until the handshake resolves (or the ready timeout expires).
    pub fn is_ready(&self) -> bool {
        let status = match self.ready_timeout {
            None => self.readiness.wait(),
            Some(t) => match self.readiness.wait_timeout(t) {
                Some(s) => s,
                None => {
                    self.log.error(format_args!("no ready signal within {:?}", t));
                    return false;
                }
            },
        };

        match status {
            ConnectionStatus::Ready => {
                if !self.announced.swap(true, Ordering::Relaxed) {
                    self.log.info(format_args!("ready to go!"));
                }
                true
            }
            _ => {
                self.log.error(format_args!("connection failed"));
                false
            }
        }
    }

    /// Transmits the desired state, then holds for the settle delay.
    ///
    /// A link that never became ready is not an error: the call logs and
    /// returns [`SendOutcome::NotReady`]. Write failures are returned and
    /// must not be retried.
    pub fn send(&mut self) -> Result<SendOutcome> {
        if !self.is_ready() {
            self.log.error(format_args!("cannot send desired state: no connection available"));
            return Ok(SendOutcome::NotReady);
        }

        let frame = self.state.frame();
        let bytes = frame.to_bytes();
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| HeliError::Io(io::ErrorKind::NotConnected.into()))?;

        let written = writer.write(&bytes)?;
        if written != bytes.len() {
            return Err(HeliError::ShortWrite { written, expected: bytes.len() });
        }
        writer.flush()?;

        self.log.debug(format_args!("sent {}", frame));

        // no ack from the bridge; give it time to relay
        thread::sleep(self.settle);
        Ok(SendOutcome::Sent)
    }

    /// Back to neutral with the throttle cut, sent once.
    pub fn land(&mut self) -> Result<SendOutcome> {
        self.reset();
        self.send()
    }

    /// Closes the link and waits, bounded, for the monitor thread to exit.
    ///
    /// A reader without a read timeout can stay blocked past the grace
    /// period; the thread is then detached and exits with the reader.
    pub fn close(mut self) {
        self.release();
        if let Some(monitor) = self.monitor.take() {
            match monitor.join_within(self.close_grace) {
                Some(Ok(())) => {}
                Some(Err(_)) => self.log.warn(format_args!("monitor thread panicked")),
                None => self.log.warn(format_args!(
                    "monitor still blocked in read after {:?}, detaching",
                    self.close_grace
                )),
            }
        }
    }

    fn release(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        self.writer = None;
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::{self, Sender};
    use std::time::Instant;

    use super::*;
    use crate::testutil::{Chunk, NullLog, RecordingLog, RecordingWriter, ScriptedReader};

    fn controller(writer: RecordingWriter) -> (Controller, Sender<Chunk>) {
        let (reader, tx) = ScriptedReader::new();
        let ctl = Controller::new(Link::new(reader, writer), Arc::new(NullLog)).unwrap();
        (ctl, tx)
    }

    fn ready_controller() -> (Controller, RecordingWriter) {
        let writer = RecordingWriter::default();
        let (ctl, tx) = controller(writer.clone());
        tx.send(Ok(b"READY\n".to_vec())).unwrap();
        (ctl, writer)
    }

    #[test]
    fn send_writes_wire_order_then_settles() {
        let (mut ctl, writer) = ready_controller();
        ctl.set_yaw(10).unwrap();
        ctl.set_pitch(20).unwrap();
        ctl.set_throttle(30).unwrap();
        ctl.set_trim(40).unwrap();

        // handshake first so the timing covers the send path only
        assert!(ctl.is_ready());
        let t0 = Instant::now();
        assert_eq!(ctl.send().unwrap(), SendOutcome::Sent);
        assert!(t0.elapsed() >= Duration::from_millis(200));

        let (bytes, writes, flushes) = writer.snapshot();
        assert_eq!(bytes, vec![10, 20, 30, 40]);
        assert_eq!(writes, 1);
        assert_eq!(flushes, 1);
    }

    #[test]
    fn land_sends_neutral_idle() {
        let (mut ctl, writer) = ready_controller();
        ctl.set_throttle(90).unwrap();
        ctl.set_pitch(5).unwrap();
        assert_eq!(ctl.land().unwrap(), SendOutcome::Sent);
        assert_eq!(writer.snapshot().0, vec![63, 63, 0, 63]);
        assert_eq!(*ctl.state(), FlightState::default());
    }

    #[test]
    fn reset_restores_defaults_without_io() {
        let (mut ctl, writer) = ready_controller();
        ctl.state_mut().set_yaw(1).unwrap();
        ctl.set_trim(100).unwrap();
        ctl.reset();
        let s = ctl.state();
        assert_eq!((s.yaw(), s.pitch(), s.throttle(), s.trim()), (63, 63, 0, 63));
        assert!(writer.snapshot().0.is_empty());
    }

    #[test]
    fn ready_is_sticky_across_calls() {
        let (ctl, _) = ready_controller();
        for _ in 0..3 {
            assert!(ctl.is_ready());
        }
        assert_eq!(ctl.readiness().status(), ConnectionStatus::Ready);
    }

    #[test]
    fn closed_link_never_writes() {
        let writer = RecordingWriter::default();
        let (mut ctl, tx) = controller(writer.clone());
        drop(tx);
        assert!(!ctl.is_ready());
        assert!(!ctl.is_ready());
        ctl.set_throttle(50).unwrap();
        assert_eq!(ctl.send().unwrap(), SendOutcome::NotReady);
        assert_eq!(ctl.land().unwrap(), SendOutcome::NotReady);
        let (bytes, writes, flushes) = writer.snapshot();
        assert!(bytes.is_empty());
        assert_eq!((writes, flushes), (0, 0));
    }

    #[test]
    fn short_write_is_an_error() {
        let writer = RecordingWriter { accept: Some(3), ..Default::default() };
        let (mut ctl, tx) = controller(writer);
        tx.send(Ok(b"READY\n".to_vec())).unwrap();
        let err = ctl.send().unwrap_err();
        assert!(matches!(err, HeliError::ShortWrite { written: 3, expected: 4 }));
    }

    #[test]
    fn write_error_propagates() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::ErrorKind::BrokenPipe.into())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        let (reader, tx) = ScriptedReader::new();
        let mut ctl = Controller::new(Link::new(reader, Broken), Arc::new(NullLog)).unwrap();
        tx.send(Ok(b"READY\n".to_vec())).unwrap();
        assert!(matches!(ctl.send(), Err(HeliError::Io(_))));
    }

    #[test]
    fn racing_callers_agree() {
        let writer = RecordingWriter::default();
        let (ctl, tx) = controller(writer);
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let r = ctl.readiness();
                thread::spawn(move || r.wait())
            })
            .collect();
        thread::sleep(Duration::from_millis(20));
        tx.send(Ok(b"READY\n".to_vec())).unwrap();
        assert!(ctl.is_ready());
        for w in waiters {
            assert_eq!(w.join().unwrap(), ConnectionStatus::Ready);
        }
    }

    #[test]
    fn ready_timeout_reports_not_ready() {
        let writer = RecordingWriter::default();
        let (reader, _tx) = ScriptedReader::new();
        let log = Arc::new(RecordingLog::default());
        let mut ctl = Controller::new(Link::new(reader, writer.clone()), log.clone())
            .unwrap()
            .with_ready_timeout(Some(Duration::from_millis(30)));

        assert_eq!(ctl.send().unwrap(), SendOutcome::NotReady);
        assert_eq!(ctl.readiness().status(), ConnectionStatus::Pending);
        assert!(log.contains("error", "no ready signal"));
        assert!(writer.snapshot().0.is_empty());
    }

    #[test]
    fn logs_ready_once() {
        let (reader, tx) = ScriptedReader::new();
        let log = Arc::new(RecordingLog::default());
        let ctl = Controller::new(Link::new(reader, RecordingWriter::default()), log.clone()).unwrap();
        tx.send(Ok(b"READY\n".to_vec())).unwrap();
        assert!(ctl.is_ready());
        assert!(ctl.is_ready());
        let n = log.lines.lock().unwrap().iter().filter(|(_, m)| m.contains("ready to go")).count();
        assert_eq!(n, 1);
    }

    #[test]
    fn close_joins_monitor() {
        let writer = RecordingWriter::default();
        let (ctl, tx) = controller(writer);
        let readiness = ctl.readiness();
        // the monitor polls shutdown on each read timeout
        let ticker = thread::spawn(move || {
            while tx.send(Err(io::ErrorKind::TimedOut)).is_ok() {
                thread::sleep(Duration::from_millis(5));
            }
        });
        ctl.close();
        assert_eq!(readiness.status(), ConnectionStatus::Failed);
        ticker.join().unwrap();
    }

    #[test]
    fn close_does_not_hang_on_silent_reader() {
        let (reader, _tx) = ScriptedReader::new();
        let log = Arc::new(RecordingLog::default());
        let ctl = Controller::new(Link::new(reader, RecordingWriter::default()), log.clone()).unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        thread::spawn(move || {
            ctl.close();
            let _ = done_tx.send(());
        });
        assert!(done_rx.recv_timeout(Duration::from_secs(2)).is_ok());
        assert!(log.contains("warn", "detaching"));
    }

    #[test]
    fn open_without_device_is_construction_error() {
        assert!(matches!(
            Controller::open(&LinkConfig::default()),
            Err(HeliError::Construction { .. })
        ));

        let blank = LinkConfig { serial_dev: Some("   ".into()), ..Default::default() };
        assert!(matches!(Controller::open(&blank), Err(HeliError::Construction { .. })));
    }

    #[test]
    fn open_missing_device_is_open_error() {
        let cfg = LinkConfig {
            serial_dev: Some("/dev/heli-link-no-such-device".into()),
            ..Default::default()
        };
        match Controller::open(&cfg) {
            Err(HeliError::Open { dev, .. }) => assert_eq!(dev, "/dev/heli-link-no-such-device"),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("opened a device that does not exist"),
        }
    }
}
