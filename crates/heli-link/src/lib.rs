pub mod controller;
pub mod doctor;
pub mod error;
pub mod link;
pub mod log;
pub mod ready;
pub mod state;

#[cfg(test)]
mod testutil;

use std::time::Duration;

use serde::Deserialize;

pub use controller::{Controller, SendOutcome};
pub use error::{HeliError, Result};
pub use link::Link;
pub use log::{FlightLog, TracingLog};
pub use ready::{ConnectionStatus, Readiness, ReadinessMonitor};
pub use state::{Axis, FlightState};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinkConfig {
    /// Serial device of the bridge, e.g. /dev/ttyACM0. Never probed for.
    pub serial_dev: Option<String>,

    /// Defaults to the bridge firmware's 9600.
    pub baud: Option<u32>,

    /// Per-read timeout on the serial port; also how often the monitor
    /// checks for shutdown. Default 100ms.
    pub read_timeout_ms: Option<u64>,

    /// Optional upper bound on waiting for READY. Unset waits forever.
    pub ready_timeout_ms: Option<u64>,
}

impl LinkConfig {
    pub fn baud(&self) -> u32 {
        self.baud.unwrap_or(heli_proto::BAUD_RATE)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.unwrap_or(100))
    }

    pub fn ready_timeout(&self) -> Option<Duration> {
        self.ready_timeout_ms.map(Duration::from_millis)
    }
}
