//! Wire contract between the host and the S107 serial bridge.
//!
//! The bridge speaks two things: a one-off `READY` text line when it has
//! booted, and afterwards a stream of raw 4-byte control commands.

pub mod command;

pub use command::{ControlFrame, FRAME_LEN};

/// Line the bridge prints once it accepts commands.
pub const READY_SIGNAL: &str = "READY";

/// The bridge firmware is fixed at this rate.
pub const BAUD_RATE: u32 = 9600;

/// Pause after each command so the bridge can relay it over IR.
pub const SETTLE_DELAY_MS: u64 = 200;

pub const MAX_PITCH: u8 = 126;
pub const MAX_YAW: u8 = 126;
pub const MAX_TRIM: u8 = 126;
pub const MAX_THROTTLE: u8 = 127;

pub const DEF_PITCH: u8 = 63;
pub const DEF_YAW: u8 = 63;
pub const DEF_TRIM: u8 = 63;
pub const DEF_THROTTLE: u8 = 0;
