use std::io;

use thiserror::Error;

use crate::state::Axis;

#[derive(Debug, Error)]
pub enum HeliError {
    #[error("no usable device stream: {reason}")]
    Construction { reason: String },

    #[error("open serial device {dev}")]
    Open {
        dev: String,
        #[source]
        source: tokio_serial::Error,
    },

    #[error("{axis} value {value} out of range 0..{max}")]
    OutOfRange { axis: Axis, value: u8, max: u8 },

    #[error("short write: {written} of {expected} bytes accepted")]
    ShortWrite { written: usize, expected: usize },

    #[error("link i/o")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, HeliError>;
