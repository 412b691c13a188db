use std::io::{Read, Write};
use std::time::Duration;

use tokio_serial::{ClearBuffer, SerialPort};
use tracing::{debug, info};

use crate::error::{HeliError, Result};

pub type LinkReader = Box<dyn Read + Send>;
pub type LinkWriter = Box<dyn Write + Send>;

/// Duplex byte stream to the bridge, split into its two directions.
pub struct Link {
    reader: LinkReader,
    writer: LinkWriter,
}

impl Link {
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        Self { reader: Box::new(reader), writer: Box::new(writer) }
    }

    /// Opens `dev` in blocking mode. `read_timeout` bounds each read so the
    /// monitor thread can notice shutdown.
    pub fn open_serial(dev: &str, baud: u32, read_timeout: Duration) -> Result<Self> {
        if dev.trim().is_empty() {
            return Err(HeliError::Construction { reason: "serial device path is empty".into() });
        }

        let port = tokio_serial::new(dev, baud)
            .timeout(read_timeout)
            .open()
            .map_err(|source| HeliError::Open { dev: dev.to_string(), source })?;

        // drop whatever the bridge printed before we were listening
        port.clear(ClearBuffer::Input)
            .map_err(|source| HeliError::Open { dev: dev.to_string(), source })?;

        let reader = port
            .try_clone()
            .map_err(|source| HeliError::Open { dev: dev.to_string(), source })?;

        info!("link: opened {} @ {}", dev, baud);
        debug!("link: read timeout {:?}", read_timeout);
        Ok(Self { reader: Box::new(reader), writer: Box::new(port) })
    }

    pub fn split(self) -> (LinkReader, LinkWriter) {
        (self.reader, self.writer)
    }
}
