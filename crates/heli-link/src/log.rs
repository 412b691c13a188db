use std::fmt;

use tracing::Span;

/// Logging capability handed to the controller and its monitor thread.
pub trait FlightLog: Send + Sync {
    fn debug(&self, args: fmt::Arguments<'_>);
    fn info(&self, args: fmt::Arguments<'_>);
    fn warn(&self, args: fmt::Arguments<'_>);
    fn error(&self, args: fmt::Arguments<'_>);
}

/// Forwards to `tracing`, inside a span naming the device.
#[derive(Debug, Clone)]
pub struct TracingLog {
    span: Span,
}

impl TracingLog {
    pub fn new(dev: &str) -> Self {
        Self { span: tracing::info_span!("heli", dev = %dev) }
    }
}

impl FlightLog for TracingLog {
    fn debug(&self, args: fmt::Arguments<'_>) {
        let _g = self.span.enter();
        tracing::debug!("{}", args);
    }

    fn info(&self, args: fmt::Arguments<'_>) {
        let _g = self.span.enter();
        tracing::info!("{}", args);
    }

    fn warn(&self, args: fmt::Arguments<'_>) {
        let _g = self.span.enter();
        tracing::warn!("{}", args);
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        let _g = self.span.enter();
        tracing::error!("{}", args);
    }
}
