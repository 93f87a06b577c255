//! Frame tracing.
//!
//! The driver hands every command payload and every raw response to a
//! [`DebugSink`] chosen at construction. [`NoopSink`] compiles away,
//! [`LogSink`] forwards to the `log` facade under the `pn532` target.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Command,
    Response,
}

pub trait DebugSink {
    fn frame(&self, direction: Direction, bytes: &[u8]);

    fn note(&self, args: fmt::Arguments<'_>);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl DebugSink for NoopSink {
    fn frame(&self, _direction: Direction, _bytes: &[u8]) {}

    fn note(&self, _args: fmt::Arguments<'_>) {}
}

#[derive(Debug, Clone, Copy)]
pub struct LogSink {
    level: log::Level,
}

impl LogSink {
    pub const fn new(level: log::Level) -> Self {
        Self { level }
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new(log::Level::Debug)
    }
}

impl DebugSink for LogSink {
    fn frame(&self, direction: Direction, bytes: &[u8]) {
        log::log!(target: "pn532", self.level, "{direction:?}: {bytes:02X?}");
    }

    fn note(&self, args: fmt::Arguments<'_>) {
        log::log!(target: "pn532", self.level, "{args}");
    }
}

impl<T: DebugSink + ?Sized> DebugSink for &T {
    fn frame(&self, direction: Direction, bytes: &[u8]) {
        (**self).frame(direction, bytes);
    }

    fn note(&self, args: fmt::Arguments<'_>) {
        (**self).note(args);
    }
}
