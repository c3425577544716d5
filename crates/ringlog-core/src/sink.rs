//! Diagnostic side channel.
//!
//! Besides structured `tracing` events, a ring log can mirror human-readable
//! diagnostics (status reports, slot dumps, verbose traces) to any number of
//! registered sinks, typically a serial console on a device. Sinks never
//! influence control flow: write failures are swallowed.

use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Highest accepted verbosity level.
pub const MAX_DEBUG_LEVEL: u8 = 9;

/// Receiver of diagnostic lines.
pub trait DiagnosticSink: Send {
    /// Accept one line, without its terminator.
    fn write_line(&mut self, line: &str);

    /// Flush anything buffered. Defaults to a no-op.
    fn flush(&mut self) {}
}

/// Sink over any [`Write`] implementation (stderr, a serial port, a file).
pub struct WriterSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> DiagnosticSink for WriterSink<W> {
    fn write_line(&mut self, line: &str) {
        let _ = writeln!(self.writer, "{line}");
    }

    fn flush(&mut self) {
        let _ = self.writer.flush();
    }
}

/// Sink that collects lines in memory. Clones share the same buffer.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every line received so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("lock poisoned").clone()
    }

    pub fn clear(&self) {
        self.lines.lock().expect("lock poisoned").clear();
    }
}

impl DiagnosticSink for MemorySink {
    fn write_line(&mut self, line: &str) {
        self.lines
            .lock()
            .expect("lock poisoned")
            .push(line.to_string());
    }
}

/// Registered sinks plus the verbosity level that gates traces.
///
/// Level 0 disables traces; levels 1 through 9 enable progressively more
/// detail. Reports (status, dumps) are delivered regardless of level.
#[derive(Default)]
pub struct Diagnostics {
    level: u8,
    sinks: Vec<Box<dyn DiagnosticSink>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the verbosity. Values above [`MAX_DEBUG_LEVEL`] fall back to 1.
    pub fn set_level(&mut self, level: u8) {
        self.level = if level <= MAX_DEBUG_LEVEL { level } else { 1 };
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn add_sink(&mut self, sink: impl DiagnosticSink + 'static) {
        self.sinks.push(Box::new(sink));
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Returns `true` if a trace at `level` would reach the sinks.
    pub fn enabled(&self, level: u8) -> bool {
        self.level > 0 && level <= self.level && !self.sinks.is_empty()
    }

    /// Deliver a trace line built lazily, if `level` is enabled.
    pub fn trace(&mut self, level: u8, line: impl FnOnce() -> String) {
        if self.enabled(level) {
            let line = line();
            self.broadcast(&line);
        }
    }

    /// Deliver a line unconditionally.
    pub fn report(&mut self, line: &str) {
        self.broadcast(line);
    }

    pub fn flush(&mut self) {
        for sink in &mut self.sinks {
            sink.flush();
        }
    }

    fn broadcast(&mut self, line: &str) {
        for sink in &mut self.sinks {
            sink.write_line(line);
        }
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("level", &self.level)
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}
