//! Output collaborators for the receive loop.
//!
//! Inbound text goes to stdout unchanged and in arrival order; diagnostics go
//! to stderr through `tracing`, so the two never interleave on one stream.
//!
//! # Testability
//!
//! The [`OutputSink`] trait lets tests capture surfaced text with
//! [`mock::CollectingSink`].

use std::io::{self, Write};

use serial_relay_core::DeviceReport;
use tracing::warn;

pub mod mock;

/// Where the receive loop surfaces what the device sends.
pub trait OutputSink: Send {
    /// Surfaces one decoded chunk exactly as received.
    fn emit(&mut self, text: &str);

    /// Notes a complete status line from the device. Ignored by default.
    fn report(&mut self, _report: &DeviceReport) {}
}

/// Prints inbound text to stdout verbatim.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn emit(&mut self, text: &str) {
        let mut out = io::stdout().lock();
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
            warn!("failed to write inbound text to stdout: {e}");
        }
    }
}

/// Prints inbound text to a terminal in raw mode.
///
/// Raw mode turns off output post-processing, so a bare `\n` would move down
/// without returning to column 0. Device reports are announced once each time
/// they change.
#[derive(Debug, Default)]
pub struct RawTerminalSink {
    last_report: Option<DeviceReport>,
}

impl RawTerminalSink {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Converts lone `\n` into `\r\n`, leaving existing `\r\n` pairs alone.
fn to_raw_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut prev = '\0';
    for c in text.chars() {
        if c == '\n' && prev != '\r' {
            out.push('\r');
        }
        out.push(c);
        prev = c;
    }
    out
}

impl OutputSink for RawTerminalSink {
    fn emit(&mut self, text: &str) {
        let mut out = io::stdout().lock();
        let converted = to_raw_newlines(text);
        if let Err(e) = out
            .write_all(converted.as_bytes())
            .and_then(|()| out.flush())
        {
            warn!("failed to write inbound text to terminal: {e}");
        }
    }

    fn report(&mut self, report: &DeviceReport) {
        if self.last_report.as_ref() == Some(report) {
            return;
        }
        self.last_report = Some(report.clone());

        let mut out = io::stdout().lock();
        if let Err(e) = write!(out, "[device] {report}\r\n").and_then(|()| out.flush()) {
            warn!("failed to write device status: {e}");
        }
    }
}

/// A writer that turns lone `\n` into `\r\n` on the way through.
///
/// Log lines go through it while the terminal is in raw mode.
#[derive(Debug)]
pub struct CrlfWriter<W> {
    inner: W,
    last: u8,
}

impl<W: Write> CrlfWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, last: 0 }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl CrlfWriter<io::Stderr> {
    /// A writer over stderr, for `tracing_subscriber`'s `with_writer`.
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write> Write for CrlfWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut converted = Vec::with_capacity(buf.len() + 8);
        for &b in buf {
            if b == b'\n' && self.last != b'\r' {
                converted.push(b'\r');
            }
            converted.push(b);
            self.last = b;
        }
        self.inner.write_all(&converted)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
