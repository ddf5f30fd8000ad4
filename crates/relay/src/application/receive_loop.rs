//! ReceiveLoop: surfaces what the device sends.
//!
//! Runs on its own OS thread because the driver's byte-count query and read
//! are blocking calls. Each iteration asks how many bytes are waiting, reads
//! them in bounded chunks, decodes each chunk as UTF-8 and hands the text to
//! the [`OutputSink`] unchanged. Between iterations it sleeps the polling
//! interval in short slices so a cleared [`RunState`] is noticed early.
//!
//! The loop owns its port while it runs and gives it back when the thread
//! finishes, so the coordinator cannot close the inbound handle while a read
//! may still be in progress.

use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serial_relay_core::{
    decode_inbound, DeviceReport, LineAssembler, PortError, PortHandle, RunState,
};
use tracing::{debug, error, info, trace, warn};

use crate::infrastructure::output::OutputSink;

/// Sleep between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Largest single read.
pub const DEFAULT_READ_CHUNK: usize = 256;

/// Granularity of the poll sleep.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Receive loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveSettings {
    pub poll_interval: Duration,
    pub max_chunk: usize,
}

impl Default for ReceiveSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_chunk: DEFAULT_READ_CHUNK,
        }
    }
}

/// What a finished receive loop did.
#[derive(Debug, Clone)]
pub struct ReceiveSummary {
    pub polls: u64,
    pub bytes_received: usize,
    pub decode_failures: u64,
    pub read_failures: u64,
    /// The fatal port error that ended the loop, if any.
    pub error: Option<PortError>,
    /// When the loop stopped touching its port.
    pub stopped_at: Instant,
}

impl ReceiveSummary {
    fn started() -> Self {
        Self {
            polls: 0,
            bytes_received: 0,
            decode_failures: 0,
            read_failures: 0,
            error: None,
            stopped_at: Instant::now(),
        }
    }
}

/// Returned from the receive thread: the port to close and the summary.
pub struct ReceiveOutcome {
    pub port: Box<dyn PortHandle>,
    pub summary: ReceiveSummary,
}

/// The inbound half of the relay.
pub struct ReceiveLoop {
    port: Box<dyn PortHandle>,
    sink: Box<dyn OutputSink>,
    run_state: RunState,
    settings: ReceiveSettings,
    lines: LineAssembler,
}

impl ReceiveLoop {
    pub fn new(
        port: Box<dyn PortHandle>,
        sink: Box<dyn OutputSink>,
        run_state: RunState,
        settings: ReceiveSettings,
    ) -> Self {
        Self {
            port,
            sink,
            run_state,
            settings,
            lines: LineAssembler::new(),
        }
    }

    /// Starts the loop on a thread named `relay-rx`.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be created. The loop and its
    /// port are dropped in that case.
    pub fn spawn(self) -> std::io::Result<JoinHandle<ReceiveOutcome>> {
        std::thread::Builder::new()
            .name("relay-rx".to_string())
            .spawn(move || self.run())
    }

    /// Polls until the run flag is cleared or the port fails fatally.
    ///
    /// A fatal error is kept in [`ReceiveSummary::error`].
    pub fn run(mut self) -> ReceiveOutcome {
        info!("receive loop started on {}", self.port.device());
        let mut summary = ReceiveSummary::started();

        while self.run_state.is_running() {
            summary.polls += 1;
            if let Err(e) = self.poll_once(&mut summary) {
                error!("{e}; stopping relay");
                self.run_state.stop();
                summary.error = Some(e);
                break;
            }
            self.pause();
        }

        summary.stopped_at = Instant::now();
        info!(
            "receive loop stopped after {} polls, {} bytes received",
            summary.polls, summary.bytes_received
        );
        ReceiveOutcome {
            port: self.port,
            summary,
        }
    }

    /// Reads everything that was waiting when the poll began.
    ///
    /// Only fatal port errors are returned; everything else is logged and
    /// counted.
    fn poll_once(&mut self, summary: &mut ReceiveSummary) -> Result<(), PortError> {
        let available = match self.port.bytes_available() {
            Ok(n) => n,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                summary.read_failures += 1;
                warn!("{e}");
                return Ok(());
            }
        };
        if available == 0 {
            trace!("nothing waiting on {}", self.port.device());
            return Ok(());
        }

        let mut remaining = available;
        while remaining > 0 {
            let chunk = match self.port.read(remaining.min(self.settings.max_chunk)) {
                Ok(chunk) => chunk,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    summary.read_failures += 1;
                    warn!("{e}");
                    return Ok(());
                }
            };
            if chunk.is_empty() {
                break;
            }
            remaining = remaining.saturating_sub(chunk.len());
            summary.bytes_received += chunk.len();
            self.surface(&chunk, summary);
        }
        Ok(())
    }

    fn surface(&mut self, chunk: &[u8], summary: &mut ReceiveSummary) {
        let text = match decode_inbound(chunk) {
            Ok(text) => text,
            Err(e) => {
                summary.decode_failures += 1;
                warn!("discarding {} inbound bytes: {e}", chunk.len());
                return;
            }
        };

        debug!("received {} bytes from {}", chunk.len(), self.port.device());
        self.sink.emit(&text);

        for line in self.lines.push(&text) {
            let report = DeviceReport::parse(&line);
            debug!("device report: {report}");
            self.sink.report(&report);
        }
    }

    fn pause(&self) {
        let deadline = Instant::now() + self.settings.poll_interval;
        while self.run_state.is_running() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}
