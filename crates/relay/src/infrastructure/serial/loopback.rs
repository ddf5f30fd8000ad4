//! In-memory serial link for tests.
//!
//! [`LoopbackPort::pair`] returns two connected ends: bytes written on one
//! end become readable on the other. Reads honour the configured read
//! timeout, so loops driven over a loopback pair behave like they would over
//! a real null-modem cable, including the shutdown latency.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use serial_relay_core::{PortError, PortHandle};

/// One direction of the link.
#[derive(Debug, Default)]
struct Pipe {
    bytes: Mutex<VecDeque<u8>>,
    ready: Condvar,
}

impl Pipe {
    fn push(&self, data: &[u8]) {
        let mut bytes = self.bytes.lock().expect("lock poisoned");
        bytes.extend(data.iter().copied());
        self.ready.notify_all();
    }

    fn len(&self) -> usize {
        self.bytes.lock().expect("lock poisoned").len()
    }

    fn pop_within(&self, max_bytes: usize, timeout: Duration) -> Vec<u8> {
        let guard = self.bytes.lock().expect("lock poisoned");
        let (mut bytes, _) = self
            .ready
            .wait_timeout_while(guard, timeout, |b| b.is_empty())
            .expect("lock poisoned");
        let n = max_bytes.min(bytes.len());
        bytes.drain(..n).collect()
    }
}

/// Records when a handle was closed.
#[derive(Debug, Clone, Default)]
pub struct CloseProbe {
    closed_at: Arc<Mutex<Option<Instant>>>,
}

impl CloseProbe {
    /// Returns the instant of the first `close` call, if any.
    pub fn closed_at(&self) -> Option<Instant> {
        *self.closed_at.lock().expect("lock poisoned")
    }

    pub fn is_closed(&self) -> bool {
        self.closed_at().is_some()
    }

    fn mark(&self) {
        let mut closed_at = self.closed_at.lock().expect("lock poisoned");
        if closed_at.is_none() {
            *closed_at = Some(Instant::now());
        }
    }
}

/// A [`PortHandle`] over an in-memory pipe pair.
#[derive(Debug)]
pub struct LoopbackPort {
    device: String,
    incoming: Arc<Pipe>,
    outgoing: Arc<Pipe>,
    read_timeout: Duration,
    writable: bool,
    write_failure: Option<PortError>,
    read_failure: Option<PortError>,
    max_write: Option<usize>,
    closed: bool,
    probe: CloseProbe,
}

impl LoopbackPort {
    /// Creates two connected ends named `a` and `b`.
    pub fn pair(a: &str, b: &str, read_timeout: Duration) -> (LoopbackPort, LoopbackPort) {
        let a_to_b = Arc::new(Pipe::default());
        let b_to_a = Arc::new(Pipe::default());
        let end_a = LoopbackPort::end(a, Arc::clone(&b_to_a), Arc::clone(&a_to_b), read_timeout);
        let end_b = LoopbackPort::end(b, a_to_b, b_to_a, read_timeout);
        (end_a, end_b)
    }

    fn end(device: &str, incoming: Arc<Pipe>, outgoing: Arc<Pipe>, read_timeout: Duration) -> Self {
        Self {
            device: device.to_string(),
            incoming,
            outgoing,
            read_timeout,
            writable: true,
            write_failure: None,
            read_failure: None,
            max_write: None,
            closed: false,
            probe: CloseProbe::default(),
        }
    }

    /// Makes the driver refuse writes on this end.
    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    /// Makes every write on this end fail with `error`.
    pub fn fail_writes_with(mut self, error: PortError) -> Self {
        self.write_failure = Some(error);
        self
    }

    /// Makes every read and byte-count query on this end fail with `error`.
    pub fn fail_reads_with(mut self, error: PortError) -> Self {
        self.read_failure = Some(error);
        self
    }

    /// Accepts at most `limit` bytes per write.
    pub fn short_writes(mut self, limit: usize) -> Self {
        self.max_write = Some(limit);
        self
    }

    /// Returns a probe that observes when this handle is closed.
    pub fn close_probe(&self) -> CloseProbe {
        self.probe.clone()
    }

    fn ensure_open(&self) -> Result<(), PortError> {
        if self.closed {
            return Err(PortError::Closed {
                device: self.device.clone(),
            });
        }
        Ok(())
    }
}

impl PortHandle for LoopbackPort {
    fn device(&self) -> &str {
        &self.device
    }

    fn bytes_available(&mut self) -> Result<usize, PortError> {
        self.ensure_open()?;
        if let Some(e) = &self.read_failure {
            return Err(e.clone());
        }
        Ok(self.incoming.len())
    }

    fn read(&mut self, max_bytes: usize) -> Result<Vec<u8>, PortError> {
        self.ensure_open()?;
        if let Some(e) = &self.read_failure {
            return Err(e.clone());
        }
        Ok(self.incoming.pop_within(max_bytes, self.read_timeout))
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, PortError> {
        self.ensure_open()?;
        if !self.writable {
            return Err(PortError::NotWritable {
                device: self.device.clone(),
            });
        }
        if let Some(e) = &self.write_failure {
            return Err(e.clone());
        }
        let n = self.max_write.map_or(bytes.len(), |limit| limit.min(bytes.len()));
        self.outgoing.push(&bytes[..n]);
        Ok(n)
    }

    fn is_writable(&self) -> bool {
        !self.closed && self.writable
    }

    fn try_clone(&self) -> Result<Box<dyn PortHandle>, PortError> {
        self.ensure_open()?;
        Ok(Box::new(LoopbackPort {
            device: self.device.clone(),
            incoming: Arc::clone(&self.incoming),
            outgoing: Arc::clone(&self.outgoing),
            read_timeout: self.read_timeout,
            writable: self.writable,
            write_failure: self.write_failure.clone(),
            read_failure: self.read_failure.clone(),
            max_write: self.max_write,
            closed: false,
            probe: CloseProbe::default(),
        }))
    }

    fn close(&mut self) {
        self.closed = true;
        self.probe.mark();
    }
}
