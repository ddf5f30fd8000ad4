//! Collecting output sink for tests.

use std::sync::{Arc, Mutex};

use serial_relay_core::DeviceReport;

use super::OutputSink;

/// A mock [`OutputSink`] that records everything surfaced to it.
///
/// Clones share the same buffers, so a test can keep one clone while the
/// receive thread owns another.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    texts: Arc<Mutex<Vec<String>>>,
    reports: Arc<Mutex<Vec<DeviceReport>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every emitted chunk in arrival order.
    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().expect("lock poisoned").clone()
    }

    /// Returns all emitted text joined together.
    pub fn joined(&self) -> String {
        self.texts().concat()
    }

    /// Returns every device report in arrival order.
    pub fn reports(&self) -> Vec<DeviceReport> {
        self.reports.lock().expect("lock poisoned").clone()
    }
}

impl OutputSink for CollectingSink {
    fn emit(&mut self, text: &str) {
        self.texts
            .lock()
            .expect("lock poisoned")
            .push(text.to_string());
    }

    fn report(&mut self, report: &DeviceReport) {
        self.reports
            .lock()
            .expect("lock poisoned")
            .push(report.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_sink_clones_share_buffers() {
        // Arrange
        let sink = CollectingSink::new();
        let mut writer = sink.clone();

        // Act
        writer.emit("PARADO\n");
        writer.report(&DeviceReport::Stopped);

        // Assert
        assert_eq!(sink.texts(), vec!["PARADO\n".to_string()]);
        assert_eq!(sink.reports(), vec![DeviceReport::Stopped]);
    }
}
