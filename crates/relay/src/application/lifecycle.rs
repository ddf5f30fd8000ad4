//! Relay lifecycle: open, start, stop, join, close.
//!
//! The coordinator owns the ordering guarantees of a run:
//!
//! 1. Ports are opened before anything else; a failure ends the run before
//!    any loop exists.
//! 2. The outbound handle must accept writes, checked before the receive
//!    thread starts.
//! 3. The receive loop is running before the send loop samples its first
//!    input.
//! 4. When the send loop returns, the run flag is cleared and the receive
//!    thread is joined. Only after the join are the handles closed.

use serial_relay_core::{PortError, PortHandle, RunState, SerialConfig};
use tracing::{error, info};

use super::receive_loop::{ReceiveLoop, ReceiveOutcome, ReceiveSettings, ReceiveSummary};
use super::send_loop::{SendLoop, SendSettings, SendSummary};
use super::RelayError;
use crate::infrastructure::input::InputSource;
use crate::infrastructure::output::OutputSink;

/// Opens serial devices.
///
/// The OS implementation lives in the serial infrastructure module; tests
/// substitute a mock.
#[cfg_attr(test, mockall::automock)]
pub trait PortOpener: Send + Sync {
    fn open(&self, config: &SerialConfig) -> Result<Box<dyn PortHandle>, PortError>;
}

/// The two ways the relay can be wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// One device, typed lines out, text in.
    Console,
    /// Two devices, held keys out, status reports in.
    Keys,
}

/// Which devices carry which direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkPlan {
    /// One device for both directions; the inbound side gets a cloned handle.
    Shared(SerialConfig),
    /// Separate devices per direction.
    Split {
        inbound: SerialConfig,
        outbound: SerialConfig,
    },
}

/// One open handle per direction.
pub struct RelayLinks {
    pub inbound: Box<dyn PortHandle>,
    pub outbound: Box<dyn PortHandle>,
}

/// Opens the handles described by `plan`.
///
/// Anything already opened is closed again if a later step fails.
///
/// # Errors
///
/// Returns the first [`PortError`] from the opener or from cloning.
pub fn open_links(opener: &dyn PortOpener, plan: &LinkPlan) -> Result<RelayLinks, PortError> {
    match plan {
        LinkPlan::Shared(config) => {
            let mut outbound = opener.open(config)?;
            match outbound.try_clone() {
                Ok(inbound) => Ok(RelayLinks { inbound, outbound }),
                Err(e) => {
                    outbound.close();
                    Err(e)
                }
            }
        }
        LinkPlan::Split { inbound, outbound } => {
            let mut inbound = opener.open(inbound)?;
            match opener.open(outbound) {
                Ok(outbound) => Ok(RelayLinks { inbound, outbound }),
                Err(e) => {
                    inbound.close();
                    Err(e)
                }
            }
        }
    }
}

/// Settings for both loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelaySettings {
    pub send: SendSettings,
    pub receive: ReceiveSettings,
}

/// Summaries of both loops after a run that ended without a fatal error.
#[derive(Debug, Clone)]
pub struct RelayReport {
    pub send: SendSummary,
    pub receive: ReceiveSummary,
}

/// Coordinates one run of the relay.
pub struct Relay {
    run_state: RunState,
    settings: RelaySettings,
}

impl Relay {
    pub fn new(run_state: RunState, settings: RelaySettings) -> Self {
        Self {
            run_state,
            settings,
        }
    }

    /// Runs both loops to completion and closes both handles.
    ///
    /// The run flag is cleared on every return path.
    ///
    /// # Errors
    ///
    /// - [`RelayError::Port`] with [`PortError::NotWritable`] if the outbound
    ///   handle refuses writes; no loop is started.
    /// - [`RelayError::SpawnFailed`] if the receive thread cannot start.
    /// - [`RelayError::ReceiverPanicked`] if the receive thread panicked.
    /// - Any error the send loop returned.
    /// - [`RelayError::Port`] with the fatal error that stopped the receive
    ///   loop, after both handles are closed.
    pub async fn run(
        &self,
        links: RelayLinks,
        sink: Box<dyn OutputSink>,
        input: &mut dyn InputSource,
    ) -> Result<RelayReport, RelayError> {
        let RelayLinks {
            mut inbound,
            mut outbound,
        } = links;

        if !outbound.is_writable() {
            let err = PortError::NotWritable {
                device: outbound.device().to_string(),
            };
            error!("{err}");
            self.run_state.stop();
            outbound.close();
            inbound.close();
            return Err(err.into());
        }

        let inbound_device = inbound.device().to_string();
        let receiver = ReceiveLoop::new(
            inbound,
            sink,
            self.run_state.clone(),
            self.settings.receive,
        );
        let handle = match receiver.spawn() {
            Ok(handle) => handle,
            Err(e) => {
                error!("failed to start receive loop: {e}");
                self.run_state.stop();
                outbound.close();
                return Err(RelayError::SpawnFailed(e));
            }
        };
        info!(
            "relay running: {} -> device, device -> {}",
            outbound.device(),
            inbound_device
        );

        let mut send = SendLoop::new(self.run_state.clone(), self.settings.send);
        let send_result = send.run(outbound.as_mut(), input).await;
        self.run_state.stop();

        let joined = tokio::task::spawn_blocking(move || handle.join()).await;
        outbound.close();

        let receive = match joined {
            Ok(Ok(ReceiveOutcome { mut port, summary })) => {
                port.close();
                summary
            }
            _ => {
                error!("receive loop panicked");
                return Err(RelayError::ReceiverPanicked);
            }
        };

        let send = send_result?;
        if let Some(e) = receive.error.clone() {
            error!("relay stopped by inbound failure after {} cycles", send.cycles);
            return Err(e.into());
        }
        info!(
            "relay stopped ({:?}): {} cycles, {} bytes sent, {} bytes received",
            send.stop_reason, send.cycles, send.bytes_written, receive.bytes_received
        );
        Ok(RelayReport { send, receive })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::application::send_loop::StopReason;
    use crate::infrastructure::input::mock::{ScriptedInput, WhenExhausted};
    use crate::infrastructure::output::mock::CollectingSink;
    use crate::infrastructure::serial::loopback::LoopbackPort;

    const READ_TIMEOUT: Duration = Duration::from_millis(20);

    fn fast_settings() -> RelaySettings {
        RelaySettings {
            send: SendSettings::console(),
            receive: ReceiveSettings {
                poll_interval: Duration::from_millis(20),
                max_chunk: 256,
            },
        }
    }

    fn unavailable(device: &str) -> PortError {
        PortError::PortUnavailable {
            device: device.to_string(),
            reason: "held by another process".to_string(),
        }
    }

    #[test]
    fn test_shared_plan_opens_once_and_clones() {
        // Arrange
        let mut opener = MockPortOpener::new();
        opener.expect_open().times(1).returning(|config| {
            let (host, _device) = LoopbackPort::pair(&config.device, "peer", READ_TIMEOUT);
            Ok(Box::new(host) as Box<dyn PortHandle>)
        });

        // Act
        let links = tokio_test::assert_ok!(open_links(
            &opener,
            &LinkPlan::Shared(SerialConfig::new("COM5"))
        ));

        // Assert
        assert_eq!(links.inbound.device(), "COM5");
        assert_eq!(links.outbound.device(), "COM5");
    }

    #[test]
    fn test_open_failure_is_port_unavailable() {
        let mut opener = MockPortOpener::new();
        opener
            .expect_open()
            .times(1)
            .returning(|config| Err(unavailable(&config.device)));

        let result = open_links(&opener, &LinkPlan::Shared(SerialConfig::new("COM5")));

        assert!(matches!(
            result.err(),
            Some(PortError::PortUnavailable { device, .. }) if device == "COM5"
        ));
    }

    #[test]
    fn test_split_plan_closes_inbound_when_outbound_fails() {
        // Arrange
        let (inbound, _peer) = LoopbackPort::pair("COM20", "peer", READ_TIMEOUT);
        let probe = inbound.close_probe();
        let mut opener = MockPortOpener::new();
        opener
            .expect_open()
            .withf(|config| config.device == "COM20")
            .times(1)
            .return_once(move |_| Ok(Box::new(inbound) as Box<dyn PortHandle>));
        opener
            .expect_open()
            .withf(|config| config.device == "COM21")
            .times(1)
            .returning(|config| Err(unavailable(&config.device)));
        let plan = LinkPlan::Split {
            inbound: SerialConfig::new("COM20"),
            outbound: SerialConfig::new("COM21"),
        };

        // Act
        let result = open_links(&opener, &plan);

        // Assert
        assert!(result.is_err());
        assert!(probe.is_closed());
    }

    #[tokio::test]
    async fn test_not_writable_outbound_refused_before_loops_start() {
        // Arrange
        let (outbound, _peer_out) = LoopbackPort::pair("COM21", "peer", READ_TIMEOUT);
        let outbound = outbound.read_only();
        let (inbound, _peer_in) = LoopbackPort::pair("COM20", "peer", READ_TIMEOUT);
        let out_probe = outbound.close_probe();
        let in_probe = inbound.close_probe();
        let links = RelayLinks {
            inbound: Box::new(inbound),
            outbound: Box::new(outbound),
        };
        let mut input = ScriptedInput::lines(["w"]);
        let taken = input.taken_counter();
        let run_state = RunState::new();
        let relay = Relay::new(run_state.clone(), fast_settings());

        // Act
        let result = relay
            .run(links, Box::new(CollectingSink::new()), &mut input)
            .await;

        // Assert
        let err = tokio_test::assert_err!(result);
        assert!(matches!(err, RelayError::Port(PortError::NotWritable { .. })));
        assert_eq!(taken.load(Ordering::SeqCst), 0);
        assert!(out_probe.is_closed());
        assert!(in_probe.is_closed());
        assert!(!run_state.is_running());
    }

    #[tokio::test]
    async fn test_clean_run_closes_both_handles_after_join() {
        // Arrange
        let (host, mut device) = LoopbackPort::pair("COM5", "device", READ_TIMEOUT);
        let out_probe = host.close_probe();
        let links = RelayLinks {
            inbound: host.try_clone().unwrap(),
            outbound: Box::new(host),
        };
        let mut input = ScriptedInput::lines(["w", "exit"]);
        let relay = Relay::new(RunState::new(), fast_settings());

        // Act
        let report = tokio_test::assert_ok!(
            relay
                .run(links, Box::new(CollectingSink::new()), &mut input)
                .await
        );

        // Assert
        assert_eq!(report.send.stop_reason, StopReason::ExitCommand);
        assert_eq!(device.read(8).unwrap(), b"w".to_vec());
        let closed_at = out_probe.closed_at().expect("outbound closed");
        assert!(closed_at >= report.receive.stopped_at);
    }

    #[tokio::test]
    async fn test_fatal_inbound_error_fails_the_run_after_close() {
        // Arrange
        let (inbound, _peer_in) = LoopbackPort::pair("COM20", "peer", READ_TIMEOUT);
        let inbound = inbound.fail_reads_with(unavailable("COM20"));
        let (outbound, _peer_out) = LoopbackPort::pair("COM21", "peer", READ_TIMEOUT);
        let in_probe = inbound.close_probe();
        let out_probe = outbound.close_probe();
        let links = RelayLinks {
            inbound: Box::new(inbound),
            outbound: Box::new(outbound),
        };
        let mut input = ScriptedInput::new([]).then(WhenExhausted::Hang);
        let run_state = RunState::new();
        let relay = Relay::new(run_state.clone(), fast_settings());

        // Act
        let result = tokio::time::timeout(
            Duration::from_secs(2),
            relay.run(links, Box::new(CollectingSink::new()), &mut input),
        )
        .await
        .expect("relay must stop on its own");

        // Assert
        let err = tokio_test::assert_err!(result);
        assert!(matches!(
            err,
            RelayError::Port(PortError::PortUnavailable { ref device, .. }) if device == "COM20"
        ));
        assert!(in_probe.is_closed());
        assert!(out_probe.is_closed());
        assert!(!run_state.is_running());
    }
}
