//! SendLoop: turns operator input into outbound command bytes.
//!
//! One control cycle is: sample the input collaborator, encode the sample
//! into a single [`CommandToken`], write its bytes to the outbound port, then
//! sleep for the pacing interval if there is one. The loop owns the decision
//! to terminate the relay: an `exit` line, a terminate request from the
//! input, or a fatal write error all clear the shared [`RunState`].
//!
//! Sampling may block indefinitely (a console waiting for Enter), so it is
//! raced against a watcher that notices when someone else clears the run
//! flag.

use std::time::Duration;

use serial_relay_core::{encode, CommandToken, PortHandle, RunState};
use tracing::{error, info, trace, warn};

use super::RelayError;
use crate::infrastructure::input::{InputSource, Sample};

/// Pacing of the key-state variant.
pub const DEFAULT_CYCLE_INTERVAL: Duration = Duration::from_millis(100);

/// How often a blocked sample or sleep checks the run flag.
pub const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(50);

/// Where the send loop is within its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    Idle,
    Sampling,
    Encoding,
    Writing,
    CycleSleep,
    Stopped,
}

/// Why the send loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The operator typed `exit`.
    ExitCommand,
    /// The input source asked to terminate (Esc, end of input).
    InputClosed,
    /// The run flag was cleared elsewhere.
    RunStateCleared,
}

/// What a completed send loop did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendSummary {
    pub cycles: u64,
    pub bytes_written: usize,
    pub write_failures: u64,
    pub stop_reason: StopReason,
}

/// Send loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendSettings {
    /// Sleep after each cycle. `None` means the input paces the loop.
    pub pacing: Option<Duration>,
}

impl SendSettings {
    /// Console variant: one cycle per typed line, no extra sleep.
    pub fn console() -> Self {
        Self { pacing: None }
    }

    /// Key-state variant: one cycle every `interval`.
    pub fn keys(interval: Duration) -> Self {
        Self {
            pacing: Some(interval),
        }
    }
}

impl Default for SendSettings {
    fn default() -> Self {
        Self::keys(DEFAULT_CYCLE_INTERVAL)
    }
}

/// Resolves once `run_state` has been cleared.
pub async fn wait_for_stop(run_state: &RunState) {
    while run_state.is_running() {
        tokio::time::sleep(STOP_CHECK_INTERVAL).await;
    }
}

/// The outbound half of the relay.
pub struct SendLoop {
    run_state: RunState,
    settings: SendSettings,
    state: SendState,
}

impl SendLoop {
    pub fn new(run_state: RunState, settings: SendSettings) -> Self {
        Self {
            run_state,
            settings,
            state: SendState::Idle,
        }
    }

    /// Returns the current cycle state.
    pub fn state(&self) -> SendState {
        self.state
    }

    fn enter(&mut self, next: SendState) {
        trace!("send loop {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Runs control cycles until the relay stops.
    ///
    /// The run flag is always cleared on return.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Port`] on a fatal write error and
    /// [`RelayError::Input`] if the input source fails.
    pub async fn run(
        &mut self,
        port: &mut dyn PortHandle,
        input: &mut dyn InputSource,
    ) -> Result<SendSummary, RelayError> {
        let result = self.cycle_until_stopped(port, input).await;
        self.run_state.stop();
        self.enter(SendState::Stopped);
        result
    }

    async fn cycle_until_stopped(
        &mut self,
        port: &mut dyn PortHandle,
        input: &mut dyn InputSource,
    ) -> Result<SendSummary, RelayError> {
        let mut cycles = 0u64;
        let mut bytes_written = 0usize;
        let mut write_failures = 0u64;

        let stop_reason = loop {
            if !self.run_state.is_running() {
                break StopReason::RunStateCleared;
            }

            self.enter(SendState::Sampling);
            let sampled = tokio::select! {
                sample = input.sample() => Some(sample),
                () = wait_for_stop(&self.run_state) => None,
            };
            let Some(sample) = sampled else {
                break StopReason::RunStateCleared;
            };

            let state = match sample {
                Ok(Sample::Input(state)) => state,
                Ok(Sample::Terminate) => {
                    info!("input closed, stopping relay");
                    break StopReason::InputClosed;
                }
                Err(e) => {
                    error!("input failed: {e}");
                    return Err(e.into());
                }
            };

            self.enter(SendState::Encoding);
            let token = encode(&state);
            let Some(bytes) = token.wire_bytes() else {
                info!("exit requested, stopping relay");
                break StopReason::ExitCommand;
            };

            if !bytes.is_empty() {
                self.enter(SendState::Writing);
                match port.write(&bytes) {
                    Ok(n) if n == bytes.len() => {
                        bytes_written += n;
                        if let CommandToken::Key(command) = token {
                            trace!("sent {command}");
                        }
                    }
                    Ok(n) => {
                        bytes_written += n;
                        write_failures += 1;
                        warn!(
                            "short write to {}: {n} of {} bytes accepted",
                            port.device(),
                            bytes.len()
                        );
                    }
                    Err(e) if e.is_fatal() => {
                        error!("{e}");
                        return Err(e.into());
                    }
                    Err(e) => {
                        write_failures += 1;
                        warn!("{e}");
                    }
                }
            }
            cycles += 1;

            if let Some(pacing) = self.settings.pacing {
                self.enter(SendState::CycleSleep);
                tokio::select! {
                    () = tokio::time::sleep(pacing) => {}
                    () = wait_for_stop(&self.run_state) => {}
                }
            }
        };

        Ok(SendSummary {
            cycles,
            bytes_written,
            write_failures,
            stop_reason,
        })
    }
}
