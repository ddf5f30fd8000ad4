//! Application layer use cases.
//!
//! Everything here depends on traits (`PortHandle`, `InputSource`,
//! `OutputSink`, `PortOpener`) rather than concrete drivers, so the loops run
//! unchanged against real serial ports or the in-memory loopback used by the
//! tests.
//!
//! # Sub-modules
//!
//! - **`send_loop`**    – Samples input, encodes one token per cycle, writes
//!   it, paces itself, and decides when the relay terminates.
//!
//! - **`receive_loop`** – Polls the inbound port, decodes text, and hands it
//!   to the output sink until the run flag is cleared.
//!
//! - **`lifecycle`**    – Opens the ports, starts the receive thread before the
//!   send loop, and joins it before closing anything.

pub mod lifecycle;
pub mod receive_loop;
pub mod send_loop;

use thiserror::Error;

use serial_relay_core::PortError;

use crate::infrastructure::input::InputError;

/// Error type for a relay run.
#[derive(Debug, Error)]
pub enum RelayError {
    /// A port operation failed fatally.
    #[error(transparent)]
    Port(#[from] PortError),

    /// The input collaborator failed.
    #[error(transparent)]
    Input(#[from] InputError),

    /// The receive thread could not be started.
    #[error("failed to spawn receive thread: {0}")]
    SpawnFailed(#[source] std::io::Error),

    /// The receive thread panicked instead of returning.
    #[error("receive loop panicked")]
    ReceiverPanicked,
}
