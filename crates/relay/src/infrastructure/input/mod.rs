//! Input collaborators for the send loop.
//!
//! Two production sources exist:
//!
//! - [`console::ConsoleInput`] yields one typed line per sample and blocks
//!   until the operator presses Enter.
//! - [`keyboard::TerminalKeyboard`] puts the terminal in raw mode and yields
//!   the set of currently held control keys without blocking.
//!
//! # Testability
//!
//! The [`InputSource`] trait lets tests drive the send loop with
//! [`mock::ScriptedInput`] instead of a real terminal.

use async_trait::async_trait;
use serial_relay_core::InputState;
use thiserror::Error;

pub mod console;
pub mod keyboard;
pub mod mock;

/// Error type for input sources.
#[derive(Debug, Error)]
pub enum InputError {
    /// Reading a console line failed.
    #[error("console input failed: {0}")]
    Console(#[source] std::io::Error),

    /// Configuring or polling the raw-mode terminal failed.
    #[error("terminal input failed: {0}")]
    Terminal(#[source] std::io::Error),
}

/// One result of sampling an input source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sample {
    /// The operator's input for this control cycle.
    Input(InputState),
    /// The operator asked to stop (window closed, Esc, end of input).
    Terminate,
}

/// Trait abstracting where control input comes from.
#[async_trait]
pub trait InputSource: Send {
    /// Produces the input for the next control cycle.
    ///
    /// May wait indefinitely (console) or return immediately (key state).
    async fn sample(&mut self) -> Result<Sample, InputError>;
}
