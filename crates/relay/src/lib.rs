//! serial-relay library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does serial-relay do?
//!
//! It connects an operator to a small serial-attached device in both
//! directions at once:
//!
//! 1. The **send loop** samples operator input once per control cycle,
//!    encodes it into one command token, and writes it to the outbound port.
//! 2. The **receive loop**, on its own thread, polls the inbound port and
//!    prints whatever text the device sends.
//! 3. The **lifecycle coordinator** starts the receive loop first, stops both
//!    loops through one shared run flag, and joins the receive thread before
//!    any port is closed.

/// Application layer: the two relay loops and their coordinator.
pub mod application;

/// Infrastructure layer: serial driver, input sources, output sinks, config.
pub mod infrastructure;
