//! # serial-relay-core
//!
//! Shared library for serial-relay containing the command encoder, the wire
//! token alphabet, inbound text decoding, and the serial port contract.
//!
//! This crate has no dependency on OS serial drivers, terminals, or async
//! runtimes. The `serial-relay` application crate supplies those.
//!
//! # Architecture overview
//!
//! serial-relay drives a small remote device (a two-motor rover with an
//! ultrasonic range finder) over a 9600 baud serial link. Each control cycle
//! the operator's input is reduced to exactly one single-byte command; the
//! device answers with newline-terminated status text once per second.
//!
//! - **`domain`** – Control keys, the per-cycle input snapshot, and the shared
//!   run flag both relay loops consult.
//!
//! - **`keymap`** – The fixed priority table that turns a key snapshot into a
//!   command, and the [`CommandEncoder`] that applies it.
//!
//! - **`protocol`** – The outbound command alphabet and the inbound side:
//!   UTF-8 decoding of raw chunks, line assembly, and device report parsing.
//!
//! - **`port`** – [`SerialConfig`] and the [`PortHandle`] trait every serial
//!   backend implements.

pub mod domain;
pub mod keymap;
pub mod port;
pub mod protocol;

pub use domain::input::{ControlKey, InputState, KeySnapshot};
pub use domain::run_state::RunState;
pub use keymap::{encode, CommandEncoder};
pub use port::{Parity, PortError, PortHandle, SerialConfig, StopBits};
pub use protocol::command::{Command, CommandToken, EXIT_COMMAND};
pub use protocol::inbound::{decode_inbound, DecodeError};
pub use protocol::report::{DeviceReport, LineAssembler};
