//! Protocol module: the outbound command alphabet and inbound text handling.
//!
//! The link carries no framing. Outbound, each control cycle writes one ASCII
//! byte (or, in the console variant, the typed line verbatim). Inbound is an
//! undelimited byte stream that the device happens to split into
//! newline-terminated status messages.

pub mod command;
pub mod inbound;
pub mod report;

pub use command::{Command, CommandToken, EXIT_COMMAND};
pub use inbound::{decode_inbound, DecodeError};
pub use report::{DeviceReport, LineAssembler};
