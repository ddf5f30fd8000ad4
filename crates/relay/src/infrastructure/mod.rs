//! Infrastructure layer for serial-relay.
//!
//! Contains OS-facing adapters: the serial driver, console and terminal input,
//! console output, the device prompt, and configuration file storage.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `serial_relay_core`, but MUST NOT be imported by the `application` layer
//! except through the traits it implements.

pub mod input;
pub mod output;
pub mod prompt;
pub mod serial;
pub mod storage;
