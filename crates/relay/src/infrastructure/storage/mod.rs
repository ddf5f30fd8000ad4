//! Storage infrastructure: configuration file loading.
//!
//! The `config` sub-module reads the TOML configuration from the platform
//! config directory (or an explicit path), fills in defaults for anything the
//! file leaves out, and validates the result before the relay starts.

pub mod config;
