//! Domain entities for serial-relay.
//!
//! Pure types with no I/O: what the operator is asserting this cycle, and
//! whether the relay as a whole is still running.

/// Control keys and the per-cycle input snapshot.
pub mod input;

/// The shared run flag observed by both relay loops.
pub mod run_state;
