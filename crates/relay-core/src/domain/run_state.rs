use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// The single flag deciding whether the relay keeps running.
///
/// Cloning a `RunState` shares the underlying flag, so the send loop, the
/// receive loop, and a Ctrl-C handler can each hold one. The flag starts set
/// and can only be cleared; there is no way to restart a stopped run.
#[derive(Debug, Clone)]
pub struct RunState {
    running: Arc<AtomicBool>,
}

impl RunState {
    /// Creates a new run flag in the running state.
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Returns `true` until [`RunState::stop`] has been called on any clone.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Clears the flag.
    ///
    /// Returns `true` if this call performed the transition, `false` if the
    /// run was already stopped.
    pub fn stop(&self) -> bool {
        self.running.swap(false, Ordering::SeqCst)
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}
