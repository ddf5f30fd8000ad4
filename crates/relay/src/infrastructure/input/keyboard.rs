//! Key-state input from a raw-mode terminal.
//!
//! The terminal stands in for a window: while it has focus, the control keys
//! currently held down make up each cycle's [`KeySnapshot`].
//!
//! Terminals normally report only key presses (and auto-repeat), never
//! releases. When the terminal supports the keyboard enhancement protocol,
//! release events are requested and a key stays held until released.
//! Otherwise a key counts as held for a short window after its last press or
//! repeat event; the window has to outlast the OS auto-repeat delay or a held
//! key flickers off between the first press and the first repeat.
//!
//! A release that happens while another window has focus is never reported,
//! so losing focus releases every held key.

use std::collections::HashMap;
use std::io;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use crossterm::event::{
    self, DisableFocusChange, EnableFocusChange, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::{execute, terminal};
use serial_relay_core::{ControlKey, InputState, KeySnapshot};
use tracing::{debug, info, warn};

use super::{InputError, InputSource, Sample};

/// How long a key counts as held after its last press when the terminal
/// cannot report releases.
pub const DEFAULT_KEY_HOLD: Duration = Duration::from_millis(500);

/// Tracks which control keys are held, from a stream of terminal key events.
#[derive(Debug)]
pub struct KeyTracker {
    last_seen: HashMap<ControlKey, Instant>,
    hold: Duration,
    releases_reported: bool,
    close_requested: bool,
}

impl KeyTracker {
    /// Creates a tracker.
    ///
    /// With `releases_reported` set, keys are held until their release event
    /// and `hold` is unused.
    pub fn new(hold: Duration, releases_reported: bool) -> Self {
        Self {
            last_seen: HashMap::new(),
            hold,
            releases_reported,
            close_requested: false,
        }
    }

    /// Applies one key event observed at `now`.
    pub fn apply(&mut self, event: &KeyEvent, now: Instant) {
        if event.kind != KeyEventKind::Release && is_close_request(event) {
            self.close_requested = true;
            return;
        }

        let KeyCode::Char(c) = event.code else {
            return;
        };
        let Some(key) = ControlKey::from_char(c) else {
            return;
        };

        match event.kind {
            KeyEventKind::Press | KeyEventKind::Repeat => {
                self.last_seen.insert(key, now);
            }
            KeyEventKind::Release => {
                self.last_seen.remove(&key);
            }
        }
    }

    /// Forgets every held key.
    pub fn release_all(&mut self) {
        self.last_seen.clear();
    }

    /// Returns `true` once Esc or Ctrl-C has been pressed.
    pub fn close_requested(&self) -> bool {
        self.close_requested
    }

    /// Returns the keys held at `now`, expiring stale ones first.
    pub fn snapshot(&mut self, now: Instant) -> KeySnapshot {
        if !self.releases_reported {
            let hold = self.hold;
            self.last_seen
                .retain(|_, seen| now.saturating_duration_since(*seen) < hold);
        }
        KeySnapshot::from_keys(self.last_seen.keys().copied())
    }
}

fn is_close_request(event: &KeyEvent) -> bool {
    match event.code {
        KeyCode::Esc => true,
        KeyCode::Char('c') | KeyCode::Char('C') => event.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// An [`InputSource`] reading held keys from the controlling terminal.
///
/// Raw mode is enabled for the lifetime of the value and restored on drop.
pub struct TerminalKeyboard {
    tracker: KeyTracker,
    enhanced: bool,
}

impl TerminalKeyboard {
    /// Switches the terminal to raw mode and starts tracking keys.
    ///
    /// # Errors
    ///
    /// Returns [`InputError::Terminal`] if raw mode cannot be enabled, focus
    /// reporting cannot be turned on, or the enhancement flags cannot be
    /// pushed.
    pub fn open(hold: Duration) -> Result<Self, InputError> {
        terminal::enable_raw_mode().map_err(InputError::Terminal)?;
        let mut keyboard = Self {
            tracker: KeyTracker::new(hold, false),
            enhanced: false,
        };
        execute!(io::stdout(), EnableFocusChange).map_err(InputError::Terminal)?;

        if matches!(terminal::supports_keyboard_enhancement(), Ok(true)) {
            execute!(
                io::stdout(),
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )
            .map_err(InputError::Terminal)?;
            keyboard.enhanced = true;
            keyboard.tracker = KeyTracker::new(hold, true);
            info!("terminal reports key releases; keys are held until released");
        } else {
            info!(
                "terminal cannot report key releases; keys expire {} ms after the last repeat",
                hold.as_millis()
            );
        }

        Ok(keyboard)
    }
}

impl Drop for TerminalKeyboard {
    fn drop(&mut self) {
        if self.enhanced {
            if let Err(e) = execute!(io::stdout(), PopKeyboardEnhancementFlags) {
                warn!("failed to restore keyboard flags: {e}");
            }
        }
        if let Err(e) = execute!(io::stdout(), DisableFocusChange) {
            warn!("failed to turn off focus reporting: {e}");
        }
        if let Err(e) = terminal::disable_raw_mode() {
            warn!("failed to leave raw mode: {e}");
        }
    }
}

#[async_trait]
impl InputSource for TerminalKeyboard {
    async fn sample(&mut self) -> Result<Sample, InputError> {
        let now = Instant::now();
        while event::poll(Duration::ZERO).map_err(InputError::Terminal)? {
            match event::read().map_err(InputError::Terminal)? {
                Event::Key(key) => self.tracker.apply(&key, now),
                Event::FocusLost => {
                    debug!("terminal lost focus, releasing held keys");
                    self.tracker.release_all();
                }
                _ => {}
            }
        }

        if self.tracker.close_requested() {
            debug!("close requested from keyboard");
            return Ok(Sample::Terminate);
        }
        Ok(Sample::Input(InputState::Keys(self.tracker.snapshot(now))))
    }
}
