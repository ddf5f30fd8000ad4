//! Scripted input source for unit and integration testing.
//!
//! Allows tests to feed a fixed sequence of [`Sample`]s to the send loop
//! without a real terminal or stdin.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serial_relay_core::{ControlKey, InputState, KeySnapshot};

use super::{InputError, InputSource, Sample};

/// What a [`ScriptedInput`] does once its script is used up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhenExhausted {
    /// Report [`Sample::Terminate`], like a console reaching end of input.
    Terminate,
    /// Repeat the last scripted sample, like a key held down forever.
    RepeatLast,
    /// Never return, like an operator who stopped typing.
    Hang,
}

/// A mock [`InputSource`] replaying a scripted sequence of samples.
pub struct ScriptedInput {
    script: VecDeque<Sample>,
    last: Option<Sample>,
    when_exhausted: WhenExhausted,
    delay: Option<Duration>,
    taken: Arc<AtomicUsize>,
}

impl ScriptedInput {
    /// Creates a source that terminates after the given samples.
    pub fn new(script: impl IntoIterator<Item = Sample>) -> Self {
        Self {
            script: script.into_iter().collect(),
            last: None,
            when_exhausted: WhenExhausted::Terminate,
            delay: None,
            taken: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Creates a source yielding one console line per sample.
    pub fn lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(
            lines
                .into_iter()
                .map(|l| Sample::Input(InputState::Line(l.to_string()))),
        )
    }

    /// Creates a source yielding one key snapshot per sample.
    pub fn key_sets<'a>(sets: impl IntoIterator<Item = &'a [ControlKey]>) -> Self {
        Self::new(sets.into_iter().map(|keys| {
            Sample::Input(InputState::Keys(KeySnapshot::from_keys(keys.iter().copied())))
        }))
    }

    /// Sets the behaviour once the script is used up.
    pub fn then(mut self, when_exhausted: WhenExhausted) -> Self {
        self.when_exhausted = when_exhausted;
        self
    }

    /// Makes every sample take `delay` before returning.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns a counter of samples taken, readable after the source moved.
    pub fn taken_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.taken)
    }
}

#[async_trait]
impl InputSource for ScriptedInput {
    async fn sample(&mut self) -> Result<Sample, InputError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = match self.script.pop_front() {
            Some(sample) => sample,
            None => match (self.when_exhausted, self.last.clone()) {
                (WhenExhausted::RepeatLast, Some(last)) => last,
                (WhenExhausted::Hang, _) => std::future::pending().await,
                _ => Sample::Terminate,
            },
        };

        self.taken.fetch_add(1, Ordering::SeqCst);
        self.last = Some(next.clone());
        Ok(next)
    }
}
