//! Line-oriented console input.
//!
//! Lines are read on a dedicated thread with ordinary blocking I/O and handed
//! to the async side over a channel. A blocking read on stdin cannot be
//! cancelled, so keeping it off the runtime lets the process exit while the
//! reader is still waiting for Enter.

use std::io::BufRead;

use async_trait::async_trait;
use serial_relay_core::InputState;
use tokio::sync::mpsc;
use tracing::debug;

use super::{InputError, InputSource, Sample};

/// Lines buffered between the reader thread and the send loop.
const LINE_CHANNEL_CAPACITY: usize = 16;

/// An [`InputSource`] yielding one typed line per sample.
pub struct ConsoleInput {
    rx: mpsc::Receiver<std::io::Result<String>>,
}

impl ConsoleInput {
    /// Starts reading lines from the process's standard input.
    ///
    /// # Errors
    ///
    /// Returns [`InputError::Console`] if the reader thread cannot be spawned.
    pub fn stdin() -> Result<Self, InputError> {
        Self::spawn_reader(|| std::io::stdin().lock())
    }

    /// Starts reading lines from an arbitrary buffered reader.
    ///
    /// # Errors
    ///
    /// Returns [`InputError::Console`] if the reader thread cannot be spawned.
    pub fn from_reader<R>(reader: R) -> Result<Self, InputError>
    where
        R: BufRead + Send + 'static,
    {
        Self::spawn_reader(move || reader)
    }

    fn spawn_reader<R, F>(make_reader: F) -> Result<Self, InputError>
    where
        R: BufRead,
        F: FnOnce() -> R + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);

        std::thread::Builder::new()
            .name("relay-console".to_string())
            .spawn(move || {
                for line in make_reader().lines() {
                    let failed = line.is_err();
                    if tx.blocking_send(line).is_err() || failed {
                        // Receiver dropped, or the error has been handed over.
                        break;
                    }
                }
                debug!("console reader finished");
            })
            .map_err(InputError::Console)?;

        Ok(Self { rx })
    }
}

#[async_trait]
impl InputSource for ConsoleInput {
    async fn sample(&mut self) -> Result<Sample, InputError> {
        match self.rx.recv().await {
            Some(Ok(line)) => Ok(Sample::Input(InputState::Line(line))),
            Some(Err(e)) => Err(InputError::Console(e)),
            None => {
                debug!("console input closed");
                Ok(Sample::Terminate)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn test_console_input_yields_lines_without_terminators() {
        // Arrange
        let mut input = ConsoleInput::from_reader(Cursor::new(b"w\r\n7\nexit\n".to_vec()))
            .expect("spawn reader");

        // Act / Assert
        assert_eq!(
            input.sample().await.unwrap(),
            Sample::Input(InputState::Line("w".into()))
        );
        assert_eq!(
            input.sample().await.unwrap(),
            Sample::Input(InputState::Line("7".into()))
        );
        assert_eq!(
            input.sample().await.unwrap(),
            Sample::Input(InputState::Line("exit".into()))
        );
    }

    #[tokio::test]
    async fn test_console_input_terminates_at_end_of_input() {
        let mut input =
            ConsoleInput::from_reader(Cursor::new(b"d".to_vec())).expect("spawn reader");

        assert_eq!(
            input.sample().await.unwrap(),
            Sample::Input(InputState::Line("d".into()))
        );
        assert_eq!(input.sample().await.unwrap(), Sample::Terminate);
        assert_eq!(input.sample().await.unwrap(), Sample::Terminate);
    }

    #[tokio::test]
    async fn test_console_input_keeps_empty_lines() {
        let mut input =
            ConsoleInput::from_reader(Cursor::new(b"\n".to_vec())).expect("spawn reader");
        assert_eq!(
            input.sample().await.unwrap(),
            Sample::Input(InputState::Line(String::new()))
        );
    }
}
