//! Outbound command tokens.
//!
//! Wire format: one ASCII byte per control cycle, no terminator.
//!
//! ```text
//! w  forward          a  rotate anticlockwise   s  reverse   d  rotate clockwise
//! 7  speed 70 %       8  speed 80 %             0  speed 100 %
//! e  report distance  q  stop (idle)
//! ```

use std::fmt;

/// Console input that stops the relay instead of being forwarded.
pub const EXIT_COMMAND: &str = "exit";

/// A single-byte instruction understood by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    Forward = b'w',
    TurnLeft = b'a',
    Back = b's',
    TurnRight = b'd',
    Speed70 = b'7',
    Speed80 = b'8',
    Speed100 = b'0',
    Distance = b'e',
    /// Motors off. Sent every cycle in which no control key is held, so the
    /// device always receives an explicit instruction.
    Stop = b'q',
}

impl Command {
    /// The idle token.
    pub const IDLE: Command = Command::Stop;

    /// Returns the byte written to the wire for this command.
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Parses a wire byte back into a command.
    ///
    /// Returns `None` for bytes outside the command alphabet.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'w' => Some(Command::Forward),
            b'a' => Some(Command::TurnLeft),
            b's' => Some(Command::Back),
            b'd' => Some(Command::TurnRight),
            b'7' => Some(Command::Speed70),
            b'8' => Some(Command::Speed80),
            b'0' => Some(Command::Speed100),
            b'e' => Some(Command::Distance),
            b'q' => Some(Command::Stop),
            _ => None,
        }
    }

    /// Returns `true` for every command except the idle token.
    pub fn is_action(self) -> bool {
        self != Self::IDLE
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_byte() as char)
    }
}

/// The encoder's output for one control cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandToken {
    /// A single command byte from the key-state variant.
    Key(Command),
    /// A console line forwarded verbatim.
    Text(String),
    /// Stop the relay. Never written to the wire.
    Exit,
}

impl CommandToken {
    /// Returns the bytes to write for this token, or `None` for [`CommandToken::Exit`].
    pub fn wire_bytes(&self) -> Option<Vec<u8>> {
        match self {
            CommandToken::Key(command) => Some(vec![command.as_byte()]),
            CommandToken::Text(text) => Some(text.as_bytes().to_vec()),
            CommandToken::Exit => None,
        }
    }

    /// Returns `true` if this token requests shutdown.
    pub fn is_exit(&self) -> bool {
        matches!(self, CommandToken::Exit)
    }
}
