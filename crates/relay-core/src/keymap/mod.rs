//! Translation from operator input to command tokens.
//!
//! Key-state input is resolved against a fixed priority table: the first held
//! key in [`PRIORITY`] decides the command and every other held key is
//! ignored. Commands never combine, so holding forward and left together
//! drives forward.

use crate::domain::input::{ControlKey, InputState, KeySnapshot};
use crate::protocol::command::{Command, CommandToken, EXIT_COMMAND};

/// Control keys in priority order, each paired with the command it produces.
pub const PRIORITY: [(ControlKey, Command); 8] = [
    (ControlKey::Forward, Command::Forward),
    (ControlKey::Left, Command::TurnLeft),
    (ControlKey::Back, Command::Back),
    (ControlKey::Right, Command::TurnRight),
    (ControlKey::Speed70, Command::Speed70),
    (ControlKey::Speed80, Command::Speed80),
    (ControlKey::Speed100, Command::Speed100),
    (ControlKey::Distance, Command::Distance),
];

/// Stateless encoder applying the [`PRIORITY`] table.
pub struct CommandEncoder;

impl CommandEncoder {
    /// Returns the command for a key snapshot, or [`Command::IDLE`] if no
    /// bound key is held.
    pub fn command_for(snapshot: &KeySnapshot) -> Command {
        PRIORITY
            .iter()
            .find(|(key, _)| snapshot.is_pressed(*key))
            .map(|(_, command)| *command)
            .unwrap_or(Command::IDLE)
    }

    /// Returns the token for one console line.
    ///
    /// The line is forwarded as-is; only the exact text `exit` is intercepted.
    pub fn token_for_line(line: &str) -> CommandToken {
        if line == EXIT_COMMAND {
            CommandToken::Exit
        } else {
            CommandToken::Text(line.to_string())
        }
    }
}

/// Encodes one cycle's input into exactly one token.
pub fn encode(input: &InputState) -> CommandToken {
    match input {
        InputState::Keys(snapshot) => CommandToken::Key(CommandEncoder::command_for(snapshot)),
        InputState::Line(line) => CommandEncoder::token_for_line(line),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(keys: &[ControlKey]) -> InputState {
        InputState::Keys(KeySnapshot::from_keys(keys.iter().copied()))
    }

    #[test]
    fn test_priority_table_covers_every_control_key_once() {
        for key in ControlKey::ALL {
            let count = PRIORITY.iter().filter(|(k, _)| *k == key).count();
            assert_eq!(count, 1, "{key:?} must appear exactly once");
        }
    }

    #[test]
    fn test_priority_table_never_yields_idle() {
        assert!(PRIORITY.iter().all(|(_, c)| c.is_action()));
    }

    #[test]
    fn test_forward_and_left_yields_forward() {
        // Arrange
        let input = keys(&[ControlKey::Left, ControlKey::Forward]);

        // Act
        let token = encode(&input);

        // Assert
        assert_eq!(token, CommandToken::Key(Command::Forward));
    }

    #[test]
    fn test_right_beats_speed_keys() {
        let input = keys(&[ControlKey::Speed100, ControlKey::Right, ControlKey::Distance]);
        assert_eq!(encode(&input), CommandToken::Key(Command::TurnRight));
    }

    #[test]
    fn test_speed70_beats_speed80() {
        let input = keys(&[ControlKey::Speed80, ControlKey::Speed70]);
        assert_eq!(encode(&input), CommandToken::Key(Command::Speed70));
    }

    #[test]
    fn test_no_keys_yields_idle() {
        assert_eq!(
            encode(&InputState::Keys(KeySnapshot::EMPTY)),
            CommandToken::Key(Command::Stop)
        );
    }

    #[test]
    fn test_console_exit_is_intercepted() {
        assert_eq!(encode(&InputState::Line("exit".into())), CommandToken::Exit);
    }

    #[test]
    fn test_console_exit_match_is_exact() {
        assert_eq!(
            encode(&InputState::Line("exit now".into())),
            CommandToken::Text("exit now".into())
        );
        assert_eq!(
            encode(&InputState::Line("EXIT".into())),
            CommandToken::Text("EXIT".into())
        );
    }

    #[test]
    fn test_console_line_is_forwarded_verbatim() {
        assert_eq!(
            encode(&InputState::Line("w".into())),
            CommandToken::Text("w".into())
        );
    }
}
