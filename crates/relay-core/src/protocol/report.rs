//! Typed view of the status messages the device sends.
//!
//! The device repeats its current status line roughly once per second and
//! switches to a new one after every command it executes:
//!
//! | Line              | Meaning                                   |
//! |-------------------|-------------------------------------------|
//! | `FRENTE`          | driving forward                           |
//! | `TRAS`            | reversing                                 |
//! | `ANTI-HORARIO`    | rotated anticlockwise                     |
//! | `HORARIO`         | rotated clockwise                         |
//! | `PARADO`          | motors off                                |
//! | `OBSTACULO`       | stopped itself, obstacle closer than 25cm |
//! | `Velocidade NN%`  | motor duty changed                        |
//! | `DDDcm`           | last distance measurement                 |
//!
//! The link has no framing, so lines can arrive split across reads.
//! [`LineAssembler`] stitches chunks back into whole lines.

use std::fmt;

use tracing::warn;

/// Longest partial line kept while waiting for its terminator.
pub const MAX_PENDING_LINE: usize = 256;

/// One parsed status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceReport {
    Forward,
    Back,
    TurnedLeft,
    TurnedRight,
    Stopped,
    Obstacle,
    /// Motor duty cycle in percent.
    Speed(u8),
    /// Distance to the nearest obstacle in centimetres.
    Distance(u16),
    /// Any line outside the known vocabulary, kept verbatim.
    Unrecognized(String),
}

impl DeviceReport {
    /// Parses one line; surrounding whitespace is ignored.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        match line {
            "FRENTE" => return DeviceReport::Forward,
            "TRAS" => return DeviceReport::Back,
            "ANTI-HORARIO" => return DeviceReport::TurnedLeft,
            "HORARIO" => return DeviceReport::TurnedRight,
            "PARADO" => return DeviceReport::Stopped,
            "OBSTACULO" => return DeviceReport::Obstacle,
            _ => {}
        }

        if let Some(percent) = line
            .strip_prefix("Velocidade ")
            .and_then(|rest| rest.strip_suffix('%'))
            .and_then(|digits| digits.parse::<u8>().ok())
        {
            return DeviceReport::Speed(percent);
        }

        if let Some(cm) = line
            .strip_suffix("cm")
            .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|digits| digits.parse::<u16>().ok())
        {
            return DeviceReport::Distance(cm);
        }

        DeviceReport::Unrecognized(line.to_string())
    }

    /// Returns `true` if the device stopped on its own because of an obstacle.
    pub fn is_obstacle(&self) -> bool {
        matches!(self, DeviceReport::Obstacle)
    }
}

impl fmt::Display for DeviceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceReport::Forward => write!(f, "moving forward"),
            DeviceReport::Back => write!(f, "reversing"),
            DeviceReport::TurnedLeft => write!(f, "turned anticlockwise"),
            DeviceReport::TurnedRight => write!(f, "turned clockwise"),
            DeviceReport::Stopped => write!(f, "stopped"),
            DeviceReport::Obstacle => write!(f, "obstacle ahead"),
            DeviceReport::Speed(p) => write!(f, "speed {p}%"),
            DeviceReport::Distance(cm) => write!(f, "distance {cm} cm"),
            DeviceReport::Unrecognized(text) => write!(f, "{text}"),
        }
    }
}

/// Reassembles newline-terminated lines from arbitrarily split text chunks.
#[derive(Debug, Default)]
pub struct LineAssembler {
    pending: String,
}

impl LineAssembler {
    /// Creates an empty assembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and returns every line it completed, without terminators.
    ///
    /// Blank lines are skipped. A partial line longer than
    /// [`MAX_PENDING_LINE`] is dropped.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        let mut lines = Vec::new();
        for c in chunk.chars() {
            if c == '\n' {
                let line = std::mem::take(&mut self.pending);
                let line = line.trim_end_matches('\r');
                if !line.trim().is_empty() {
                    lines.push(line.to_string());
                }
                continue;
            }
            self.pending.push(c);
            if self.pending.len() > MAX_PENDING_LINE {
                warn!(
                    "discarding {} bytes of inbound text without a line terminator",
                    self.pending.len()
                );
                self.pending.clear();
            }
        }
        lines
    }

    /// Returns the text received since the last complete line.
    pub fn pending(&self) -> &str {
        &self.pending
    }
}
