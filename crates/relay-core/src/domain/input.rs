//! Control keys and the input snapshot sampled once per control cycle.

/// A logical control key the operator can hold down.
///
/// The discriminant is the key's bit position inside a [`KeySnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ControlKey {
    /// Drive forward (`W`).
    Forward = 0,
    /// Rotate anticlockwise (`A`).
    Left = 1,
    /// Reverse (`S`).
    Back = 2,
    /// Rotate clockwise (`D`).
    Right = 3,
    /// Motor duty 70 % (`7`).
    Speed70 = 4,
    /// Motor duty 80 % (`8`).
    Speed80 = 5,
    /// Motor duty 100 % (`0`).
    Speed100 = 6,
    /// Ask the device for its last distance measurement (`E`).
    Distance = 7,
}

impl ControlKey {
    /// Every control key, in declaration order.
    pub const ALL: [ControlKey; 8] = [
        ControlKey::Forward,
        ControlKey::Left,
        ControlKey::Back,
        ControlKey::Right,
        ControlKey::Speed70,
        ControlKey::Speed80,
        ControlKey::Speed100,
        ControlKey::Distance,
    ];

    /// Maps a typed character to the control key bound to it.
    ///
    /// Letters are matched case-insensitively so Shift or Caps Lock does not
    /// change the binding. Returns `None` for unbound characters.
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'w' => Some(ControlKey::Forward),
            'a' => Some(ControlKey::Left),
            's' => Some(ControlKey::Back),
            'd' => Some(ControlKey::Right),
            '7' => Some(ControlKey::Speed70),
            '8' => Some(ControlKey::Speed80),
            '0' => Some(ControlKey::Speed100),
            'e' => Some(ControlKey::Distance),
            _ => None,
        }
    }

    fn bit(self) -> u16 {
        1 << (self as u8)
    }
}

/// The set of control keys asserted during one control cycle.
///
/// Order of assertion is not recorded; the encoder's priority table alone
/// decides which key wins when several are held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct KeySnapshot(u16);

impl KeySnapshot {
    /// A snapshot with no keys asserted.
    pub const EMPTY: KeySnapshot = KeySnapshot(0);

    /// Builds a snapshot from any collection of asserted keys.
    pub fn from_keys<I: IntoIterator<Item = ControlKey>>(keys: I) -> Self {
        let mut snapshot = Self::EMPTY;
        for key in keys {
            snapshot.press(key);
        }
        snapshot
    }

    /// Marks `key` as asserted.
    pub fn press(&mut self, key: ControlKey) {
        self.0 |= key.bit();
    }

    /// Marks `key` as released.
    pub fn release(&mut self, key: ControlKey) {
        self.0 &= !key.bit();
    }

    /// Returns `true` if `key` is asserted.
    pub fn is_pressed(&self, key: ControlKey) -> bool {
        self.0 & key.bit() != 0
    }

    /// Returns `true` if no key is asserted.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Iterates over asserted keys in declaration order.
    pub fn pressed(&self) -> impl Iterator<Item = ControlKey> + '_ {
        ControlKey::ALL.into_iter().filter(|k| self.is_pressed(*k))
    }
}

/// What the input collaborator produced for one control cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputState {
    /// Key-state variant: which control keys are held right now.
    Keys(KeySnapshot),
    /// Console variant: one line of typed text, without its line terminator.
    Line(String),
}

impl From<KeySnapshot> for InputState {
    fn from(snapshot: KeySnapshot) -> Self {
        InputState::Keys(snapshot)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_char_maps_all_bound_keys() {
        assert_eq!(ControlKey::from_char('w'), Some(ControlKey::Forward));
        assert_eq!(ControlKey::from_char('a'), Some(ControlKey::Left));
        assert_eq!(ControlKey::from_char('s'), Some(ControlKey::Back));
        assert_eq!(ControlKey::from_char('d'), Some(ControlKey::Right));
        assert_eq!(ControlKey::from_char('7'), Some(ControlKey::Speed70));
        assert_eq!(ControlKey::from_char('8'), Some(ControlKey::Speed80));
        assert_eq!(ControlKey::from_char('0'), Some(ControlKey::Speed100));
        assert_eq!(ControlKey::from_char('e'), Some(ControlKey::Distance));
    }

    #[test]
    fn test_from_char_ignores_case() {
        assert_eq!(ControlKey::from_char('W'), Some(ControlKey::Forward));
        assert_eq!(ControlKey::from_char('E'), Some(ControlKey::Distance));
    }

    #[test]
    fn test_from_char_returns_none_for_unbound() {
        assert_eq!(ControlKey::from_char('q'), None);
        assert_eq!(ControlKey::from_char('9'), None);
        assert_eq!(ControlKey::from_char(' '), None);
    }

    #[test]
    fn test_snapshot_press_and_release() {
        // Arrange
        let mut snapshot = KeySnapshot::EMPTY;

        // Act
        snapshot.press(ControlKey::Left);
        snapshot.press(ControlKey::Distance);
        snapshot.release(ControlKey::Left);

        // Assert
        assert!(!snapshot.is_pressed(ControlKey::Left));
        assert!(snapshot.is_pressed(ControlKey::Distance));
        assert!(!snapshot.is_empty());
    }

    #[test]
    fn test_snapshot_pressed_iterates_in_declaration_order() {
        let snapshot = KeySnapshot::from_keys([ControlKey::Speed100, ControlKey::Forward]);
        let keys: Vec<_> = snapshot.pressed().collect();
        assert_eq!(keys, vec![ControlKey::Forward, ControlKey::Speed100]);
    }

    #[test]
    fn test_empty_snapshot_is_default() {
        assert_eq!(KeySnapshot::default(), KeySnapshot::EMPTY);
        assert!(KeySnapshot::default().is_empty());
    }
}
