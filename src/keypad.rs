use std::collections::HashMap;
use std::fmt;

/// number of positions on the COSMAC hex keypad
pub const KEYPAD_SIZE: usize = 16;

/// the canonical keymap: left-hand side of a qwerty keyboard standing in for
/// the 4x4 COSMAC keypad
///
///   1 2 3 4        1 2 3 C
///   q w e r   =>   4 5 6 D
///   a s d f        7 8 9 E
///   z x c v        A 0 B F
const CHIP8_CONVENTIONAL_KEYMAP: [(char, u8); KEYPAD_SIZE] = [
    ('1', 0x01),
    ('2', 0x02),
    ('3', 0x03),
    ('4', 0x0c),
    ('q', 0x04),
    ('w', 0x05),
    ('e', 0x06),
    ('r', 0x0d),
    ('a', 0x07),
    ('s', 0x08),
    ('d', 0x09),
    ('f', 0x0e),
    ('z', 0x0a),
    ('x', 0x00),
    ('c', 0x0b),
    ('v', 0x0f),
];

/// one of the 16 keypad positions, 0x0 to 0xf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogicalKey(u8);

impl LogicalKey {
    pub fn new(code: u8) -> Option<Self> {
        if (code as usize) < KEYPAD_SIZE {
            Some(LogicalKey(code))
        } else {
            None
        }
    }

    pub fn code(self) -> u8 {
        self.0
    }

    /// every key, in code order
    pub fn all() -> impl Iterator<Item = LogicalKey> {
        (0..KEYPAD_SIZE as u8).map(LogicalKey)
    }
}

impl fmt::Display for LogicalKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:X}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEdge {
    Pressed,
    Released,
}

/// a key going down or up, as reported by whatever is reading the keyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: char,
    pub edge: KeyEdge,
}

impl KeyEvent {
    pub fn pressed(key: char) -> Self {
        KeyEvent {
            key,
            edge: KeyEdge::Pressed,
        }
    }

    pub fn released(key: char) -> Self {
        KeyEvent {
            key,
            edge: KeyEdge::Released,
        }
    }
}

/// maps keyboard keys onto the keypad. anything outside the table (arrows,
/// modifiers, the rest of the alphabet) has no mapping and must be ignored
pub struct KeyMapper {
    keymap: HashMap<char, LogicalKey>,
}

impl KeyMapper {
    pub fn new() -> Self {
        KeyMapper {
            keymap: CHIP8_CONVENTIONAL_KEYMAP
                .iter()
                .map(|&(key, code)| (key, LogicalKey(code)))
                .collect(),
        }
    }

    /// letters are matched regardless of case
    pub fn map(&self, key: char) -> Option<LogicalKey> {
        // to_lowercase can expand to several chars; none of those are in the table
        let mut lower = key.to_lowercase();
        match (lower.next(), lower.next()) {
            (Some(k), None) => self.keymap.get(&k).copied(),
            _ => None,
        }
    }
}

impl Default for KeyMapper {
    fn default() -> Self {
        Self::new()
    }
}

/// level-triggered up/down state of the keypad. written by the input side,
/// read by the machine side
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct KeypadState {
    keys: [bool; KEYPAD_SIZE],
}

impl KeypadState {
    pub fn new() -> Self {
        Self::default()
    }

    /// returns true if the key was previously up
    pub fn set_pressed(&mut self, key: LogicalKey) -> bool {
        !std::mem::replace(&mut self.keys[key.0 as usize], true)
    }

    /// returns true if the key was previously down
    pub fn set_released(&mut self, key: LogicalKey) -> bool {
        std::mem::replace(&mut self.keys[key.0 as usize], false)
    }

    pub fn is_pressed(&self, key: LogicalKey) -> bool {
        self.keys[key.0 as usize]
    }

    /// applies an edge and reports whether the observable state changed
    pub fn apply(&mut self, key: LogicalKey, edge: KeyEdge) -> bool {
        match edge {
            KeyEdge::Pressed => self.set_pressed(key),
            KeyEdge::Released => self.set_released(key),
        }
    }

    #[cfg(test)]
    fn pressed(&self) -> impl Iterator<Item = LogicalKey> + '_ {
        LogicalKey::all().filter(move |k| self.is_pressed(*k))
    }
}
