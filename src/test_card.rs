//! A stand-in machine for exercising the driver without an emulator: it shows
//! the display test card, marches an inverted pixel across it once per cycle
//! (so the effective clock rate is visible) and lights a cell for every key
//! held down on the keypad.

use crate::display::Surface;
use crate::error::TransferError;
use crate::keypad::{LogicalKey, KEYPAD_SIZE};
use crate::machine::Machine;

/// programs load at 0x200 and may use the rest of a 4K machine
pub const PROGRAM_CAPACITY: usize = 0x1000 - 0x200;

const FRAME_BYTES: usize = 256;
const FRAME_PIXELS: u64 = FRAME_BYTES as u64 * 8;
const BYTES_PER_ROW: usize = 8;

/// first row of the key cells. keys 0-7 light row pair 20/21, 8-F 22/23
const KEY_ROW: usize = 20;

pub struct TestCardMachine {
    frame: [u8; FRAME_BYTES],
    keys: [bool; KEYPAD_SIZE],
    cycles: u64,
    program_len: usize,
    halt_after: Option<u64>,
}

impl TestCardMachine {
    pub fn new(halt_after: Option<u64>) -> Self {
        TestCardMachine {
            frame: CHIP8_TEST_CARD,
            keys: [false; KEYPAD_SIZE],
            cycles: 0,
            program_len: 0,
            halt_after,
        }
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// the frame as it would be drawn right now
    pub fn compose(&self) -> [u8; FRAME_BYTES] {
        let mut out = self.frame;
        for key in LogicalKey::all().filter(|k| self.keys[k.code() as usize]) {
            let code = key.code() as usize;
            let row = KEY_ROW + (code / BYTES_PER_ROW) * 2;
            let col = code % BYTES_PER_ROW;
            out[row * BYTES_PER_ROW + col] ^= 0xff;
            out[(row + 1) * BYTES_PER_ROW + col] ^= 0xff;
        }
        out
    }
}

impl Machine for TestCardMachine {
    fn initialize(&mut self) {
        *self = TestCardMachine::new(self.halt_after);
    }

    fn load_program(&mut self, program: Vec<u8>) -> Result<(), TransferError> {
        if program.len() > PROGRAM_CAPACITY {
            return Err(TransferError::new(format!(
                "program is {} bytes; only {} fit above 0x200",
                program.len(),
                PROGRAM_CAPACITY
            )));
        }
        self.program_len = program.len();
        Ok(())
    }

    fn execute_cycle(&mut self) -> bool {
        if let Some(limit) = self.halt_after {
            if self.cycles >= limit {
                log::error!("test card halting after {} cycles", limit);
                return false;
            }
        }
        let px = (self.cycles % FRAME_PIXELS) as usize;
        self.frame[px / 8] ^= 0x80 >> (px % 8);
        self.cycles += 1;
        true
    }

    fn set_key_down(&mut self, key: LogicalKey) {
        self.keys[key.code() as usize] = true;
    }

    fn set_key_up(&mut self, key: LogicalKey) {
        self.keys[key.code() as usize] = false;
    }

    fn render_frame(&mut self, surface: &mut dyn Surface) {
        if let Err(e) = surface.draw(&self.compose()) {
            log::error!("couldn't draw the test card: {}", e);
        }
    }

    fn refresh_diagnostics(&mut self) {
        let held: String = LogicalKey::all()
            .filter(|k| self.keys[k.code() as usize])
            .map(|k| k.to_string())
            .collect();
        log::debug!(
            "cycles: {}, program: {} bytes, keys down: [{}]",
            self.cycles,
            self.program_len,
            held
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::DummyDisplay;

    fn key(code: u8) -> LogicalKey {
        LogicalKey::new(code).unwrap()
    }

    #[test]
    fn test_initialize_shows_card() {
        let mut m = TestCardMachine::new(None);
        m.execute_cycle();
        m.set_key_down(key(0x3));
        m.initialize();
        assert_eq!(m.compose(), CHIP8_TEST_CARD);
        assert_eq!(m.cycles(), 0);
    }

    #[test]
    fn test_cycle_inverts_next_pixel() {
        let mut m = TestCardMachine::new(None);
        assert!(m.execute_cycle());
        assert!(m.execute_cycle());
        let f = m.compose();
        assert_eq!(f[0], CHIP8_TEST_CARD[0] ^ 0xc0);
        assert_eq!(f[1..], CHIP8_TEST_CARD[1..]);
    }

    #[test]
    fn test_full_sweep_restores_card() {
        let mut m = TestCardMachine::new(None);
        for _ in 0..FRAME_PIXELS * 2 {
            m.execute_cycle();
        }
        assert_eq!(m.compose(), CHIP8_TEST_CARD);
    }

    #[test]
    fn test_pressed_key_lights_cell() {
        let mut m = TestCardMachine::new(None);
        m.set_key_down(key(0xa));
        let f = m.compose();
        // key A: second row pair, column 2
        assert_eq!(f[22 * 8 + 2], CHIP8_TEST_CARD[22 * 8 + 2] ^ 0xff);
        assert_eq!(f[23 * 8 + 2], CHIP8_TEST_CARD[23 * 8 + 2] ^ 0xff);
        m.set_key_up(key(0xa));
        assert_eq!(m.compose(), CHIP8_TEST_CARD);
    }

    #[test]
    fn test_halts_after_limit() {
        let mut m = TestCardMachine::new(Some(3));
        assert!(m.execute_cycle());
        assert!(m.execute_cycle());
        assert!(m.execute_cycle());
        assert!(!m.execute_cycle());
        assert_eq!(m.cycles(), 3);
    }

    #[test]
    fn test_program_size_limit() {
        let mut m = TestCardMachine::new(None);
        assert!(m.load_program(vec![0; PROGRAM_CAPACITY]).is_ok());
        assert!(m.load_program(vec![0; PROGRAM_CAPACITY + 1]).is_err());
    }

    #[test]
    fn test_renders_to_surface() {
        let mut m = TestCardMachine::new(None);
        let mut d = DummyDisplay::new();
        m.render_frame(&mut d);
        assert_eq!(d.last_frame(), Some(&CHIP8_TEST_CARD[..]));
    }
}

/// this is a display test card suitable for CHIP8, for testing display routines
#[rustfmt::skip]
pub const CHIP8_TEST_CARD: [u8; 256] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, // 00 XXXXXXX|XXXXXXX|XXXXXXX|XXXXXXX|XXXXXXX|XXXXXXX|XXXXXXX|XXXXXXX|
    0x80, 0x00, 0x00, 0x01, 0x80, 0x00, 0x00, 0x01, // 01 X                              |X                              |
    0x80, 0x00, 0x00, 0x03, 0xc2, 0x41, 0x55, 0x55, // 02 X                             X|XX    X  X     | X X X | X X X |
    0x81, 0xff, 0xff, 0xc5, 0xa2, 0x40, 0xaa, 0xa9, // 03 X      |XXXXXXX|XXXXXXX|XX   X |X X   X  X      X X X X X X X  |
    0x80, 0x00, 0x00, 0x09, 0x92, 0x41, 0x55, 0x55, // 04 X                           X  |X  X  X  X     | X X X | X X X |
    0x81, 0xff, 0xff, 0xc1, 0x82, 0x40, 0xaa, 0xa9, // 05 X      |XXXXXXX|XXXXXXX|XX     |X     X  X      X X X X X X X  |
    0xa0, 0x00, 0x00, 0x01, 0x83, 0xc1, 0x55, 0x55, // 06 X X                            |X     X|XX     | X X X | X X X |
    0xa1, 0xff, 0xff, 0xc1, 0x80, 0x00, 0xaa, 0xa9, // 07 X X    |XXXXXXX|XXXXXXX|XX     |X               X X X X X X X  |
    0xa0, 0x00, 0x00, 0x00, 0x00, 0x01, 0x55, 0x55, // 08 X X                                            | X X X | X X X |
    0xa1, 0xff, 0xff, 0xc0, 0x00, 0x00, 0xaa, 0xa9, // 09 X X    |XXXXXXX|XXXXXXX|XX                      X X X X X X X  |
    0xbc, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, // 10 X XXXX                                                         |
    0x81, 0xff, 0xff, 0xc0, 0x00, 0x00, 0x00, 0x01, // 11 X      |XXXXXXX|XXXXXXX|XX                                     |
    0x88, 0x00, 0x00, 0x01, 0x80, 0x00, 0x00, 0x11, // 12 X   X                          |X                          X   |
    0x91, 0xff, 0xff, 0xc1, 0x80, 0x00, 0x00, 0x09, // 13 X  X   |XXXXXXX|XXXXXXX|XX     |X                           X  |
    0xa0, 0x00, 0x00, 0x01, 0x80, 0x00, 0x00, 0x05, // 14 X X                            |X                            X |
    0xff, 0x80, 0x00, 0x1f, 0xf8, 0x00, 0x01, 0xff, // 15 XXXXXXX|X                  XXXX|XXXXX                  |XXXXXXX|
    0xff, 0x80, 0x00, 0x1f, 0xf8, 0x00, 0x01, 0xff, // 16 XXXXXXX|X                  XXXX|XXXXX                  |XXXXXXX|
    0xa0, 0x00, 0x00, 0x01, 0x80, 0x00, 0x00, 0x05, // 17 X X                            |X                            X |
    0x90, 0x00, 0x00, 0x01, 0x85, 0x55, 0x55, 0x09, // 18 X  X                           |X    X | X X X | X X X |    X  |
    0x88, 0x00, 0x00, 0x01, 0x85, 0x55, 0x55, 0x11, // 19 X   X                          |X    X | X X X | X X X |   X   |
    0x80, 0x00, 0x00, 0x00, 0x05, 0x55, 0x55, 0x01, // 20 X                                    X | X X X | X X X |       |
    0x80, 0x00, 0x00, 0x00, 0x05, 0x55, 0x55, 0x3d, // 21 X                                    X | X X X | X X X |  XXXX |
    0x95, 0x55, 0x40, 0x00, 0x05, 0x55, 0x55, 0x25, // 22 X  X X | X X X | X                   X | X X X | X X X |  X  X |
    0xaa, 0xaa, 0x80, 0x00, 0x05, 0x55, 0x55, 0x3d, // 23 X X X X X X X X X                    X | X X X | X X X |  XXXX |
    0x95, 0x55, 0x40, 0x01, 0x85, 0x55, 0x55, 0x29, // 24 X  X X | X X X | X             |X    X | X X X | X X X |  X X  |
    0xaa, 0xaa, 0x83, 0xc1, 0x85, 0x55, 0x55, 0x25, // 25 X X X X X X X X X     X|XX     |X    X | X X X | X X X |  X  X |
    0x95, 0x55, 0x41, 0x41, 0x85, 0x55, 0x55, 0x01, // 26 X  X X | X X X | X     | X     |X    X | X X X | X X X |       |
    0xaa, 0xaa, 0x81, 0x49, 0x95, 0x55, 0x55, 0x01, // 27 X X X X X X X X X      | X  X  |X  X X | X X X | X X X |       |
    0x95, 0x55, 0x41, 0x45, 0xa5, 0x55, 0x55, 0x01, // 28 X  X X | X X X | X     | X   X |X X  X | X X X | X X X |       |
    0xaa, 0xaa, 0x83, 0xc3, 0xc5, 0x55, 0x55, 0x01, // 29 X X X X X X X X X     X|XX    X|XX   X | X X X | X X X |       |
    0x80, 0x00, 0x00, 0x01, 0x80, 0x00, 0x00, 0x01, // 30 X                              |X                              |
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, // 31 XXXXXXX|XXXXXXX|XXXXXXX|XXXXXXX|XXXXXXX|XXXXXXX|XXXXXXX|XXXXXXX|
]; //                                                  .. 0......78......f0......78......f0......78......f0......78......f
