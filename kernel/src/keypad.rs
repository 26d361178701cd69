//! 4x4 membrane keypad behind a PCF8574 I2C expander
//!
//! Rows sit on P0..P3, columns on P4..P7. The expander's pins are
//! quasi-bidirectional: writing 1 leaves a pin weakly pulled up (an
//! input), writing 0 drives it low. A scan drives one row low at a time
//! and reads back which column followed it down.
//!
//! Only one key is reported per scan (first hit in row-major order);
//! the keypad is a passcode pad, not a chording keyboard.

use core::fmt;

use embedded_hal::i2c::I2c;

use crate::clock::Millis;

const DEBOUNCE_MS: u32 = 20;
const HOLD_MS: u32 = 1000;

pub const ROWS: usize = 4;
pub const COLS: usize = 4;

pub const DEFAULT_ADDRESS: u8 = 0x20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Digit(u8),
    A,
    B,
    C,
    D,
    Star,
    Hash,
}

pub const LAYOUT: [[Key; COLS]; ROWS] = [
    [Key::Digit(1), Key::Digit(2), Key::Digit(3), Key::A],
    [Key::Digit(4), Key::Digit(5), Key::Digit(6), Key::B],
    [Key::Digit(7), Key::Digit(8), Key::Digit(9), Key::C],
    [Key::Star, Key::Digit(0), Key::Hash, Key::D],
];

impl Key {
    pub const fn at(row: usize, col: usize) -> Option<Key> {
        if row < ROWS && col < COLS {
            Some(LAYOUT[row][col])
        } else {
            None
        }
    }

    pub const fn as_char(self) -> char {
        match self {
            Key::Digit(d) => (b'0' + d) as char,
            Key::A => 'A',
            Key::B => 'B',
            Key::C => 'C',
            Key::D => 'D',
            Key::Star => '*',
            Key::Hash => '#',
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeypadError {
    Bus,
}

impl fmt::Display for KeypadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeypadError::Bus => write!(f, "keypad expander not responding"),
        }
    }
}

/// Source of raw (undebounced) matrix hits.
pub trait KeyMatrix {
    fn scan(&mut self) -> Result<Option<(usize, usize)>, KeypadError>;
}

pub struct Pcf8574Keypad<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Pcf8574Keypad<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    fn write(&mut self, value: u8) -> Result<(), KeypadError> {
        self.i2c
            .write(self.address, &[value])
            .map_err(|_| KeypadError::Bus)
    }

    fn read(&mut self) -> Result<u8, KeypadError> {
        let mut buf = [0u8; 1];
        self.i2c
            .read(self.address, &mut buf)
            .map_err(|_| KeypadError::Bus)?;
        Ok(buf[0])
    }
}

impl<I2C: I2c> KeyMatrix for Pcf8574Keypad<I2C> {
    fn scan(&mut self) -> Result<Option<(usize, usize)>, KeypadError> {
        let mut hit = None;
        for row in 0..ROWS {
            self.write(!(1u8 << row))?;
            let cols = (!self.read()? >> 4) & 0x0F;
            if cols != 0 {
                hit = Some((row, cols.trailing_zeros() as usize));
                break;
            }
        }
        // release all rows so the idle bus state is all-high
        self.write(0xFF)?;
        Ok(hit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Pressed(Key),
    Released(Key),
    Held(Key),
}

pub struct Keypad<M> {
    matrix: M,
    stable: Option<Key>,
    candidate: Option<Key>,
    candidate_since: Millis,
    press_since: Millis,
    held_fired: bool,
    pending: Option<KeyEvent>,
    errors: u32,
}

impl<M: KeyMatrix> Keypad<M> {
    pub fn new(matrix: M) -> Self {
        Self {
            matrix,
            stable: None,
            candidate: None,
            candidate_since: Millis::ZERO,
            press_since: Millis::ZERO,
            held_fired: false,
            pending: None,
            errors: 0,
        }
    }

    pub fn poll(&mut self, now: Millis) -> Option<KeyEvent> {
        if let Some(ev) = self.pending.take() {
            return Some(ev);
        }

        let raw = match self.matrix.scan() {
            Ok(hit) => hit.and_then(|(r, c)| Key::at(r, c)),
            Err(e) => {
                // skip this scan; log the first failure of a run only
                if self.errors == 0 {
                    log::warn!("keypad: {}", e);
                }
                self.errors = self.errors.saturating_add(1);
                return None;
            }
        };
        if self.errors > 0 {
            log::info!("keypad: recovered after {} failed scans", self.errors);
            self.errors = 0;
        }

        if raw != self.candidate {
            self.candidate = raw;
            self.candidate_since = now;
        }

        let debounced = if now.since(self.candidate_since) >= DEBOUNCE_MS {
            self.candidate
        } else {
            self.stable
        };

        if debounced != self.stable {
            let old = self.stable;
            self.stable = debounced;
            if let Some(new) = debounced {
                self.press_since = now;
                self.held_fired = false;
                if let Some(old) = old {
                    self.pending = Some(KeyEvent::Pressed(new));
                    return Some(KeyEvent::Released(old));
                }
                return Some(KeyEvent::Pressed(new));
            }
            return old.map(KeyEvent::Released);
        }

        if let Some(key) = self.stable
            && !self.held_fired
            && now.since(self.press_since) >= HOLD_MS
        {
            self.held_fired = true;
            return Some(KeyEvent::Held(key));
        }

        None
    }

    /// True while a key is down or a change is still settling; the
    /// adaptive poller stays fast in that case.
    pub fn is_active(&self) -> bool {
        self.stable.is_some() || self.candidate != self.stable
    }

    pub fn matrix_mut(&mut self) -> &mut M {
        &mut self.matrix
    }
}
