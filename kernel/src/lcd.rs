// HD44780 16x2 character LCD behind a PCF8574 I2C backpack
//
// Backpack wiring (the common blue "LCM1602 IIC" board):
//   P0 RS   P1 RW   P2 EN   P3 backlight   P4..P7 D4..D7
// The controller runs in 4-bit mode; every byte goes out as two nibbles,
// each latched by an EN high->low edge. I2C at 100kHz is slow enough
// that the enable pulse and the ~40us command time need no extra delay;
// only clear/home (1.5ms) and the power-on sequence do.

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

pub const DEFAULT_ADDRESS: u8 = 0x27;
pub const COLS: usize = 16;
pub const ROWS: usize = 2;

const RS: u8 = 1 << 0;
const EN: u8 = 1 << 2;
const BACKLIGHT: u8 = 1 << 3;

#[allow(dead_code)]
mod cmd {
    pub const CLEAR: u8 = 0x01;
    pub const HOME: u8 = 0x02;
    pub const ENTRY_MODE_INC: u8 = 0x06;
    pub const DISPLAY_ON: u8 = 0x0C;
    pub const DISPLAY_OFF: u8 = 0x08;
    pub const FUNCTION_4BIT_2LINE: u8 = 0x28;
    pub const SET_DDRAM: u8 = 0x80;
}

const ROW_OFFSETS: [u8; ROWS] = [0x00, 0x40];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LcdError {
    Bus,
}

impl fmt::Display for LcdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LcdError::Bus => write!(f, "lcd backpack not responding"),
        }
    }
}

pub struct Lcd<I2C> {
    i2c: I2C,
    address: u8,
    backlight: bool,
}

impl<I2C: I2c> Lcd<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self {
            i2c,
            address,
            backlight: true,
        }
    }

    /// Power-on reset into 4-bit mode, display on, cursor off, cleared.
    pub fn init(&mut self, delay: &mut impl DelayNs) -> Result<(), LcdError> {
        delay.delay_ms(50);
        self.expander(0)?;

        // "initialization by instruction": 0x3 three times, then 0x2
        self.nibble(0x30, 0)?;
        delay.delay_us(4500);
        self.nibble(0x30, 0)?;
        delay.delay_us(4500);
        self.nibble(0x30, 0)?;
        delay.delay_us(150);
        self.nibble(0x20, 0)?;

        self.command(cmd::FUNCTION_4BIT_2LINE)?;
        self.command(cmd::DISPLAY_ON)?;
        self.command(cmd::ENTRY_MODE_INC)?;
        self.clear(delay)?;
        log::info!("lcd: ready at {:#04x}", self.address);
        Ok(())
    }

    pub fn clear(&mut self, delay: &mut impl DelayNs) -> Result<(), LcdError> {
        self.command(cmd::CLEAR)?;
        delay.delay_ms(2);
        Ok(())
    }

    pub fn set_cursor(&mut self, col: u8, row: u8) -> Result<(), LcdError> {
        let row = (row as usize).min(ROWS - 1);
        let col = col.min(COLS as u8 - 1);
        self.command(cmd::SET_DDRAM | (ROW_OFFSETS[row] + col))
    }

    /// Writes at the cursor. Chars outside the controller's ASCII range
    /// print as '?'.
    pub fn write_str(&mut self, text: &str) -> Result<(), LcdError> {
        for c in text.chars() {
            let byte = if c.is_ascii() && !c.is_ascii_control() {
                c as u8
            } else {
                b'?'
            };
            self.data(byte)?;
        }
        Ok(())
    }

    /// Overwrite a whole row, padding with spaces so stale text vanishes.
    pub fn write_line(&mut self, row: u8, text: &str) -> Result<(), LcdError> {
        self.set_cursor(0, row)?;
        let mut written = 0;
        for c in text.chars().take(COLS) {
            let mut buf = [0u8; 4];
            self.write_str(c.encode_utf8(&mut buf))?;
            written += 1;
        }
        for _ in written..COLS {
            self.data(b' ')?;
        }
        Ok(())
    }

    pub fn backlight(&mut self, on: bool) -> Result<(), LcdError> {
        self.backlight = on;
        self.expander(0)
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    fn command(&mut self, byte: u8) -> Result<(), LcdError> {
        self.send(byte, 0)
    }

    fn data(&mut self, byte: u8) -> Result<(), LcdError> {
        self.send(byte, RS)
    }

    fn send(&mut self, byte: u8, mode: u8) -> Result<(), LcdError> {
        let bl = self.bl();
        let hi = (byte & 0xF0) | mode | bl;
        let lo = ((byte << 4) & 0xF0) | mode | bl;
        self.i2c
            .write(self.address, &[hi | EN, hi, lo | EN, lo])
            .map_err(|_| LcdError::Bus)
    }

    fn nibble(&mut self, high_bits: u8, mode: u8) -> Result<(), LcdError> {
        let b = (high_bits & 0xF0) | mode | self.bl();
        self.i2c
            .write(self.address, &[b | EN, b])
            .map_err(|_| LcdError::Bus)
    }

    fn expander(&mut self, bits: u8) -> Result<(), LcdError> {
        let b = bits | self.bl();
        self.i2c
            .write(self.address, &[b])
            .map_err(|_| LcdError::Bus)
    }

    fn bl(&self) -> u8 {
        if self.backlight { BACKLIGHT } else { 0 }
    }
}

/// Remembers what each row shows so unchanged rows are not resent.
pub struct LineCache {
    rows: [[u8; COLS]; ROWS],
    valid: [bool; ROWS],
}

impl LineCache {
    pub const fn new() -> Self {
        Self {
            rows: [[b' '; COLS]; ROWS],
            valid: [false; ROWS],
        }
    }

    /// True (and remembered) when `text` differs from what row shows.
    pub fn changed(&mut self, row: usize, text: &str) -> bool {
        if row >= ROWS {
            return false;
        }
        let mut next = [b' '; COLS];
        for (slot, b) in next.iter_mut().zip(text.bytes()) {
            *slot = b;
        }
        if self.valid[row] && self.rows[row] == next {
            return false;
        }
        self.rows[row] = next;
        self.valid[row] = true;
        true
    }

    /// Forget everything, e.g. after a clear or a bus error.
    pub fn invalidate(&mut self) {
        self.valid = [false; ROWS];
    }
}

impl Default for LineCache {
    fn default() -> Self {
        Self::new()
    }
}
