// 4-digit 7-segment display multiplexed through chained 74HC595s
//
// Three registers share one data/clock/latch trio:
//   byte 0  segments a..g + dp (1 = lit, common cathode)
//   byte 1  low nibble: digit select, active low; high nibble: LEDs
//   byte 2  low nibble: stepper coils
// Only one digit is driven at a time; MuxDisplay advances to the next
// digit every couple of milliseconds, fast enough to look steady.

use embedded_hal::digital::OutputPin;

pub const SEG_A: u8 = 1 << 0;
pub const SEG_B: u8 = 1 << 1;
pub const SEG_C: u8 = 1 << 2;
pub const SEG_D: u8 = 1 << 3;
pub const SEG_E: u8 = 1 << 4;
pub const SEG_F: u8 = 1 << 5;
pub const SEG_G: u8 = 1 << 6;
pub const SEG_DP: u8 = 1 << 7;

const DIGITS: [u8; 10] = [
    SEG_A | SEG_B | SEG_C | SEG_D | SEG_E | SEG_F,
    SEG_B | SEG_C,
    SEG_A | SEG_B | SEG_D | SEG_E | SEG_G,
    SEG_A | SEG_B | SEG_C | SEG_D | SEG_G,
    SEG_B | SEG_C | SEG_F | SEG_G,
    SEG_A | SEG_C | SEG_D | SEG_F | SEG_G,
    SEG_A | SEG_C | SEG_D | SEG_E | SEG_F | SEG_G,
    SEG_A | SEG_B | SEG_C,
    SEG_A | SEG_B | SEG_C | SEG_D | SEG_E | SEG_F | SEG_G,
    SEG_A | SEG_B | SEG_C | SEG_D | SEG_F | SEG_G,
];

pub const BLANK: u8 = 0;
pub const MINUS: u8 = SEG_G;

/// Glyph for an ASCII char; unknown chars render blank.
pub fn glyph(c: char) -> u8 {
    match c {
        '0'..='9' => DIGITS[c as usize - '0' as usize],
        '-' => MINUS,
        '_' => SEG_D,
        'A' | 'a' => SEG_A | SEG_B | SEG_C | SEG_E | SEG_F | SEG_G,
        'b' | 'B' => SEG_C | SEG_D | SEG_E | SEG_F | SEG_G,
        'C' => SEG_A | SEG_D | SEG_E | SEG_F,
        'c' => SEG_D | SEG_E | SEG_G,
        'd' | 'D' => SEG_B | SEG_C | SEG_D | SEG_E | SEG_G,
        'E' | 'e' => SEG_A | SEG_D | SEG_E | SEG_F | SEG_G,
        'F' | 'f' => SEG_A | SEG_E | SEG_F | SEG_G,
        'H' | 'h' => SEG_B | SEG_C | SEG_E | SEG_F | SEG_G,
        'L' | 'l' => SEG_D | SEG_E | SEG_F,
        'n' | 'N' => SEG_C | SEG_E | SEG_G,
        'O' | 'o' => SEG_C | SEG_D | SEG_E | SEG_G,
        'P' | 'p' => SEG_A | SEG_B | SEG_E | SEG_F | SEG_G,
        'r' | 'R' => SEG_E | SEG_G,
        'S' | 's' => DIGITS[5],
        't' | 'T' => SEG_D | SEG_E | SEG_F | SEG_G,
        'U' | 'u' => SEG_B | SEG_C | SEG_D | SEG_E | SEG_F,
        _ => BLANK,
    }
}

pub struct SegmentDisplay<const N: usize> {
    cells: [u8; N],
    current: usize,
}

impl<const N: usize> SegmentDisplay<N> {
    pub const fn new() -> Self {
        // one select bit per digit in a single register
        const { assert!(N > 0 && N <= 8, "1..=8 digits") };
        Self {
            cells: [BLANK; N],
            current: 0,
        }
    }

    /// Right aligned, leading zeros blanked. Shows dashes when the value
    /// does not fit.
    pub fn show_number(&mut self, value: i32) {
        let negative = value < 0;
        let mut n = value.unsigned_abs();
        let room = if negative { N.saturating_sub(1) } else { N };

        let mut digits = 1;
        let mut rest = n / 10;
        while rest > 0 {
            digits += 1;
            rest /= 10;
        }
        if digits > room {
            self.cells = [MINUS; N];
            return;
        }

        self.cells = [BLANK; N];
        let mut pos = N;
        loop {
            pos -= 1;
            self.cells[pos] = DIGITS[(n % 10) as usize];
            n /= 10;
            if n == 0 {
                break;
            }
        }
        if negative {
            self.cells[pos - 1] = MINUS;
        }
    }

    /// Left aligned; a '.' lights the decimal point of the previous cell.
    pub fn show_text(&mut self, text: &str) {
        self.cells = [BLANK; N];
        let mut pos = 0;
        for c in text.chars() {
            if c == '.' && pos > 0 {
                self.cells[pos - 1] |= SEG_DP;
                continue;
            }
            if pos == N {
                break;
            }
            self.cells[pos] = glyph(c);
            pos += 1;
        }
    }

    pub fn blank(&mut self) {
        self.cells = [BLANK; N];
    }

    pub fn cells(&self) -> &[u8; N] {
        &self.cells
    }

    /// Segments and active-low digit mask for the next digit in turn.
    pub fn next_frame(&mut self) -> (u8, u8) {
        let idx = self.current;
        self.current = (self.current + 1) % N;
        let select = !(1u8 << idx) & digit_mask(N);
        (self.cells[idx], select)
    }
}

impl<const N: usize> Default for SegmentDisplay<N> {
    fn default() -> Self {
        Self::new()
    }
}

const fn digit_mask(n: usize) -> u8 {
    if n >= 8 { 0xFF } else { (1u8 << n) - 1 }
}

/// Everything that goes out through the register chain in one latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFrame {
    pub segments: u8,
    /// active low, low nibble only
    pub digits: u8,
    /// four indicator LEDs
    pub leds: u8,
    /// stepper coil pattern, low nibble
    pub coils: u8,
}

impl OutputFrame {
    pub const fn new() -> Self {
        Self {
            segments: BLANK,
            digits: 0x0F,
            leds: 0,
            coils: 0,
        }
    }

    /// Register contents, nearest register first.
    pub fn bytes(&self) -> [u8; 3] {
        [
            self.segments,
            (self.digits & 0x0F) | (self.leds << 4),
            self.coils & 0x0F,
        ]
    }
}

impl Default for OutputFrame {
    fn default() -> Self {
        Self::new()
    }
}

/// Bit-banged 74HC595 chain.
pub struct ShiftRegister<D, C, L> {
    data: D,
    clock: C,
    latch: L,
    last: Option<[u8; 3]>,
}

impl<D, C, L, E> ShiftRegister<D, C, L>
where
    D: OutputPin<Error = E>,
    C: OutputPin<Error = E>,
    L: OutputPin<Error = E>,
{
    pub fn new(data: D, clock: C, latch: L) -> Self {
        Self {
            data,
            clock,
            latch,
            last: None,
        }
    }

    /// Shift out `bytes` (nearest register first, so the slice is sent
    /// back to front, MSB first) and latch.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), E> {
        self.latch.set_low()?;
        for &byte in bytes.iter().rev() {
            for bit in (0..8).rev() {
                if byte & (1 << bit) != 0 {
                    self.data.set_high()?;
                } else {
                    self.data.set_low()?;
                }
                self.clock.set_high()?;
                self.clock.set_low()?;
            }
        }
        self.latch.set_high()
    }

    /// Latch a frame unless the chain already holds it. Returns whether
    /// anything was shifted.
    pub fn show(&mut self, frame: &OutputFrame) -> Result<bool, E> {
        let bytes = frame.bytes();
        if self.last == Some(bytes) {
            return Ok(false);
        }
        self.write(&bytes)?;
        self.last = Some(bytes);
        Ok(true)
    }
}
