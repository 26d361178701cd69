// 24C32-class I2C EEPROM (4KB, 32-byte pages)
//
// Reads are a single write_read from any address. Writes must not cross
// a page: the chip wraps inside the page instead of moving on, silently
// overwriting the start of it. After each page write the chip goes
// deaf for up to 5ms while it programs the cells.

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

pub const DEFAULT_ADDRESS: u8 = 0x50;
pub const PAGE_SIZE: usize = 32;
pub const CAPACITY: usize = 4096;

const WRITE_CYCLE_MS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EepromError {
    Bus,
    OutOfRange,
}

impl fmt::Display for EepromError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EepromError::Bus => write!(f, "eeprom not responding"),
            EepromError::OutOfRange => write!(f, "eeprom access past end of device"),
        }
    }
}

/// Byte-addressed non-volatile storage.
pub trait Eeprom {
    fn read(&mut self, addr: u16, buf: &mut [u8]) -> Result<(), EepromError>;
    fn write(&mut self, addr: u16, data: &[u8]) -> Result<(), EepromError>;
    fn capacity(&self) -> usize;

    fn check_range(&self, addr: u16, len: usize) -> Result<(), EepromError> {
        if addr as usize + len > self.capacity() {
            Err(EepromError::OutOfRange)
        } else {
            Ok(())
        }
    }
}

pub struct At24c32<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
}

impl<I2C: I2c, D: DelayNs> At24c32<I2C, D> {
    pub fn new(i2c: I2C, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
        }
    }

    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    fn write_page(&mut self, addr: u16, chunk: &[u8]) -> Result<(), EepromError> {
        let mut frame = [0u8; 2 + PAGE_SIZE];
        frame[..2].copy_from_slice(&addr.to_be_bytes());
        frame[2..2 + chunk.len()].copy_from_slice(chunk);
        self.i2c
            .write(self.address, &frame[..2 + chunk.len()])
            .map_err(|_| EepromError::Bus)?;
        self.delay.delay_ms(WRITE_CYCLE_MS);
        Ok(())
    }
}

impl<I2C: I2c, D: DelayNs> Eeprom for At24c32<I2C, D> {
    fn read(&mut self, addr: u16, buf: &mut [u8]) -> Result<(), EepromError> {
        self.check_range(addr, buf.len())?;
        if buf.is_empty() {
            return Ok(());
        }
        self.i2c
            .write_read(self.address, &addr.to_be_bytes(), buf)
            .map_err(|_| EepromError::Bus)
    }

    fn write(&mut self, addr: u16, data: &[u8]) -> Result<(), EepromError> {
        self.check_range(addr, data.len())?;
        let mut addr = addr as usize;
        let mut rest = data;
        while !rest.is_empty() {
            let room = PAGE_SIZE - addr % PAGE_SIZE;
            let (chunk, tail) = rest.split_at(room.min(rest.len()));
            self.write_page(addr as u16, chunk)?;
            addr += chunk.len();
            rest = tail;
        }
        Ok(())
    }

    fn capacity(&self) -> usize {
        CAPACITY
    }
}

/// Write `data` at `addr`, touching only the bytes that differ from
/// what is stored. Returns the number of bytes actually written.
pub fn update<E: Eeprom + ?Sized>(
    eeprom: &mut E,
    addr: u16,
    data: &[u8],
) -> Result<usize, EepromError> {
    eeprom.check_range(addr, data.len())?;
    let mut written = 0;
    let mut offset = 0;
    while offset < data.len() {
        let at = addr as usize + offset;
        let len = (PAGE_SIZE - at % PAGE_SIZE).min(data.len() - offset);
        let wanted = &data[offset..offset + len];
        let mut current = [0u8; PAGE_SIZE];
        eeprom.read(at as u16, &mut current[..len])?;

        let first = wanted.iter().zip(&current[..len]).position(|(a, b)| a != b);
        let last = wanted.iter().zip(&current[..len]).rposition(|(a, b)| a != b);
        if let (Some(first), Some(last)) = (first, last) {
            eeprom.write((at + first) as u16, &wanted[first..=last])?;
            written += last - first + 1;
        }
        offset += len;
    }
    Ok(written)
}
