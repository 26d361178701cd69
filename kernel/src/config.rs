// Persistent configuration, stored as a small binary record in EEPROM.
//
// Layout (little-endian), 25 bytes at ConfigStore::addr:
//   0  'S' 'P'          magic
//   2  version
//   3  passcode length
//   4  passcode digits, 8 slots
//  12  near_cm  u16     14  far_cm      u16
//  16  beep_enabled     17  relock_secs u16
//  19  door_steps u16   21  motor_speed u16
//  23  page_secs
//  24  CRC-8 over bytes 0..24
// A blank or corrupt record loads defaults; a record is only rewritten
// where bytes changed.

use core::fmt;

use crate::alarm::Thresholds;
use crate::eeprom::{self, Eeprom, EepromError};
use crate::security::{MAX_CODE_LEN, Passcode, Policy};

const MAGIC: [u8; 2] = *b"SP";
const VERSION: u8 = 1;
pub const IMAGE_LEN: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub passcode: Passcode,
    pub near_cm: u16,
    pub far_cm: u16,
    pub beep_enabled: bool,
    pub relock_secs: u16, // 0 = stay open until locked by hand
    pub door_steps: u16,  // half steps from closed to open
    pub motor_speed: u16, // half steps per second
    pub page_secs: u8,    // dashboard auto-rotate; 0 = manual only
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Config {
    pub const fn defaults() -> Self {
        Self {
            passcode: Passcode::factory(),
            near_cm: 10,
            far_cm: 50,
            beep_enabled: true,
            relock_secs: 30,
            door_steps: 1024,
            motor_speed: 400,
            page_secs: 4,
        }
    }

    pub fn sanitize(&mut self) {
        self.near_cm = self.near_cm.clamp(NEAR_MIN, NEAR_MAX);
        self.far_cm = self.far_cm.clamp(self.near_cm + GAP_MIN, FAR_MAX);
        self.relock_secs = self.relock_secs.min(RELOCK_MAX);
        self.door_steps = self.door_steps.clamp(DOOR_MIN, DOOR_MAX);
        self.motor_speed = self.motor_speed.clamp(SPEED_MIN, SPEED_MAX);
        self.page_secs = self.page_secs.min(PAGE_MAX);
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            near_cm: self.near_cm,
            far_cm: self.far_cm,
        }
    }

    pub fn policy(&self) -> Policy {
        Policy {
            relock_ms: self.relock_secs as u32 * 1000,
            ..Policy::default()
        }
    }

    pub fn encode(&self) -> [u8; IMAGE_LEN] {
        let mut out = [0u8; IMAGE_LEN];
        out[0..2].copy_from_slice(&MAGIC);
        out[2] = VERSION;
        out[3] = self.passcode.len() as u8;
        out[4..4 + self.passcode.len()].copy_from_slice(self.passcode.digits());
        out[12..14].copy_from_slice(&self.near_cm.to_le_bytes());
        out[14..16].copy_from_slice(&self.far_cm.to_le_bytes());
        out[16] = self.beep_enabled as u8;
        out[17..19].copy_from_slice(&self.relock_secs.to_le_bytes());
        out[19..21].copy_from_slice(&self.door_steps.to_le_bytes());
        out[21..23].copy_from_slice(&self.motor_speed.to_le_bytes());
        out[23] = self.page_secs;
        out[IMAGE_LEN - 1] = crc8(&out[..IMAGE_LEN - 1]);
        out
    }

    /// Parse and sanitize a stored record.
    pub fn decode(image: &[u8; IMAGE_LEN]) -> Result<Self, ConfigError> {
        if image[0..2] != MAGIC {
            return Err(ConfigError::BadMagic);
        }
        if image[2] != VERSION {
            return Err(ConfigError::BadVersion(image[2]));
        }
        if crc8(&image[..IMAGE_LEN - 1]) != image[IMAGE_LEN - 1] {
            return Err(ConfigError::BadChecksum);
        }

        let len = (image[3] as usize).min(MAX_CODE_LEN);
        let passcode = Passcode::new(&image[4..4 + len]).unwrap_or_else(|| {
            log::warn!("config: stored passcode invalid, using factory code");
            Passcode::factory()
        });
        let u16_at = |i: usize| u16::from_le_bytes([image[i], image[i + 1]]);

        let mut cfg = Self {
            passcode,
            near_cm: u16_at(12),
            far_cm: u16_at(14),
            beep_enabled: image[16] != 0,
            relock_secs: u16_at(17),
            door_steps: u16_at(19),
            motor_speed: u16_at(21),
            page_secs: image[23],
        };
        cfg.sanitize();
        Ok(cfg)
    }
}

// limits shared with the config menu
pub const NEAR_MIN: u16 = 3;
pub const NEAR_MAX: u16 = 100;
pub const GAP_MIN: u16 = 10;
pub const FAR_MAX: u16 = 300;
pub const RELOCK_MAX: u16 = 600;
pub const DOOR_MIN: u16 = 64;
pub const DOOR_MAX: u16 = 4096;
pub const SPEED_MIN: u16 = 50;
// the door steps at most once per 1 ms motor poll
pub const SPEED_MAX: u16 = 800;
pub const PAGE_MAX: u8 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    BadMagic,
    BadVersion(u8),
    BadChecksum,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::BadMagic => write!(f, "no config record"),
            ConfigError::BadVersion(v) => write!(f, "unsupported config version {}", v),
            ConfigError::BadChecksum => write!(f, "config checksum mismatch"),
        }
    }
}

/// CRC-8, polynomial 0x07, init 0 (CRC-8/SMBUS).
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &b in data {
        crc ^= b;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x07
            } else {
                crc << 1
            };
        }
    }
    crc
}

pub struct ConfigStore {
    addr: u16,
}

impl ConfigStore {
    pub const fn new(addr: u16) -> Self {
        Self { addr }
    }

    /// Never fails: anything unreadable yields defaults.
    pub fn load<E: Eeprom + ?Sized>(&self, eeprom: &mut E) -> Config {
        let mut image = [0u8; IMAGE_LEN];
        if let Err(e) = eeprom.read(self.addr, &mut image) {
            log::error!("config: read failed: {}, using defaults", e);
            return Config::defaults();
        }
        match Config::decode(&image) {
            Ok(cfg) => {
                log::info!("config: loaded from eeprom @{:#06x}", self.addr);
                cfg
            }
            Err(e) => {
                log::info!("config: {}, using defaults", e);
                Config::defaults()
            }
        }
    }

    pub fn save<E: Eeprom + ?Sized>(&self, eeprom: &mut E, cfg: &Config) -> Result<usize, EepromError> {
        let written = eeprom::update(eeprom, self.addr, &cfg.encode())?;
        log::info!("config: saved ({} bytes changed)", written);
        Ok(written)
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(0)
    }
}
