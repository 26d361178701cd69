//! Proximity alarm (parking-sensor style)
//!
//! Distance picks a zone; the zone and the distance inside it pick the
//! buzzer cadence. Closer means faster beeps, inside the near threshold
//! the tone is continuous. Zone boundaries carry a little hysteresis so
//! a reading wobbling across a boundary does not flap the LEDs.

use core::fmt;

use crate::clock::Millis;
use crate::ranging::Reading;

const HYSTERESIS_CM: u16 = 2;
const BEEP_MS: u32 = 60;
const FASTEST_INTERVAL_MS: u32 = 100;
const SLOWEST_INTERVAL_MS: u32 = 800;
// consecutive out-of-range samples before the object counts as gone
const MISSES_TO_CLEAR: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Zone {
    Clear = 0,
    Caution = 1,
    Warning = 2,
    Danger = 3,
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Zone::Clear => "clear",
            Zone::Caution => "caution",
            Zone::Warning => "warning",
            Zone::Danger => "DANGER",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// continuous tone below this
    pub near_cm: u16,
    /// silent at or beyond this
    pub far_cm: u16,
}

impl Thresholds {
    pub fn mid_cm(&self) -> u16 {
        self.near_cm + (self.far_cm.saturating_sub(self.near_cm)) / 2
    }

    pub fn zone_for(&self, cm: u16) -> Zone {
        if cm < self.near_cm {
            Zone::Danger
        } else if cm < self.mid_cm() {
            Zone::Warning
        } else if cm < self.far_cm {
            Zone::Caution
        } else {
            Zone::Clear
        }
    }

    /// Linear from SLOWEST at `far_cm` down to FASTEST at `near_cm`.
    pub fn beep_interval(&self, cm: u16) -> u32 {
        let span = self.far_cm.saturating_sub(self.near_cm) as u32;
        if span == 0 {
            return FASTEST_INTERVAL_MS;
        }
        let offset = cm.clamp(self.near_cm, self.far_cm).saturating_sub(self.near_cm) as u32;
        FASTEST_INTERVAL_MS + (SLOWEST_INTERVAL_MS - FASTEST_INTERVAL_MS) * offset / span
    }
}

pub struct ProximityAlarm {
    thresholds: Thresholds,
    zone: Zone,
    distance: Option<u16>,
    misses: u8,
    muted: bool,
    enabled: bool,
    cycle_start: Millis,
}

impl ProximityAlarm {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            zone: Zone::Clear,
            distance: None,
            misses: 0,
            muted: false,
            enabled: true,
            cycle_start: Millis::ZERO,
        }
    }

    /// Returns the new zone when it changed.
    pub fn update(&mut self, reading: Reading) -> Option<Zone> {
        let next = match reading {
            Reading::Distance(cm) => {
                self.misses = 0;
                self.distance = Some(cm);
                self.zone_with_hysteresis(cm)
            }
            Reading::OutOfRange => {
                self.misses = self.misses.saturating_add(1);
                if self.misses < MISSES_TO_CLEAR {
                    return None;
                }
                self.distance = None;
                Zone::Clear
            }
        };

        if next == self.zone {
            return None;
        }
        log::info!("alarm: {} -> {}", self.zone, next);
        self.zone = next;
        Some(next)
    }

    fn zone_with_hysteresis(&self, cm: u16) -> Zone {
        let raw = self.thresholds.zone_for(cm);
        if raw >= self.zone {
            return raw;
        }
        // backing off: must clear the boundary by HYSTERESIS_CM
        let relaxed = self.thresholds.zone_for(cm.saturating_sub(HYSTERESIS_CM));
        if relaxed < self.zone { relaxed } else { self.zone }
    }

    /// Buzzer level for this tick.
    pub fn buzzer(&mut self, now: Millis) -> bool {
        if self.muted || !self.enabled {
            return false;
        }
        match self.zone {
            Zone::Clear => false,
            Zone::Danger => true,
            Zone::Caution | Zone::Warning => {
                let cm = self.distance.unwrap_or(self.thresholds.far_cm);
                let interval = self.thresholds.beep_interval(cm);
                if now.since(self.cycle_start) >= interval {
                    self.cycle_start = now;
                }
                now.since(self.cycle_start) < BEEP_MS
            }
        }
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    pub fn distance(&self) -> Option<u16> {
        self.distance
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn set_thresholds(&mut self, thresholds: Thresholds) {
        self.thresholds = thresholds;
    }

    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        log::info!("alarm: {}", if self.muted { "muted" } else { "unmuted" });
        self.muted
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}
