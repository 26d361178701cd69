// Adaptive input scan rate
// NOTE: the keypad scan costs four I2C round trips, so back off when
// nobody is touching the board:
// - active input: scan every 5ms for responsive debouncing
// - recently active: every 20ms
// - idle: every 50ms, still far shorter than any human key press

use core::fmt;

/// Kernel tick (ms); the periodic timer interrupt rate
pub const BASE_TICK_MS: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollRate {
    #[default]
    Fast,
    Normal,
    Slow,
}

impl PollRate {
    // How many base ticks between scans at this rate
    pub const fn divisor(self) -> u32 {
        match self {
            PollRate::Fast => 5,
            PollRate::Normal => 20,
            PollRate::Slow => 50,
        }
    }

    pub const fn interval_ms(self) -> u32 {
        self.divisor() * BASE_TICK_MS
    }
}

impl fmt::Display for PollRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollRate::Fast => write!(f, "Fast({}ms)", self.interval_ms()),
            PollRate::Normal => write!(f, "Normal({}ms)", self.interval_ms()),
            PollRate::Slow => write!(f, "Slow({}ms)", self.interval_ms()),
        }
    }
}

// idle scans before stepping down a rate
mod thresholds {
    pub const FAST_TO_NORMAL: u32 = 100; // 100 x 5ms = 500ms
    pub const NORMAL_TO_SLOW: u32 = 100; // 100 x 20ms = 2s
}

pub struct AdaptivePoller {
    rate: PollRate,
    // consecutive idle scans
    idle_count: u32,
}

impl AdaptivePoller {
    pub const fn new() -> Self {
        Self {
            rate: PollRate::Fast,
            idle_count: 0,
        }
    }

    pub fn on_activity(&mut self) {
        self.rate = PollRate::Fast;
        self.idle_count = 0;
    }

    /// Returns true when the rate changed, so the caller can retune
    /// its scan timer.
    pub fn on_idle(&mut self) -> bool {
        self.idle_count = self.idle_count.saturating_add(1);

        match self.rate {
            PollRate::Fast if self.idle_count >= thresholds::FAST_TO_NORMAL => {
                self.rate = PollRate::Normal;
                self.idle_count = 0;
                true
            }
            PollRate::Normal if self.idle_count >= thresholds::NORMAL_TO_SLOW => {
                self.rate = PollRate::Slow;
                true
            }
            _ => false,
        }
    }

    pub fn rate(&self) -> PollRate {
        self.rate
    }

    pub fn interval_ms(&self) -> u32 {
        self.rate.interval_ms()
    }

    pub fn idle_count(&self) -> u32 {
        self.idle_count
    }
}

impl Default for AdaptivePoller {
    fn default() -> Self {
        Self::new()
    }
}
