// Timestamp-comparison timers: the building block of the multiplexer.
//
// Periodic fires at most once per interval. If the loop stalls for more
// than one interval (long I2C transfer, EEPROM write cycle) it resyncs
// to `now` rather than replaying the missed ticks in a burst.
// Deadline is a one-shot timeout that can be re-armed.

use crate::clock::Millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Periodic {
    interval: u32,
    last: Millis,
}

impl Periodic {
    pub const fn new(interval_ms: u32) -> Self {
        Self {
            interval: interval_ms,
            last: Millis::ZERO,
        }
    }

    /// Start counting from `now` instead of from boot.
    pub const fn starting_at(interval_ms: u32, now: Millis) -> Self {
        Self {
            interval: interval_ms,
            last: now,
        }
    }

    pub fn is_due(&mut self, now: Millis) -> bool {
        let elapsed = now.since(self.last);
        if elapsed < self.interval {
            return false;
        }
        if elapsed >= self.interval.saturating_mul(2) {
            self.last = now;
        } else {
            self.last = self.last.add(self.interval);
        }
        true
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    // keeps `last`, so the next firing is measured from the previous one
    pub fn set_interval(&mut self, interval_ms: u32) {
        self.interval = interval_ms;
    }

    pub fn reset(&mut self, now: Millis) {
        self.last = now;
    }

    pub fn remaining(&self, now: Millis) -> u32 {
        self.interval.saturating_sub(now.since(self.last))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Deadline {
    at: Option<Millis>,
}

impl Deadline {
    pub const fn disarmed() -> Self {
        Self { at: None }
    }

    pub fn arm(&mut self, now: Millis, ms: u32) {
        self.at = Some(now.add(ms));
    }

    pub fn disarm(&mut self) {
        self.at = None;
    }

    pub fn is_armed(&self) -> bool {
        self.at.is_some()
    }

    pub fn expired(&self, now: Millis) -> bool {
        match self.at {
            Some(at) => now.reached(at),
            None => false,
        }
    }

    // 0 when disarmed or expired
    pub fn remaining(&self, now: Millis) -> u32 {
        match self.at {
            Some(at) if !now.reached(at) => at.since(now),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_per_interval() {
        let mut p = Periodic::new(10);
        assert!(!p.is_due(Millis(9)));
        assert!(p.is_due(Millis(10)));
        assert!(!p.is_due(Millis(10)));
        assert!(!p.is_due(Millis(19)));
        assert!(p.is_due(Millis(20)));
    }

    #[test]
    fn keeps_phase_when_slightly_late() {
        let mut p = Periodic::new(10);
        assert!(p.is_due(Millis(13)));
        // next due at 20, not 23
        assert!(p.is_due(Millis(20)));
    }

    #[test]
    fn resyncs_after_stall_instead_of_bursting() {
        let mut p = Periodic::new(10);
        assert!(p.is_due(Millis(95)));
        assert!(!p.is_due(Millis(96)));
        assert!(!p.is_due(Millis(104)));
        assert!(p.is_due(Millis(105)));
    }

    #[test]
    fn works_across_counter_wrap() {
        let start = Millis(u32::MAX - 5);
        let mut p = Periodic::starting_at(10, start);
        assert!(!p.is_due(Millis(2)));
        assert!(p.is_due(Millis(4)));
    }

    #[test]
    fn remaining_counts_down() {
        let p = Periodic::starting_at(100, Millis(1000));
        assert_eq!(p.remaining(Millis(1040)), 60);
        assert_eq!(p.remaining(Millis(1200)), 0);
    }

    #[test]
    fn deadline_expires_and_rearms() {
        let mut d = Deadline::disarmed();
        assert!(!d.expired(Millis(1_000_000)));
        d.arm(Millis(100), 50);
        assert!(!d.expired(Millis(149)));
        assert_eq!(d.remaining(Millis(120)), 30);
        assert!(d.expired(Millis(150)));
        assert_eq!(d.remaining(Millis(160)), 0);
        d.arm(Millis(160), 10);
        assert!(!d.expired(Millis(165)));
        d.disarm();
        assert!(!d.expired(Millis(500)));
    }
}
