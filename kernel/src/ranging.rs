// HC-SR04 ultrasonic ranging without blocking the loop
//
// The loop pulses TRIG and returns; the GPIO interrupt timestamps both
// echo edges and hands the pulse width over through clock::signal_echo.
// RangeFinder only tracks "triggered, waiting for echo" and gives up
// after ECHO_TIMEOUT_MS, so a missing echo costs one sample, not a stall.
//
// Sound travels ~343 m/s: 29.1us per cm each way, ~58us per cm of range.

use crate::clock::Millis;

pub const US_PER_CM: u32 = 58;
pub const MIN_RANGE_CM: u16 = 2;
pub const MAX_RANGE_CM: u16 = 400;

// 400cm round trip is ~23ms; anything later is an echo from nowhere
const ECHO_TIMEOUT_MS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reading {
    Distance(u16),
    OutOfRange,
}

pub fn echo_to_cm(pulse_us: u32) -> u32 {
    // round to nearest; a stuck echo line can hand us anything
    pulse_us.saturating_add(US_PER_CM / 2) / US_PER_CM
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    AwaitingEcho { since: Millis },
}

pub struct RangeFinder {
    phase: Phase,
    misses: u32,
}

impl RangeFinder {
    pub const fn new() -> Self {
        Self {
            phase: Phase::Idle,
            misses: 0,
        }
    }

    /// Returns false if a measurement is still in flight; the caller
    /// should not pulse TRIG in that case.
    pub fn trigger(&mut self, now: Millis) -> bool {
        if self.is_busy() {
            return false;
        }
        self.phase = Phase::AwaitingEcho { since: now };
        true
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.phase, Phase::AwaitingEcho { .. })
    }

    /// Feed the latest echo pulse (if any) and see whether the current
    /// measurement finished.
    pub fn poll(&mut self, echo_us: Option<u32>, now: Millis) -> Option<Reading> {
        let Phase::AwaitingEcho { since } = self.phase else {
            return None;
        };

        if let Some(pulse) = echo_us {
            self.phase = Phase::Idle;
            let cm = echo_to_cm(pulse);
            return if (MIN_RANGE_CM as u32..=MAX_RANGE_CM as u32).contains(&cm) {
                Some(Reading::Distance(cm as u16))
            } else {
                Some(Reading::OutOfRange)
            };
        }

        if now.since(since) >= ECHO_TIMEOUT_MS {
            self.phase = Phase::Idle;
            self.misses = self.misses.wrapping_add(1);
            return Some(Reading::OutOfRange);
        }

        None
    }

    pub fn misses(&self) -> u32 {
        self.misses
    }
}

impl Default for RangeFinder {
    fn default() -> Self {
        Self::new()
    }
}

/// Median over the last N valid readings; rejects single-sample spikes
/// from stray reflections.
pub struct MedianFilter<const N: usize> {
    buf: [u16; N],
    len: usize,
    next: usize,
}

impl<const N: usize> MedianFilter<N> {
    pub const fn new() -> Self {
        const { assert!(N > 0, "median window must hold a reading") };
        Self {
            buf: [0; N],
            len: 0,
            next: 0,
        }
    }

    pub fn push(&mut self, value: u16) -> u16 {
        self.buf[self.next] = value;
        self.next = (self.next + 1) % N;
        if self.len < N {
            self.len += 1;
        }
        self.median().unwrap_or(value)
    }

    pub fn median(&self) -> Option<u16> {
        if self.len == 0 {
            return None;
        }
        let mut sorted = self.buf;
        let window = &mut sorted[..self.len];
        window.sort_unstable();
        Some(window[self.len / 2])
    }

    pub fn clear(&mut self) {
        self.len = 0;
        self.next = 0;
    }
}

impl<const N: usize> Default for MedianFilter<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_pulse_width_to_cm() {
        assert_eq!(echo_to_cm(580), 10);
        assert_eq!(echo_to_cm(5800), 100);
        assert_eq!(echo_to_cm(610), 11);
        assert_eq!(echo_to_cm(0), 0);
    }

    #[test]
    fn echo_completes_measurement() {
        let mut r = RangeFinder::new();
        assert_eq!(r.poll(Some(1160), Millis(0)), None);
        assert!(r.trigger(Millis(100)));
        assert!(!r.trigger(Millis(101)));
        assert_eq!(r.poll(None, Millis(105)), None);
        assert_eq!(r.poll(Some(1160), Millis(110)), Some(Reading::Distance(20)));
        assert!(!r.is_busy());
    }

    #[test]
    fn missing_echo_times_out() {
        let mut r = RangeFinder::new();
        r.trigger(Millis(0));
        assert_eq!(r.poll(None, Millis(29)), None);
        assert_eq!(r.poll(None, Millis(30)), Some(Reading::OutOfRange));
        assert_eq!(r.misses(), 1);
        assert!(r.trigger(Millis(60)));
    }

    #[test]
    fn out_of_band_echo_is_out_of_range() {
        let mut r = RangeFinder::new();
        r.trigger(Millis(0));
        assert_eq!(r.poll(Some(40), Millis(1)), Some(Reading::OutOfRange));
        r.trigger(Millis(2));
        assert_eq!(r.poll(Some(30_000), Millis(3)), Some(Reading::OutOfRange));
    }

    #[test]
    fn stuck_echo_line_is_out_of_range() {
        assert_eq!(echo_to_cm(u32::MAX), u32::MAX / US_PER_CM);
        let mut r = RangeFinder::new();
        r.trigger(Millis(0));
        assert_eq!(r.poll(Some(u32::MAX), Millis(1)), Some(Reading::OutOfRange));
        assert!(!r.is_busy());
    }

    #[test]
    fn median_rejects_spike() {
        let mut f = MedianFilter::<3>::new();
        assert_eq!(f.push(50), 50);
        assert_eq!(f.push(52), 52);
        assert_eq!(f.push(300), 52);
        assert_eq!(f.push(51), 52);
        assert_eq!(f.push(53), 53);
        f.clear();
        assert_eq!(f.median(), None);
    }
}
