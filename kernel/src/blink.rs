// LED blink patterns without delay()
//
// A pattern is a list of durations, alternating on/off starting with
// on. The Blinker walks it against the clock and reports a level only
// when the LED has to change, so the caller can write the pin lazily.

use crate::clock::Millis;

pub type Pattern = &'static [u32];

/// double pulse, like a heartbeat
pub const HEARTBEAT: Pattern = &[80, 120, 80, 720];
pub const SLOW: Pattern = &[500, 500];
pub const FAST: Pattern = &[100, 100];
/// single on span that never ends
pub const SOLID: Pattern = &[u32::MAX];
pub const OFF: Pattern = &[];

pub struct Blinker {
    pattern: Pattern,
    index: usize,
    since: Millis,
    level: Option<bool>,
}

impl Blinker {
    pub const fn new(pattern: Pattern) -> Self {
        Self {
            pattern,
            index: 0,
            since: Millis::ZERO,
            level: None,
        }
    }

    /// Switch patterns; restarts only if `pattern` differs from the
    /// current one so calling this every tick is harmless.
    pub fn set_pattern(&mut self, pattern: Pattern, now: Millis) {
        if self.pattern == pattern {
            return;
        }
        self.pattern = pattern;
        self.index = 0;
        self.since = now;
        self.level = None;
    }

    /// Returns the new LED level when it changes.
    pub fn poll(&mut self, now: Millis) -> Option<bool> {
        if self.pattern.is_empty() {
            return self.emit(false);
        }

        if self.level.is_none() {
            self.index = 0;
            self.since = now;
            return self.emit(true);
        }

        let span = self.pattern[self.index];
        if now.since(self.since) < span {
            return None;
        }

        self.since = self.since.add(span);
        // stalled for a full period or more; restart phase from now
        if now.since(self.since) >= span {
            self.since = now;
        }
        self.index = (self.index + 1) % self.pattern.len();
        self.emit(self.index % 2 == 0)
    }

    pub fn level(&self) -> bool {
        self.level.unwrap_or(false)
    }

    fn emit(&mut self, on: bool) -> Option<bool> {
        if self.level == Some(on) {
            return None;
        }
        self.level = Some(on);
        Some(on)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(b: &mut Blinker, until: u32) -> Vec<(u32, bool)> {
        (0..until)
            .filter_map(|t| b.poll(Millis(t)).map(|l| (t, l)))
            .collect()
    }

    #[test]
    fn slow_blink_edges() {
        let mut b = Blinker::new(SLOW);
        assert_eq!(
            edges(&mut b, 2001),
            vec![(0, true), (500, false), (1000, true), (1500, false), (2000, true)]
        );
    }

    #[test]
    fn heartbeat_double_pulse() {
        let mut b = Blinker::new(HEARTBEAT);
        assert_eq!(
            edges(&mut b, 1001),
            vec![(0, true), (80, false), (200, true), (280, false), (1000, true)]
        );
    }

    #[test]
    fn solid_and_off() {
        let mut b = Blinker::new(SOLID);
        assert_eq!(edges(&mut b, 5000), vec![(0, true)]);
        b.set_pattern(OFF, Millis(5000));
        assert_eq!(b.poll(Millis(5001)), Some(false));
        assert_eq!(b.poll(Millis(5002)), None);
        assert!(!b.level());
    }

    #[test]
    fn same_pattern_does_not_restart() {
        let mut b = Blinker::new(FAST);
        b.poll(Millis(0));
        b.set_pattern(FAST, Millis(50));
        assert_eq!(b.poll(Millis(100)), Some(false));
        b.set_pattern(SLOW, Millis(150));
        assert_eq!(b.poll(Millis(150)), Some(true));
    }

    #[test]
    fn odd_length_pattern_keeps_alternating_per_index() {
        // 3 spans: on 10, off 10, on 10, then wraps to index 0 (on)
        static ODD: [u32; 3] = [10, 10, 10];
        let mut b = Blinker::new(&ODD);
        let e = edges(&mut b, 41);
        assert_eq!(e, vec![(0, true), (10, false), (20, true), (40, false)]);
    }
}
