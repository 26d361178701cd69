//! Debounced push button
//!
//! The board has one momentary button to ground (internal pull-up),
//! so "pressed" means the pin reads low. The debouncer itself only
//! sees a boolean and a timestamp, which keeps it independent of the
//! pin type and trivially testable.
//!
//! 30ms debounce, 800ms long press, 150ms repeat after the long press.

use embedded_hal::digital::InputPin;

use crate::clock::Millis;

const DEBOUNCE_MS: u32 = 30;
const LONG_PRESS_MS: u32 = 800;
const REPEAT_MS: u32 = 150;

/// At most one event per sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Press,
    Release,
    LongPress,
    Repeat,
}

pub struct Debouncer {
    stable: bool,
    candidate: bool,
    candidate_since: Millis,
    press_since: Millis,
    long_press_fired: bool,
    last_repeat: Millis,
}

impl Debouncer {
    pub const fn new() -> Self {
        Self {
            stable: false,
            candidate: false,
            candidate_since: Millis::ZERO,
            press_since: Millis::ZERO,
            long_press_fired: false,
            last_repeat: Millis::ZERO,
        }
    }

    /// Feed one raw sample (`true` = pressed) taken at `now`.
    pub fn poll(&mut self, pressed: bool, now: Millis) -> Option<Event> {
        if pressed != self.candidate {
            self.candidate = pressed;
            self.candidate_since = now;
        }

        let debounced = if now.since(self.candidate_since) >= DEBOUNCE_MS {
            self.candidate
        } else {
            self.stable
        };

        if debounced != self.stable {
            self.stable = debounced;
            if !debounced {
                return Some(Event::Release);
            }
            self.press_since = now;
            self.long_press_fired = false;
            self.last_repeat = now;
            return Some(Event::Press);
        }

        if self.stable {
            let held = now.since(self.press_since);

            if !self.long_press_fired && held >= LONG_PRESS_MS {
                self.long_press_fired = true;
                self.last_repeat = now;
                return Some(Event::LongPress);
            }

            if self.long_press_fired && now.since(self.last_repeat) >= REPEAT_MS {
                self.last_repeat = now;
                return Some(Event::Repeat);
            }
        }

        None
    }

    pub fn is_pressed(&self) -> bool {
        self.stable
    }

    pub fn is_debouncing(&self) -> bool {
        self.candidate != self.stable
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new()
    }
}

/// Active-low button on any `embedded-hal` input pin.
pub struct Button<P> {
    pin: P,
    debouncer: Debouncer,
}

impl<P: InputPin> Button<P> {
    pub fn new(pin: P) -> Self {
        Self {
            pin,
            debouncer: Debouncer::new(),
        }
    }

    pub fn poll(&mut self, now: Millis) -> Option<Event> {
        // a pin read error counts as "not pressed" for this sample
        let pressed = self.pin.is_low().unwrap_or(false);
        self.debouncer.poll(pressed, now)
    }

    pub fn is_debouncing(&self) -> bool {
        self.debouncer.is_debouncing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;

    // Feed a constant level every `step` ms over [from, to), collecting events.
    fn run(d: &mut Debouncer, pressed: bool, from: u32, to: u32, step: u32) -> Vec<(u32, Event)> {
        let mut out = Vec::new();
        let mut t = from;
        while t < to {
            if let Some(ev) = d.poll(pressed, Millis(t)) {
                out.push((t, ev));
            }
            t += step;
        }
        out
    }

    #[test]
    fn bounce_shorter_than_window_is_ignored() {
        let mut d = Debouncer::new();
        let mut events = Vec::new();
        for (t, level) in [(0, true), (5, false), (10, true), (15, false), (20, true), (25, false)] {
            events.extend(d.poll(level, Millis(t)));
        }
        events.extend(run(&mut d, false, 30, 200, 5).into_iter().map(|(_, e)| e));
        assert!(events.is_empty());
        assert!(!d.is_pressed());
    }

    #[test]
    fn press_then_release_after_debounce() {
        let mut d = Debouncer::new();
        let presses = run(&mut d, true, 100, 200, 5);
        assert_eq!(presses, vec![(130, Event::Press)]);
        assert!(d.is_pressed());
        let releases = run(&mut d, false, 200, 300, 5);
        assert_eq!(releases, vec![(230, Event::Release)]);
    }

    #[test]
    fn long_press_then_repeats() {
        let mut d = Debouncer::new();
        let events = run(&mut d, true, 0, 1300, 10);
        let kinds: Vec<Event> = events.iter().map(|(_, e)| *e).collect();
        assert_eq!(kinds[0], Event::Press);
        assert_eq!(events[1], (830, Event::LongPress));
        assert_eq!(events[2], (980, Event::Repeat));
        assert_eq!(events[3], (1130, Event::Repeat));
        assert_eq!(events[4], (1280, Event::Repeat));
        assert_eq!(events.len(), 5);
    }

    #[test]
    fn fast_tapping_yields_alternating_events() {
        let mut d = Debouncer::new();
        let mut events = Vec::new();
        // 40ms on, 40ms off: each edge settles inside its own half period
        for t in (0..800).step_by(5) {
            let pressed = (t / 40) % 2 == 0;
            events.extend(d.poll(pressed, Millis(t)));
        }
        assert_eq!(events.len(), 20);
        for pair in events.chunks(2) {
            assert_eq!(pair, [Event::Press, Event::Release]);
        }
    }

    #[test]
    fn debouncing_flag_tracks_candidate() {
        let mut d = Debouncer::new();
        d.poll(true, Millis(0));
        assert!(d.is_debouncing());
        d.poll(true, Millis(30));
        assert!(!d.is_debouncing());
    }

    struct FakePin(bool);

    impl embedded_hal::digital::ErrorType for FakePin {
        type Error = Infallible;
    }

    impl InputPin for FakePin {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(!self.0)
        }
        fn is_low(&mut self) -> Result<bool, Infallible> {
            Ok(self.0)
        }
    }

    #[test]
    fn button_reads_active_low_pin() {
        let mut b = Button::new(FakePin(true));
        assert_eq!(b.poll(Millis(0)), None);
        assert!(b.is_debouncing());
        assert_eq!(b.poll(Millis(40)), Some(Event::Press));
    }
}
