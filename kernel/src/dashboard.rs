// Two-line LCD dashboard
//
// Rotates through a fixed set of pages; the button skips ahead. Code
// entry, lockout and the config menu take over the screen while they
// are active. Rendering is pure: the main loop gathers a Snapshot and
// hands the two lines to the LCD line cache.

use core::fmt::Write as _;

use crate::alarm::Zone;
use crate::clock::Millis;
use crate::fmt::StackFmt;
use crate::menu::Menu;
use crate::periodic::Periodic;
use crate::security::{MAX_CODE_LEN, State};
use crate::sensors::light_label;
use crate::stepper::DoorState;

pub type Line = StackFmt<16>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Proximity,
    Light,
    Security,
    Door,
    Uptime,
}

impl Page {
    pub const ALL: [Page; 5] = [
        Page::Proximity,
        Page::Light,
        Page::Security,
        Page::Door,
        Page::Uptime,
    ];

    pub fn next(self) -> Page {
        let idx = Self::ALL.iter().position(|&p| p == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

/// Everything a page might show, sampled once per refresh.
pub struct Snapshot<'a> {
    pub now: Millis,
    pub distance_cm: Option<u16>,
    pub zone: Zone,
    pub muted: bool,
    pub light_pct: u8,
    pub light_mv: u16,
    pub lock: State,
    /// masked digits typed so far
    pub entry: StackFmt<MAX_CODE_LEN>,
    pub attempts_left: u8,
    pub lockout_secs: u32,
    pub door: DoorState,
    pub door_pos: i32,
    pub menu: Option<&'a Menu>,
}

pub struct Dashboard {
    page: Page,
    rotate: Periodic,
    auto: bool,
}

impl Dashboard {
    pub fn new(page_secs: u8, now: Millis) -> Self {
        Self {
            page: Page::Proximity,
            rotate: Periodic::starting_at(page_secs.max(1) as u32 * 1000, now),
            auto: page_secs > 0,
        }
    }

    pub fn page(&self) -> Page {
        self.page
    }

    /// Auto-rotate; returns true when the page changed.
    pub fn tick(&mut self, now: Millis) -> bool {
        if !self.auto || !self.rotate.is_due(now) {
            return false;
        }
        self.page = self.page.next();
        true
    }

    /// Manual advance; restarts the rotation timer so the new page gets
    /// its full time on screen.
    pub fn next_page(&mut self, now: Millis) {
        self.page = self.page.next();
        self.rotate.reset(now);
        log::debug!("dashboard: page {:?}", self.page);
    }

    pub fn set_page_secs(&mut self, page_secs: u8, now: Millis) {
        self.auto = page_secs > 0;
        self.rotate.set_interval(page_secs.max(1) as u32 * 1000);
        self.rotate.reset(now);
    }

    pub fn render(&self, snap: &Snapshot<'_>) -> [Line; 2] {
        if let Some(menu) = snap.menu {
            return menu.render();
        }

        let mut top = Line::new();
        let mut bottom = Line::new();

        match snap.lock {
            State::LockedOut => {
                let _ = write!(top, "LOCKED OUT");
                let _ = write!(bottom, "Wait {}s", snap.lockout_secs);
                return [top, bottom];
            }
            State::Entering => {
                let _ = write!(top, "Enter code, #=OK");
                let _ = write!(bottom, "Code: {}", snap.entry.as_str());
                return [top, bottom];
            }
            State::Locked | State::Unlocked => {}
        }

        match self.page {
            Page::Proximity => {
                match snap.distance_cm {
                    Some(cm) => {
                        let _ = write!(top, "Dist {:>4} cm", cm);
                    }
                    None => {
                        let _ = write!(top, "Dist  --- cm");
                    }
                }
                if snap.muted {
                    let _ = write!(bottom, "{} muted", snap.zone);
                } else {
                    let _ = write!(bottom, "Zone {}", snap.zone);
                }
            }
            Page::Light => {
                let _ = write!(top, "Light {:>3}%", snap.light_pct);
                let _ = write!(bottom, "{} {}mV", light_label(snap.light_pct), snap.light_mv);
            }
            Page::Security => {
                let _ = write!(top, "Lock {}", snap.lock);
                if snap.lock == State::Unlocked {
                    let _ = write!(bottom, "*=lock A=setup");
                } else {
                    let _ = write!(bottom, "Tries left {}", snap.attempts_left);
                }
            }
            Page::Door => {
                let state = match snap.door {
                    DoorState::Closed => "closed",
                    DoorState::Opening => "opening",
                    DoorState::Open => "open",
                    DoorState::Closing => "closing",
                };
                let _ = write!(top, "Door {}", state);
                let _ = write!(bottom, "Pos {} st", snap.door_pos);
            }
            Page::Uptime => {
                let secs = snap.now.as_secs();
                let _ = write!(top, "Uptime");
                let _ = write!(
                    bottom,
                    "{}h{:02}m{:02}s",
                    secs / 3600,
                    (secs / 60) % 60,
                    secs % 60
                );
            }
        }
        [top, bottom]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn snap<'a>() -> Snapshot<'a> {
        Snapshot {
            now: Millis(3_723_000),
            distance_cm: Some(42),
            zone: Zone::Caution,
            muted: false,
            light_pct: 63,
            light_mv: 1580,
            lock: State::Locked,
            entry: StackFmt::new(),
            attempts_left: 3,
            lockout_secs: 0,
            door: DoorState::Closed,
            door_pos: 0,
            menu: None,
        }
    }

    fn lines(d: &Dashboard, s: &Snapshot<'_>) -> (String, String) {
        let [a, b] = d.render(s);
        (a.as_str().to_string(), b.as_str().to_string())
    }

    #[test]
    fn pages_rotate_on_schedule() {
        let mut d = Dashboard::new(4, Millis(0));
        assert!(!d.tick(Millis(3_999)));
        assert!(d.tick(Millis(4_000)));
        assert_eq!(d.page(), Page::Light);
        d.next_page(Millis(5_000));
        assert_eq!(d.page(), Page::Security);
        // timer restarted by the manual advance
        assert!(!d.tick(Millis(8_000)));
        assert!(d.tick(Millis(9_000)));
    }

    #[test]
    fn manual_only_when_page_secs_zero() {
        let mut d = Dashboard::new(0, Millis(0));
        assert!(!d.tick(Millis(60_000)));
        d.next_page(Millis(60_000));
        assert_eq!(d.page(), Page::Light);
        d.set_page_secs(2, Millis(60_000));
        assert!(d.tick(Millis(62_000)));
    }

    #[test]
    fn page_wraps_after_uptime() {
        assert_eq!(Page::Uptime.next(), Page::Proximity);
    }

    #[test]
    fn renders_each_page() {
        let mut d = Dashboard::new(0, Millis(0));
        let s = snap();
        assert_eq!(lines(&d, &s), ("Dist   42 cm".into(), "Zone caution".into()));
        d.next_page(Millis(0));
        assert_eq!(lines(&d, &s), ("Light  63%".into(), "bright 1580mV".into()));
        d.next_page(Millis(0));
        assert_eq!(lines(&d, &s), ("Lock LOCKED".into(), "Tries left 3".into()));
        d.next_page(Millis(0));
        assert_eq!(lines(&d, &s), ("Door closed".into(), "Pos 0 st".into()));
        d.next_page(Millis(0));
        assert_eq!(lines(&d, &s), ("Uptime".into(), "1h02m03s".into()));
    }

    #[test]
    fn no_reading_and_mute() {
        let d = Dashboard::new(0, Millis(0));
        let s = Snapshot {
            distance_cm: None,
            zone: Zone::Clear,
            muted: true,
            ..snap()
        };
        assert_eq!(lines(&d, &s), ("Dist  --- cm".into(), "clear muted".into()));
    }

    #[test]
    fn overlays_take_precedence() {
        let d = Dashboard::new(0, Millis(0));
        let s = Snapshot {
            lock: State::Entering,
            entry: crate::security::mask(3),
            ..snap()
        };
        assert_eq!(lines(&d, &s).1, "Code: ***");

        let s = Snapshot {
            lock: State::LockedOut,
            lockout_secs: 27,
            ..snap()
        };
        assert_eq!(lines(&d, &s), ("LOCKED OUT".into(), "Wait 27s".into()));

        let menu = Menu::open(Config::defaults(), Millis(0));
        let s = Snapshot {
            menu: Some(&menu),
            lock: State::Unlocked,
            ..snap()
        };
        assert_eq!(lines(&d, &s).0, "1/8 Near alarm");
    }
}
