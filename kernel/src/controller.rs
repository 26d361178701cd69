// Input routing and the state machines it drives.
//
// The button pages the dashboard on a short press and toggles the alarm
// mute on a long one. Keypad presses go to the config menu while it is
// open; otherwise 'A' on an unlocked board opens it and every other key
// goes to the lock. Unlocking opens the door, relocking closes it.
//
// Nothing here touches hardware or the scheduler: every entry point
// returns Effects and the main loop applies them.

use crate::alarm::{ProximityAlarm, Zone};
use crate::blink::{self, Pattern};
use crate::clock::Millis;
use crate::config::Config;
use crate::dashboard::{Dashboard, Snapshot};
use crate::input::Event as ButtonEvent;
use crate::keymap::{Action, ActionEvent, KeyMapper};
use crate::keypad::KeyEvent;
use crate::menu::{Menu, MenuOutcome};
use crate::scheduler::{Job, Scheduler};
use crate::security::{Lock, SecurityEvent, State};
use crate::sensors::light_percent;
use crate::stepper::{Door, DoorState};
use crate::tasks::TaskTable;

/// indicator nibble: three zone bars plus the unlocked lamp
pub const LED_UNLOCKED: u8 = 0b1000;

/// Follow-up work requested of the main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Effects {
    pub refresh_lcd: bool,
    pub save_config: bool,
    /// the door started moving and needs its 1ms motor slot
    pub start_motor: bool,
}

impl Effects {
    pub const NONE: Self = Self {
        refresh_lcd: false,
        save_config: false,
        start_motor: false,
    };

    const REFRESH: Self = Self {
        refresh_lcd: true,
        ..Self::NONE
    };

    pub fn apply(self, tasks: &mut TaskTable, sched: &mut Scheduler, now: Millis) {
        if self.start_motor {
            tasks.set_enabled(Job::StepMotor, true, now);
        }
        let wanted = [
            (self.save_config, Job::SaveConfig),
            (self.refresh_lcd, Job::RefreshLcd),
        ];
        for (want, job) in wanted {
            if want && let Err(e) = sched.push_unique(job) {
                log::warn!("controller: {}", e);
            }
        }
    }
}

pub struct Controller {
    cfg: Config,
    lock: Lock,
    alarm: ProximityAlarm,
    door: Door,
    dash: Dashboard,
    menu: Option<Menu>,
    mapper: KeyMapper,
    // the release ending a long press must not also flip the page
    long_press: bool,
}

impl Controller {
    pub fn new(cfg: Config, now: Millis) -> Self {
        let mut alarm = ProximityAlarm::new(cfg.thresholds());
        alarm.set_enabled(cfg.beep_enabled);
        Self {
            lock: Lock::new(cfg.passcode, cfg.policy()),
            alarm,
            door: Door::new(cfg.door_steps, cfg.motor_speed),
            dash: Dashboard::new(cfg.page_secs, now),
            menu: None,
            mapper: KeyMapper::new(),
            long_press: false,
            cfg,
        }
    }

    pub fn on_button(&mut self, ev: ButtonEvent, now: Millis) -> Effects {
        match ev {
            ButtonEvent::LongPress => {
                self.long_press = true;
                self.alarm.toggle_mute();
            }
            ButtonEvent::Release => {
                if !self.long_press {
                    self.dash.next_page(now);
                }
                self.long_press = false;
            }
            ButtonEvent::Press | ButtonEvent::Repeat => {}
        }
        Effects::REFRESH
    }

    /// Only presses act; releases and holds are ignored.
    pub fn on_key(&mut self, ev: KeyEvent, now: Millis) -> Effects {
        let ActionEvent::Press(action) = self.mapper.map_event(ev) else {
            return Effects::NONE;
        };
        log::debug!("input: {:?}", action);

        let mut fx = Effects::REFRESH;
        if let Some(menu) = self.menu.as_mut() {
            match menu.on_action(action, now) {
                Some(MenuOutcome::Save(cfg)) => {
                    self.menu = None;
                    self.apply_config(cfg, now);
                    fx.save_config = true;
                }
                Some(MenuOutcome::Cancel) => self.menu = None,
                None => {}
            }
        } else if self.lock.is_unlocked() && action == Action::Up {
            self.menu = Some(Menu::open(self.cfg, now));
        } else if let Some(ev) = self.lock.on_action(action, now) {
            fx.start_motor = self.on_security(ev);
        }
        fx
    }

    /// Relock, entry and lockout timers, menu idle timeout, page rotation.
    pub fn tick(&mut self, now: Millis) -> Effects {
        let mut fx = Effects::NONE;
        if self.menu.is_some() {
            self.lock.keep_open(now);
        }
        if let Some(ev) = self.lock.tick(now) {
            fx.start_motor = self.on_security(ev);
            fx.refresh_lcd = true;
        }
        if let Some(menu) = self.menu.as_mut()
            && menu.tick(now).is_some()
        {
            self.menu = None;
            fx.refresh_lcd = true;
        }
        if self.dash.tick(now) {
            fx.refresh_lcd = true;
        }
        fx
    }

    /// Push a config into every state machine that caches part of it.
    pub fn apply_config(&mut self, cfg: Config, now: Millis) {
        self.lock.set_passcode(cfg.passcode);
        self.lock.set_policy(cfg.policy());
        self.alarm.set_thresholds(cfg.thresholds());
        self.alarm.set_enabled(cfg.beep_enabled);
        self.door.configure(cfg.door_steps, cfg.motor_speed);
        self.dash.set_page_secs(cfg.page_secs, now);
        self.cfg = cfg;
    }

    /// Coil nibble to latch, if the door stepped or released.
    pub fn step_motor(&mut self, now_us: u32) -> Option<u8> {
        self.door.poll(now_us)
    }

    /// True once the door is at rest and the motor slot can be dropped.
    pub fn motor_parked(&self) -> bool {
        matches!(self.door.state(), DoorState::Open | DoorState::Closed) && !self.door.is_moving()
    }

    pub fn snapshot(&self, now: Millis, light_mv: u16) -> Snapshot<'_> {
        Snapshot {
            now,
            distance_cm: self.alarm.distance(),
            zone: self.alarm.zone(),
            muted: self.alarm.is_muted(),
            light_pct: light_percent(light_mv),
            light_mv,
            lock: self.lock.state(),
            entry: self.lock.masked_entry(),
            attempts_left: self.lock.attempts_left(),
            lockout_secs: self.lock.lockout_remaining_secs(now),
            door: self.door.state(),
            door_pos: self.door.position(),
            menu: self.menu.as_ref(),
        }
    }

    pub fn blink_pattern(&self) -> Pattern {
        match self.lock.state() {
            State::Locked => blink::HEARTBEAT,
            State::Entering => blink::FAST,
            State::Unlocked => blink::SOLID,
            State::LockedOut => blink::SLOW,
        }
    }

    pub fn leds(&self) -> u8 {
        let lamp = if self.lock.is_unlocked() { LED_UNLOCKED } else { 0 };
        zone_bar(self.alarm.zone()) | lamp
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn lock(&self) -> &Lock {
        &self.lock
    }

    pub fn alarm(&self) -> &ProximityAlarm {
        &self.alarm
    }

    pub fn alarm_mut(&mut self) -> &mut ProximityAlarm {
        &mut self.alarm
    }

    pub fn door(&self) -> &Door {
        &self.door
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dash
    }

    pub fn menu(&self) -> Option<&Menu> {
        self.menu.as_ref()
    }

    // returns true when the door was set moving
    fn on_security(&mut self, ev: SecurityEvent) -> bool {
        match ev {
            SecurityEvent::Unlocked => self.door.open(),
            SecurityEvent::Relocked => self.door.close(),
            SecurityEvent::WrongCode { .. }
            | SecurityEvent::LockedOut
            | SecurityEvent::LockoutOver
            | SecurityEvent::EntryTimedOut => return false,
        }
        true
    }
}

fn zone_bar(zone: Zone) -> u8 {
    match zone {
        Zone::Clear => 0b000,
        Zone::Caution => 0b001,
        Zone::Warning => 0b011,
        Zone::Danger => 0b111,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::Page;
    use crate::keypad::Key;
    use crate::ranging::Reading;

    fn controller() -> Controller {
        Controller::new(Config::defaults(), Millis(0))
    }

    fn press(c: &mut Controller, key: Key, now: Millis) -> Effects {
        c.on_key(KeyEvent::Pressed(key), now)
    }

    fn type_keys(c: &mut Controller, keys: &[Key], now: Millis) -> Effects {
        let mut last = Effects::NONE;
        for &k in keys {
            last = press(c, k, now);
        }
        last
    }

    fn unlock(c: &mut Controller, now: Millis) -> Effects {
        use Key::{Digit, Hash};
        type_keys(c, &[Digit(1), Digit(2), Digit(3), Digit(4), Hash], now)
    }

    #[test]
    fn short_press_pages_and_long_press_only_mutes() {
        let mut c = controller();
        c.on_button(ButtonEvent::Press, Millis(0));
        let fx = c.on_button(ButtonEvent::Release, Millis(100));
        assert!(fx.refresh_lcd);
        assert_eq!(c.dashboard().page(), Page::Light);

        c.on_button(ButtonEvent::Press, Millis(1_000));
        c.on_button(ButtonEvent::LongPress, Millis(1_800));
        c.on_button(ButtonEvent::Repeat, Millis(1_950));
        c.on_button(ButtonEvent::Release, Millis(2_000));
        assert!(c.alarm().is_muted());
        assert_eq!(c.dashboard().page(), Page::Light);

        // the long press flag does not outlive its release
        c.on_button(ButtonEvent::Press, Millis(3_000));
        c.on_button(ButtonEvent::Release, Millis(3_100));
        assert_eq!(c.dashboard().page(), Page::Security);
        assert!(c.alarm().is_muted());
    }

    #[test]
    fn menu_key_only_opens_when_unlocked() {
        let mut c = controller();
        let fx = press(&mut c, Key::A, Millis(0));
        assert!(c.menu().is_none());
        assert_eq!(c.lock().state(), State::Locked);
        assert!(!fx.start_motor);

        unlock(&mut c, Millis(10));
        press(&mut c, Key::A, Millis(20));
        assert!(c.menu().is_some());

        // while the menu is open '*' cancels it instead of relocking
        press(&mut c, Key::Digit(7), Millis(30));
        assert_eq!(c.lock().entry_len(), 0);
        let fx = press(&mut c, Key::Star, Millis(40));
        assert!(c.menu().is_none());
        assert!(c.lock().is_unlocked());
        assert!(!fx.start_motor);
    }

    #[test]
    fn unlock_opens_and_relock_closes_the_door() {
        let mut c = controller();
        let fx = unlock(&mut c, Millis(0));
        assert!(fx.start_motor);
        assert_eq!(c.door().state(), DoorState::Opening);

        let fx = press(&mut c, Key::Star, Millis(10));
        assert!(fx.start_motor);
        assert_eq!(c.lock().state(), State::Locked);
        assert_eq!(c.door().state(), DoorState::Closing);

        // a wrong code moves nothing
        use Key::{Digit, Hash};
        let fx = type_keys(&mut c, &[Digit(9), Digit(9), Digit(9), Digit(9), Hash], Millis(20));
        assert!(fx.refresh_lcd);
        assert!(!fx.start_motor);
    }

    #[test]
    fn key_releases_and_holds_are_ignored() {
        let mut c = controller();
        assert_eq!(c.on_key(KeyEvent::Released(Key::Digit(1)), Millis(0)), Effects::NONE);
        assert_eq!(c.on_key(KeyEvent::Held(Key::Digit(1)), Millis(0)), Effects::NONE);
        assert_eq!(c.lock().state(), State::Locked);
    }

    #[test]
    fn saved_config_reaches_every_state_machine() {
        use Key::{A, B, C, D, Digit, Hash, Star};
        let mut c = controller();
        unlock(&mut c, Millis(0));
        press(&mut c, A, Millis(0));

        // near +1, beeper off, relock never, door +64, manual paging, code 9876
        let fx = type_keys(
            &mut c,
            &[
                D, B, B, D, B, C, C, C, B, B, D, B, C, C, C, C, B,
                Digit(9), Digit(8), Digit(7), Digit(6), Hash,
            ],
            Millis(100),
        );
        assert!(fx.save_config);
        assert!(fx.refresh_lcd);
        assert!(c.menu().is_none());

        let cfg = *c.config();
        assert_eq!(cfg.near_cm, 11);
        assert!(!cfg.beep_enabled);
        assert_eq!(cfg.relock_secs, 0);
        assert_eq!(cfg.door_steps, 1088);
        assert_eq!(cfg.page_secs, 0);

        assert_eq!(c.alarm().thresholds(), cfg.thresholds());
        assert!(!c.alarm().is_enabled());
        assert_eq!(c.door().open_steps(), 1088);

        // no auto relock and no auto paging any more
        let fx = c.tick(Millis(600_000));
        assert_eq!(fx, Effects::NONE);
        assert!(c.lock().is_unlocked());
        assert_eq!(c.dashboard().page(), Page::Proximity);

        // only the new passcode opens the lock
        press(&mut c, Star, Millis(600_000));
        type_keys(&mut c, &[Digit(1), Digit(2), Digit(3), Digit(4), Hash], Millis(600_010));
        assert!(!c.lock().is_unlocked());
        type_keys(&mut c, &[Digit(9), Digit(8), Digit(7), Digit(6), Hash], Millis(600_020));
        assert!(c.lock().is_unlocked());
    }

    #[test]
    fn motor_slot_follows_door_motion() {
        let mut c = controller();
        let mut tasks = TaskTable::new();
        let mut sched = Scheduler::new();
        tasks.set_enabled(Job::StepMotor, false, Millis(0));
        assert!(c.motor_parked());

        let fx = unlock(&mut c, Millis(100));
        fx.apply(&mut tasks, &mut sched, Millis(100));
        assert!(!c.motor_parked());
        let mut queued = Vec::new();
        while let Some(job) = sched.pop() {
            queued.push(job);
        }
        assert_eq!(queued, vec![Job::RefreshLcd]);
        tasks.schedule(Millis(101), &mut sched);
        assert!(core::iter::from_fn(|| sched.pop()).any(|j| j == Job::StepMotor));

        let mut released = None;
        let mut t = 0;
        while !c.motor_parked() && t < 20_000_000 {
            if let Some(coils) = c.step_motor(t) {
                released = Some(coils);
            }
            t += 1_000;
        }
        assert_eq!(c.door().state(), DoorState::Open);
        assert_eq!(c.door().position(), 1024);
        assert_eq!(released, Some(0));
    }

    #[test]
    fn open_menu_holds_the_relock_timer() {
        let mut c = controller();
        unlock(&mut c, Millis(0));
        press(&mut c, Key::A, Millis(0));

        assert!(!c.tick(Millis(10_000)).start_motor);
        assert!(c.menu().is_some());
        // menu idle timeout closes it, the relock countdown restarts here
        let fx = c.tick(Millis(20_000));
        assert!(fx.refresh_lcd);
        assert!(c.menu().is_none());

        assert!(!c.tick(Millis(45_000)).start_motor);
        assert!(c.lock().is_unlocked());
        let fx = c.tick(Millis(50_000));
        assert!(fx.start_motor);
        assert_eq!(c.door().state(), DoorState::Closing);
    }

    #[test]
    fn snapshot_and_indicators_follow_state() {
        let mut c = controller();
        assert_eq!(c.blink_pattern(), blink::HEARTBEAT);
        assert_eq!(c.leds(), 0);

        type_keys(&mut c, &[Key::Digit(1), Key::Digit(2)], Millis(0));
        let snap = c.snapshot(Millis(0), 1580);
        assert_eq!(snap.lock, State::Entering);
        assert_eq!(snap.entry.as_str(), "**");
        assert_eq!(c.dashboard().render(&snap)[1].as_str(), "Code: **");
        assert_eq!(c.blink_pattern(), blink::FAST);

        type_keys(&mut c, &[Key::Digit(3), Key::Digit(4), Key::Hash], Millis(0));
        c.alarm_mut().update(Reading::Distance(5));
        assert_eq!(c.blink_pattern(), blink::SOLID);
        assert_eq!(c.leds(), LED_UNLOCKED | 0b111);
    }
}
