// Config menu on the LCD, driven from the keypad.
//
//   A/B   previous/next item      C/D   decrease/increase
//   0-9   type a new passcode (passcode item only)
//   #     save everything         *     cancel (or wipe typed digits)
//
// Edits go to a draft; nothing takes effect until saved. 20s without a
// key abandons the draft.

use core::fmt::Write as _;

use crate::clock::Millis;
use crate::config::{
    Config, DOOR_MAX, DOOR_MIN, FAR_MAX, NEAR_MAX, NEAR_MIN, PAGE_MAX, RELOCK_MAX, SPEED_MAX,
    SPEED_MIN,
};
use crate::fmt::StackFmt;
use crate::keymap::Action;
use crate::security::{MAX_CODE_LEN, MIN_CODE_LEN, Passcode, mask};

const IDLE_TIMEOUT_MS: u32 = 20_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Item {
    NearCm,
    FarCm,
    Beep,
    RelockSecs,
    MotorSpeed,
    DoorSteps,
    PageSecs,
    Passcode,
}

const ITEMS: [Item; 8] = [
    Item::NearCm,
    Item::FarCm,
    Item::Beep,
    Item::RelockSecs,
    Item::MotorSpeed,
    Item::DoorSteps,
    Item::PageSecs,
    Item::Passcode,
];

impl Item {
    pub const fn label(self) -> &'static str {
        match self {
            Item::NearCm => "Near alarm",
            Item::FarCm => "Far alarm",
            Item::Beep => "Beeper",
            Item::RelockSecs => "Auto relock",
            Item::MotorSpeed => "Motor speed",
            Item::DoorSteps => "Door travel",
            Item::PageSecs => "Page rotate",
            Item::Passcode => "New passcode",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuOutcome {
    Save(Config),
    Cancel,
}

pub struct Menu {
    draft: Config,
    selected: usize,
    code: [u8; MAX_CODE_LEN],
    code_len: usize,
    rejected: bool,
    last_input: Millis,
}

impl Menu {
    pub fn open(current: Config, now: Millis) -> Self {
        log::info!("menu: open");
        Self {
            draft: current,
            selected: 0,
            code: [0; MAX_CODE_LEN],
            code_len: 0,
            rejected: false,
            last_input: now,
        }
    }

    pub fn selected(&self) -> Item {
        ITEMS[self.selected]
    }

    pub fn draft(&self) -> &Config {
        &self.draft
    }

    pub fn on_action(&mut self, action: Action, now: Millis) -> Option<MenuOutcome> {
        self.last_input = now;
        self.rejected = false;
        match action {
            Action::Up => {
                self.selected = if self.selected == 0 {
                    ITEMS.len() - 1
                } else {
                    self.selected - 1
                };
                None
            }
            Action::Down => {
                self.selected = (self.selected + 1) % ITEMS.len();
                None
            }
            Action::Increase => {
                self.increment();
                None
            }
            Action::Decrease => {
                self.decrement();
                None
            }
            Action::Digit(d) => {
                if self.selected() == Item::Passcode && self.code_len < MAX_CODE_LEN {
                    self.code[self.code_len] = d;
                    self.code_len += 1;
                }
                None
            }
            Action::Clear => {
                if self.code_len > 0 {
                    self.code_len = 0;
                    return None;
                }
                log::info!("menu: cancelled");
                Some(MenuOutcome::Cancel)
            }
            Action::Submit => self.submit(),
        }
    }

    /// Abandons the draft after a stretch without input.
    pub fn tick(&mut self, now: Millis) -> Option<MenuOutcome> {
        if now.since(self.last_input) >= IDLE_TIMEOUT_MS {
            log::info!("menu: idle timeout");
            return Some(MenuOutcome::Cancel);
        }
        None
    }

    fn submit(&mut self) -> Option<MenuOutcome> {
        if self.code_len > 0 {
            match Passcode::new(&self.code[..self.code_len]) {
                Some(code) => self.draft.passcode = code,
                None => {
                    log::warn!(
                        "menu: passcode needs {}-{} digits",
                        MIN_CODE_LEN,
                        MAX_CODE_LEN
                    );
                    self.code_len = 0;
                    self.rejected = true;
                    return None;
                }
            }
        }
        self.draft.sanitize();
        log::info!("menu: saved");
        Some(MenuOutcome::Save(self.draft))
    }

    fn increment(&mut self) {
        let item = self.selected();
        let c = &mut self.draft;
        match item {
            Item::NearCm => c.near_cm = (c.near_cm + 1).min(NEAR_MAX),
            Item::FarCm => c.far_cm = (c.far_cm + 5).min(FAR_MAX),
            Item::Beep => c.beep_enabled = !c.beep_enabled,
            Item::RelockSecs => c.relock_secs = (c.relock_secs + 10).min(RELOCK_MAX),
            Item::MotorSpeed => c.motor_speed = (c.motor_speed + 50).min(SPEED_MAX),
            Item::DoorSteps => c.door_steps = (c.door_steps + 64).min(DOOR_MAX),
            Item::PageSecs => c.page_secs = (c.page_secs + 1).min(PAGE_MAX),
            Item::Passcode => {}
        }
        // far must stay clear of near
        c.sanitize();
    }

    fn decrement(&mut self) {
        let item = self.selected();
        let c = &mut self.draft;
        match item {
            Item::NearCm => c.near_cm = c.near_cm.saturating_sub(1).max(NEAR_MIN),
            Item::FarCm => c.far_cm = c.far_cm.saturating_sub(5),
            Item::Beep => c.beep_enabled = !c.beep_enabled,
            Item::RelockSecs => c.relock_secs = c.relock_secs.saturating_sub(10),
            Item::MotorSpeed => c.motor_speed = c.motor_speed.saturating_sub(50).max(SPEED_MIN),
            Item::DoorSteps => c.door_steps = c.door_steps.saturating_sub(64).max(DOOR_MIN),
            Item::PageSecs => c.page_secs = c.page_secs.saturating_sub(1),
            Item::Passcode => {}
        }
        c.sanitize();
    }

    pub fn render(&self) -> [StackFmt<16>; 2] {
        let mut top = StackFmt::new();
        let mut bottom = StackFmt::new();
        let item = self.selected();
        let _ = write!(top, "{}/{} {}", self.selected + 1, ITEMS.len(), item.label());

        let c = &self.draft;
        let _ = match item {
            Item::NearCm => write!(bottom, "< {} cm >", c.near_cm),
            Item::FarCm => write!(bottom, "< {} cm >", c.far_cm),
            Item::Beep => write!(bottom, "< {} >", if c.beep_enabled { "On" } else { "Off" }),
            Item::RelockSecs if c.relock_secs == 0 => write!(bottom, "< Never >"),
            Item::RelockSecs => write!(bottom, "< {} s >", c.relock_secs),
            Item::MotorSpeed => write!(bottom, "< {} st/s >", c.motor_speed),
            Item::DoorSteps => write!(bottom, "< {} st >", c.door_steps),
            Item::PageSecs if c.page_secs == 0 => write!(bottom, "< Manual >"),
            Item::PageSecs => write!(bottom, "< {} s >", c.page_secs),
            Item::Passcode if self.rejected => write!(bottom, "4-8 digits!"),
            Item::Passcode if self.code_len == 0 => write!(bottom, "Type digits"),
            Item::Passcode => write!(bottom, "New: {}", mask(self.code_len).as_str()),
        };
        [top, bottom]
    }
}
