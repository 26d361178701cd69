// Semantic actions decoupled from physical keys.
//
// The security state machine and the config menu match on Action,
// never on Key. KeyMapper translates keypad events into actions; the
// letter column doubles as a navigation cluster inside the menu.

use crate::keypad::{Key, KeyEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// A digit of a passcode or a typed value
    Digit(u8),
    /// Confirm an entry / save (#)
    Submit,
    /// Wipe the entry / lock / cancel (*)
    Clear,
    /// Previous menu item (A)
    Up,
    /// Next menu item (B)
    Down,
    /// Lower the selected value (C)
    Decrease,
    /// Raise the selected value (D)
    Increase,
}

/// Semantic input event, mirrors `KeyEvent` but carries `Action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionEvent {
    Press(Action),
    Release(Action),
    Hold(Action),
}

impl ActionEvent {
    pub fn action(self) -> Action {
        match self {
            Self::Press(a) | Self::Release(a) | Self::Hold(a) => a,
        }
    }

    pub fn is_press(self) -> bool {
        matches!(self, Self::Press(_))
    }
}

pub struct KeyMapper;

impl KeyMapper {
    pub const fn new() -> Self {
        Self
    }

    pub const fn map_key(&self, key: Key) -> Action {
        match key {
            Key::Digit(d) => Action::Digit(d),
            Key::Hash => Action::Submit,
            Key::Star => Action::Clear,
            Key::A => Action::Up,
            Key::B => Action::Down,
            Key::C => Action::Decrease,
            Key::D => Action::Increase,
        }
    }

    pub fn map_event(&self, event: KeyEvent) -> ActionEvent {
        match event {
            KeyEvent::Pressed(k) => ActionEvent::Press(self.map_key(k)),
            KeyEvent::Released(k) => ActionEvent::Release(self.map_key(k)),
            KeyEvent::Held(k) => ActionEvent::Hold(self.map_key(k)),
        }
    }
}

impl Default for KeyMapper {
    fn default() -> Self {
        Self::new()
    }
}
