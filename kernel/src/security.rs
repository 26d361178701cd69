//! Passcode lock
//!
//! ```text
//!            digit                 # (match)
//!   Locked ───────▶ Entering ─────────────▶ Unlocked
//!     ▲  ▲             │ * / timeout           │ * / relock timer
//!     │  └─────────────┘                       │
//!     │◀───────────────────────────────────────┘
//!     │        # (mismatch, attempts left)
//!     │◀─────── Entering
//!     │        # (mismatch, last attempt)
//!     └─ lockout timer ── LockedOut ◀── Entering
//! ```
//!
//! All timing is driven by `tick(now)`; nothing here reads the clock.

use core::fmt::{self, Write};

use crate::clock::Millis;
use crate::fmt::StackFmt;
use crate::keymap::Action;
use crate::periodic::Deadline;

pub const MIN_CODE_LEN: usize = 4;
pub const MAX_CODE_LEN: usize = 8;

/// `len` stars, for echoing a code without showing it.
pub fn mask(len: usize) -> StackFmt<MAX_CODE_LEN> {
    let mut out = StackFmt::new();
    for _ in 0..len.min(MAX_CODE_LEN) {
        let _ = out.write_char('*');
    }
    out
}

/// A numeric passcode of 4 to 8 digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Passcode {
    digits: [u8; MAX_CODE_LEN],
    len: u8,
}

impl Passcode {
    /// Returns `None` unless every entry is a digit and the length is in range.
    pub fn new(digits: &[u8]) -> Option<Self> {
        if digits.len() < MIN_CODE_LEN
            || digits.len() > MAX_CODE_LEN
            || digits.iter().any(|&d| d > 9)
        {
            return None;
        }
        let mut out = [0u8; MAX_CODE_LEN];
        out[..digits.len()].copy_from_slice(digits);
        Some(Self {
            digits: out,
            len: digits.len() as u8,
        })
    }

    pub const fn factory() -> Self {
        Self {
            digits: [1, 2, 3, 4, 0, 0, 0, 0],
            len: 4,
        }
    }

    pub fn digits(&self) -> &[u8] {
        &self.digits[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    // touches every slot regardless of where the first mismatch is
    fn matches(&self, entry: &[u8]) -> bool {
        let mut diff = (self.len as usize ^ entry.len()) as u8;
        for i in 0..MAX_CODE_LEN {
            let given = entry.get(i).copied().unwrap_or(0);
            diff |= self.digits[i] ^ given;
        }
        diff == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub max_attempts: u8,
    pub lockout_ms: u32,
    pub entry_timeout_ms: u32,
    /// 0 = stay unlocked until locked by hand
    pub relock_ms: u32,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            lockout_ms: 30_000,
            entry_timeout_ms: 10_000,
            relock_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Locked,
    Entering,
    Unlocked,
    LockedOut,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            State::Locked => "LOCKED",
            State::Entering => "ENTER CODE",
            State::Unlocked => "UNLOCKED",
            State::LockedOut => "LOCKED OUT",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEvent {
    Unlocked,
    Relocked,
    WrongCode { remaining: u8 },
    LockedOut,
    LockoutOver,
    EntryTimedOut,
}

pub struct Lock {
    state: State,
    passcode: Passcode,
    policy: Policy,
    entry: [u8; MAX_CODE_LEN],
    entry_len: usize,
    last_key: Millis,
    unlocked_at: Millis,
    lockout: Deadline,
    failures: u8,
}

impl Lock {
    pub fn new(passcode: Passcode, policy: Policy) -> Self {
        Self {
            state: State::Locked,
            passcode,
            policy,
            entry: [0u8; MAX_CODE_LEN],
            entry_len: 0,
            last_key: Millis::ZERO,
            unlocked_at: Millis::ZERO,
            lockout: Deadline::disarmed(),
            failures: 0,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_unlocked(&self) -> bool {
        self.state == State::Unlocked
    }

    pub fn entry_len(&self) -> usize {
        self.entry_len
    }

    /// One '*' per digit typed so far.
    pub fn masked_entry(&self) -> StackFmt<MAX_CODE_LEN> {
        mask(self.entry_len)
    }

    pub fn attempts_left(&self) -> u8 {
        self.policy.max_attempts.saturating_sub(self.failures)
    }

    pub fn lockout_remaining_secs(&self, now: Millis) -> u32 {
        self.lockout.remaining(now).div_ceil(1000)
    }

    pub fn set_passcode(&mut self, passcode: Passcode) {
        self.passcode = passcode;
    }

    pub fn set_policy(&mut self, policy: Policy) {
        self.policy = policy;
    }

    /// Restart the relock countdown (e.g. while the config menu is open).
    pub fn keep_open(&mut self, now: Millis) {
        if self.state == State::Unlocked {
            self.unlocked_at = now;
        }
    }

    pub fn on_action(&mut self, action: Action, now: Millis) -> Option<SecurityEvent> {
        match self.state {
            State::LockedOut => None,

            State::Locked => {
                if let Action::Digit(d) = action {
                    self.clear_entry();
                    self.push_digit(d, now);
                    self.enter(State::Entering);
                }
                None
            }

            State::Entering => match action {
                Action::Digit(d) => {
                    self.push_digit(d, now);
                    None
                }
                Action::Clear => {
                    self.clear_entry();
                    self.enter(State::Locked);
                    None
                }
                Action::Submit => Some(self.submit(now)),
                _ => None,
            },

            State::Unlocked => match action {
                Action::Clear => {
                    self.enter(State::Locked);
                    Some(SecurityEvent::Relocked)
                }
                _ => None,
            },
        }
    }

    pub fn tick(&mut self, now: Millis) -> Option<SecurityEvent> {
        match self.state {
            State::Entering if now.since(self.last_key) >= self.policy.entry_timeout_ms => {
                self.clear_entry();
                self.enter(State::Locked);
                Some(SecurityEvent::EntryTimedOut)
            }
            State::Unlocked
                if self.policy.relock_ms > 0
                    && now.since(self.unlocked_at) >= self.policy.relock_ms =>
            {
                self.enter(State::Locked);
                Some(SecurityEvent::Relocked)
            }
            State::LockedOut if self.lockout.expired(now) => {
                self.lockout.disarm();
                self.failures = 0;
                self.enter(State::Locked);
                Some(SecurityEvent::LockoutOver)
            }
            _ => None,
        }
    }

    fn submit(&mut self, now: Millis) -> SecurityEvent {
        let ok = self.passcode.matches(&self.entry[..self.entry_len]);
        self.clear_entry();

        if ok {
            self.failures = 0;
            self.unlocked_at = now;
            self.enter(State::Unlocked);
            return SecurityEvent::Unlocked;
        }

        self.failures = self.failures.saturating_add(1);
        if self.failures >= self.policy.max_attempts {
            self.lockout.arm(now, self.policy.lockout_ms);
            self.enter(State::LockedOut);
            SecurityEvent::LockedOut
        } else {
            self.enter(State::Locked);
            SecurityEvent::WrongCode {
                remaining: self.attempts_left(),
            }
        }
    }

    fn push_digit(&mut self, d: u8, now: Millis) {
        self.last_key = now;
        if self.entry_len < MAX_CODE_LEN {
            self.entry[self.entry_len] = d;
            self.entry_len += 1;
        }
    }

    fn clear_entry(&mut self) {
        self.entry = [0u8; MAX_CODE_LEN];
        self.entry_len = 0;
    }

    fn enter(&mut self, next: State) {
        if next != self.state {
            log::info!("security: {} -> {}", self.state, next);
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lock() -> Lock {
        Lock::new(Passcode::factory(), Policy::default())
    }

    fn type_code(l: &mut Lock, code: &[u8], now: Millis) -> Option<SecurityEvent> {
        for &d in code {
            l.on_action(Action::Digit(d), now);
        }
        l.on_action(Action::Submit, now)
    }

    #[test]
    fn mask_is_capped_at_code_length() {
        assert_eq!(mask(0).as_str(), "");
        assert_eq!(mask(3).as_str(), "***");
        assert_eq!(mask(20).len(), MAX_CODE_LEN);
    }

    #[test]
    fn passcode_validation() {
        assert!(Passcode::new(&[1, 2, 3]).is_none());
        assert!(Passcode::new(&[1, 2, 3, 4, 5, 6, 7, 8, 9]).is_none());
        assert!(Passcode::new(&[1, 2, 3, 10]).is_none());
        let p = Passcode::new(&[9, 0, 0, 1, 2]).unwrap();
        assert_eq!(p.digits(), &[9, 0, 0, 1, 2]);
        assert!(p.matches(&[9, 0, 0, 1, 2]));
        assert!(!p.matches(&[9, 0, 0, 1]));
        assert!(!p.matches(&[9, 0, 0, 1, 2, 0]));
    }

    #[test]
    fn correct_code_unlocks() {
        let mut l = lock();
        assert_eq!(l.on_action(Action::Digit(1), Millis(0)), None);
        assert_eq!(l.state(), State::Entering);
        assert_eq!(l.entry_len(), 1);
        assert_eq!(type_code(&mut l, &[2, 3, 4], Millis(10)), Some(SecurityEvent::Unlocked));
        assert!(l.is_unlocked());
    }

    #[test]
    fn wrong_codes_lock_out_then_recover() {
        let mut l = lock();
        assert_eq!(
            type_code(&mut l, &[0, 0, 0, 0], Millis(0)),
            Some(SecurityEvent::WrongCode { remaining: 2 })
        );
        assert_eq!(
            type_code(&mut l, &[0, 0, 0, 0], Millis(100)),
            Some(SecurityEvent::WrongCode { remaining: 1 })
        );
        assert_eq!(
            type_code(&mut l, &[0, 0, 0, 0], Millis(200)),
            Some(SecurityEvent::LockedOut)
        );
        assert_eq!(l.state(), State::LockedOut);

        // even the right code is ignored during lockout
        assert_eq!(type_code(&mut l, &[1, 2, 3, 4], Millis(300)), None);
        assert_eq!(l.state(), State::LockedOut);
        assert_eq!(l.lockout_remaining_secs(Millis(1200)), 29);

        assert_eq!(l.tick(Millis(30_199)), None);
        assert_eq!(l.tick(Millis(30_200)), Some(SecurityEvent::LockoutOver));
        assert_eq!(l.attempts_left(), 3);
        assert_eq!(type_code(&mut l, &[1, 2, 3, 4], Millis(31_000)), Some(SecurityEvent::Unlocked));
    }

    #[test]
    fn success_resets_failure_count() {
        let mut l = lock();
        type_code(&mut l, &[9, 9, 9, 9], Millis(0));
        type_code(&mut l, &[1, 2, 3, 4], Millis(10));
        l.on_action(Action::Clear, Millis(20));
        assert_eq!(l.attempts_left(), 3);
    }

    #[test]
    fn partial_entry_times_out() {
        let mut l = lock();
        l.on_action(Action::Digit(1), Millis(1000));
        l.on_action(Action::Digit(2), Millis(3000));
        assert_eq!(l.tick(Millis(12_999)), None);
        assert_eq!(l.tick(Millis(13_000)), Some(SecurityEvent::EntryTimedOut));
        assert_eq!(l.state(), State::Locked);
        assert_eq!(l.entry_len(), 0);
    }

    #[test]
    fn clear_wipes_entry_and_extra_digits_are_dropped() {
        let mut l = lock();
        for _ in 0..12 {
            l.on_action(Action::Digit(5), Millis(0));
        }
        assert_eq!(l.entry_len(), MAX_CODE_LEN);
        assert_eq!(l.masked_entry().as_str(), "********");
        l.on_action(Action::Clear, Millis(0));
        assert_eq!(l.state(), State::Locked);
        assert_eq!(type_code(&mut l, &[1, 2, 3, 4], Millis(5)), Some(SecurityEvent::Unlocked));
    }

    #[test]
    fn relocks_after_timeout_unless_kept_open() {
        let mut l = lock();
        type_code(&mut l, &[1, 2, 3, 4], Millis(0));
        assert_eq!(l.tick(Millis(20_000)), None);
        l.keep_open(Millis(20_000));
        assert_eq!(l.tick(Millis(30_000)), None);
        assert_eq!(l.tick(Millis(50_000)), Some(SecurityEvent::Relocked));
        assert_eq!(l.state(), State::Locked);
    }

    #[test]
    fn zero_relock_never_relocks_but_star_does() {
        let mut l = Lock::new(
            Passcode::factory(),
            Policy {
                relock_ms: 0,
                ..Policy::default()
            },
        );
        type_code(&mut l, &[1, 2, 3, 4], Millis(0));
        assert_eq!(l.tick(Millis(10_000_000)), None);
        assert_eq!(l.on_action(Action::Clear, Millis(10_000_001)), Some(SecurityEvent::Relocked));
    }

    #[test]
    fn submit_with_no_digits_is_ignored_while_locked() {
        let mut l = lock();
        assert_eq!(l.on_action(Action::Submit, Millis(0)), None);
        assert_eq!(l.attempts_left(), 3);
    }
}
