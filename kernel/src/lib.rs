// Cooperative kernel for the sprout workshop board
// Single core, no preemption. One thread, one 1ms tick.
//
// Every activity (display multiplexing, motor stepping, input scan,
// ranging, alarm cadence, LCD refresh) owns a Periodic timer in the
// TaskTable; due activities become Jobs, drained by priority from the
// Scheduler. State machines take `now` explicitly so they never read
// the clock themselves.

#![cfg_attr(not(test), no_std)]

pub mod alarm;
pub mod blink;
pub mod clock;
pub mod config;
pub mod controller;
pub mod dashboard;
pub mod eeprom;
pub mod fmt;
pub mod input;
pub mod keymap;
pub mod keypad;
pub mod lcd;
pub mod menu;
pub mod periodic;
pub mod poll;
pub mod ranging;
pub mod scheduler;
pub mod security;
pub mod segment;
pub mod sensors;
pub mod stepper;
pub mod tasks;

pub use clock::{Millis, WakeFlags, try_wake};
pub use periodic::{Deadline, Periodic};
pub use scheduler::{Job, Priority, Scheduler};
pub use tasks::TaskTable;
