// firmware for the sprout workshop board (ESP32-C3)
// Hardware bring-up lives here; all behaviour is in sprout-kernel.

#![no_std]

pub mod board;
