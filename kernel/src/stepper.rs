//! Stepper motion with acceleration and deceleration
//!
//! `Ramp` produces step timing for a trapezoidal (or triangular, on short
//! moves) speed profile using David Austin's recurrence for the step
//! interval:
//!
//! ```text
//!   c0 = 0.676 * sqrt(2 / a) * 1e6          first step, us
//!   cn = c(n-1) - 2 * c(n-1) / (4n + 1)     accelerating (n > 0)
//!                                           decelerating (n < 0)
//! ```
//!
//! clamped at `1e6 / max_speed`. The profile is recomputed after every
//! step so a new target mid-move decelerates and reverses smoothly.
//!
//! `HalfStepper` turns steps into coil patterns for a 28BYJ-48 on a
//! ULN2003 driver; `Door` ties both to an open/close mechanism.

use micromath::F32Ext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    const fn delta(self) -> i32 {
        match self {
            Direction::Forward => 1,
            Direction::Backward => -1,
        }
    }
}

pub struct Ramp {
    position: i32,
    target: i32,
    /// steps/s, signed
    speed: f32,
    max_speed: f32,
    acceleration: f32,
    /// step counter within the current ramp; negative while decelerating
    n: i32,
    c0: f32,
    cn: f32,
    cmin: f32,
    interval_us: u32,
    /// None: at rest, next step may go immediately
    last_step_us: Option<u32>,
    direction: Direction,
}

impl Ramp {
    pub fn new(max_speed: f32, acceleration: f32) -> Self {
        let mut ramp = Self {
            position: 0,
            target: 0,
            speed: 0.0,
            max_speed: 1.0,
            acceleration: 1.0,
            n: 0,
            c0: 0.0,
            cn: 0.0,
            cmin: 1_000_000.0,
            interval_us: 0,
            last_step_us: None,
            direction: Direction::Forward,
        };
        ramp.set_max_speed(max_speed);
        ramp.set_acceleration(acceleration);
        ramp
    }

    pub fn set_max_speed(&mut self, steps_per_sec: f32) {
        let speed = steps_per_sec.abs().max(1.0);
        if speed == self.max_speed {
            return;
        }
        self.max_speed = speed;
        self.cmin = 1_000_000.0 / speed;
        // already ramping up: re-derive where on the ramp we are
        if self.n > 0 {
            self.n = self.steps_to_stop();
            self.compute_new_speed();
        }
    }

    pub fn set_acceleration(&mut self, steps_per_sec2: f32) {
        let accel = steps_per_sec2.abs().max(1.0);
        if accel == self.acceleration && self.c0 != 0.0 {
            return;
        }
        if self.c0 != 0.0 {
            self.n = (self.n as f32 * (self.acceleration / accel)) as i32;
        }
        self.acceleration = accel;
        self.c0 = 0.676 * sqrt(2.0 / accel) * 1_000_000.0;
    }

    pub fn move_to(&mut self, target: i32) {
        if self.target != target {
            self.target = target;
            self.compute_new_speed();
        }
    }

    pub fn move_by(&mut self, steps: i32) {
        self.move_to(self.position.saturating_add(steps));
    }

    /// Take at most one step if it is due. Returns the direction stepped.
    pub fn poll(&mut self, now_us: u32) -> Option<Direction> {
        if self.interval_us == 0 {
            return None;
        }
        // Steps are laid on a fixed grid so poll jitter does not stretch
        // the interval; more than one interval late means we stalled.
        let due = match self.last_step_us {
            Some(last) => {
                let late = now_us.wrapping_sub(last);
                if late < self.interval_us {
                    return None;
                }
                if late >= self.interval_us.saturating_mul(2) {
                    now_us
                } else {
                    last.wrapping_add(self.interval_us)
                }
            }
            None => now_us,
        };

        let dir = self.direction;
        self.position += dir.delta();
        self.last_step_us = Some(due);
        self.compute_new_speed();
        Some(dir)
    }

    /// Decelerate to a halt as quickly as the acceleration allows.
    pub fn stop(&mut self) {
        if self.speed == 0.0 {
            return;
        }
        let steps = self.steps_to_stop() + 1;
        if self.speed > 0.0 {
            self.move_by(steps);
        } else {
            self.move_by(-steps);
        }
    }

    /// Redefine the current position; any motion is abandoned.
    pub fn set_position(&mut self, position: i32) {
        self.position = position;
        self.target = position;
        self.halt();
    }

    pub fn distance_to_go(&self) -> i32 {
        self.target - self.position
    }

    pub fn position(&self) -> i32 {
        self.position
    }

    pub fn target(&self) -> i32 {
        self.target
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn interval_us(&self) -> u32 {
        self.interval_us
    }

    pub fn is_running(&self) -> bool {
        self.speed != 0.0 || self.distance_to_go() != 0
    }

    fn steps_to_stop(&self) -> i32 {
        ((self.speed * self.speed) / (2.0 * self.acceleration)) as i32
    }

    fn halt(&mut self) {
        self.interval_us = 0;
        self.speed = 0.0;
        self.n = 0;
        self.last_step_us = None;
    }

    fn compute_new_speed(&mut self) {
        let distance = self.distance_to_go();
        let steps_to_stop = self.steps_to_stop();

        if distance == 0 && steps_to_stop <= 1 {
            self.halt();
            return;
        }

        if distance > 0 {
            if self.n > 0 {
                if steps_to_stop >= distance || self.direction == Direction::Backward {
                    self.n = -steps_to_stop;
                }
            } else if self.n < 0 && steps_to_stop < distance && self.direction == Direction::Forward {
                self.n = -self.n;
            }
        } else if distance < 0 {
            if self.n > 0 {
                if steps_to_stop >= -distance || self.direction == Direction::Forward {
                    self.n = -steps_to_stop;
                }
            } else if self.n < 0 && steps_to_stop < -distance && self.direction == Direction::Backward {
                self.n = -self.n;
            }
        }

        if self.n == 0 {
            self.cn = self.c0;
            self.direction = if distance > 0 {
                Direction::Forward
            } else {
                Direction::Backward
            };
        } else {
            self.cn -= (2.0 * self.cn) / ((4 * self.n + 1) as f32);
            self.cn = self.cn.max(self.cmin);
        }
        self.n += 1;
        self.interval_us = self.cn as u32;

        let speed = 1_000_000.0 / self.cn;
        self.speed = match self.direction {
            Direction::Forward => speed,
            Direction::Backward => -speed,
        };
    }
}

// micromath's estimate is only good to a few percent; two Newton steps
// bring it to float precision
fn sqrt(x: f32) -> f32 {
    if x <= 0.0 {
        return 0.0;
    }
    let mut y = F32Ext::sqrt(x);
    for _ in 0..2 {
        y = 0.5 * (y + x / y);
    }
    y
}

/// IN1..IN4 in bits 0..3
const HALF_STEPS: [u8; 8] = [
    0b0001, 0b0011, 0b0010, 0b0110, 0b0100, 0b1100, 0b1000, 0b1001,
];

pub struct HalfStepper {
    phase: usize,
}

impl HalfStepper {
    pub const fn new() -> Self {
        Self { phase: 0 }
    }

    /// Advance one half step and return the coil nibble to drive.
    pub fn step(&mut self, dir: Direction) -> u8 {
        self.phase = match dir {
            Direction::Forward => (self.phase + 1) % HALF_STEPS.len(),
            Direction::Backward => (self.phase + HALF_STEPS.len() - 1) % HALF_STEPS.len(),
        };
        HALF_STEPS[self.phase]
    }

    pub fn current(&self) -> u8 {
        HALF_STEPS[self.phase]
    }

    /// All coils off; the phase is kept so the next step continues from it.
    pub fn release(&self) -> u8 {
        0
    }
}

impl Default for HalfStepper {
    fn default() -> Self {
        Self::new()
    }
}

const DOOR_ACCEL: f32 = 400.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorState {
    Closed,
    Opening,
    Open,
    Closing,
}

/// Door latch driven by the stepper; position 0 is closed.
pub struct Door {
    ramp: Ramp,
    coils: HalfStepper,
    open_steps: i32,
    state: DoorState,
    energized: bool,
}

impl Door {
    pub fn new(open_steps: u16, max_speed: u16) -> Self {
        Self {
            ramp: Ramp::new(max_speed as f32, DOOR_ACCEL),
            coils: HalfStepper::new(),
            open_steps: open_steps as i32,
            state: DoorState::Closed,
            energized: false,
        }
    }

    pub fn open(&mut self) {
        if matches!(self.state, DoorState::Open | DoorState::Opening) {
            return;
        }
        log::info!("door: opening");
        self.state = DoorState::Opening;
        self.ramp.move_to(self.open_steps);
    }

    pub fn close(&mut self) {
        if matches!(self.state, DoorState::Closed | DoorState::Closing) {
            return;
        }
        log::info!("door: closing");
        self.state = DoorState::Closing;
        self.ramp.move_to(0);
    }

    /// Returns a new coil nibble when the coils must change.
    pub fn poll(&mut self, now_us: u32) -> Option<u8> {
        if let Some(dir) = self.ramp.poll(now_us) {
            self.energized = true;
            return Some(self.coils.step(dir));
        }
        if self.ramp.is_running() {
            return None;
        }

        match self.state {
            DoorState::Opening => {
                log::info!("door: open");
                self.state = DoorState::Open;
            }
            DoorState::Closing => {
                log::info!("door: closed");
                self.state = DoorState::Closed;
            }
            _ => {}
        }
        if self.energized {
            self.energized = false;
            return Some(self.coils.release());
        }
        None
    }

    pub fn state(&self) -> DoorState {
        self.state
    }

    pub fn position(&self) -> i32 {
        self.ramp.position()
    }

    pub fn is_moving(&self) -> bool {
        self.ramp.is_running()
    }

    pub fn open_steps(&self) -> i32 {
        self.open_steps
    }

    /// Applies from the next move; a door already open at the old
    /// distance stays where it is until closed.
    pub fn configure(&mut self, open_steps: u16, max_speed: u16) {
        self.open_steps = open_steps as i32;
        self.ramp.set_max_speed(max_speed as f32);
    }
}
