// Millisecond uptime and wake flag signalling between ISRs and the main loop
//
// ISRs set atomic flags; main loop consumes via try_wake().
// Independent flags prevent concurrent sources from swallowing
// each other. Critical section guards riscv32imc (no atomic RMW).
// The 1ms timer ISR is the only writer of the uptime counter.

use core::cell::Cell;
use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use critical_section::Mutex;

/// Milliseconds since boot. Wraps after ~49.7 days; all comparisons
/// go through `since`, which is wrap-safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Millis(pub u32);

impl Millis {
    pub const ZERO: Millis = Millis(0);

    /// Milliseconds elapsed from `earlier` to `self`.
    #[inline]
    pub const fn since(self, earlier: Millis) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    #[inline]
    pub const fn add(self, ms: u32) -> Millis {
        Millis(self.0.wrapping_add(ms))
    }

    /// True once `self` has reached or passed `deadline`, assuming the
    /// two are less than half the counter range apart.
    #[inline]
    pub const fn reached(self, deadline: Millis) -> bool {
        self.0.wrapping_sub(deadline.0) < u32::MAX / 2
    }

    pub const fn as_secs(self) -> u32 {
        self.0 / 1000
    }
}

impl fmt::Display for Millis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}s", self.0 / 1000, self.0 % 1000)
    }
}

static WAKE_TIMER: AtomicBool = AtomicBool::new(false);
static WAKE_BUTTON: AtomicBool = AtomicBool::new(false);
static WAKE_ECHO: AtomicBool = AtomicBool::new(false);

static ECHO_READY: AtomicBool = AtomicBool::new(false);
static ECHO_PULSE_US: AtomicU32 = AtomicU32::new(0);

// cs: riscv32imc has no atomic add
static UPTIME_MS: Mutex<Cell<u32>> = Mutex::new(Cell::new(0));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeFlags {
    pub timer: bool,
    pub button: bool,
    pub echo: bool,
}

impl WakeFlags {
    /// A GPIO edge arrived, as opposed to a plain tick.
    #[inline]
    pub fn has_input(&self) -> bool {
        self.button || self.echo
    }
}

fn take_wake_flags() -> Option<WakeFlags> {
    critical_section::with(|_| {
        let timer = WAKE_TIMER.load(Ordering::Relaxed);
        let button = WAKE_BUTTON.load(Ordering::Relaxed);
        let echo = WAKE_ECHO.load(Ordering::Relaxed);

        if !timer && !button && !echo {
            return None;
        }

        if timer {
            WAKE_TIMER.store(false, Ordering::Relaxed);
        }
        if button {
            WAKE_BUTTON.store(false, Ordering::Relaxed);
        }
        if echo {
            WAKE_ECHO.store(false, Ordering::Relaxed);
        }

        Some(WakeFlags {
            timer,
            button,
            echo,
        })
    })
}

/// Called from the 1ms periodic timer interrupt.
#[inline]
pub fn signal_timer() {
    WAKE_TIMER.store(true, Ordering::Release);
    critical_section::with(|cs| {
        let ms = UPTIME_MS.borrow(cs);
        ms.set(ms.get().wrapping_add(1));
    });
}

#[inline]
pub fn signal_button() {
    WAKE_BUTTON.store(true, Ordering::Release);
}

/// Called from the GPIO interrupt once the echo line falls, with the
/// measured high time in microseconds.
#[inline]
pub fn signal_echo(pulse_us: u32) {
    ECHO_PULSE_US.store(pulse_us, Ordering::Relaxed);
    ECHO_READY.store(true, Ordering::Release);
    WAKE_ECHO.store(true, Ordering::Release);
}

/// Latest echo pulse, consumed on read.
pub fn take_echo() -> Option<u32> {
    critical_section::with(|_| {
        if ECHO_READY.load(Ordering::Acquire) {
            ECHO_READY.store(false, Ordering::Relaxed);
            Some(ECHO_PULSE_US.load(Ordering::Relaxed))
        } else {
            None
        }
    })
}

pub fn now() -> Millis {
    critical_section::with(|cs| Millis(UPTIME_MS.borrow(cs).get()))
}

pub fn uptime_secs() -> u32 {
    now().as_secs()
}

#[inline]
pub fn wait_for_interrupt() {
    #[cfg(target_arch = "riscv32")]
    unsafe {
        core::arch::asm!("wfi", options(nomem, nostack));
    }

    #[cfg(all(not(target_arch = "riscv32"), test))]
    {
        std::thread::yield_now();
    }
}

pub fn try_wake() -> Option<WakeFlags> {
    take_wake_flags()
}
