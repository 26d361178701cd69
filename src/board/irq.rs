// GPIO interrupt: button edges and HC-SR04 echo timing.
//
// Both inputs live in statics so the handler can acknowledge them. The
// echo edge timestamps come from the system timer in microseconds; the
// falling edge hands the pulse width to the kernel via signal_echo.
// The main loop reads the button through SharedInput, which borrows the
// same static for a level read.

use core::cell::{Cell, RefCell};
use core::convert::Infallible;

use critical_section::Mutex;
use esp_hal::gpio::{Event, Input};
use esp_hal::time::Instant;

use sprout_kernel::clock::{signal_button, signal_echo};

pub(crate) static BUTTON: Mutex<RefCell<Option<Input<'static>>>> = Mutex::new(RefCell::new(None));
pub(crate) static ECHO: Mutex<RefCell<Option<Input<'static>>>> = Mutex::new(RefCell::new(None));
static ECHO_RISE_US: Mutex<Cell<Option<u64>>> = Mutex::new(Cell::new(None));

pub(crate) fn install(mut button: Input<'static>, mut echo: Input<'static>) {
    critical_section::with(|cs| {
        button.listen(Event::AnyEdge);
        echo.listen(Event::AnyEdge);
        BUTTON.borrow_ref_mut(cs).replace(button);
        ECHO.borrow_ref_mut(cs).replace(echo);
    });
}

pub fn micros() -> u64 {
    Instant::now().duration_since_epoch().as_micros()
}

#[esp_hal::handler(priority = esp_hal::interrupt::Priority::Priority2)]
pub(crate) fn gpio_handler() {
    let mut pulse = None;
    let mut button_edge = false;

    critical_section::with(|cs| {
        if let Some(echo) = ECHO.borrow_ref_mut(cs).as_mut()
            && echo.is_interrupt_set()
        {
            echo.clear_interrupt();
            let t = micros();
            let rise = ECHO_RISE_US.borrow(cs);
            if echo.is_high() {
                rise.set(Some(t));
            } else if let Some(start) = rise.take() {
                pulse = Some(u32::try_from(t.saturating_sub(start)).unwrap_or(u32::MAX));
            }
        }

        if let Some(button) = BUTTON.borrow_ref_mut(cs).as_mut()
            && button.is_interrupt_set()
        {
            button.clear_interrupt();
            button_edge = true;
        }
    });

    if let Some(us) = pulse {
        signal_echo(us);
    }
    if button_edge {
        signal_button();
    }
}

/// Level reads of the interrupt-owned button pin.
pub struct SharedInput {
    pin: &'static Mutex<RefCell<Option<Input<'static>>>>,
}

impl SharedInput {
    pub(crate) const fn button() -> Self {
        Self { pin: &BUTTON }
    }
}

impl embedded_hal::digital::ErrorType for SharedInput {
    type Error = Infallible;
}

impl embedded_hal::digital::InputPin for SharedInput {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(critical_section::with(|cs| {
            self.pin
                .borrow_ref(cs)
                .as_ref()
                .is_some_and(|p| p.is_high())
        }))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(critical_section::with(|cs| {
            self.pin
                .borrow_ref(cs)
                .as_ref()
                .is_some_and(|p| p.is_low())
        }))
    }
}
