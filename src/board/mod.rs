//! Sprout workshop board support
//!
//! ESP32-C3 devkit plus the workshop shield: HC-SR04, LDR, buzzer, a
//! 16x2 I2C LCD, a 4x4 keypad behind a PCF8574, a 24C32 EEPROM, and a
//! chain of three 74HC595s driving a 4-digit 7-segment display, four
//! indicator LEDs and a 28BYJ-48 stepper (ULN2003).
//!
//! Everything on I2C shares one bus through `RefCellDevice`; the bus
//! itself lives in a `StaticCell` so the devices can be `'static`.

pub mod irq;
pub mod pins;

pub use irq::SharedInput;

use core::cell::RefCell;

use embedded_hal_bus::i2c::RefCellDevice;
use esp_hal::{
    Blocking,
    analog::adc::{Adc, AdcCalCurve, AdcConfig, AdcPin, Attenuation},
    delay::Delay,
    gpio::{Input, InputConfig, Io, Level, Output, OutputConfig, Pull},
    i2c::master::{Config as I2cConfig, I2c},
    peripherals::{ADC1, GPIO0, Peripherals},
    time::Rate,
};
use static_cell::StaticCell;

use sprout_kernel::segment::ShiftRegister;

// Type Aliases
pub type I2cBus = I2c<'static, Blocking>;
pub type I2cDev = RefCellDevice<'static, I2cBus>;
pub type Chain = ShiftRegister<Output<'static>, Output<'static>, Output<'static>>;

static I2C_BUS: StaticCell<RefCell<I2cBus>> = StaticCell::new();

const TRIG_PULSE_US: u32 = 10;

// Hardware Bundles
/// Analog light sensor and the ultrasonic trigger line.
pub struct SensorHw {
    pub adc: Adc<'static, ADC1<'static>, Blocking>,
    pub light: AdcPin<GPIO0<'static>, ADC1<'static>, AdcCalCurve<ADC1<'static>>>,
    pub trig: Output<'static>,
}

impl SensorHw {
    /// Read the LDR divider in calibrated millivolts.
    pub fn read_light_mv(&mut self) -> u16 {
        nb::block!(self.adc.read_oneshot(&mut self.light)).unwrap_or(0)
    }

    /// Start an HC-SR04 measurement; the echo arrives via the GPIO IRQ.
    pub fn pulse_trig(&mut self, delay: &Delay) {
        self.trig.set_high();
        delay.delay_micros(TRIG_PULSE_US);
        self.trig.set_low();
    }
}

/// Directly driven outputs and the shift-register chain.
pub struct OutputHw {
    pub chain: Chain,
    pub status_led: Output<'static>,
    pub buzzer: Output<'static>,
}

/// Complete board hardware, ready for driver initialization.
pub struct Board {
    pub sensors: SensorHw,
    pub outputs: OutputHw,
    pub button: SharedInput,
    i2c: &'static RefCell<I2cBus>,
}

impl Board {
    pub fn init(p: Peripherals) -> Self {
        // GPIO interrupt for button and echo edges
        let mut io = Io::new(p.IO_MUX);
        io.set_interrupt_handler(irq::gpio_handler);

        let button = Input::new(p.GPIO9, InputConfig::default().with_pull(Pull::Up));
        let echo = Input::new(p.GPIO1, InputConfig::default().with_pull(Pull::Down));
        irq::install(button, echo);

        // LDR on ADC1 with 11dB attenuation for the full 0-2.5V span
        let mut adc_cfg = AdcConfig::new();
        let light =
            adc_cfg.enable_pin_with_cal::<_, AdcCalCurve<ADC1>>(p.GPIO0, Attenuation::_11dB);
        let adc = Adc::new(p.ADC1, adc_cfg);
        let trig = Output::new(p.GPIO3, Level::Low, OutputConfig::default());

        // 74HC595 chain; latch idles high
        let chain = ShiftRegister::new(
            Output::new(p.GPIO6, Level::Low, OutputConfig::default()),
            Output::new(p.GPIO7, Level::Low, OutputConfig::default()),
            Output::new(p.GPIO10, Level::High, OutputConfig::default()),
        );
        let status_led = Output::new(p.GPIO8, Level::Low, OutputConfig::default());
        let buzzer = Output::new(p.GPIO20, Level::Low, OutputConfig::default());

        // I2C bus
        let i2c_cfg = I2cConfig::default().with_frequency(Rate::from_khz(pins::I2C_FREQ_KHZ));
        let i2c = I2c::new(p.I2C0, i2c_cfg)
            .unwrap()
            .with_sda(p.GPIO4)
            .with_scl(p.GPIO5);
        let i2c: &'static RefCell<I2cBus> = I2C_BUS.init(RefCell::new(i2c));

        Board {
            sensors: SensorHw { adc, light, trig },
            outputs: OutputHw {
                chain,
                status_led,
                buzzer,
            },
            button: SharedInput::button(),
            i2c,
        }
    }

    /// A handle on the shared I2C bus for one more device.
    pub fn i2c_device(&self) -> I2cDev {
        RefCellDevice::new(self.i2c)
    }
}
