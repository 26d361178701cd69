//! GPIO |     Function      |      Notes
//! -----+-------------------+----------------------------------
//!  0   | ADC1 - LDR        | 3V3 - LDR - node - 10K - GND
//!  1   | HC-SR04 ECHO      | 5V echo through a 1K/2K divider, both edges IRQ
//!  3   | HC-SR04 TRIG      | 10us high pulse starts a measurement
//!  4   | I2C0 SDA          | LCD backpack 0x27, keypad PCF8574 0x20, 24C32 0x50
//!  5   | I2C0 SCL          | 100kHz, 4.7K pullups on the LCD backpack
//!  6   | 74HC595 DATA      | SER of the first register in the chain
//!  7   | 74HC595 CLOCK     | SRCLK shared by all three registers
//!  8   | Status LED        | On-board LED (strapping pin, output after boot)
//!  9   | Button            | On-board BOOT button, active LOW, internal pullup
//! 10   | 74HC595 LATCH     | RCLK shared by all three registers
//! 20   | Buzzer            | Active buzzer through an NPN, HIGH = sound

// ----- Sensors -----
pub const LDR_ADC: u8 = 0;
pub const ECHO: u8 = 1;
pub const TRIG: u8 = 3;

// ----- I2C Bus (shared: LCD + keypad + EEPROM) -----
pub const I2C_SDA: u8 = 4;
pub const I2C_SCL: u8 = 5;
pub const I2C_FREQ_KHZ: u32 = 100;

// ----- Shift register chain (segments, digits + LEDs, stepper coils) -----
pub const SR_DATA: u8 = 6;
pub const SR_CLOCK: u8 = 7;
pub const SR_LATCH: u8 = 10;

// ----- Direct outputs -----
pub const STATUS_LED: u8 = 8;
pub const BUZZER: u8 = 20;

// ----- Button -----
pub const BUTTON: u8 = 9; // Digital, active LOW
