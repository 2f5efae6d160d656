//! HD44780 LCD module.
//!
//! Drives character displays wired to the I2C bus through a PCF8574 port
//! expander, the "I2C backpack" commonly soldered onto 16x2 and 20x4
//! modules. The expander register is treated as write-only: the busy flag is
//! never polled, timing is satisfied with fixed settling delays instead.

pub mod driver;
