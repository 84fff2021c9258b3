//! Handle contracts for pins, buses and LEDs.
//!
//! Drivers in `embr_hal` construct these handles through injected factories
//! and hand them out as `Arc<dyn Trait>`. The core never looks inside a
//! handle beyond [`pin::DigitalPin::fd`], which the interrupt multiplexer
//! needs to watch the pin.

pub mod bus;
pub mod led;
pub mod pin;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Resource subsystem, used for error context and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subsystem {
    /// Digital, analog and PWM pins.
    Gpio,
    /// I2C buses.
    I2c,
    /// SPI buses.
    Spi,
    /// On-board LEDs.
    Led,
    /// Interrupt multiplexer.
    Interrupt,
}

impl Subsystem {
    /// Lowercase name, used as the feature name in errors.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gpio => "gpio",
            Self::I2c => "i2c",
            Self::Spi => "spi",
            Self::Led => "led",
            Self::Interrupt => "interrupt",
        }
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
