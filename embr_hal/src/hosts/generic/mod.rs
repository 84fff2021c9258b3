//! Handle implementations shared by every Linux board.

pub mod digital_pin;
pub mod i2c;
pub mod led;
pub mod spi;

pub(crate) mod sysfs;

pub use digital_pin::SysfsDigitalPin;
pub use i2c::I2cDevBus;
pub use led::SysfsLed;
pub use spi::SpidevBus;
