//! Botanist gateway.
//!
//! Three port-control lines, I2C and SPI. The board has no user LEDs.

use embr_common::consts::SYSFS_GPIO_ROOT;
use embr_common::pin::{Capability as C, PinDesc, PinMap};

use super::generic::{I2cDevBus, SpidevBus, SysfsDigitalPin};
use super::sysfs_gpio;
use crate::drivers::{I2cDriver, PinFactories, SpiDriver};
use crate::registry::Descriptor;

/// spidev minor of the SPI controller.
pub const SPI_DEV_MINOR: u32 = 32766;

/// Capability map of the port-control lines.
pub fn pin_map() -> PinMap {
    PinMap::new(vec![
        PinDesc::new("PA27", &["27", "PORT_ENABLE"], C::DIGITAL).digital(27),
        PinDesc::new("PA28", &["28", "PORT_FAULT"], C::DIGITAL).digital(28),
        PinDesc::new("PA29", &["29", "PORT_DETECT"], C::DIGITAL).digital(29),
    ])
}

/// Describer registered for [`Host::BotanistGw`](embr_common::host::Host::BotanistGw).
pub fn describe(_revision: u32) -> Descriptor {
    let factories = PinFactories::new().digital(SysfsDigitalPin::factory(SYSFS_GPIO_ROOT));
    Descriptor::new()
        .gpio(sysfs_gpio(pin_map(), factories))
        .i2c(|_| I2cDriver::new(I2cDevBus::factory))
        .spi(|_| SpiDriver::new(SPI_DEV_MINOR, SpidevBus::factory, None))
}
