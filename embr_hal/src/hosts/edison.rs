//! Intel Edison (Arduino breakout numbering).

use embr_common::consts::{SYSFS_GPIO_ROOT, SYSFS_LED_ROOT};
use embr_common::pin::{Capability as C, PinDesc, PinMap};

use super::generic::{I2cDevBus, SpidevBus, SysfsDigitalPin, SysfsLed};
use super::sysfs_gpio;
use crate::drivers::{I2cDriver, LedDriver, LedMap, PinFactories, SpiDriver};
use crate::registry::Descriptor;

/// spidev minor of the breakout SPI controller.
pub const SPI_DEV_MINOR: u32 = 0;

fn gpio(n: u32) -> PinDesc {
    let id = format!("P1_{n}");
    let num = n.to_string();
    let alias = format!("GPIO_{n}");
    PinDesc::new(&id, &[num.as_str(), alias.as_str()], C::DIGITAL).digital(n)
}

/// Capability map of the breakout header.
pub fn pin_map() -> PinMap {
    let mut pins: Vec<PinDesc> = [12, 13, 14, 15, 44, 45, 46, 47, 48, 49, 128, 129]
        .into_iter()
        .map(gpio)
        .collect();
    pins.push(PinDesc::new("P1_130", &["130", "GPIO_130", "RXD", "UART0_RXD"], C::DIGITAL | C::UART).digital(130));
    pins.push(PinDesc::new("P1_131", &["131", "GPIO_131", "TXD", "UART0_TXD"], C::DIGITAL | C::UART).digital(131));
    pins.extend([182, 183].into_iter().map(gpio));
    PinMap::new(pins)
}

/// Describer registered for [`Host::Edison`](embr_common::host::Host::Edison).
pub fn describe(_revision: u32) -> Descriptor {
    let factories = PinFactories::new().digital(SysfsDigitalPin::factory(SYSFS_GPIO_ROOT));
    Descriptor::new()
        .gpio(sysfs_gpio(pin_map(), factories))
        .i2c(|_| I2cDriver::new(I2cDevBus::factory))
        .spi(|_| SpiDriver::new(SPI_DEV_MINOR, SpidevBus::factory, None))
        .led(|_| LedDriver::new(LedMap::new(), SysfsLed::factory(SYSFS_LED_ROOT)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use embr_common::pin::Capability;

    #[test]
    fn test_pin_map() {
        let map = pin_map();
        assert_eq!(map.len(), 16);
        assert_eq!(map.lookup("GPIO_128", Capability::DIGITAL).unwrap().digital_logical, 128);
        assert_eq!(map.lookup("TXD", Capability::UART).unwrap().id, "P1_131");
        assert!(map.lookup("TXD", Capability::I2C).is_none());
    }
}
