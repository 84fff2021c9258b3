//! Raspberry Pi (26-pin P1 header).
//!
//! Revision 0002/0003 boards route GPIO 0/1/21 where later boards route
//! GPIO 2/3/27, and expose I2C bus 0 on the header instead of bus 1.

use embr_common::consts::{SYSFS_GPIO_ROOT, SYSFS_LED_ROOT};
use embr_common::pin::{Capability as C, PinDesc, PinMap};

use super::generic::{I2cDevBus, SpidevBus, SysfsDigitalPin, SysfsLed};
use super::sysfs_gpio;
use crate::drivers::{I2cDriver, LedDriver, LedMap, PinFactories, SpiDriver};
use crate::registry::Descriptor;

/// spidev minor of the header SPI controller.
pub const SPI_DEV_MINOR: u32 = 0;

fn common_pins() -> Vec<PinDesc> {
    vec![
        PinDesc::new("P1_7", &["4", "GPIO_4", "GPCLK0"], C::DIGITAL).digital(4),
        PinDesc::new("P1_8", &["14", "GPIO_14", "TXD", "UART0_TXD"], C::DIGITAL | C::UART).digital(14),
        PinDesc::new("P1_10", &["15", "GPIO_15", "RXD", "UART0_RXD"], C::DIGITAL | C::UART).digital(15),
        PinDesc::new("P1_11", &["17", "GPIO_17"], C::DIGITAL).digital(17),
        PinDesc::new("P1_12", &["18", "GPIO_18", "PCM_CLK"], C::DIGITAL).digital(18),
        PinDesc::new("P1_15", &["22", "GPIO_22"], C::DIGITAL).digital(22),
        PinDesc::new("P1_16", &["23", "GPIO_23"], C::DIGITAL).digital(23),
        PinDesc::new("P1_18", &["24", "GPIO_24"], C::DIGITAL).digital(24),
        PinDesc::new("P1_19", &["10", "GPIO_10", "MOSI", "SPI0_MOSI"], C::DIGITAL | C::SPI).digital(10),
        PinDesc::new("P1_21", &["9", "GPIO_9", "MISO", "SPI0_MISO"], C::DIGITAL | C::SPI).digital(9),
        PinDesc::new("P1_22", &["25", "GPIO_25"], C::DIGITAL).digital(25),
        PinDesc::new("P1_23", &["11", "GPIO_11", "SCLK", "SPI0_SCLK"], C::DIGITAL | C::SPI).digital(11),
        PinDesc::new("P1_24", &["8", "GPIO_8", "CE0", "SPI0_CE0_N"], C::DIGITAL | C::SPI).digital(8),
        PinDesc::new("P1_26", &["7", "GPIO_7", "CE1", "SPI0_CE1_N"], C::DIGITAL | C::SPI).digital(7),
    ]
}

/// Whether `revision` is one of the first-generation boards.
pub fn is_rev1(revision: u32) -> bool {
    matches!(revision, 2 | 3)
}

/// Header I2C bus for `revision`.
pub fn i2c_bus(revision: u32) -> u8 {
    if is_rev1(revision) { 0 } else { 1 }
}

/// Capability map for `revision`.
pub fn pin_map(revision: u32) -> PinMap {
    let mut pins = if is_rev1(revision) {
        vec![
            PinDesc::new("P1_3", &["0", "GPIO_0", "SDA", "I2C0_SDA"], C::DIGITAL | C::I2C).digital(0),
            PinDesc::new("P1_5", &["1", "GPIO_1", "SCL", "I2C0_SCL"], C::DIGITAL | C::I2C).digital(1),
            PinDesc::new("P1_13", &["21", "GPIO_21"], C::DIGITAL).digital(21),
        ]
    } else {
        vec![
            PinDesc::new("P1_3", &["2", "GPIO_2", "SDA", "I2C1_SDA"], C::DIGITAL | C::I2C).digital(2),
            PinDesc::new("P1_5", &["3", "GPIO_3", "SCL", "I2C1_SCL"], C::DIGITAL | C::I2C).digital(3),
            PinDesc::new("P1_13", &["27", "GPIO_27"], C::DIGITAL).digital(27),
        ]
    };
    pins.extend(common_pins());
    pins.sort_by_key(|pd| {
        pd.id
            .trim_start_matches("P1_")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    PinMap::new(pins)
}

/// On-board LEDs.
pub fn led_map() -> LedMap {
    LedMap::new().with("led0", &["0", "led0", "LED0"])
}

/// Describer registered for [`Host::RaspberryPi`](embr_common::host::Host::RaspberryPi).
pub fn describe(revision: u32) -> Descriptor {
    let factories = PinFactories::new().digital(SysfsDigitalPin::factory(SYSFS_GPIO_ROOT));
    Descriptor::new()
        .gpio(sysfs_gpio(pin_map(revision), factories))
        .i2c(|_| I2cDriver::new(I2cDevBus::factory))
        .spi(|_| SpiDriver::new(SPI_DEV_MINOR, SpidevBus::factory, None))
        .led(|_| LedDriver::new(led_map(), SysfsLed::factory(SYSFS_LED_ROOT)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use embr_common::pin::Capability;

    #[test]
    fn test_revision_selects_header() {
        let rev1 = pin_map(2);
        let rev2 = pin_map(0xa02082);
        assert_eq!(rev1.lookup("SDA", Capability::I2C).unwrap().digital_logical, 0);
        assert_eq!(rev2.lookup("SDA", Capability::I2C).unwrap().digital_logical, 2);
        assert!(rev1.lookup("27", Capability::DIGITAL).is_none());
        assert_eq!(rev2.lookup(27, Capability::DIGITAL).unwrap().id, "P1_13");
        assert_eq!(i2c_bus(3), 0);
        assert_eq!(i2c_bus(4), 1);
        // Unknown revision is treated as a current board.
        assert_eq!(i2c_bus(0), 1);
    }

    #[test]
    fn test_table_is_in_header_order() {
        let map = pin_map(4);
        let ids: Vec<&str> = map.iter().map(|pd| pd.id.as_str()).collect();
        assert_eq!(ids.first(), Some(&"P1_3"));
        assert_eq!(ids.last(), Some(&"P1_26"));
        assert_eq!(ids.len(), 17);
    }

    #[test]
    fn test_descriptor_supports_everything() {
        use embr_common::hal::Subsystem;
        let desc = describe(4);
        for s in [Subsystem::Gpio, Subsystem::I2c, Subsystem::Spi, Subsystem::Led] {
            assert!(desc.supports(s));
        }
    }
}
