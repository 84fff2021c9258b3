//! BeagleBone Black.
//!
//! Digital pins go through sysfs GPIO, analog inputs through the
//! `cape-bone-iio` helper and PWM outputs through `pwm_test` devices. SPI
//! needs the `BB-SPIDEV0` overlay, which is loaded before the first bus is
//! opened.

pub mod analog_pin;
pub mod capemgr;
pub mod pwm_pin;

use std::path::Path;

use embr_common::consts::{SYSFS_GPIO_ROOT, SYSFS_LED_ROOT};
use embr_common::pin::{Capability as C, PinDesc, PinMap};

use super::generic::{I2cDevBus, SpidevBus, SysfsDigitalPin, SysfsLed};
use super::sysfs_gpio;
use crate::drivers::spi::SpiInitializer;
use crate::drivers::{I2cDriver, LedDriver, LedMap, PinFactories, SpiDriver};
use crate::registry::Descriptor;

pub use analog_pin::BbbAnalogPin;
pub use capemgr::{DEVICES_ROOT, ensure_feature_disabled, ensure_feature_enabled};
pub use pwm_pin::BbbPwmPin;

/// spidev minor of SPI0 once the overlay is loaded.
pub const SPI_DEV_MINOR: u32 = 1;

const SPI_OVERLAY: &str = "BB-SPIDEV0";

/// Capability map of the P8/P9 headers.
pub fn pin_map() -> PinMap {
    PinMap::new(vec![
        PinDesc::new("P8_07", &["66", "GPIO_66", "TIMER4"], C::DIGITAL).digital(66),
        PinDesc::new("P8_08", &["67", "GPIO_67", "TIMER7"], C::DIGITAL).digital(67),
        PinDesc::new("P8_09", &["69", "GPIO_69", "TIMER5"], C::DIGITAL).digital(69),
        PinDesc::new("P8_10", &["68", "GPIO_68", "TIMER6"], C::DIGITAL).digital(68),
        PinDesc::new("P8_11", &["45", "GPIO_45"], C::DIGITAL).digital(45),
        PinDesc::new("P8_12", &["44", "GPIO_44"], C::DIGITAL).digital(44),
        PinDesc::new("P8_13", &["23", "GPIO_23", "EHRPWM2B"], C::DIGITAL | C::PWM).digital(23),
        PinDesc::new("P8_14", &["26", "GPIO_26"], C::DIGITAL).digital(26),
        PinDesc::new("P8_15", &["47", "GPIO_47"], C::DIGITAL).digital(47),
        PinDesc::new("P8_16", &["46", "GPIO_46"], C::DIGITAL).digital(46),
        PinDesc::new("P8_17", &["27", "GPIO_27"], C::DIGITAL).digital(27),
        PinDesc::new("P8_18", &["65", "GPIO_65"], C::DIGITAL).digital(65),
        PinDesc::new("P8_19", &["22", "GPIO_22", "EHRPWM2A"], C::DIGITAL | C::PWM).digital(22),
        PinDesc::new("P8_26", &["61", "GPIO_61"], C::DIGITAL).digital(61),
        PinDesc::new("P9_11", &["30", "GPIO_30", "UART4_RXD"], C::DIGITAL | C::UART).digital(30),
        PinDesc::new("P9_12", &["60", "GPIO_60"], C::DIGITAL).digital(60),
        PinDesc::new("P9_13", &["31", "GPIO_31", "UART4_TXD"], C::DIGITAL | C::UART).digital(31),
        PinDesc::new("P9_14", &["50", "GPIO_50", "EHRPWM1A"], C::DIGITAL | C::PWM).digital(50),
        PinDesc::new("P9_15", &["48", "GPIO_48"], C::DIGITAL).digital(48),
        PinDesc::new("P9_16", &["51", "GPIO_51", "EHRPWM1B"], C::DIGITAL | C::PWM).digital(51),
        PinDesc::new("P9_17", &["5", "GPIO_5", "I2C1_SCL", "SPI0_CS0"], C::DIGITAL | C::I2C | C::SPI).digital(5),
        PinDesc::new("P9_18", &["4", "GPIO_4", "I2C1_SDA", "SPI0_D1"], C::DIGITAL | C::I2C | C::SPI).digital(4),
        PinDesc::new("P9_19", &["13", "GPIO_13", "I2C2_SCL"], C::DIGITAL | C::I2C).digital(13),
        PinDesc::new("P9_20", &["12", "GPIO_12", "I2C2_SDA"], C::DIGITAL | C::I2C).digital(12),
        PinDesc::new("P9_21", &["3", "GPIO_3", "UART2_TXD", "EHRPWM0B"], C::DIGITAL | C::UART | C::PWM).digital(3),
        PinDesc::new("P9_22", &["2", "GPIO_2", "UART2_RXD", "EHRPWM0A"], C::DIGITAL | C::UART | C::PWM).digital(2),
        PinDesc::new("P9_23", &["49", "GPIO_49"], C::DIGITAL).digital(49),
        PinDesc::new("P9_24", &["15", "GPIO_15", "UART1_TXD"], C::DIGITAL | C::UART).digital(15),
        PinDesc::new("P9_25", &["117", "GPIO_117"], C::DIGITAL).digital(117),
        PinDesc::new("P9_26", &["14", "GPIO_14", "UART1_RXD"], C::DIGITAL | C::UART).digital(14),
        PinDesc::new("P9_27", &["115", "GPIO_115"], C::DIGITAL).digital(115),
        PinDesc::new("P9_30", &["112", "GPIO_112", "SPI1_D1"], C::DIGITAL | C::SPI).digital(112),
        PinDesc::new("P9_33", &["4", "AIN4"], C::ANALOG).analog(4),
        PinDesc::new("P9_35", &["6", "AIN6"], C::ANALOG).analog(6),
        PinDesc::new("P9_36", &["5", "AIN5"], C::ANALOG).analog(5),
        PinDesc::new("P9_37", &["2", "AIN2"], C::ANALOG).analog(2),
        PinDesc::new("P9_38", &["3", "AIN3"], C::ANALOG).analog(3),
        PinDesc::new("P9_39", &["0", "AIN0"], C::ANALOG).analog(0),
        PinDesc::new("P9_40", &["1", "AIN1"], C::ANALOG).analog(1),
        PinDesc::new("P9_41", &["20", "GPIO_20"], C::DIGITAL).digital(20),
        PinDesc::new("P9_42", &["7", "GPIO_7", "ECAPPWM0"], C::DIGITAL | C::PWM).digital(7),
    ])
}

/// User LEDs.
pub fn led_map() -> LedMap {
    LedMap::new()
        .with("beaglebone:green:usr0", &["0", "USR0", "usr0"])
        .with("beaglebone:green:usr1", &["1", "USR1", "usr1"])
        .with("beaglebone:green:usr2", &["2", "USR2", "usr2"])
        .with("beaglebone:green:usr3", &["3", "USR3", "usr3"])
}

fn spi_initializer() -> SpiInitializer {
    Box::new(|| ensure_feature_enabled(Path::new(DEVICES_ROOT), SPI_OVERLAY))
}

/// Pin factories for the board.
pub fn pin_factories() -> PinFactories {
    PinFactories::new()
        .digital(SysfsDigitalPin::factory(SYSFS_GPIO_ROOT))
        .analog(BbbAnalogPin::factory(DEVICES_ROOT))
        .pwm(BbbPwmPin::factory(DEVICES_ROOT))
}

/// Describer registered for [`Host::BeagleBoneBlack`](embr_common::host::Host::BeagleBoneBlack).
pub fn describe(_revision: u32) -> Descriptor {
    Descriptor::new()
        .gpio(sysfs_gpio(pin_map(), pin_factories()))
        .i2c(|_| I2cDriver::new(I2cDevBus::factory))
        .spi(|_| SpiDriver::new(SPI_DEV_MINOR, SpidevBus::factory, Some(spi_initializer())))
        .led(|_| LedDriver::new(led_map(), SysfsLed::factory(SYSFS_LED_ROOT)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use embr_common::pin::Capability;

    #[test]
    fn test_shared_numbers_resolve_by_capability() {
        let map = pin_map();
        assert_eq!(map.lookup(4, Capability::DIGITAL).unwrap().id, "P9_18");
        assert_eq!(map.lookup(4, Capability::ANALOG).unwrap().id, "P9_33");
        assert_eq!(map.lookup("AIN4", Capability::ANALOG).unwrap().analog_logical, 4);
        assert_eq!(map.lookup("EHRPWM1A", Capability::PWM).unwrap().id, "P9_14");
        assert!(map.lookup("EHRPWM1A", Capability::ANALOG).is_none());
    }

    #[test]
    fn test_led_aliases() {
        let leds = led_map();
        assert_eq!(leds.lookup("USR2"), Some("beaglebone:green:usr2"));
        assert_eq!(leds.len(), 4);
    }
}
