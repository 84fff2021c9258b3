//! Pin capability bitmask.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Subsystems a physical pin can serve.
    ///
    /// Bit order is part of the board-table contract and must not change.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Capability: u32 {
        /// Digital I/O.
        const DIGITAL = 1 << 0;
        /// I2C data/clock.
        const I2C = 1 << 1;
        /// UART TX/RX.
        const UART = 1 << 2;
        /// SPI MOSI/MISO/SCLK/CE.
        const SPI = 1 << 3;
        /// General-purpose memory controller.
        const GPMC = 1 << 4;
        /// LCD data lines.
        const LCD = 1 << 5;
        /// PWM output.
        const PWM = 1 << 6;
        /// Analog input.
        const ANALOG = 1 << 7;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_follow_table_order() {
        assert_eq!(Capability::DIGITAL.bits(), 1);
        assert_eq!(Capability::I2C.bits(), 2);
        assert_eq!(Capability::UART.bits(), 4);
        assert_eq!(Capability::SPI.bits(), 8);
        assert_eq!(Capability::GPMC.bits(), 16);
        assert_eq!(Capability::LCD.bits(), 32);
        assert_eq!(Capability::PWM.bits(), 64);
        assert_eq!(Capability::ANALOG.bits(), 128);
    }

    #[test]
    fn disjoint_capabilities_do_not_intersect() {
        let digital_uart = Capability::DIGITAL | Capability::UART;
        assert!(digital_uart.intersects(Capability::UART));
        assert!(!digital_uart.intersects(Capability::ANALOG));
        assert!(!Capability::empty().intersects(Capability::all()));
    }
}
