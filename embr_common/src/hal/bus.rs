//! I2C and SPI bus handle traits.
//!
//! Register helpers are provided in terms of the primitive transfers, so an
//! implementation only has to supply the raw bus operations.

use crate::error::HalResult;

// ─── I2C ────────────────────────────────────────────────────────────

/// I2C bus.
pub trait I2cBus: Send + Sync {
    /// Bus index (`/dev/i2c-N`).
    fn index(&self) -> u8;

    /// Read one byte from a device.
    fn read_byte(&self, addr: u8) -> HalResult<u8>;

    /// Read `num` bytes from a device.
    fn read_bytes(&self, addr: u8, num: usize) -> HalResult<Vec<u8>>;

    /// Write one byte to a device.
    fn write_byte(&self, addr: u8, value: u8) -> HalResult<()>;

    /// Write bytes to a device.
    fn write_bytes(&self, addr: u8, value: &[u8]) -> HalResult<()>;

    /// Fill `value` from consecutive registers starting at `reg`.
    fn read_from_reg(&self, addr: u8, reg: u8, value: &mut [u8]) -> HalResult<()>;

    /// Write `value` to consecutive registers starting at `reg`.
    fn write_to_reg(&self, addr: u8, reg: u8, value: &[u8]) -> HalResult<()>;

    /// Read one register.
    fn read_byte_from_reg(&self, addr: u8, reg: u8) -> HalResult<u8> {
        let mut buf = [0u8; 1];
        self.read_from_reg(addr, reg, &mut buf)?;
        Ok(buf[0])
    }

    /// Read a big-endian 16-bit word.
    fn read_word_from_reg(&self, addr: u8, reg: u8) -> HalResult<u16> {
        let mut buf = [0u8; 2];
        self.read_from_reg(addr, reg, &mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    /// Write one register.
    fn write_byte_to_reg(&self, addr: u8, reg: u8, value: u8) -> HalResult<()> {
        self.write_to_reg(addr, reg, &[value])
    }

    /// Write a big-endian 16-bit word.
    fn write_word_to_reg(&self, addr: u8, reg: u8, value: u16) -> HalResult<()> {
        self.write_to_reg(addr, reg, &value.to_be_bytes())
    }

    /// Release the bus and unregister it from its driver.
    fn close(&self) -> HalResult<()>;
}

// ─── SPI ────────────────────────────────────────────────────────────

const SPI_CPHA: u8 = 0x01;
const SPI_CPOL: u8 = 0x02;

/// SPI clock mode (CPOL/CPHA).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SpiMode {
    /// CPOL=0 CPHA=0
    #[default]
    Mode0 = 0,
    /// CPOL=0 CPHA=1
    Mode1 = SPI_CPHA,
    /// CPOL=1 CPHA=0
    Mode2 = SPI_CPOL,
    /// CPOL=1 CPHA=1
    Mode3 = SPI_CPOL | SPI_CPHA,
}

impl SpiMode {
    /// Raw mode bits as understood by spidev.
    pub fn bits(self) -> u8 {
        self as u8
    }
}

/// Parameters used to open an SPI bus.
///
/// The driver caches one bus per `channel`; the remaining fields only take
/// effect when the bus is first built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiConfig {
    /// Clock mode
    pub mode: SpiMode,
    /// Chip-select channel
    pub channel: u8,
    /// Clock speed in Hz (0 = keep kernel default)
    pub speed_hz: u32,
    /// Bits per word (0 = 8)
    pub bits_per_word: u8,
    /// Delay after each transfer in microseconds
    pub delay_us: u16,
}

impl SpiConfig {
    /// Mode-0, 8-bit defaults on `channel`.
    pub fn new(channel: u8) -> Self {
        Self {
            mode: SpiMode::Mode0,
            channel,
            speed_hz: 0,
            bits_per_word: 8,
            delay_us: 0,
        }
    }
}

/// SPI bus.
pub trait SpiBus: Send + Sync {
    /// Chip-select channel.
    fn channel(&self) -> u8;

    /// Full-duplex transfer: send `buf` and overwrite it with the reply.
    fn transfer_and_receive_data(&self, buf: &mut [u8]) -> HalResult<()>;

    /// Send `data`, discarding the reply.
    fn write(&self, data: &[u8]) -> HalResult<usize> {
        let mut buf = data.to_vec();
        self.transfer_and_receive_data(&mut buf)?;
        Ok(data.len())
    }

    /// Clock in `len` bytes.
    fn receive_data(&self, len: usize) -> HalResult<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.transfer_and_receive_data(&mut buf)?;
        Ok(buf)
    }

    /// Exchange one byte.
    fn transfer_and_receive_byte(&self, data: u8) -> HalResult<u8> {
        let mut buf = [data];
        self.transfer_and_receive_data(&mut buf)?;
        Ok(buf[0])
    }

    /// Clock in one byte.
    fn receive_byte(&self) -> HalResult<u8> {
        self.transfer_and_receive_byte(0)
    }

    /// Release the bus and unregister it from its driver.
    fn close(&self) -> HalResult<()>;
}
