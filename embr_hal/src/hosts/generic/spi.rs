//! Linux spidev bus (`/dev/spidev<minor>.<channel>`).

use std::fs::File;
use std::os::fd::AsRawFd;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use embr_common::consts::DEV_ROOT;
use embr_common::error::HalResult;
use embr_common::hal::bus::SpiBus;
use static_assertions::const_assert_eq;
use tracing::debug;

use super::sysfs;
use crate::drivers::spi::SpiDevice;
use crate::drivers::{Registration, lock};

/// `struct spi_ioc_transfer` from `linux/spi/spidev.h`.
#[repr(C)]
#[derive(Debug, Default)]
struct SpiIocTransfer {
    tx_buf: u64,
    rx_buf: u64,
    len: u32,
    speed_hz: u32,
    delay_usecs: u16,
    bits_per_word: u8,
    cs_change: u8,
    tx_nbits: u8,
    rx_nbits: u8,
    word_delay_usecs: u8,
    pad: u8,
}

const_assert_eq!(std::mem::size_of::<SpiIocTransfer>(), 32);

mod ioctl {
    use super::SpiIocTransfer;

    const SPI_IOC_MAGIC: u8 = b'k';

    nix::ioctl_write_buf!(spi_message, SPI_IOC_MAGIC, 0, SpiIocTransfer);
    nix::ioctl_write_ptr!(spi_write_mode, SPI_IOC_MAGIC, 1, u8);
    nix::ioctl_write_ptr!(spi_write_bits_per_word, SPI_IOC_MAGIC, 3, u8);
    nix::ioctl_write_ptr!(spi_write_max_speed_hz, SPI_IOC_MAGIC, 4, u32);
}

/// SPI bus backed by spidev.
pub struct SpidevBus {
    device: SpiDevice,
    reg: Registration<u8>,
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl SpidevBus {
    /// Bus for `device`, with its node under `dev_root`.
    pub fn with_root(device: SpiDevice, reg: Registration<u8>, dev_root: impl Into<PathBuf>) -> Arc<Self> {
        let path = dev_root
            .into()
            .join(format!("spidev{}.{}", device.minor, device.config.channel));
        Arc::new(Self {
            device,
            reg,
            path,
            file: Mutex::new(None),
        })
    }

    /// Factory building buses under `/dev`.
    pub fn factory(device: SpiDevice, reg: Registration<u8>) -> HalResult<Arc<dyn SpiBus>> {
        Ok(Self::with_root(device, reg, DEV_ROOT))
    }

    /// Open the node and apply mode, word size and speed.
    fn open(&self) -> HalResult<File> {
        let file = sysfs::open_rw(&self.path)?;
        let fd = file.as_raw_fd();
        let config = self.device.config;
        let mode = config.mode.bits();
        let bits = if config.bits_per_word == 0 { 8 } else { config.bits_per_word };

        // SAFETY: `fd` is owned by `file` and each pointer outlives its call.
        unsafe {
            ioctl::spi_write_mode(fd, &mode)?;
            ioctl::spi_write_bits_per_word(fd, &bits)?;
            if config.speed_hz > 0 {
                ioctl::spi_write_max_speed_hz(fd, &config.speed_hz)?;
            }
        }
        debug!(
            "Opened {} (mode {mode}, {bits} bits, {} Hz)",
            self.path.display(),
            config.speed_hz
        );
        Ok(file)
    }
}

impl SpiBus for SpidevBus {
    fn channel(&self) -> u8 {
        self.device.config.channel
    }

    fn transfer_and_receive_data(&self, buf: &mut [u8]) -> HalResult<()> {
        let mut guard = lock(&self.file);
        let file = match guard.take() {
            Some(file) => file,
            None => self.open()?,
        };
        let file = guard.insert(file);

        let config = self.device.config;
        let transfer = SpiIocTransfer {
            tx_buf: buf.as_ptr() as u64,
            rx_buf: buf.as_mut_ptr() as u64,
            len: buf.len() as u32,
            speed_hz: config.speed_hz,
            delay_usecs: config.delay_us,
            bits_per_word: config.bits_per_word,
            ..SpiIocTransfer::default()
        };
        // SAFETY: tx and rx point into `buf`, which is live and `len` bytes
        // long for the duration of the call. spidev allows them to alias.
        unsafe { ioctl::spi_message(file.as_raw_fd(), std::slice::from_ref(&transfer))? };
        Ok(())
    }

    fn close(&self) -> HalResult<()> {
        self.reg.unregister()?;
        lock(&self.file).take();
        Ok(())
    }
}
