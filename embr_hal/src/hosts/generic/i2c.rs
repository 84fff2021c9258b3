//! Linux i2c-dev bus (`/dev/i2c-N`).
//!
//! The device node is opened on first use. The slave address is selected
//! with the `I2C_SLAVE` ioctl and only re-issued when it changes.

use std::fs::File;
use std::io::{Read, Write};
use std::os::fd::AsRawFd;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use embr_common::consts::DEV_ROOT;
use embr_common::error::{HalError, HalResult};
use embr_common::hal::bus::I2cBus;
use tracing::trace;

use super::sysfs;
use crate::drivers::{Registration, lock};

mod ioctl {
    const I2C_SLAVE: u16 = 0x0703;

    nix::ioctl_write_int_bad!(i2c_set_slave, I2C_SLAVE);
}

#[derive(Default)]
struct Device {
    file: Option<File>,
    addr: Option<u8>,
}

/// I2C bus backed by i2c-dev.
pub struct I2cDevBus {
    reg: Registration<u8>,
    path: PathBuf,
    device: Mutex<Device>,
}

impl I2cDevBus {
    /// Bus registered under `reg`, with its node under `dev_root`.
    pub fn with_root(reg: Registration<u8>, dev_root: impl Into<PathBuf>) -> Arc<Self> {
        let path = dev_root.into().join(format!("i2c-{}", reg.key()));
        Arc::new(Self {
            reg,
            path,
            device: Mutex::new(Device::default()),
        })
    }

    /// Factory building buses under `/dev`.
    pub fn factory(index: u8, reg: Registration<u8>) -> HalResult<Arc<dyn I2cBus>> {
        debug_assert_eq!(index, *reg.key());
        Ok(Self::with_root(reg, DEV_ROOT))
    }

    /// Run `f` against the device node with `addr` selected.
    fn with_slave<R>(&self, addr: u8, f: impl FnOnce(&mut File) -> std::io::Result<R>) -> HalResult<R> {
        let mut device = lock(&self.device);
        let mut file = match device.file.take() {
            Some(file) => file,
            None => sysfs::open_rw(&self.path)?,
        };
        if device.addr != Some(addr) {
            trace!("i2c-{}: selecting slave {addr:#04x}", self.reg.key());
            // SAFETY: the descriptor belongs to `file`, which is alive for the call.
            let selected = unsafe { ioctl::i2c_set_slave(file.as_raw_fd(), i32::from(addr)) };
            if let Err(e) = selected {
                device.file = Some(file);
                device.addr = None;
                return Err(HalError::from(e));
            }
            device.addr = Some(addr);
        }
        let result = f(&mut file).map_err(|e| HalError::sysfs(&self.path, e));
        device.file = Some(file);
        result
    }
}

impl I2cBus for I2cDevBus {
    fn index(&self) -> u8 {
        *self.reg.key()
    }

    fn read_byte(&self, addr: u8) -> HalResult<u8> {
        let mut buf = [0u8; 1];
        self.with_slave(addr, |f| f.read_exact(&mut buf))?;
        Ok(buf[0])
    }

    fn read_bytes(&self, addr: u8, num: usize) -> HalResult<Vec<u8>> {
        let mut buf = vec![0u8; num];
        self.with_slave(addr, |f| f.read_exact(&mut buf))?;
        Ok(buf)
    }

    fn write_byte(&self, addr: u8, value: u8) -> HalResult<()> {
        self.with_slave(addr, |f| f.write_all(&[value]))
    }

    fn write_bytes(&self, addr: u8, value: &[u8]) -> HalResult<()> {
        self.with_slave(addr, |f| f.write_all(value))
    }

    fn read_from_reg(&self, addr: u8, reg: u8, value: &mut [u8]) -> HalResult<()> {
        self.with_slave(addr, |f| {
            f.write_all(&[reg])?;
            f.read_exact(value)
        })
    }

    fn write_to_reg(&self, addr: u8, reg: u8, value: &[u8]) -> HalResult<()> {
        let mut buf = Vec::with_capacity(value.len() + 1);
        buf.push(reg);
        buf.extend_from_slice(value);
        self.with_slave(addr, |f| f.write_all(&buf))
    }

    fn close(&self) -> HalResult<()> {
        self.reg.unregister()?;
        *lock(&self.device) = Device::default();
        Ok(())
    }
}
