//! BeagleBone Black analog input.
//!
//! The ADC is exposed by the `cape-bone-iio` overlay as
//! `<devices>/ocp.*/helper.*/AIN<n>`. The overlay is loaded through the cape
//! manager when the pin is first read.

use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use embr_common::error::HalResult;
use embr_common::hal::pin::AnalogPin;
use embr_common::pin::PinDesc;

use super::capemgr::ensure_feature_enabled;
use crate::drivers::{GpioHandle, lock};
use crate::hosts::generic::sysfs;

const IIO_OVERLAY: &str = "cape-bone-iio";

/// Analog pin read from the iio helper.
pub struct BbbAnalogPin {
    id: String,
    n: u32,
    drv: GpioHandle,
    devices_root: PathBuf,
    value: Mutex<Option<(PathBuf, File)>>,
}

impl BbbAnalogPin {
    /// Pin for `pd` under `devices_root`.
    pub fn with_root(pd: &PinDesc, drv: GpioHandle, devices_root: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            id: pd.id.clone(),
            n: pd.analog_logical,
            drv,
            devices_root: devices_root.into(),
            value: Mutex::new(None),
        })
    }

    /// Factory for a GPIO driver, building pins under `devices_root`.
    pub fn factory(
        devices_root: impl Into<PathBuf>,
    ) -> impl Fn(&PinDesc, GpioHandle) -> HalResult<Arc<dyn AnalogPin>> + Send + Sync + 'static {
        let root = devices_root.into();
        move |pd, drv| Ok(Self::with_root(pd, drv, root.clone()) as Arc<dyn AnalogPin>)
    }

    fn open(&self) -> HalResult<(PathBuf, File)> {
        ensure_feature_enabled(&self.devices_root, IIO_OVERLAY)?;
        let path = sysfs::find_first_matching(
            &self.devices_root,
            &["ocp.", "helper."],
            &format!("AIN{}", self.n),
        )?;
        let file = sysfs::open_ro(&path)?;
        Ok((path, file))
    }
}

impl AnalogPin for BbbAnalogPin {
    fn id(&self) -> &str {
        &self.id
    }

    fn n(&self) -> u32 {
        self.n
    }

    fn read(&self) -> HalResult<u32> {
        let mut value = lock(&self.value);
        let opened = match value.take() {
            Some(opened) => opened,
            None => self.open()?,
        };
        let (path, file) = value.insert(opened);
        let text = sysfs::read_trimmed(file, path)?;
        sysfs::parse_attr(&text, path)
    }

    fn close(&self) -> HalResult<()> {
        self.drv.unregister()?;
        lock(&self.value).take();
        Ok(())
    }
}
