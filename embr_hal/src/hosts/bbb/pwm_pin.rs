//! BeagleBone Black PWM output.
//!
//! A header pin is driven by a `pwm_test_<id>` device that appears under
//! `<devices>/ocp.*/` once the `am33xx_pwm` and `bone_pwm_<id>` overlays are
//! loaded. The device exposes `period`, `duty` (both in nanoseconds) and
//! `polarity`. Overlays are loaded on first use; closing the pin resets the
//! output and unloads the pin's own overlay.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use embr_common::error::{HalError, HalResult};
use embr_common::hal::pin::{Polarity, PwmPin};
use embr_common::pin::PinDesc;
use tracing::debug;

use super::capemgr::{ensure_feature_disabled, ensure_feature_enabled};
use crate::drivers::{GpioHandle, lock};
use crate::hosts::generic::sysfs;

/// Period set when the pin is opened and after it is reset.
pub const DEFAULT_PERIOD_NS: u32 = 500_000;

/// Period used by [`PwmPin::set_microseconds`], the usual 50 Hz servo frame.
pub const SERVO_PERIOD_NS: u32 = 20_000_000;

const PWM_OVERLAY: &str = "am33xx_pwm";

/// Opened `pwm_test` device.
struct PwmDevice {
    dir: PathBuf,
    period: u32,
}

impl PwmDevice {
    fn write(&self, attr: &str, value: impl fmt::Display) -> HalResult<()> {
        sysfs::write_attr(&self.dir.join(attr), &value.to_string())
    }

    fn set_period(&mut self, ns: u32) -> HalResult<()> {
        self.write("period", ns)?;
        self.period = ns;
        Ok(())
    }

    fn set_duty(&self, ns: u32) -> HalResult<()> {
        self.write("duty", ns)
    }

    fn set_polarity(&self, pol: Polarity) -> HalResult<()> {
        let value = match pol {
            Polarity::Positive => 0,
            Polarity::Negative => 1,
        };
        self.write("polarity", value)
    }

    /// Positive polarity, zero duty, default period. Duty goes first so the
    /// period is never set below it.
    fn reset(&mut self) -> HalResult<()> {
        self.set_polarity(Polarity::Positive)?;
        self.set_duty(0)?;
        self.set_period(DEFAULT_PERIOD_NS)
    }
}

/// Duty cycle for `value` on a 0-255 scale of `period`.
fn analog_duty(value: u8, period: u32) -> u32 {
    (u64::from(value) * u64::from(period) / u64::from(u8::MAX)) as u32
}

/// PWM pin on the P8/P9 headers.
pub struct BbbPwmPin {
    id: String,
    drv: GpioHandle,
    devices_root: PathBuf,
    device: Mutex<Option<PwmDevice>>,
}

impl BbbPwmPin {
    /// Pin for `pd` under `devices_root`.
    pub fn with_root(pd: &PinDesc, drv: GpioHandle, devices_root: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            id: pd.id.clone(),
            drv,
            devices_root: devices_root.into(),
            device: Mutex::new(None),
        })
    }

    /// Factory for a GPIO driver, building pins under `devices_root`.
    pub fn factory(
        devices_root: impl Into<PathBuf>,
    ) -> impl Fn(&PinDesc, GpioHandle) -> HalResult<Arc<dyn PwmPin>> + Send + Sync + 'static {
        let root = devices_root.into();
        move |pd, drv| Ok(Self::with_root(pd, drv, root.clone()) as Arc<dyn PwmPin>)
    }

    fn overlay(&self) -> String {
        format!("bone_pwm_{}", self.id)
    }

    fn open(&self) -> HalResult<PwmDevice> {
        ensure_feature_enabled(&self.devices_root, PWM_OVERLAY)?;
        ensure_feature_enabled(&self.devices_root, &self.overlay())?;

        let device_prefix = format!("pwm_test_{}.", self.id);
        let period = sysfs::find_first_matching(
            &self.devices_root,
            &["ocp.", device_prefix.as_str()],
            "period",
        )?;
        let dir = period
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| HalError::sysfs(&period, io::Error::from(io::ErrorKind::NotFound)))?;
        debug!("PWM pin {} at {}", self.id, dir.display());

        let mut device = PwmDevice {
            dir,
            period: DEFAULT_PERIOD_NS,
        };
        device.reset()?;
        Ok(device)
    }

    fn with_device<R>(&self, f: impl FnOnce(&mut PwmDevice) -> HalResult<R>) -> HalResult<R> {
        let mut device = lock(&self.device);
        let opened = match device.take() {
            Some(opened) => opened,
            None => self.open()?,
        };
        f(device.insert(opened))
    }
}

impl PwmPin for BbbPwmPin {
    fn id(&self) -> &str {
        &self.id
    }

    fn n(&self) -> &str {
        &self.id
    }

    fn set_period(&self, ns: u32) -> HalResult<()> {
        self.with_device(|device| device.set_period(ns))
    }

    fn set_duty(&self, ns: u32) -> HalResult<()> {
        self.with_device(|device| device.set_duty(ns))
    }

    fn set_polarity(&self, pol: Polarity) -> HalResult<()> {
        self.with_device(|device| device.set_polarity(pol))
    }

    fn set_microseconds(&self, us: u32) -> HalResult<()> {
        self.with_device(|device| {
            if device.period != SERVO_PERIOD_NS {
                device.set_period(SERVO_PERIOD_NS)?;
            }
            device.set_duty(us.saturating_mul(1_000).min(SERVO_PERIOD_NS))
        })
    }

    fn set_analog(&self, value: u8) -> HalResult<()> {
        self.with_device(|device| device.set_duty(analog_duty(value, device.period)))
    }

    fn close(&self) -> HalResult<()> {
        self.drv.unregister()?;
        let Some(mut device) = lock(&self.device).take() else {
            return Ok(());
        };
        device.reset()?;
        ensure_feature_disabled(&self.devices_root, &self.overlay())
    }
}
