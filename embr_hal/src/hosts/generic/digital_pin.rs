//! Sysfs GPIO digital pin.
//!
//! The pin is exported under `<root>/gpio<N>` on first use. The `value`
//! attribute stays open while the pin is initialized; its descriptor is
//! what the interrupt multiplexer watches.

use std::fs::File;
use std::os::fd::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use embr_common::consts::SYSFS_GPIO_ROOT;
use embr_common::error::{HalError, HalResult};
use embr_common::hal::pin::{DigitalPin, Direction, Edge, IrqHandler, Level};
use embr_common::pin::PinDesc;
use tracing::{debug, warn};

use super::sysfs;
use crate::drivers::GpioHandle;
use crate::drivers::lock;

/// Longest `time_pulse` waits for any single transition.
const PULSE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Default)]
struct State {
    value: Option<File>,
    exported: bool,
    watching: bool,
}

/// Digital pin driven through `/sys/class/gpio`.
pub struct SysfsDigitalPin {
    id: String,
    n: u32,
    root: PathBuf,
    drv: GpioHandle,
    this: Weak<SysfsDigitalPin>,
    state: Mutex<State>,
}

impl SysfsDigitalPin {
    /// Pin for `pd` under the default sysfs root.
    pub fn new(pd: &PinDesc, drv: GpioHandle) -> Arc<Self> {
        Self::with_root(pd, drv, SYSFS_GPIO_ROOT)
    }

    /// Pin for `pd` under `root`.
    pub fn with_root(pd: &PinDesc, drv: GpioHandle, root: impl Into<PathBuf>) -> Arc<Self> {
        let root = root.into();
        Arc::new_cyclic(|this| Self {
            id: pd.id.clone(),
            n: pd.digital_logical,
            root,
            drv,
            this: this.clone(),
            state: Mutex::new(State::default()),
        })
    }

    /// Factory for a GPIO driver, building pins under `root`.
    pub fn factory(
        root: impl Into<PathBuf>,
    ) -> impl Fn(&PinDesc, GpioHandle) -> HalResult<Arc<dyn DigitalPin>> + Send + Sync + 'static {
        let root = root.into();
        move |pd, drv| Ok(Self::with_root(pd, drv, root.clone()) as Arc<dyn DigitalPin>)
    }

    fn dir(&self) -> PathBuf {
        self.root.join(format!("gpio{}", self.n))
    }

    fn attr(&self, name: &str) -> PathBuf {
        self.dir().join(name)
    }

    /// Export the pin if needed and open its value file.
    fn init<'a>(&self, state: &'a mut State) -> HalResult<&'a File> {
        let file = match state.value.take() {
            Some(file) => file,
            None => {
                if !self.dir().exists() {
                    debug!("Exporting gpio{} for pin {}", self.n, self.id);
                    sysfs::write_attr(&self.root.join("export"), &self.n.to_string())?;
                    state.exported = true;
                }
                sysfs::open_rw(&self.attr("value"))?
            }
        };
        Ok(state.value.insert(file))
    }

    fn set_attr(&self, name: &str, value: &str) -> HalResult<()> {
        let mut state = lock(&self.state);
        self.init(&mut state)?;
        sysfs::write_attr(&self.attr(name), value)
    }

    fn wait_for(&self, level: Level, since: Instant) -> HalResult<()> {
        while self.read()? != level {
            if since.elapsed() > PULSE_TIMEOUT {
                return Err(HalError::sysfs(
                    self.attr("value"),
                    std::io::Error::from(std::io::ErrorKind::TimedOut),
                ));
            }
        }
        Ok(())
    }

    fn value_path(&self) -> PathBuf {
        self.attr("value")
    }

    /// Sysfs directory of the exported pin.
    pub fn sysfs_dir(&self) -> PathBuf {
        self.dir()
    }

    /// Sysfs root the pin lives under.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DigitalPin for SysfsDigitalPin {
    fn id(&self) -> &str {
        &self.id
    }

    fn n(&self) -> u32 {
        self.n
    }

    fn write(&self, level: Level) -> HalResult<()> {
        let mut state = lock(&self.state);
        let file = self.init(&mut state)?;
        sysfs::write_at_start(file, &self.value_path(), &level.to_string())
    }

    fn read(&self) -> HalResult<Level> {
        let mut state = lock(&self.state);
        let file = self.init(&mut state)?;
        let path = self.value_path();
        match sysfs::read_trimmed(file, &path)?.as_str() {
            "0" => Ok(Level::Low),
            "1" => Ok(Level::High),
            other => Err(HalError::sysfs(
                path,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("unexpected gpio value {other:?}"),
                ),
            )),
        }
    }

    fn time_pulse(&self, state: Level) -> HalResult<Duration> {
        let around = match state {
            Level::Low => Level::High,
            Level::High => Level::Low,
        };

        // Let any pulse already in progress finish.
        self.wait_for(around, Instant::now())?;
        self.wait_for(state, Instant::now())?;
        let start = Instant::now();
        self.wait_for(around, start)?;
        Ok(start.elapsed())
    }

    fn set_direction(&self, dir: Direction) -> HalResult<()> {
        self.set_attr("direction", dir.as_str())
    }

    fn active_low(&self, enable: bool) -> HalResult<()> {
        self.set_attr("active_low", if enable { "1" } else { "0" })
    }

    fn pull_up(&self) -> HalResult<()> {
        Err(HalError::FeatureNotImplemented { feature: "pull up" })
    }

    fn pull_down(&self) -> HalResult<()> {
        Err(HalError::FeatureNotImplemented {
            feature: "pull down",
        })
    }

    fn watch(&self, edge: Edge, handler: IrqHandler) -> HalResult<()> {
        self.set_attr("edge", edge.as_str())?;

        let Some(this) = self.this.upgrade() else {
            return Err(HalError::NotInterruptCapable {
                id: self.id.clone(),
            });
        };
        // The state lock must not be held here: the worker thread calls
        // handlers under the multiplexer lock and handlers read the pin.
        self.drv.register_interrupt(this, handler)?;
        lock(&self.state).watching = true;
        Ok(())
    }

    fn stop_watching(&self) -> HalResult<()> {
        self.drv.unregister_interrupt(self)?;
        lock(&self.state).watching = false;
        self.set_attr("edge", Edge::None.as_str())
    }

    fn fd(&self) -> Option<RawFd> {
        lock(&self.state).value.as_ref().map(|f| f.as_raw_fd())
    }

    fn close(&self) -> HalResult<()> {
        self.drv.unregister()?;

        let watching = lock(&self.state).watching;
        if watching {
            self.drv.unregister_interrupt(self)?;
        }

        let mut state = lock(&self.state);
        if state.value.take().is_none() {
            return Ok(());
        }
        state.watching = false;
        if state.exported {
            state.exported = false;
            if let Err(e) = sysfs::write_attr(&self.root.join("unexport"), &self.n.to_string()) {
                warn!("Failed to unexport gpio{}: {e}", self.n);
                return Err(e);
            }
        }
        Ok(())
    }
}
