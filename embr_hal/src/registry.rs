//! Host registry.
//!
//! Maps each [`Host`] to a describer that, given the board revision, yields
//! the set of driver constructors the board supports. The registry is built
//! at startup, populated with `register()`, and handed to
//! [`HalCore`](crate::core::HalCore) by value.

use std::collections::HashMap;
use std::sync::Arc;

use embr_common::error::{HalError, HalResult};
use embr_common::hal::Subsystem;
use embr_common::host::Host;
use tracing::debug;

use crate::drivers::{GpioDriver, I2cDriver, LedDriver, SpiDriver};
use crate::interrupt::InterruptMux;

/// Shared state a driver constructor may need.
#[derive(Clone)]
pub struct DriverContext {
    /// Interrupt multiplexer of the owning core.
    pub interrupts: Arc<InterruptMux>,
}

/// Builds a fresh driver instance.
pub type DriverCtor<T> = Box<dyn Fn(&DriverContext) -> Arc<T> + Send + Sync>;

/// Driver constructors for one board. A missing constructor means the board
/// does not support that subsystem.
#[derive(Default)]
pub struct Descriptor {
    /// GPIO driver constructor.
    pub gpio: Option<DriverCtor<GpioDriver>>,
    /// I2C driver constructor.
    pub i2c: Option<DriverCtor<I2cDriver>>,
    /// SPI driver constructor.
    pub spi: Option<DriverCtor<SpiDriver>>,
    /// LED driver constructor.
    pub led: Option<DriverCtor<LedDriver>>,
}

impl Descriptor {
    /// Board with no subsystems.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the GPIO driver constructor.
    pub fn gpio(mut self, f: impl Fn(&DriverContext) -> Arc<GpioDriver> + Send + Sync + 'static) -> Self {
        self.gpio = Some(Box::new(f));
        self
    }

    /// Set the I2C driver constructor.
    pub fn i2c(mut self, f: impl Fn(&DriverContext) -> Arc<I2cDriver> + Send + Sync + 'static) -> Self {
        self.i2c = Some(Box::new(f));
        self
    }

    /// Set the SPI driver constructor.
    pub fn spi(mut self, f: impl Fn(&DriverContext) -> Arc<SpiDriver> + Send + Sync + 'static) -> Self {
        self.spi = Some(Box::new(f));
        self
    }

    /// Set the LED driver constructor.
    pub fn led(mut self, f: impl Fn(&DriverContext) -> Arc<LedDriver> + Send + Sync + 'static) -> Self {
        self.led = Some(Box::new(f));
        self
    }

    /// Whether the board provides `subsystem`.
    pub fn supports(&self, subsystem: Subsystem) -> bool {
        match subsystem {
            Subsystem::Gpio | Subsystem::Interrupt => self.gpio.is_some(),
            Subsystem::I2c => self.i2c.is_some(),
            Subsystem::Spi => self.spi.is_some(),
            Subsystem::Led => self.led.is_some(),
        }
    }
}

/// Produces the descriptor for a board revision.
pub type Describer = fn(revision: u32) -> Descriptor;

/// Registry of known boards.
///
/// No global state: each [`HalCore`](crate::core::HalCore) owns one.
pub struct HostRegistry {
    describers: HashMap<Host, Describer>,
}

impl HostRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            describers: HashMap::new(),
        }
    }

    /// Registry pre-populated with every board shipped in [`crate::hosts`].
    pub fn with_builtin_hosts() -> Self {
        let mut registry = Self::new();
        crate::hosts::register_all(&mut registry);
        registry
    }

    /// Register a describer.
    ///
    /// # Panics
    /// Panics if the host is already registered.
    pub fn register(&mut self, host: Host, describer: Describer) {
        if self.describers.contains_key(&host) {
            panic!("Host '{host}' is already registered");
        }
        debug!("Registered host {host}");
        self.describers.insert(host, describer);
    }

    /// Whether `host` has a describer.
    pub fn contains(&self, host: &Host) -> bool {
        self.describers.contains_key(host)
    }

    /// Describe `host` at `revision`.
    ///
    /// # Errors
    /// Returns `HalError::InvalidHost` if no describer is registered.
    pub fn describe(&self, host: &Host, revision: u32) -> HalResult<Descriptor> {
        let describer = self
            .describers
            .get(host)
            .ok_or_else(|| HalError::InvalidHost {
                host: host.to_string(),
            })?;
        Ok(describer(revision))
    }

    /// Registered hosts, sorted by name.
    pub fn list_hosts(&self) -> Vec<&Host> {
        let mut hosts: Vec<&Host> = self.describers.keys().collect();
        hosts.sort_by(|a, b| a.name().cmp(b.name()));
        hosts
    }
}

impl Default for HostRegistry {
    fn default() -> Self {
        Self::new()
    }
}
