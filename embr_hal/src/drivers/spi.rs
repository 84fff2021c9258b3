//! SPI driver.
//!
//! Buses are cached per chip-select channel. The first caller's
//! [`SpiConfig`] decides how a channel is opened; later callers get the
//! cached bus regardless of the config they pass.

use std::sync::{Arc, Mutex, Weak};

use embr_common::error::HalResult;
use embr_common::hal::Subsystem;
use embr_common::hal::bus::{SpiBus, SpiConfig};
use tracing::debug;

use super::{HandleCache, Registration, Registry, close_all, lock};

/// What a bus factory needs to open `/dev/spidev<minor>.<channel>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiDevice {
    /// Board-specific spidev minor number.
    pub minor: u32,
    /// Settings requested by the first caller.
    pub config: SpiConfig,
}

/// Builds the bus handle for a device.
pub type SpiBusFactory =
    Arc<dyn Fn(SpiDevice, Registration<u8>) -> HalResult<Arc<dyn SpiBus>> + Send + Sync>;

/// Board setup run before the first bus is opened, e.g. loading an overlay.
pub type SpiInitializer = Box<dyn Fn() -> HalResult<()> + Send + Sync>;

/// SPI driver for one board.
pub struct SpiDriver {
    dev_minor: u32,
    factory: SpiBusFactory,
    initializer: Option<SpiInitializer>,
    initialized: Mutex<bool>,
    buses: HandleCache<u8, Arc<dyn SpiBus>>,
    this: Weak<SpiDriver>,
}

impl SpiDriver {
    /// Create a driver for spidev minor `dev_minor`.
    pub fn new<F>(dev_minor: u32, factory: F, initializer: Option<SpiInitializer>) -> Arc<Self>
    where
        F: Fn(SpiDevice, Registration<u8>) -> HalResult<Arc<dyn SpiBus>> + Send + Sync + 'static,
    {
        Arc::new_cyclic(|this| Self {
            dev_minor,
            factory: Arc::new(factory),
            initializer,
            initialized: Mutex::new(false),
            buses: HandleCache::new(Subsystem::Spi),
            this: this.clone(),
        })
    }

    /// spidev minor number.
    pub fn dev_minor(&self) -> u32 {
        self.dev_minor
    }

    /// Run the initializer until it succeeds once.
    fn ensure_initialized(&self) -> HalResult<()> {
        let mut done = lock(&self.initialized);
        if *done {
            return Ok(());
        }
        if let Some(init) = &self.initializer {
            debug!("Running SPI board initializer");
            init()?;
        }
        *done = true;
        Ok(())
    }

    /// Bus for `config.channel`, built on first use.
    pub fn bus(&self, config: SpiConfig) -> HalResult<Arc<dyn SpiBus>> {
        self.buses.get_or_try_insert_with(&config.channel, |generation| {
            self.ensure_initialized()?;
            let registry: Weak<dyn Registry<u8>> = self.this.clone();
            let device = SpiDevice {
                minor: self.dev_minor,
                config,
            };
            let reg = Registration::new(registry, Subsystem::Spi, config.channel, generation);
            (self.factory)(device, reg)
        })
    }

    /// Number of open buses.
    pub fn open_buses(&self) -> usize {
        self.buses.len()
    }

    /// Forget the bus cached for `channel` if it was built under `generation`.
    pub fn unregister(&self, channel: u8, generation: u64) -> HalResult<()> {
        self.buses.remove(&channel, generation)
    }

    /// Close every open bus, stopping at the first failure.
    pub fn close(&self) -> HalResult<()> {
        close_all(self.buses.snapshot(), |bus| bus.close())
    }
}

impl Registry<u8> for SpiDriver {
    fn unregister(&self, key: &u8, generation: u64) -> HalResult<()> {
        SpiDriver::unregister(self, *key, generation)
    }
}
