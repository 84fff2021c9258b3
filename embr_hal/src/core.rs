//! HAL Core: the per-process context object.
//!
//! `HalCore` owns the host registry, the host override, one lazily built
//! driver per subsystem and the interrupt multiplexer. Everything a program
//! needs to reach hardware goes through one `HalCore`, usually shared as an
//! `Arc<HalCore>`.
//!
//! Pin operations require [`HalCore::init_gpio`] first. I2C, SPI and LED
//! operations initialize their subsystem on first use.

use std::sync::{Arc, Mutex, RwLock};

use embr_common::config::{HalConfig, InterruptConfig};
use embr_common::detect;
use embr_common::error::{HalError, HalResult};
use embr_common::hal::Subsystem;
use embr_common::hal::bus::{I2cBus, SpiBus, SpiConfig};
use embr_common::hal::led::Led;
use embr_common::hal::pin::{AnalogPin, DigitalPin, Direction, Edge, Level, PwmPin};
use embr_common::host::Host;
use embr_common::pin::PinKey;
use tracing::{debug, info, warn};

use crate::drivers::{GpioDriver, I2cDriver, LedDriver, SpiDriver, lock};
use crate::interrupt::InterruptMux;
use crate::registry::{Descriptor, DriverContext, DriverCtor, HostRegistry};

/// Host detection routine.
pub type Detector = fn() -> HalResult<(Host, u32)>;

type Slot<T> = Mutex<Option<Arc<T>>>;

/// HAL Core manages board identity and subsystem drivers.
pub struct HalCore {
    /// Known boards
    registry: HostRegistry,
    /// Detection routine, replaceable for tests
    detector: Detector,
    /// Host set explicitly; wins over detection
    host_override: RwLock<Option<(Host, u32)>>,
    /// Shared with driver constructors
    context: DriverContext,
    gpio: Slot<GpioDriver>,
    i2c: Slot<I2cDriver>,
    spi: Slot<SpiDriver>,
    led: Slot<LedDriver>,
}

impl HalCore {
    /// Create a core over `registry` with default interrupt settings.
    pub fn new(registry: HostRegistry) -> Self {
        Self::with_interrupts(registry, InterruptConfig::default())
    }

    /// Create a core over `registry` with the given interrupt settings.
    pub fn with_interrupts(registry: HostRegistry, interrupts: InterruptConfig) -> Self {
        Self {
            registry,
            detector: detect::detect_host,
            host_override: RwLock::new(None),
            context: DriverContext {
                interrupts: Arc::new(InterruptMux::new(interrupts)),
            },
            gpio: Mutex::new(None),
            i2c: Mutex::new(None),
            spi: Mutex::new(None),
            led: Mutex::new(None),
        }
    }

    /// Create a core from a loaded configuration file.
    ///
    /// A `[host]` section becomes the host override.
    pub fn from_config(registry: HostRegistry, config: &HalConfig) -> Self {
        let core = Self::with_interrupts(registry, config.interrupt);
        if let Some(host) = &config.host {
            core.set_host(host.name.clone(), host.revision);
        }
        core
    }

    /// Replace the detection routine.
    pub fn with_detector(mut self, detector: Detector) -> Self {
        self.detector = detector;
        self
    }

    /// Board registry.
    pub fn registry(&self) -> &HostRegistry {
        &self.registry
    }

    /// Interrupt multiplexer shared by all digital pins of this core.
    pub fn interrupts(&self) -> &Arc<InterruptMux> {
        &self.context.interrupts
    }

    // ─── Host identity ──────────────────────────────────────────────

    /// Run host detection, ignoring any override.
    pub fn detect_host(&self) -> HalResult<(Host, u32)> {
        (self.detector)()
    }

    /// Pin the host identity; later lookups skip detection.
    pub fn set_host(&self, host: Host, revision: u32) {
        info!("Host set to {host} (revision {revision:#x})");
        *self.host_override.write().unwrap_or_else(|e| e.into_inner()) = Some((host, revision));
    }

    /// Effective host: the override if set, detection otherwise.
    pub fn host(&self) -> HalResult<(Host, u32)> {
        let over = self
            .host_override
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        match over {
            Some(host) => Ok(host),
            None => self.detect_host(),
        }
    }

    /// Descriptor of the effective host.
    ///
    /// # Errors
    /// Detection errors, or `InvalidHost` if the host has no describer.
    pub fn describe_host(&self) -> HalResult<Descriptor> {
        let (host, revision) = self.host()?;
        debug!("Describing host {host} revision {revision:#x}");
        self.registry.describe(&host, revision)
    }

    // ─── Driver lifecycle ───────────────────────────────────────────

    fn init_driver<T>(
        &self,
        slot: &Slot<T>,
        subsystem: Subsystem,
        select: fn(Descriptor) -> Option<DriverCtor<T>>,
    ) -> HalResult<Arc<T>> {
        let mut slot = lock(slot);
        if let Some(driver) = slot.as_ref() {
            return Ok(Arc::clone(driver));
        }

        let ctor = select(self.describe_host()?).ok_or(HalError::FeatureNotSupported {
            feature: subsystem.as_str(),
        })?;
        let driver = ctor(&self.context);
        info!("{subsystem} driver initialized");
        *slot = Some(Arc::clone(&driver));
        Ok(driver)
    }

    fn driver<T>(&self, slot: &Slot<T>, subsystem: Subsystem) -> HalResult<Arc<T>> {
        lock(slot)
            .as_ref()
            .map(Arc::clone)
            .ok_or(HalError::NotInitialized { subsystem })
    }

    fn close_driver<T>(
        &self,
        slot: &Slot<T>,
        subsystem: Subsystem,
        close: fn(&T) -> HalResult<()>,
    ) -> HalResult<()> {
        let mut slot = lock(slot);
        let driver = slot.as_ref().ok_or(HalError::NotInitialized { subsystem })?;
        close(driver)?;
        *slot = None;
        info!("{subsystem} driver closed");
        Ok(())
    }

    /// Build the GPIO driver for the effective host. Idempotent.
    pub fn init_gpio(&self) -> HalResult<()> {
        self.init_driver(&self.gpio, Subsystem::Gpio, |d| d.gpio).map(drop)
    }

    /// Close every open pin, stop the interrupt loop and drop the driver.
    pub fn close_gpio(&self) -> HalResult<()> {
        self.close_driver(&self.gpio, Subsystem::Gpio, GpioDriver::close)?;
        self.context.interrupts.shutdown();
        Ok(())
    }

    /// The initialized GPIO driver.
    pub fn gpio(&self) -> HalResult<Arc<GpioDriver>> {
        self.driver(&self.gpio, Subsystem::Gpio)
    }

    /// Build the I2C driver for the effective host. Idempotent.
    pub fn init_i2c(&self) -> HalResult<()> {
        self.i2c_driver().map(drop)
    }

    fn i2c_driver(&self) -> HalResult<Arc<I2cDriver>> {
        self.init_driver(&self.i2c, Subsystem::I2c, |d| d.i2c)
    }

    /// Close every open bus and drop the driver.
    pub fn close_i2c(&self) -> HalResult<()> {
        self.close_driver(&self.i2c, Subsystem::I2c, I2cDriver::close)
    }

    /// Build the SPI driver for the effective host. Idempotent.
    pub fn init_spi(&self) -> HalResult<()> {
        self.spi_driver().map(drop)
    }

    fn spi_driver(&self) -> HalResult<Arc<SpiDriver>> {
        self.init_driver(&self.spi, Subsystem::Spi, |d| d.spi)
    }

    /// Close every open bus and drop the driver.
    pub fn close_spi(&self) -> HalResult<()> {
        self.close_driver(&self.spi, Subsystem::Spi, SpiDriver::close)
    }

    /// Build the LED driver for the effective host. Idempotent.
    pub fn init_led(&self) -> HalResult<()> {
        self.led_driver().map(drop)
    }

    fn led_driver(&self) -> HalResult<Arc<LedDriver>> {
        self.init_driver(&self.led, Subsystem::Led, |d| d.led)
    }

    /// Close every open LED and drop the driver.
    pub fn close_led(&self) -> HalResult<()> {
        self.close_driver(&self.led, Subsystem::Led, LedDriver::close)
    }

    /// Close every initialized subsystem.
    ///
    /// All subsystems are attempted; the first error is returned.
    pub fn close(&self) -> HalResult<()> {
        let results = [
            self.close_gpio(),
            self.close_i2c(),
            self.close_spi(),
            self.close_led(),
        ];
        let mut first = None;
        for result in results {
            match result {
                Ok(()) | Err(HalError::NotInitialized { .. }) => {}
                Err(e) => {
                    warn!("Close failed: {e}");
                    first.get_or_insert(e);
                }
            }
        }
        first.map_or(Ok(()), Err)
    }

    // ─── Pins ───────────────────────────────────────────────────────

    /// Digital pin for `key`.
    pub fn new_digital_pin(&self, key: impl Into<PinKey>) -> HalResult<Arc<dyn DigitalPin>> {
        self.gpio()?.digital_pin(key)
    }

    /// Drive the pin for `key`.
    pub fn digital_write(&self, key: impl Into<PinKey>, level: Level) -> HalResult<()> {
        self.new_digital_pin(key)?.write(level)
    }

    /// Sample the pin for `key`.
    pub fn digital_read(&self, key: impl Into<PinKey>) -> HalResult<Level> {
        self.new_digital_pin(key)?.read()
    }

    /// Set the direction of the pin for `key`.
    pub fn set_direction(&self, key: impl Into<PinKey>, dir: Direction) -> HalResult<()> {
        self.new_digital_pin(key)?.set_direction(dir)
    }

    /// Invert the logic of the pin for `key`.
    pub fn active_low(&self, key: impl Into<PinKey>, enable: bool) -> HalResult<()> {
        self.new_digital_pin(key)?.active_low(enable)
    }

    /// Enable the pull-up of the pin for `key`.
    pub fn pull_up(&self, key: impl Into<PinKey>) -> HalResult<()> {
        self.new_digital_pin(key)?.pull_up()
    }

    /// Enable the pull-down of the pin for `key`.
    pub fn pull_down(&self, key: impl Into<PinKey>) -> HalResult<()> {
        self.new_digital_pin(key)?.pull_down()
    }

    /// Deliver `edge` transitions of the pin for `key` to `handler`.
    pub fn watch<F>(&self, key: impl Into<PinKey>, edge: Edge, handler: F) -> HalResult<()>
    where
        F: Fn(&dyn DigitalPin) + Send + Sync + 'static,
    {
        self.new_digital_pin(key)?.watch(edge, Arc::new(handler))
    }

    /// Stop delivering edges of the pin for `key`.
    pub fn stop_watching(&self, key: impl Into<PinKey>) -> HalResult<()> {
        self.new_digital_pin(key)?.stop_watching()
    }

    /// Analog pin for `key`.
    pub fn new_analog_pin(&self, key: impl Into<PinKey>) -> HalResult<Arc<dyn AnalogPin>> {
        self.gpio()?.analog_pin(key)
    }

    /// Sample the analog pin for `key`.
    pub fn analog_read(&self, key: impl Into<PinKey>) -> HalResult<u32> {
        self.new_analog_pin(key)?.read()
    }

    /// PWM pin for `key`.
    pub fn new_pwm_pin(&self, key: impl Into<PinKey>) -> HalResult<Arc<dyn PwmPin>> {
        self.gpio()?.pwm_pin(key)
    }

    // ─── Buses and LEDs ─────────────────────────────────────────────

    /// I2C bus `index`, initializing the subsystem if needed.
    pub fn new_i2c_bus(&self, index: u8) -> HalResult<Arc<dyn I2cBus>> {
        self.i2c_driver()?.bus(index)
    }

    /// SPI bus for `config.channel`, initializing the subsystem if needed.
    pub fn new_spi_bus(&self, config: SpiConfig) -> HalResult<Arc<dyn SpiBus>> {
        self.spi_driver()?.bus(config)
    }

    /// LED for `key`, initializing the subsystem if needed.
    pub fn new_led(&self, key: impl Into<PinKey>) -> HalResult<Arc<dyn Led>> {
        self.led_driver()?.led(key)
    }

    /// Switch the LED for `key` on.
    pub fn led_on(&self, key: impl Into<PinKey>) -> HalResult<()> {
        self.new_led(key)?.on()
    }

    /// Switch the LED for `key` off.
    pub fn led_off(&self, key: impl Into<PinKey>) -> HalResult<()> {
        self.new_led(key)?.off()
    }

    /// Toggle the LED for `key`.
    pub fn led_toggle(&self, key: impl Into<PinKey>) -> HalResult<()> {
        self.new_led(key)?.toggle()
    }
}
