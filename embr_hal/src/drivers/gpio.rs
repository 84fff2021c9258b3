//! GPIO driver.
//!
//! Resolves keys through the board's [`PinMap`] and caches one handle per
//! pin identity. Digital, analog and PWM handles share the cache, so an
//! identity opened as one kind cannot be opened as another until it is
//! closed.

use std::sync::{Arc, Weak};

use embr_common::error::{HalError, HalResult};
use embr_common::hal::Subsystem;
use embr_common::hal::pin::{AnalogPin, DigitalPin, IrqHandler, PwmPin};
use embr_common::pin::{Capability, PinDesc, PinKey, PinMap};
use tracing::debug;

use super::{HandleCache, close_all};
use crate::interrupt::InterruptMux;

/// Builds a pin handle of kind `P` for a resolved descriptor.
pub type PinFactory<P> = Arc<dyn Fn(&PinDesc, GpioHandle) -> HalResult<Arc<P>> + Send + Sync>;

/// Digital pin factory.
pub type DigitalPinFactory = PinFactory<dyn DigitalPin>;
/// Analog pin factory.
pub type AnalogPinFactory = PinFactory<dyn AnalogPin>;
/// PWM pin factory.
pub type PwmPinFactory = PinFactory<dyn PwmPin>;

/// The pin kinds a board can build. A missing factory makes that kind
/// unsupported on the board.
#[derive(Clone, Default)]
pub struct PinFactories {
    digital: Option<DigitalPinFactory>,
    analog: Option<AnalogPinFactory>,
    pwm: Option<PwmPinFactory>,
}

impl PinFactories {
    /// No pin kinds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the digital pin factory.
    pub fn digital<F>(mut self, f: F) -> Self
    where
        F: Fn(&PinDesc, GpioHandle) -> HalResult<Arc<dyn DigitalPin>> + Send + Sync + 'static,
    {
        self.digital = Some(Arc::new(f));
        self
    }

    /// Set the analog pin factory.
    pub fn analog<F>(mut self, f: F) -> Self
    where
        F: Fn(&PinDesc, GpioHandle) -> HalResult<Arc<dyn AnalogPin>> + Send + Sync + 'static,
    {
        self.analog = Some(Arc::new(f));
        self
    }

    /// Set the PWM pin factory.
    pub fn pwm<F>(mut self, f: F) -> Self
    where
        F: Fn(&PinDesc, GpioHandle) -> HalResult<Arc<dyn PwmPin>> + Send + Sync + 'static,
    {
        self.pwm = Some(Arc::new(f));
        self
    }
}

// ─── Cached handles ─────────────────────────────────────────────────

#[derive(Clone)]
enum CachedPin {
    Digital(Arc<dyn DigitalPin>),
    Analog(Arc<dyn AnalogPin>),
    Pwm(Arc<dyn PwmPin>),
}

impl CachedPin {
    fn kind(&self) -> &'static str {
        match self {
            Self::Digital(_) => "digital",
            Self::Analog(_) => "analog",
            Self::Pwm(_) => "pwm",
        }
    }

    fn close(&self) -> HalResult<()> {
        match self {
            Self::Digital(pin) => pin.close(),
            Self::Analog(pin) => pin.close(),
            Self::Pwm(pin) => pin.close(),
        }
    }
}

/// One pin kind: how to wrap it into, and find it in, the shared cache.
struct Kind<P: ?Sized> {
    name: &'static str,
    caps: Capability,
    wrap: fn(Arc<P>) -> CachedPin,
    unwrap: fn(&CachedPin) -> Option<Arc<P>>,
}

const DIGITAL: Kind<dyn DigitalPin> = Kind {
    name: "digital",
    caps: Capability::DIGITAL,
    wrap: CachedPin::Digital,
    unwrap: |c| match c {
        CachedPin::Digital(p) => Some(Arc::clone(p)),
        _ => None,
    },
};

const ANALOG: Kind<dyn AnalogPin> = Kind {
    name: "analog",
    caps: Capability::ANALOG,
    wrap: CachedPin::Analog,
    unwrap: |c| match c {
        CachedPin::Analog(p) => Some(Arc::clone(p)),
        _ => None,
    },
};

const PWM: Kind<dyn PwmPin> = Kind {
    name: "pwm",
    caps: Capability::PWM,
    wrap: CachedPin::Pwm,
    unwrap: |c| match c {
        CachedPin::Pwm(p) => Some(Arc::clone(p)),
        _ => None,
    },
};

// ─── Handle token ───────────────────────────────────────────────────

/// Link from a pin back to the driver that built it.
///
/// Pins call [`unregister`](Self::unregister) from their `close`, and route
/// `watch`/`stop_watching` through the interrupt methods. A handle only
/// unregisters the pin it was issued for; once the pin has been closed and
/// reopened, the old handle gets `NotRegistered`.
#[derive(Clone)]
pub struct GpioHandle {
    driver: Weak<GpioDriver>,
    id: String,
    generation: u64,
}

impl GpioHandle {
    /// Pin identity the handle is cached under.
    pub fn id(&self) -> &str {
        &self.id
    }

    fn driver(&self) -> HalResult<Arc<GpioDriver>> {
        self.driver.upgrade().ok_or(HalError::NotInitialized {
            subsystem: Subsystem::Gpio,
        })
    }

    /// Remove the pin from the driver cache.
    pub fn unregister(&self) -> HalResult<()> {
        match self.driver.upgrade() {
            Some(driver) => driver.unregister(&self.id, self.generation),
            None => Err(HalError::NotRegistered {
                subsystem: Subsystem::Gpio,
                id: self.id.clone(),
            }),
        }
    }

    /// Watch `pin` through the driver's interrupt multiplexer.
    pub fn register_interrupt(&self, pin: Arc<dyn DigitalPin>, handler: IrqHandler) -> HalResult<()> {
        self.driver()?.register_interrupt(pin, handler)
    }

    /// Stop watching `pin`.
    pub fn unregister_interrupt(&self, pin: &dyn DigitalPin) -> HalResult<()> {
        self.driver()?.unregister_interrupt(pin)
    }
}

// ─── Driver ─────────────────────────────────────────────────────────

/// GPIO driver for one board.
pub struct GpioDriver {
    pin_map: PinMap,
    factories: PinFactories,
    interrupts: Arc<InterruptMux>,
    pins: HandleCache<String, CachedPin>,
    this: Weak<GpioDriver>,
}

impl GpioDriver {
    /// Create a driver over `pin_map`.
    pub fn new(pin_map: PinMap, factories: PinFactories, interrupts: Arc<InterruptMux>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            pin_map,
            factories,
            interrupts,
            pins: HandleCache::new(Subsystem::Gpio),
            this: this.clone(),
        })
    }

    /// Board capability map.
    pub fn pin_map(&self) -> &PinMap {
        &self.pin_map
    }

    /// Number of live handles.
    pub fn open_pins(&self) -> usize {
        self.pins.len()
    }

    /// Whether a handle is cached for the pin identity `id`.
    pub fn is_open(&self, id: &str) -> bool {
        self.pins.contains(&id.to_string())
    }

    fn acquire<P: ?Sized>(
        &self,
        key: PinKey,
        kind: Kind<P>,
        factory: Option<&PinFactory<P>>,
    ) -> HalResult<Arc<P>> {
        let factory = factory.ok_or(HalError::FeatureNotSupported { feature: kind.name })?;
        let pd = self
            .pin_map
            .lookup(&key, kind.caps)
            .ok_or_else(|| HalError::PinNotFound {
                subsystem: Subsystem::Gpio,
                key: key.to_string(),
            })?;

        let cached = self.pins.get_or_try_insert_with(&pd.id, |generation| {
            debug!("Opening {} pin {} for key {key}", kind.name, pd.id);
            let handle = GpioHandle {
                driver: self.this.clone(),
                id: pd.id.clone(),
                generation,
            };
            factory(pd, handle).map(kind.wrap)
        })?;

        (kind.unwrap)(&cached).ok_or_else(|| HalError::PinKindMismatch {
            id: pd.id.clone(),
            requested: kind.name,
            cached: cached.kind(),
        })
    }

    /// Digital pin for `key`. Repeated calls for keys resolving to the same
    /// pin return the same handle.
    ///
    /// # Errors
    ///
    /// - `FeatureNotSupported` if the board has no digital pins
    /// - `PinNotFound` if no descriptor matches with the digital capability
    /// - `PinKindMismatch` if the pin is open as another kind
    pub fn digital_pin(&self, key: impl Into<PinKey>) -> HalResult<Arc<dyn DigitalPin>> {
        self.acquire(key.into(), DIGITAL, self.factories.digital.as_ref())
    }

    /// Analog pin for `key`.
    pub fn analog_pin(&self, key: impl Into<PinKey>) -> HalResult<Arc<dyn AnalogPin>> {
        self.acquire(key.into(), ANALOG, self.factories.analog.as_ref())
    }

    /// PWM pin for `key`.
    pub fn pwm_pin(&self, key: impl Into<PinKey>) -> HalResult<Arc<dyn PwmPin>> {
        self.acquire(key.into(), PWM, self.factories.pwm.as_ref())
    }

    /// Forget the handle cached for `id` if it is the one issued under
    /// `generation`.
    ///
    /// # Errors
    ///
    /// `NotRegistered` if nothing is cached for `id`, or if the pin was
    /// closed and reopened since that handle was issued.
    pub fn unregister(&self, id: &str, generation: u64) -> HalResult<()> {
        self.pins.remove(&id.to_string(), generation)
    }

    /// Watch `pin` for edges.
    pub fn register_interrupt(&self, pin: Arc<dyn DigitalPin>, handler: IrqHandler) -> HalResult<()> {
        self.interrupts.register(pin, handler)
    }

    /// Stop watching `pin`.
    pub fn unregister_interrupt(&self, pin: &dyn DigitalPin) -> HalResult<()> {
        self.interrupts.unregister(pin)
    }

    /// Close every open pin, stopping at the first failure.
    pub fn close(&self) -> HalResult<()> {
        close_all(self.pins.snapshot(), CachedPin::close)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embr_common::config::InterruptConfig;

    struct Analog {
        id: String,
        handle: GpioHandle,
    }

    impl AnalogPin for Analog {
        fn id(&self) -> &str {
            &self.id
        }
        fn n(&self) -> u32 {
            0
        }
        fn read(&self) -> HalResult<u32> {
            Ok(512)
        }
        fn close(&self) -> HalResult<()> {
            self.handle.unregister()
        }
    }

    fn driver(factories: PinFactories) -> Arc<GpioDriver> {
        let map = PinMap::new(vec![
            PinDesc::new("P1", &["1"], Capability::DIGITAL | Capability::ANALOG),
            PinDesc::new("P2", &["2"], Capability::ANALOG),
        ]);
        GpioDriver::new(
            map,
            factories,
            Arc::new(InterruptMux::new(InterruptConfig::default())),
        )
    }

    fn analog_factories() -> PinFactories {
        PinFactories::new().analog(|pd, handle| {
            Ok(Arc::new(Analog {
                id: pd.id.clone(),
                handle,
            }) as Arc<dyn AnalogPin>)
        })
    }

    #[test]
    fn test_missing_factory_is_not_supported() {
        let drv = driver(analog_factories());
        let err = drv.digital_pin(1).err().unwrap();
        assert!(matches!(err, HalError::FeatureNotSupported { feature: "digital" }));
        let err = drv.pwm_pin(1).err().unwrap();
        assert!(matches!(err, HalError::FeatureNotSupported { feature: "pwm" }));
    }

    #[test]
    fn test_unknown_key_is_not_found() {
        let drv = driver(analog_factories());
        let err = drv.analog_pin("AIN9").err().unwrap();
        assert!(matches!(err, HalError::PinNotFound { subsystem: Subsystem::Gpio, .. }));
        assert_eq!(drv.open_pins(), 0);
    }

    #[test]
    fn test_kind_mismatch_reports_both_kinds() {
        let drv = driver(analog_factories().digital(|_, _| {
            Err(HalError::FeatureNotImplemented { feature: "digital" })
        }));
        drv.analog_pin("P1").unwrap();
        // Resolves to P1 which is cached as analog.
        let err = drv.digital_pin(1).err().unwrap();
        match err {
            HalError::PinKindMismatch { id, requested, cached } => {
                assert_eq!(id, "P1");
                assert_eq!(requested, "digital");
                assert_eq!(cached, "analog");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_close_empties_cache() {
        let drv = driver(analog_factories());
        drv.analog_pin("1").unwrap();
        drv.analog_pin("2").unwrap();
        assert_eq!(drv.open_pins(), 2);
        drv.close().unwrap();
        assert_eq!(drv.open_pins(), 0);
    }

    #[test]
    fn test_stale_close_keeps_reopened_pin() {
        let drv = driver(analog_factories());
        let old = drv.analog_pin("2").unwrap();
        old.close().unwrap();
        let new = drv.analog_pin("2").unwrap();

        let err = old.close().unwrap_err();
        assert!(matches!(err, HalError::NotRegistered { ref id, .. } if id == "P2"));
        assert!(drv.is_open("P2"));
        assert!(Arc::ptr_eq(&new, &drv.analog_pin("2").unwrap()));
    }

    #[test]
    fn test_handle_outlives_driver() {
        let drv = driver(analog_factories());
        let pin = drv.analog_pin("2").unwrap();
        drop(drv);
        assert!(matches!(pin.close(), Err(HalError::NotRegistered { .. })));
    }
}
