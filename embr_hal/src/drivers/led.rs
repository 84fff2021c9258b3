//! LED driver.
//!
//! LEDs have no capabilities, so they are looked up in a separate
//! [`LedMap`] of sysfs names and aliases rather than the pin map.

use std::sync::{Arc, Weak};

use embr_common::error::{HalError, HalResult};
use embr_common::hal::Subsystem;
use embr_common::hal::led::Led;
use embr_common::pin::PinKey;
use serde::Serialize;

use super::{HandleCache, Registration, Registry, close_all};

/// Board LEDs: sysfs name plus the aliases users may call it by.
///
/// Entries are kept in board order; the first entry whose name or one of
/// whose aliases equals the key wins.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct LedMap {
    leds: Vec<(String, Vec<String>)>,
}

impl LedMap {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an LED.
    pub fn with(mut self, id: &str, aliases: &[&str]) -> Self {
        self.leds
            .push((id.to_string(), aliases.iter().map(|a| a.to_string()).collect()));
        self
    }

    /// Resolve `key` to an LED name.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.leds
            .iter()
            .find(|(id, aliases)| id == key || aliases.iter().any(|a| a == key))
            .map(|(id, _)| id.as_str())
    }

    /// LED names in board order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.leds.iter().map(|(id, _)| id.as_str())
    }

    /// Number of LEDs.
    pub fn len(&self) -> usize {
        self.leds.len()
    }

    /// Whether the board has no LEDs.
    pub fn is_empty(&self) -> bool {
        self.leds.is_empty()
    }
}

/// Builds the handle for an LED name.
pub type LedFactory = Arc<dyn Fn(&str, Registration<String>) -> HalResult<Arc<dyn Led>> + Send + Sync>;

/// LED driver for one board.
pub struct LedDriver {
    led_map: LedMap,
    factory: LedFactory,
    leds: HandleCache<String, Arc<dyn Led>>,
    this: Weak<LedDriver>,
}

impl LedDriver {
    /// Create a driver over `led_map`.
    pub fn new<F>(led_map: LedMap, factory: F) -> Arc<Self>
    where
        F: Fn(&str, Registration<String>) -> HalResult<Arc<dyn Led>> + Send + Sync + 'static,
    {
        Arc::new_cyclic(|this| Self {
            led_map,
            factory: Arc::new(factory),
            leds: HandleCache::new(Subsystem::Led),
            this: this.clone(),
        })
    }

    /// Board LED map.
    pub fn led_map(&self) -> &LedMap {
        &self.led_map
    }

    /// LED for `key`, built on first use.
    ///
    /// # Errors
    ///
    /// - `InvalidKey` if the key is empty
    /// - `PinNotFound` if no LED matches
    pub fn led(&self, key: impl Into<PinKey>) -> HalResult<Arc<dyn Led>> {
        let key = key.into();
        let canonical = key.canonical().ok_or_else(|| HalError::InvalidKey {
            key: key.to_string(),
        })?;
        let id = self
            .led_map
            .lookup(&canonical)
            .ok_or_else(|| HalError::PinNotFound {
                subsystem: Subsystem::Led,
                key: canonical.to_string(),
            })?
            .to_string();

        self.leds.get_or_try_insert_with(&id, |generation| {
            let registry: Weak<dyn Registry<String>> = self.this.clone();
            let reg = Registration::new(registry, Subsystem::Led, id.clone(), generation);
            (self.factory)(&id, reg)
        })
    }

    /// Number of open LEDs.
    pub fn open_leds(&self) -> usize {
        self.leds.len()
    }

    /// Forget the handle cached for `id` if it was built under `generation`.
    pub fn unregister(&self, id: &str, generation: u64) -> HalResult<()> {
        self.leds.remove(&id.to_string(), generation)
    }

    /// Close every open LED, stopping at the first failure.
    pub fn close(&self) -> HalResult<()> {
        close_all(self.leds.snapshot(), |led| led.close())
    }
}

impl Registry<String> for LedDriver {
    fn unregister(&self, key: &String, generation: u64) -> HalResult<()> {
        LedDriver::unregister(self, key, generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FakeLed {
        reg: Registration<String>,
        lit: AtomicBool,
    }

    impl Led for FakeLed {
        fn id(&self) -> &str {
            self.reg.key()
        }
        fn on(&self) -> HalResult<()> {
            self.lit.store(true, Ordering::SeqCst);
            Ok(())
        }
        fn off(&self) -> HalResult<()> {
            self.lit.store(false, Ordering::SeqCst);
            Ok(())
        }
        fn toggle(&self) -> HalResult<()> {
            self.lit.fetch_xor(true, Ordering::SeqCst);
            Ok(())
        }
        fn close(&self) -> HalResult<()> {
            self.reg.unregister()
        }
    }

    fn driver() -> Arc<LedDriver> {
        let map = LedMap::new()
            .with("led0", &["0", "LED0"])
            .with("led1", &["1", "LED1"]);
        LedDriver::new(map, |_, reg| {
            Ok(Arc::new(FakeLed {
                reg,
                lit: AtomicBool::new(false),
            }) as Arc<dyn Led>)
        })
    }

    #[test]
    fn test_led_map_lookup() {
        let map = driver().led_map().clone();
        assert_eq!(map.lookup("led1"), Some("led1"));
        assert_eq!(map.lookup("LED0"), Some("led0"));
        assert_eq!(map.lookup("2"), None);
        assert_eq!(map.ids().collect::<Vec<_>>(), ["led0", "led1"]);
    }

    #[test]
    fn test_aliases_share_one_handle() {
        let drv = driver();
        let a = drv.led(0).unwrap();
        let b = drv.led("LED0").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.id(), "led0");
        assert_eq!(drv.open_leds(), 1);
    }

    #[test]
    fn test_bad_keys() {
        let drv = driver();
        assert!(matches!(drv.led(""), Err(HalError::InvalidKey { .. })));
        assert!(matches!(
            drv.led("usr9"),
            Err(HalError::PinNotFound { subsystem: Subsystem::Led, .. })
        ));
    }

    #[test]
    fn test_close_unregisters_all() {
        let drv = driver();
        drv.led(0).unwrap().on().unwrap();
        drv.led(1).unwrap();
        drv.close().unwrap();
        assert_eq!(drv.open_leds(), 0);
    }
}
