//! I2C driver: one bus handle per bus index.

use std::sync::{Arc, Weak};

use embr_common::error::HalResult;
use embr_common::hal::Subsystem;
use embr_common::hal::bus::I2cBus;

use super::{HandleCache, Registration, Registry, close_all};

/// Builds the bus handle for an index.
pub type I2cBusFactory =
    Arc<dyn Fn(u8, Registration<u8>) -> HalResult<Arc<dyn I2cBus>> + Send + Sync>;

/// I2C driver for one board.
pub struct I2cDriver {
    factory: I2cBusFactory,
    buses: HandleCache<u8, Arc<dyn I2cBus>>,
    this: Weak<I2cDriver>,
}

impl I2cDriver {
    /// Create a driver that builds buses with `factory`.
    pub fn new<F>(factory: F) -> Arc<Self>
    where
        F: Fn(u8, Registration<u8>) -> HalResult<Arc<dyn I2cBus>> + Send + Sync + 'static,
    {
        Arc::new_cyclic(|this| Self {
            factory: Arc::new(factory),
            buses: HandleCache::new(Subsystem::I2c),
            this: this.clone(),
        })
    }

    /// Bus `index`, built on first use.
    pub fn bus(&self, index: u8) -> HalResult<Arc<dyn I2cBus>> {
        self.buses.get_or_try_insert_with(&index, |generation| {
            let registry: Weak<dyn Registry<u8>> = self.this.clone();
            let reg = Registration::new(registry, Subsystem::I2c, index, generation);
            (self.factory)(index, reg)
        })
    }

    /// Number of open buses.
    pub fn open_buses(&self) -> usize {
        self.buses.len()
    }

    /// Forget the bus cached for `index` if it was built under `generation`.
    pub fn unregister(&self, index: u8, generation: u64) -> HalResult<()> {
        self.buses.remove(&index, generation)
    }

    /// Close every open bus, stopping at the first failure.
    pub fn close(&self) -> HalResult<()> {
        close_all(self.buses.snapshot(), |bus| bus.close())
    }
}

impl Registry<u8> for I2cDriver {
    fn unregister(&self, key: &u8, generation: u64) -> HalResult<()> {
        I2cDriver::unregister(self, *key, generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embr_common::error::HalError;

    struct NullBus {
        reg: Registration<u8>,
    }

    impl I2cBus for NullBus {
        fn index(&self) -> u8 {
            *self.reg.key()
        }
        fn read_byte(&self, _addr: u8) -> HalResult<u8> {
            Ok(0)
        }
        fn read_bytes(&self, _addr: u8, num: usize) -> HalResult<Vec<u8>> {
            Ok(vec![0; num])
        }
        fn write_byte(&self, _addr: u8, _value: u8) -> HalResult<()> {
            Ok(())
        }
        fn write_bytes(&self, _addr: u8, _value: &[u8]) -> HalResult<()> {
            Ok(())
        }
        fn read_from_reg(&self, _addr: u8, _reg: u8, _value: &mut [u8]) -> HalResult<()> {
            Ok(())
        }
        fn write_to_reg(&self, _addr: u8, _reg: u8, _value: &[u8]) -> HalResult<()> {
            Ok(())
        }
        fn close(&self) -> HalResult<()> {
            self.reg.unregister()
        }
    }

    fn driver() -> Arc<I2cDriver> {
        I2cDriver::new(|_, reg| Ok(Arc::new(NullBus { reg }) as Arc<dyn I2cBus>))
    }

    #[test]
    fn test_bus_is_cached_per_index() {
        let drv = driver();
        let a = drv.bus(1).unwrap();
        let b = drv.bus(1).unwrap();
        let c = drv.bus(2).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(c.index(), 2);
        assert_eq!(drv.open_buses(), 2);
    }

    #[test]
    fn test_closed_bus_is_rebuilt() {
        let drv = driver();
        let a = drv.bus(1).unwrap();
        a.close().unwrap();
        assert_eq!(drv.open_buses(), 0);
        let b = drv.bus(1).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_stale_close_keeps_reopened_bus() {
        let drv = driver();
        let old = drv.bus(1).unwrap();
        old.close().unwrap();
        let new = drv.bus(1).unwrap();

        assert!(matches!(
            old.close(),
            Err(HalError::NotRegistered { subsystem: Subsystem::I2c, .. })
        ));
        assert_eq!(drv.open_buses(), 1);
        assert!(Arc::ptr_eq(&new, &drv.bus(1).unwrap()));
    }

    #[test]
    fn test_double_close_fails() {
        let drv = driver();
        let bus = drv.bus(0).unwrap();
        bus.close().unwrap();
        assert!(matches!(
            bus.close(),
            Err(HalError::NotRegistered { subsystem: Subsystem::I2c, .. })
        ));
    }
}
