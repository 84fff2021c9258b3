//! Resource drivers.
//!
//! One driver per subsystem turns a lookup key into a cached handle:
//!
//! - [`gpio`] - digital, analog and PWM pins resolved through the capability map
//! - [`i2c`] - buses keyed by index
//! - [`spi`] - buses keyed by chip-select channel
//! - [`led`] - LEDs resolved through the board's LED map
//!
//! Every driver keeps at most one live handle per physical resource. The
//! handle removes itself through its [`Registration`] when closed, and the
//! driver's `close` closes whatever is still cached. Each cache entry carries
//! the generation it was built under, so a stale handle closed after its
//! resource was reopened cannot evict the new handle.

pub mod gpio;
pub mod i2c;
pub mod led;
pub mod spi;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, Weak};

use embr_common::error::{HalError, HalResult};
use embr_common::hal::Subsystem;
use tracing::trace;

pub use gpio::{GpioDriver, GpioHandle, PinFactories};
pub use i2c::I2cDriver;
pub use led::{LedDriver, LedMap};
pub use spi::SpiDriver;

/// Lock a mutex, recovering the guard if a panicking holder poisoned it.
///
/// The guarded maps are only mutated by single insert/remove calls, so they
/// are consistent even after a panic elsewhere.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── Handle cache ───────────────────────────────────────────────────

/// Identity → handle map shared by all drivers.
///
/// Entries are tagged with a generation that is never reused within a cache.
pub(crate) struct HandleCache<K, V> {
    subsystem: Subsystem,
    entries: Mutex<BTreeMap<K, (u64, V)>>,
    next_generation: AtomicU64,
}

impl<K: Ord + Clone + fmt::Display, V: Clone> HandleCache<K, V> {
    pub(crate) fn new(subsystem: Subsystem) -> Self {
        Self {
            subsystem,
            entries: Mutex::new(BTreeMap::new()),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Return the cached handle for `key`, or build it with `make`.
    ///
    /// `make` receives the generation the new entry will carry; the handle
    /// must hand it back to [`remove`](Self::remove). The lock is held while
    /// `make` runs so concurrent first users of the same key observe one
    /// handle and `make` runs once. Factories must not call back into the
    /// owning driver.
    pub(crate) fn get_or_try_insert_with(
        &self,
        key: &K,
        make: impl FnOnce(u64) -> HalResult<V>,
    ) -> HalResult<V> {
        let mut entries = lock(&self.entries);
        if let Some((_, handle)) = entries.get(key) {
            trace!("{}: cache hit for {}", self.subsystem, key);
            return Ok(handle.clone());
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        trace!("{}: building handle for {} (generation {})", self.subsystem, key, generation);
        let handle = make(generation)?;
        entries.insert(key.clone(), (generation, handle.clone()));
        Ok(handle)
    }

    /// Remove `key` if it is still cached under `generation`.
    ///
    /// An absent key, or one rebuilt under a newer generation, is a
    /// lifecycle error and leaves the cache untouched.
    pub(crate) fn remove(&self, key: &K, generation: u64) -> HalResult<()> {
        let mut entries = lock(&self.entries);
        match entries.get(key) {
            Some((current, _)) if *current == generation => {
                entries.remove(key);
                Ok(())
            }
            _ => Err(HalError::NotRegistered {
                subsystem: self.subsystem,
                id: key.to_string(),
            }),
        }
    }

    pub(crate) fn contains(&self, key: &K) -> bool {
        lock(&self.entries).contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// Clone out the live handles in key order.
    pub(crate) fn snapshot(&self) -> Vec<V> {
        lock(&self.entries).values().map(|(_, v)| v.clone()).collect()
    }
}

/// Close every handle in order, stopping at the first failure.
///
/// Each `close` re-enters the cache through its registration, so this must
/// be called on a snapshot, never under the cache lock.
pub(crate) fn close_all<V>(handles: Vec<V>, close: impl Fn(&V) -> HalResult<()>) -> HalResult<()> {
    for handle in &handles {
        close(handle)?;
    }
    Ok(())
}

// ─── Registration ───────────────────────────────────────────────────

/// Driver side of a [`Registration`].
pub trait Registry<K>: Send + Sync {
    /// Remove the handle cached under `key` if it still carries `generation`.
    fn unregister(&self, key: &K, generation: u64) -> HalResult<()>;
}

/// Token given to a bus or LED factory so the handle can remove itself from
/// its driver when it is closed.
pub struct Registration<K> {
    registry: Weak<dyn Registry<K>>,
    subsystem: Subsystem,
    key: K,
    generation: u64,
}

impl<K: Clone> Clone for Registration<K> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            subsystem: self.subsystem,
            key: self.key.clone(),
            generation: self.generation,
        }
    }
}

impl<K: fmt::Display> Registration<K> {
    pub(crate) fn new(
        registry: Weak<dyn Registry<K>>,
        subsystem: Subsystem,
        key: K,
        generation: u64,
    ) -> Self {
        Self {
            registry,
            subsystem,
            key,
            generation,
        }
    }

    /// Key the handle is cached under.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Remove the handle from its driver.
    ///
    /// Fails with `NotRegistered` when the handle was already removed, was
    /// superseded by a newer handle for the same key, or the driver no
    /// longer exists.
    pub fn unregister(&self) -> HalResult<()> {
        match self.registry.upgrade() {
            Some(registry) => registry.unregister(&self.key, self.generation),
            None => Err(HalError::NotRegistered {
                subsystem: self.subsystem,
                id: self.key.to_string(),
            }),
        }
    }
}
