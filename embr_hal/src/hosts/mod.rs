//! Board support.
//!
//! Each board module holds its capability map, LED map and describer. The
//! [`generic`] module holds the Linux sysfs/devfs handles they share.

pub mod bbb;
pub mod botanist_gw;
pub mod edison;
pub mod generic;
pub mod rpi;

use std::sync::Arc;

use embr_common::host::Host;
use embr_common::pin::PinMap;

use crate::drivers::{GpioDriver, PinFactories};
use crate::registry::{DriverContext, HostRegistry};

/// GPIO driver constructor over a fixed pin map.
pub(crate) fn sysfs_gpio(
    pins: PinMap,
    factories: PinFactories,
) -> impl Fn(&DriverContext) -> Arc<GpioDriver> + Send + Sync + 'static {
    move |ctx| GpioDriver::new(pins.clone(), factories.clone(), Arc::clone(&ctx.interrupts))
}

/// Register every built-in board.
///
/// # Panics
/// Panics if any of them is already registered.
pub fn register_all(registry: &mut HostRegistry) {
    registry.register(Host::RaspberryPi, rpi::describe);
    registry.register(Host::BeagleBoneBlack, bbb::describe);
    registry.register(Host::Edison, edison::describe);
    registry.register(Host::BotanistGw, botanist_gw::describe);
}
