//! # EMBR HAL Library
//!
//! Capability-keyed hardware resource broker for embedded Linux boards.
//!
//! Callers name a pin, bus or LED by number or alias; the broker resolves
//! the name against the active board's capability map, builds the handle
//! once and hands the same instance to every later caller until it is
//! closed. Edge notifications for watched pins are multiplexed onto one
//! background worker.
//!
//! # Module Structure
//!
//! - [`core`] - HalCore context object, host override, subsystem lifecycle
//! - [`registry`] - Host registry and driver descriptors
//! - [`drivers`] - Per-subsystem resource drivers with handle caches
//! - [`interrupt`] - Edge-event multiplexer
//! - [`hosts`] - Board tables and generic Linux handle implementations
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            HalCore                               │
//! │  ┌──────────────┐   describe   ┌──────────────────────────────┐  │
//! │  │ HostRegistry │─────────────►│ Descriptor (driver ctors)    │  │
//! │  └──────────────┘              └──────────────┬───────────────┘  │
//! │                                               │ init_*           │
//! │         ┌───────────────┬─────────────────────┼────────────┐     │
//! │         ▼               ▼                     ▼            ▼     │
//! │   ┌───────────┐   ┌───────────┐        ┌───────────┐ ┌─────────┐ │
//! │   │GpioDriver │   │I2cDriver  │        │SpiDriver  │ │LedDriver│ │
//! │   └─────┬─────┘   └───────────┘        └───────────┘ └─────────┘ │
//! │         │ watch                                                  │
//! │         ▼                                                        │
//! │   ┌──────────────┐   epoll + eventfd   ┌──────────────────────┐  │
//! │   │ InterruptMux │────────────────────►│ worker "embr-irq"    │  │
//! │   └──────────────┘                     └──────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

#![deny(missing_docs)]

pub mod core;
pub mod drivers;
pub mod hosts;
pub mod interrupt;
pub mod registry;

// Re-export key types for convenience
pub use crate::core::HalCore;
pub use crate::interrupt::InterruptMux;
pub use crate::registry::{Descriptor, DriverContext, HostRegistry};
