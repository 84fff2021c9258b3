//! Prelude module for common re-exports.
//!
//! ```rust
//! use embr_common::prelude::*;
//! ```

// ─── Errors ─────────────────────────────────────────────────────────
pub use crate::error::{HalError, HalResult};

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{
    ConfigError, ConfigLoader, DispatchPolicy, HalConfig, InterruptConfig, LogLevel,
};

// ─── Board identity ─────────────────────────────────────────────────
pub use crate::host::Host;

// ─── Pin maps ───────────────────────────────────────────────────────
pub use crate::pin::{Capability, PinDesc, PinKey, PinMap};

// ─── Handle contracts ───────────────────────────────────────────────
pub use crate::hal::Subsystem;
pub use crate::hal::bus::{I2cBus, SpiBus, SpiConfig, SpiMode};
pub use crate::hal::led::Led;
pub use crate::hal::pin::{
    AnalogPin, DigitalPin, Direction, Edge, IrqHandler, Level, Polarity, PwmPin,
};
