//! Pin handle traits and value types.

use std::fmt;
use std::os::fd::RawFd;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::HalResult;

// ─── Value types ────────────────────────────────────────────────────

/// Direction of a digital pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Read mode.
    In,
    /// Write mode.
    Out,
}

impl Direction {
    /// Sysfs spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

/// Logical level of a digital pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
    /// 0
    Low,
    /// 1
    High,
}

impl From<bool> for Level {
    fn from(b: bool) -> Self {
        if b { Self::High } else { Self::Low }
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> Self {
        match level {
            Level::Low => 0,
            Level::High => 1,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// Interrupt edge trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    /// Interrupts disabled.
    #[default]
    None,
    /// Low to high.
    Rising,
    /// High to low.
    Falling,
    /// Either transition.
    Both,
}

impl Edge {
    /// Sysfs spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Rising => "rising",
            Self::Falling => "falling",
            Self::Both => "both",
        }
    }
}

impl FromStr for Edge {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "rising" => Ok(Self::Rising),
            "falling" => Ok(Self::Falling),
            "both" => Ok(Self::Both),
            _ => Err(format!("unknown edge: {s:?}")),
        }
    }
}

/// Polarity of a PWM pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    /// Default positive polarity.
    #[default]
    Positive,
    /// Inverted polarity.
    Negative,
}

/// Callback invoked for each genuine edge on a watched pin.
pub type IrqHandler = Arc<dyn Fn(&dyn DigitalPin) + Send + Sync>;

// ─── Handle traits ──────────────────────────────────────────────────

/// Digital I/O pin.
///
/// All methods take `&self`: handles are shared as `Arc<dyn DigitalPin>` and
/// implementations keep their mutable state behind interior locks.
pub trait DigitalPin: Send + Sync {
    /// Identity of the descriptor this pin was built from.
    fn id(&self) -> &str;

    /// Logical GPIO number.
    fn n(&self) -> u32;

    /// Drive the pin.
    fn write(&self, level: Level) -> HalResult<()>;

    /// Sample the pin.
    fn read(&self) -> HalResult<Level>;

    /// Measure how long the pin stays at `state`.
    fn time_pulse(&self, state: Level) -> HalResult<Duration>;

    /// Set the pin direction.
    fn set_direction(&self, dir: Direction) -> HalResult<()>;

    /// Invert the logical sense of the pin.
    fn active_low(&self, enable: bool) -> HalResult<()>;

    /// Enable the pull-up resistor.
    fn pull_up(&self) -> HalResult<()>;

    /// Enable the pull-down resistor.
    fn pull_down(&self) -> HalResult<()>;

    /// Arm the pin for `edge` and deliver genuine edges to `handler`.
    fn watch(&self, edge: Edge, handler: IrqHandler) -> HalResult<()>;

    /// Disarm the pin.
    fn stop_watching(&self) -> HalResult<()>;

    /// Raw OS descriptor signalled on edges, if the pin is interrupt capable.
    fn fd(&self) -> Option<RawFd>;

    /// Release the pin and unregister it from its driver.
    fn close(&self) -> HalResult<()>;
}

/// Analog input pin.
pub trait AnalogPin: Send + Sync {
    /// Identity of the descriptor this pin was built from.
    fn id(&self) -> &str;

    /// Logical analog channel.
    fn n(&self) -> u32;

    /// Sample the pin.
    fn read(&self) -> HalResult<u32>;

    /// Release the pin and unregister it from its driver.
    fn close(&self) -> HalResult<()>;
}

/// PWM output pin.
pub trait PwmPin: Send + Sync {
    /// Identity of the descriptor this pin was built from.
    fn id(&self) -> &str;

    /// Logical PWM name.
    fn n(&self) -> &str;

    /// Set the period in nanoseconds.
    fn set_period(&self, ns: u32) -> HalResult<()>;

    /// Set the duty cycle in nanoseconds.
    fn set_duty(&self, ns: u32) -> HalResult<()>;

    /// Set the output polarity.
    fn set_polarity(&self, pol: Polarity) -> HalResult<()>;

    /// Generate a pulse `us` microseconds wide.
    fn set_microseconds(&self, us: u32) -> HalResult<()>;

    /// Set the output from a 0-255 range value.
    fn set_analog(&self, value: u8) -> HalResult<()>;

    /// Release the pin and unregister it from its driver.
    fn close(&self) -> HalResult<()>;
}
