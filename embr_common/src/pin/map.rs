//! Pin descriptors and capability-based lookup.
//!
//! A board's [`PinMap`] is an ordered table built once when the host is
//! described and never mutated afterwards. The same alias may appear on
//! several descriptors as long as their capabilities differ:
//!
//! ```text
//! P1_1: aliases [AN1, 10]     caps ANALOG
//! P1_2: aliases [10, GPIO10]  caps DIGITAL
//! ```
//!
//! Looking up `10` with `DIGITAL` yields `P1_2`, with `ANALOG` yields `P1_1`.

use serde::Serialize;

use super::caps::Capability;
use super::key::PinKey;

// ─── PinDesc ────────────────────────────────────────────────────────

/// Static description of one physical pin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PinDesc {
    /// Unique identity within the board (for example `"P9_12"`).
    pub id: String,
    /// Alternative names, only honored together with a matching capability.
    pub aliases: Vec<String>,
    /// Subsystems this pin can serve.
    pub caps: Capability,
    /// Kernel GPIO number used by the digital subsystem.
    pub digital_logical: u32,
    /// Channel index used by the analog subsystem.
    pub analog_logical: u32,
}

impl PinDesc {
    /// Create a descriptor with zeroed logical indices.
    pub fn new(id: &str, aliases: &[&str], caps: Capability) -> Self {
        Self {
            id: id.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            caps,
            digital_logical: 0,
            analog_logical: 0,
        }
    }

    /// Set the digital logical index.
    pub fn digital(mut self, n: u32) -> Self {
        self.digital_logical = n;
        self
    }

    /// Set the analog logical index.
    pub fn analog(mut self, n: u32) -> Self {
        self.analog_logical = n;
        self
    }

    fn matches(&self, key: &str, caps: Capability) -> bool {
        // Identity is unambiguous, so it matches regardless of capability.
        if self.id == key {
            return true;
        }
        self.caps.intersects(caps) && self.aliases.iter().any(|a| a == key)
    }
}

// ─── PinMap ─────────────────────────────────────────────────────────

/// Ordered collection of pin descriptors for one board.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PinMap {
    pins: Vec<PinDesc>,
}

impl PinMap {
    /// Build a map from descriptors in table order.
    pub fn new(pins: Vec<PinDesc>) -> Self {
        Self { pins }
    }

    /// Resolve a key against the map.
    ///
    /// Descriptors are scanned in table order and the first match wins. A
    /// descriptor matches on identity for any capability, or on alias only
    /// when it shares at least one bit with `caps`. Absence is `None`, never
    /// an error.
    pub fn lookup(&self, key: impl Into<PinKey>, caps: Capability) -> Option<&PinDesc> {
        let key = key.into();
        let ks = key.canonical()?;
        self.pins.iter().find(|pd| pd.matches(&ks, caps))
    }

    /// Iterate descriptors in table order.
    pub fn iter(&self) -> impl Iterator<Item = &PinDesc> {
        self.pins.iter()
    }

    /// Number of descriptors.
    pub fn len(&self) -> usize {
        self.pins.len()
    }

    /// Whether the map has no descriptors.
    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }
}

impl FromIterator<PinDesc> for PinMap {
    fn from_iter<I: IntoIterator<Item = PinDesc>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
