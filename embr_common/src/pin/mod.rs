//! Pin capability maps.
//!
//! - [`caps`] - capability bitmask
//! - [`key`] - lookup key sum type
//! - [`map`] - descriptors and first-match lookup

pub mod caps;
pub mod key;
pub mod map;

pub use caps::Capability;
pub use key::PinKey;
pub use map::{PinDesc, PinMap};
