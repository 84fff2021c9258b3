//! EMBR Common Library
//!
//! Data model and contracts shared by all EMBR workspace crates. Nothing in
//! this crate spawns threads or keeps global state.
//!
//! # Module Structure
//!
//! - [`pin`] - Capability bitmask, pin descriptors, first-match lookup
//! - [`host`] - Board identity
//! - [`detect`] - Host detection from kernel version and cpuinfo
//! - [`hal`] - Pin, bus and LED handle traits
//! - [`error`] - Recoverable error taxonomy
//! - [`config`] - TOML configuration loading
//! - [`consts`] - Limits and default paths
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use embr_common::pin::{Capability, PinDesc, PinMap};
//!
//! let map = PinMap::new(vec![
//!     PinDesc::new("P1", &["1", "GPIO1"], Capability::DIGITAL),
//!     PinDesc::new("P2", &["1"], Capability::ANALOG),
//! ]);
//! assert_eq!(map.lookup("1", Capability::ANALOG).map(|p| p.id.as_str()), Some("P2"));
//! ```

pub mod config;
pub mod consts;
pub mod detect;
pub mod error;
pub mod hal;
pub mod host;
pub mod pin;
pub mod prelude;
