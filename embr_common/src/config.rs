//! Configuration loading traits and types.
//!
//! Every EMBR binary reads one TOML file. The host override and interrupt
//! policy live here so they can be set without recompiling.
//!
//! # Usage
//!
//! ```rust,no_run
//! use embr_common::config::{ConfigLoader, HalConfig, ConfigError};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = HalConfig::load(Path::new("/etc/embr/embr.toml"))?;
//!     config.validate()?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::consts::{DEFAULT_SERVICE_NAME, MAX_GPIO_INTERRUPT, MAX_INTERRUPT_CAPACITY};
use crate::host::Host;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Fields shared by every EMBR application.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "embr-gateway-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_service_name() -> String {
    DEFAULT_SERVICE_NAME.to_string()
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: default_service_name(),
        }
    }
}

/// Explicit host selection. Its presence overrides detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostOverride {
    /// Board name, e.g. `"Raspberry Pi"`.
    pub name: Host,
    /// Board revision passed to the describer.
    #[serde(default)]
    pub revision: u32,
}

/// How the interrupt worker invokes user handlers.
///
/// Both policies run handlers on the single worker thread, one at a time, in
/// the order the OS reported the events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchPolicy {
    /// Handlers run while the registration lock is held, so a handler never
    /// overlaps a (un)registration of any pin.
    #[default]
    Inline,
    /// Handlers run after the lock is released. Registration calls do not
    /// wait for slow handlers, but an unregister may return while the last
    /// handler for that pin is still running.
    Deferred,
}

/// Interrupt multiplexer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptConfig {
    /// Handler invocation policy.
    #[serde(default)]
    pub dispatch: DispatchPolicy,
    /// Readiness events drained per wake.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_capacity() -> usize {
    MAX_GPIO_INTERRUPT
}

impl Default for InterruptConfig {
    fn default() -> Self {
        Self {
            dispatch: DispatchPolicy::default(),
            capacity: default_capacity(),
        }
    }
}

/// Top-level configuration file.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "info"
///
/// [host]
/// name = "BeagleBone Black"
/// revision = 0
///
/// [interrupt]
/// dispatch = "deferred"
/// capacity = 32
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HalConfig {
    /// Shared application settings.
    #[serde(default)]
    pub shared: SharedConfig,
    /// Host override; `None` means detect.
    #[serde(default)]
    pub host: Option<HostOverride>,
    /// Interrupt multiplexer settings.
    #[serde(default)]
    pub interrupt: InterruptConfig,
}

impl HalConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `service_name` is empty
    /// - `interrupt.capacity` is 0 or above [`MAX_INTERRUPT_CAPACITY`]
    /// - `host.name` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shared.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        if self.interrupt.capacity == 0 || self.interrupt.capacity > MAX_INTERRUPT_CAPACITY {
            return Err(ConfigError::ValidationError(format!(
                "interrupt.capacity must be 1..={MAX_INTERRUPT_CAPACITY}, got {}",
                self.interrupt.capacity
            )));
        }
        if let Some(host) = &self.host {
            if host.name == Host::Null {
                return Err(ConfigError::ValidationError(
                    "host.name cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Any serde-deserializable struct can be loaded from TOML.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
