//! Error types for hardware resource operations.
//!
//! Every recoverable failure in the workspace is a [`HalError`]. Configuration
//! faults (duplicate host registration) and a broken interrupt facility are not
//! represented here: they terminate the process at the point of detection.

use std::os::fd::RawFd;
use std::path::PathBuf;

use thiserror::Error;

use crate::hal::Subsystem;

/// Errors that can occur while resolving or driving hardware resources.
#[derive(Error, Debug)]
pub enum HalError {
    /// The board cannot do this at all.
    #[error("requested feature is not supported: {feature}")]
    FeatureNotSupported {
        /// Feature name
        feature: &'static str,
    },

    /// The board can do this in principle but it is not wired up yet.
    #[error("requested feature is not implemented: {feature}")]
    FeatureNotImplemented {
        /// Feature name
        feature: &'static str,
    },

    /// No describer is registered for the host.
    #[error("invalid host {host:?}")]
    InvalidHost {
        /// Host name
        host: String,
    },

    /// Running kernel is older than the supported minimum.
    #[error(
        "linux kernel versions lower than 3.8 are not supported, you have {major}.{minor}.{patch}"
    )]
    UnsupportedKernel {
        /// Kernel major version
        major: u32,
        /// Kernel minor version
        minor: u32,
        /// Kernel patch level
        patch: u32,
    },

    /// Kernel release string could not be parsed.
    #[error("cannot parse kernel version {input:?}")]
    KernelVersionParse {
        /// Raw release string
        input: String,
    },

    /// `/proc/cpuinfo` matched no known board.
    #[error("host {model:?} : {hardware:?} is not supported")]
    UnsupportedHardware {
        /// `model name` field
        model: String,
        /// `Hardware` field
        hardware: String,
    },

    /// Key has no match in the capability map.
    #[error("{subsystem}: could not find pin matching {key}")]
    PinNotFound {
        /// Subsystem performing the lookup
        subsystem: Subsystem,
        /// Canonical key
        key: String,
    },

    /// Key has no canonical form (for example an empty name).
    #[error("invalid key {key:?}")]
    InvalidKey {
        /// Raw key
        key: String,
    },

    /// Unregister was called for an identity that is not cached.
    #[error("{subsystem}: {id} is not registered yet, cannot unregister")]
    NotRegistered {
        /// Owning subsystem
        subsystem: Subsystem,
        /// Resource identity
        id: String,
    },

    /// The identity is already held by a handle of another kind.
    #[error("gpio: pin {id} is already in use as {cached}, cannot open as {requested}")]
    PinKindMismatch {
        /// Pin identity
        id: String,
        /// Requested handle kind
        requested: &'static str,
        /// Kind of the cached handle
        cached: &'static str,
    },

    /// Interrupt registration for a descriptor that is already registered.
    #[error("pin interrupt already registered (fd {fd})")]
    PinAlreadyRegistered {
        /// OS file descriptor
        fd: RawFd,
    },

    /// The pin has no OS descriptor to watch.
    #[error("pin {id} is not interrupt capable")]
    NotInterruptCapable {
        /// Pin identity
        id: String,
    },

    /// Subsystem accessor used before the subsystem was initialized.
    #[error("{subsystem} driver is not initialized")]
    NotInitialized {
        /// Subsystem
        subsystem: Subsystem,
    },

    /// Value outside the range accepted by the handle.
    #[error("invalid value {value} for {what}")]
    InvalidValue {
        /// What was being set
        what: &'static str,
        /// Offending value
        value: i64,
    },

    /// Sysfs or device-node access failed.
    #[error("I/O error on {}: {source}", path.display())]
    SysfsIo {
        /// File being accessed
        path: PathBuf,
        /// Source IO error
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },

    /// Nix system call error
    #[error("System call error: {source}")]
    Nix {
        /// Source nix error
        #[from]
        source: nix::Error,
    },
}

impl HalError {
    /// Wrap an IO error with the path that produced it.
    pub fn sysfs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SysfsIo {
            path: path.into(),
            source,
        }
    }
}

/// Result type for hardware resource operations.
pub type HalResult<T> = Result<T, HalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_supported_and_not_implemented_are_distinct() {
        let a = HalError::FeatureNotSupported { feature: "pwm" };
        let b = HalError::FeatureNotImplemented { feature: "pwm" };
        assert_ne!(a.to_string(), b.to_string());
        assert!(a.to_string().contains("not supported"));
        assert!(b.to_string().contains("not implemented"));
    }

    #[test]
    fn test_error_display_carries_context() {
        let err = HalError::PinNotFound {
            subsystem: Subsystem::Gpio,
            key: "GPIO99".to_string(),
        };
        assert!(err.to_string().contains("GPIO99"));
        assert!(err.to_string().starts_with("gpio:"));

        let err = HalError::NotRegistered {
            subsystem: Subsystem::I2c,
            id: "1".to_string(),
        };
        assert!(err.to_string().contains("cannot unregister"));

        let err = HalError::UnsupportedKernel {
            major: 3,
            minor: 2,
            patch: 0,
        };
        assert!(err.to_string().contains("3.2.0"));
    }

    #[test]
    fn test_sysfs_error_names_path() {
        let err = HalError::sysfs(
            "/sys/class/gpio/export",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(err.to_string().contains("/sys/class/gpio/export"));
    }
}
