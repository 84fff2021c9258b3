//! System-wide constants for the EMBR workspace.
//!
//! Single source of truth for numeric limits and default paths.

use static_assertions::const_assert;

/// Maximum number of readiness events drained per interrupt-loop wake.
pub const MAX_GPIO_INTERRUPT: usize = 64;

/// Upper bound accepted for a configured interrupt capacity.
pub const MAX_INTERRUPT_CAPACITY: usize = 1024;

/// Oldest supported kernel (major, minor).
pub const MIN_KERNEL_VERSION: (u32, u32) = (3, 8);

/// Location of the CPU information pseudo-file.
pub const CPUINFO_PATH: &str = "/proc/cpuinfo";

/// Root of the sysfs GPIO class.
pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// Root of the sysfs LED class.
pub const SYSFS_LED_ROOT: &str = "/sys/class/leds";

/// Directory holding `i2c-N` and `spidevM.C` device nodes.
pub const DEV_ROOT: &str = "/dev";

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/embr/embr.toml";

/// Default service name reported in logs.
pub const DEFAULT_SERVICE_NAME: &str = "embr";

const_assert!(MAX_GPIO_INTERRUPT > 0);
const_assert!(MAX_GPIO_INTERRUPT <= MAX_INTERRUPT_CAPACITY);
