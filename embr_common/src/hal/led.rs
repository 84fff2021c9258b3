//! On-board LED handle trait.

use crate::error::HalResult;

/// LED on the board.
pub trait Led: Send + Sync {
    /// LED identity (sysfs name).
    fn id(&self) -> &str;

    /// Switch the LED on.
    fn on(&self) -> HalResult<()>;

    /// Switch the LED off.
    fn off(&self) -> HalResult<()>;

    /// Toggle the LED.
    fn toggle(&self) -> HalResult<()>;

    /// Release the LED and unregister it from its driver.
    fn close(&self) -> HalResult<()>;
}
