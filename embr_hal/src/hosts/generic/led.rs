//! Sysfs LED (`<root>/<id>/brightness`).

use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use embr_common::error::HalResult;
use embr_common::hal::led::Led;

use super::sysfs;
use crate::drivers::{Registration, lock};

/// LED driven through `/sys/class/leds`.
pub struct SysfsLed {
    reg: Registration<String>,
    brightness_path: PathBuf,
    brightness: Mutex<Option<File>>,
}

impl SysfsLed {
    /// LED registered under `reg`, living under `root`.
    pub fn with_root(reg: Registration<String>, root: impl Into<PathBuf>) -> Arc<Self> {
        let brightness_path = root.into().join(reg.key()).join("brightness");
        Arc::new(Self {
            reg,
            brightness_path,
            brightness: Mutex::new(None),
        })
    }

    /// Factory for an LED driver, building LEDs under `root`.
    pub fn factory(
        root: impl Into<PathBuf>,
    ) -> impl Fn(&str, Registration<String>) -> HalResult<Arc<dyn Led>> + Send + Sync + 'static {
        let root = root.into();
        move |_, reg| Ok(Self::with_root(reg, root.clone()) as Arc<dyn Led>)
    }

    fn with_file<R>(&self, f: impl FnOnce(&File) -> HalResult<R>) -> HalResult<R> {
        let mut brightness = lock(&self.brightness);
        let file = match brightness.take() {
            Some(file) => file,
            None => sysfs::open_rw(&self.brightness_path)?,
        };
        f(brightness.insert(file))
    }

    fn set(&self, on: bool) -> HalResult<()> {
        self.with_file(|file| {
            sysfs::write_at_start(file, &self.brightness_path, if on { "1" } else { "0" })
        })
    }
}

impl Led for SysfsLed {
    fn id(&self) -> &str {
        self.reg.key()
    }

    fn on(&self) -> HalResult<()> {
        self.set(true)
    }

    fn off(&self) -> HalResult<()> {
        self.set(false)
    }

    fn toggle(&self) -> HalResult<()> {
        let lit = self.with_file(|file| {
            Ok(sysfs::read_trimmed(file, &self.brightness_path)? == "1")
        })?;
        self.set(!lit)
    }

    fn close(&self) -> HalResult<()> {
        self.reg.unregister()?;
        lock(&self.brightness).take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    use crate::drivers::{LedDriver, LedMap};

    fn setup() -> (TempDir, Arc<LedDriver>) {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("led0")).unwrap();
        fs::write(dir.path().join("led0/brightness"), "0\n").unwrap();
        let drv = LedDriver::new(
            LedMap::new().with("led0", &["0", "LED0"]),
            SysfsLed::factory(dir.path()),
        );
        (dir, drv)
    }

    fn brightness(dir: &TempDir) -> String {
        fs::read_to_string(dir.path().join("led0/brightness"))
            .unwrap()
            .trim()
            .to_string()
    }

    #[test]
    fn test_on_off_toggle() {
        let (dir, drv) = setup();
        let led = drv.led("LED0").unwrap();

        led.on().unwrap();
        assert_eq!(brightness(&dir), "1");
        led.toggle().unwrap();
        assert_eq!(brightness(&dir), "0");
        led.toggle().unwrap();
        assert_eq!(brightness(&dir), "1");
        led.off().unwrap();
        assert_eq!(brightness(&dir), "0");
    }

    #[test]
    fn test_close_releases_handle() {
        let (_dir, drv) = setup();
        let led = drv.led(0).unwrap();
        led.close().unwrap();
        assert_eq!(drv.open_leds(), 0);
        let again = drv.led(0).unwrap();
        assert!(!Arc::ptr_eq(&led, &again));
    }

    #[test]
    fn test_missing_led_fails_on_use() {
        let dir = TempDir::new().unwrap();
        let drv = LedDriver::new(LedMap::new().with("led9", &["9"]), SysfsLed::factory(dir.path()));
        let led = drv.led(9).unwrap();
        assert!(led.on().is_err());
    }
}
