//! Fake handles shared by the integration tests.
//!
//! `FakePin` is backed by an eventfd: writing to it makes the descriptor
//! readable, which the interrupt multiplexer sees exactly like a GPIO edge.

#![allow(dead_code)]

use std::os::fd::{AsFd, AsRawFd, RawFd};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use embr_common::error::{HalError, HalResult};
use embr_common::hal::pin::{AnalogPin, DigitalPin, Direction, Edge, IrqHandler, Level};
use embr_common::pin::PinDesc;
use embr_hal::drivers::GpioHandle;
use nix::fcntl::{FcntlArg, OFlag, fcntl};
use nix::sys::eventfd::{EfdFlags, EventFd};

/// Digital pin whose "edges" are produced by [`FakePin::fire`].
pub struct FakePin {
    id: String,
    n: u32,
    handle: Option<GpioHandle>,
    this: Weak<FakePin>,
    event: EventFd,
    level: Mutex<Level>,
}

impl FakePin {
    /// Pin not owned by any driver.
    pub fn detached(id: &str) -> Arc<Self> {
        Self::build(id.to_string(), 0, None)
    }

    fn build(id: String, n: u32, handle: Option<GpioHandle>) -> Arc<Self> {
        let event = EventFd::from_value_and_flags(0, EfdFlags::EFD_CLOEXEC).unwrap();
        Arc::new_cyclic(|this| Self {
            id,
            n,
            handle,
            this: this.clone(),
            event,
            level: Mutex::new(Level::Low),
        })
    }

    /// Digital factory for a `GpioDriver`, counting how often it runs.
    pub fn factory(
        built: Arc<AtomicUsize>,
    ) -> impl Fn(&PinDesc, GpioHandle) -> HalResult<Arc<dyn DigitalPin>> + Send + Sync + 'static {
        move |pd, handle| {
            built.fetch_add(1, Ordering::SeqCst);
            Ok(Self::build(pd.id.clone(), pd.digital_logical, Some(handle)) as Arc<dyn DigitalPin>)
        }
    }

    /// Signal one edge.
    pub fn fire(&self) {
        self.event.write(1).unwrap();
    }

    /// Whether the descriptor is in non-blocking mode.
    pub fn is_nonblocking(&self) -> bool {
        let flags = fcntl(self.event.as_fd(), FcntlArg::F_GETFL).unwrap();
        OFlag::from_bits_truncate(flags).contains(OFlag::O_NONBLOCK)
    }

    fn handle(&self) -> HalResult<&GpioHandle> {
        self.handle.as_ref().ok_or(HalError::FeatureNotSupported { feature: "detached" })
    }
}

impl DigitalPin for FakePin {
    fn id(&self) -> &str {
        &self.id
    }

    fn n(&self) -> u32 {
        self.n
    }

    fn write(&self, level: Level) -> HalResult<()> {
        *self.level.lock().unwrap() = level;
        Ok(())
    }

    fn read(&self) -> HalResult<Level> {
        Ok(*self.level.lock().unwrap())
    }

    fn time_pulse(&self, _state: Level) -> HalResult<Duration> {
        Ok(Duration::ZERO)
    }

    fn set_direction(&self, _dir: Direction) -> HalResult<()> {
        Ok(())
    }

    fn active_low(&self, _enable: bool) -> HalResult<()> {
        Ok(())
    }

    fn pull_up(&self) -> HalResult<()> {
        Err(HalError::FeatureNotImplemented { feature: "pull_up" })
    }

    fn pull_down(&self) -> HalResult<()> {
        Err(HalError::FeatureNotImplemented { feature: "pull_down" })
    }

    fn watch(&self, _edge: Edge, handler: IrqHandler) -> HalResult<()> {
        let this = self.this.upgrade().ok_or(HalError::NotRegistered {
            subsystem: embr_common::hal::Subsystem::Gpio,
            id: self.id.clone(),
        })?;
        self.handle()?.register_interrupt(this, handler)
    }

    fn stop_watching(&self) -> HalResult<()> {
        self.handle()?.unregister_interrupt(self)
    }

    fn fd(&self) -> Option<RawFd> {
        Some(self.event.as_fd().as_raw_fd())
    }

    fn close(&self) -> HalResult<()> {
        let handle = self.handle()?;
        handle.unregister()?;
        handle.unregister_interrupt(self)
    }
}

/// Analog pin returning a fixed sample.
pub struct FakeAnalog {
    id: String,
    n: u32,
    handle: GpioHandle,
}

impl FakeAnalog {
    /// Analog factory for a `GpioDriver`.
    pub fn factory() -> impl Fn(&PinDesc, GpioHandle) -> HalResult<Arc<dyn AnalogPin>> + Send + Sync + 'static
    {
        |pd, handle| {
            Ok(Arc::new(Self {
                id: pd.id.clone(),
                n: pd.analog_logical,
                handle,
            }) as Arc<dyn AnalogPin>)
        }
    }
}

impl AnalogPin for FakeAnalog {
    fn id(&self) -> &str {
        &self.id
    }

    fn n(&self) -> u32 {
        self.n
    }

    fn read(&self) -> HalResult<u32> {
        Ok(512 + self.n)
    }

    fn close(&self) -> HalResult<()> {
        self.handle.unregister()
    }
}

/// Handler that counts its invocations.
pub fn counting_handler() -> (IrqHandler, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    let handler: IrqHandler = Arc::new(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    (handler, count)
}

/// Poll `cond` until it holds or `timeout` passes.
pub fn wait_for(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}
