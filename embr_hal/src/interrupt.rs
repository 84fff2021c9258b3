//! Edge-interrupt multiplexer.
//!
//! One epoll instance and one worker thread serve every watched pin of a
//! [`HalCore`](crate::core::HalCore). The event loop is created on the first
//! registration and torn down by [`InterruptMux::shutdown`]; a later
//! registration starts a fresh one.
//!
//! Pins are watched edge-triggered for `EPOLLIN | EPOLLPRI`. The kernel
//! reports a sysfs value file as ready immediately after it is armed, so the
//! first readiness event per registration is swallowed and only later events
//! reach the handler.
//!
//! # Failure model
//!
//! Registration errors are returned to the caller. Failure to create the
//! epoll instance, or any wait error other than `EINTR`, means the process
//! can no longer deliver interrupts: it is logged and the process aborts.
//!
//! A panicking handler is caught and logged, and the loop keeps serving the
//! other pins. This needs an unwinding panic strategy: the workspace release
//! profile sets `panic = "abort"`, so in release builds a handler panic
//! terminates the process.

use std::collections::HashMap;
use std::os::fd::{AsFd, BorrowedFd, RawFd};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use embr_common::config::{DispatchPolicy, InterruptConfig};
use embr_common::error::{HalError, HalResult};
use embr_common::hal::pin::{DigitalPin, IrqHandler};
use nix::errno::Errno;
use nix::fcntl::{FcntlArg, OFlag, fcntl};
use nix::sys::epoll::{Epoll, EpollCreateFlags, EpollEvent, EpollFlags, EpollTimeout};
use nix::sys::eventfd::{EfdFlags, EventFd};
use tracing::{debug, error, info, warn};

use crate::drivers::lock;

/// Event data reserved for the wake descriptor. Pin events carry their fd.
const WAKE_TOKEN: u64 = u64::MAX;

fn fatal(msg: &str) -> ! {
    error!("FATAL: {msg}");
    std::process::abort()
}

// ─── Registration ───────────────────────────────────────────────────

struct Interrupt {
    pin: Arc<dyn DigitalPin>,
    handler: IrqHandler,
    armed: bool,
}

impl Interrupt {
    /// Consume one readiness event. Returns the call to make, if any.
    fn signal(&mut self) -> Option<(IrqHandler, Arc<dyn DigitalPin>)> {
        if !self.armed {
            self.armed = true;
            return None;
        }
        Some((Arc::clone(&self.handler), Arc::clone(&self.pin)))
    }
}

/// Run a handler, containing its panic. Has no effect under `panic = "abort"`.
fn invoke(handler: &IrqHandler, pin: &dyn DigitalPin) {
    if catch_unwind(AssertUnwindSafe(|| handler(pin))).is_err() {
        error!("interrupt handler for pin {} panicked", pin.id());
    }
}

/// Toggle `O_NONBLOCK` on a descriptor owned by a pin.
fn set_nonblocking(fd: BorrowedFd<'_>, enable: bool) -> nix::Result<()> {
    let mut flags = OFlag::from_bits_retain(fcntl(fd, FcntlArg::F_GETFL)?);
    flags.set(OFlag::O_NONBLOCK, enable);
    fcntl(fd, FcntlArg::F_SETFL(flags))?;
    Ok(())
}

// ─── Event loop ─────────────────────────────────────────────────────

struct EventLoop {
    epoll: Epoll,
    wake: EventFd,
    policy: DispatchPolicy,
    capacity: usize,
    interrupts: Mutex<HashMap<RawFd, Interrupt>>,
}

impl EventLoop {
    fn start(config: InterruptConfig) -> (Arc<Self>, JoinHandle<()>) {
        let epoll = Epoll::new(EpollCreateFlags::EPOLL_CLOEXEC)
            .unwrap_or_else(|e| fatal(&format!("epoll create failed: {e}")));
        let wake = EventFd::from_value_and_flags(0, EfdFlags::EFD_CLOEXEC | EfdFlags::EFD_NONBLOCK)
            .unwrap_or_else(|e| fatal(&format!("eventfd create failed: {e}")));
        if let Err(e) = epoll.add(wake.as_fd(), EpollEvent::new(EpollFlags::EPOLLIN, WAKE_TOKEN)) {
            fatal(&format!("epoll add wake descriptor failed: {e}"));
        }

        let event_loop = Arc::new(Self {
            epoll,
            wake,
            policy: config.dispatch,
            capacity: config.capacity.max(1),
            interrupts: Mutex::new(HashMap::new()),
        });

        let worker = Arc::clone(&event_loop);
        let handle = thread::Builder::new()
            .name("embr-irq".to_string())
            .spawn(move || worker.run())
            .unwrap_or_else(|e| fatal(&format!("interrupt worker spawn failed: {e}")));

        info!(
            "Interrupt loop started (dispatch={:?}, capacity={})",
            config.dispatch, config.capacity
        );
        (event_loop, handle)
    }

    fn run(&self) {
        let mut events = vec![EpollEvent::empty(); self.capacity];
        loop {
            let n = match self.epoll.wait(&mut events, EpollTimeout::NONE) {
                Ok(n) => n,
                Err(Errno::EINTR) => continue,
                Err(e) => fatal(&format!("epoll wait failed: {e}")),
            };

            let mut woken = false;
            let mut ready = Vec::with_capacity(n);
            for event in &events[..n] {
                if event.data() == WAKE_TOKEN {
                    woken = true;
                } else {
                    ready.push(event.data() as RawFd);
                }
            }

            self.dispatch(&ready);

            // Only `stop` writes the wake descriptor.
            if woken {
                debug!("Interrupt loop stopping");
                return;
            }
        }
    }

    fn dispatch(&self, ready: &[RawFd]) {
        match self.policy {
            DispatchPolicy::Inline => {
                let mut interrupts = lock(&self.interrupts);
                for fd in ready {
                    if let Some((handler, pin)) = interrupts.get_mut(fd).and_then(Interrupt::signal) {
                        invoke(&handler, pin.as_ref());
                    }
                }
            }
            DispatchPolicy::Deferred => {
                let calls: Vec<_> = {
                    let mut interrupts = lock(&self.interrupts);
                    ready
                        .iter()
                        .filter_map(|fd| interrupts.get_mut(fd).and_then(Interrupt::signal))
                        .collect()
                };
                for (handler, pin) in calls {
                    invoke(&handler, pin.as_ref());
                }
            }
        }
    }

    fn register(&self, fd: RawFd, pin: Arc<dyn DigitalPin>, handler: IrqHandler) -> HalResult<()> {
        let mut interrupts = lock(&self.interrupts);
        if interrupts.contains_key(&fd) {
            return Err(HalError::PinAlreadyRegistered { fd });
        }

        // SAFETY: the pin owns `fd` and keeps it open while it is registered.
        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
        set_nonblocking(borrowed, true)?;
        let event = EpollEvent::new(
            EpollFlags::EPOLLIN | EpollFlags::EPOLLET | EpollFlags::EPOLLPRI,
            fd as u64,
        );
        if let Err(e) = self.epoll.add(borrowed, event) {
            let _ = set_nonblocking(borrowed, false);
            return Err(e.into());
        }

        debug!("Registered interrupt for pin {} (fd {fd})", pin.id());
        interrupts.insert(
            fd,
            Interrupt {
                pin,
                handler,
                armed: false,
            },
        );
        Ok(())
    }

    fn unregister(&self, fd: RawFd) -> HalResult<()> {
        let mut interrupts = lock(&self.interrupts);
        let Some(interrupt) = interrupts.get(&fd) else {
            return Ok(());
        };

        // SAFETY: the descriptor is still registered, so its pin has not closed it.
        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
        self.epoll.delete(borrowed)?;
        set_nonblocking(borrowed, false)?;

        debug!("Unregistered interrupt for pin {} (fd {fd})", interrupt.pin.id());
        interrupts.remove(&fd);
        Ok(())
    }

    fn len(&self) -> usize {
        lock(&self.interrupts).len()
    }

    fn contains(&self, fd: RawFd) -> bool {
        lock(&self.interrupts).contains_key(&fd)
    }

    /// Remove every registration and ask the worker to exit.
    fn stop(&self) {
        let fds: Vec<RawFd> = lock(&self.interrupts).keys().copied().collect();
        for fd in fds {
            if let Err(e) = self.unregister(fd) {
                warn!("Failed to unregister fd {fd} during shutdown: {e}");
            }
        }
        if let Err(e) = self.wake.write(1) {
            fatal(&format!("interrupt loop wake failed: {e}"));
        }
    }
}

// ─── Multiplexer ────────────────────────────────────────────────────

struct Running {
    event_loop: Arc<EventLoop>,
    worker: JoinHandle<()>,
}

/// Lazily started interrupt multiplexer.
///
/// Creating one allocates no OS resources. The epoll instance and worker
/// thread appear on the first [`register`](Self::register).
///
/// With [`DispatchPolicy::Inline`] handlers run under the registration lock:
/// a handler must not register or unregister interrupts itself.
pub struct InterruptMux {
    config: InterruptConfig,
    running: Mutex<Option<Running>>,
}

impl InterruptMux {
    /// Create an idle multiplexer.
    pub fn new(config: InterruptConfig) -> Self {
        Self {
            config,
            running: Mutex::new(None),
        }
    }

    /// Settings the event loop is started with.
    pub fn config(&self) -> &InterruptConfig {
        &self.config
    }

    /// Whether the worker thread is running.
    pub fn is_running(&self) -> bool {
        lock(&self.running).is_some()
    }

    fn current(&self) -> Option<Arc<EventLoop>> {
        lock(&self.running)
            .as_ref()
            .map(|state| Arc::clone(&state.event_loop))
    }

    /// Start delivering edges of `pin` to `handler`.
    ///
    /// The pin's descriptor is switched to non-blocking mode while it is
    /// registered. The first readiness event after registration is not
    /// delivered.
    ///
    /// # Errors
    ///
    /// - `NotInterruptCapable` if the pin has no descriptor
    /// - `PinAlreadyRegistered` if the descriptor is already watched
    /// - `Nix` if the descriptor cannot be added to epoll
    pub fn register(&self, pin: Arc<dyn DigitalPin>, handler: IrqHandler) -> HalResult<()> {
        let fd = pin.fd().ok_or_else(|| HalError::NotInterruptCapable {
            id: pin.id().to_string(),
        })?;
        // Held until the pin is in epoll so `shutdown` cannot stop this
        // loop in between and leave the registration behind.
        let mut running = lock(&self.running);
        let state = running.get_or_insert_with(|| {
            let (event_loop, worker) = EventLoop::start(self.config);
            Running { event_loop, worker }
        });
        state.event_loop.register(fd, pin, handler)
    }

    /// Stop delivering edges of `pin`.
    ///
    /// A pin that is not registered is a no-op. On success the descriptor is
    /// back in blocking mode.
    pub fn unregister(&self, pin: &dyn DigitalPin) -> HalResult<()> {
        let (Some(fd), Some(event_loop)) = (pin.fd(), self.current()) else {
            return Ok(());
        };
        event_loop.unregister(fd)
    }

    /// Whether `pin` is currently registered.
    pub fn is_registered(&self, pin: &dyn DigitalPin) -> bool {
        match (pin.fd(), self.current()) {
            (Some(fd), Some(event_loop)) => event_loop.contains(fd),
            _ => false,
        }
    }

    /// Number of registered pins.
    pub fn registered(&self) -> usize {
        self.current().map_or(0, |event_loop| event_loop.len())
    }

    /// Unregister every pin and join the worker thread.
    ///
    /// Safe to call when the loop never started. Must not be called from
    /// inside a handler.
    pub fn shutdown(&self) {
        let Some(Running { event_loop, worker }) = lock(&self.running).take() else {
            return;
        };
        event_loop.stop();
        if worker.join().is_err() {
            error!("Interrupt worker panicked");
        }
        info!("Interrupt loop stopped");
    }
}

impl Drop for InterruptMux {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use embr_common::hal::pin::{Direction, Edge, Level};

    /// Pin with no OS descriptor.
    struct Detached;

    impl DigitalPin for Detached {
        fn id(&self) -> &str {
            "DETACHED"
        }
        fn n(&self) -> u32 {
            0
        }
        fn write(&self, _level: Level) -> HalResult<()> {
            Ok(())
        }
        fn read(&self) -> HalResult<Level> {
            Ok(Level::Low)
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
            Ok(())
        }
        fn pull_down(&self) -> HalResult<()> {
            Ok(())
        }
        fn watch(&self, _edge: Edge, _handler: IrqHandler) -> HalResult<()> {
            Ok(())
        }
        fn stop_watching(&self) -> HalResult<()> {
            Ok(())
        }
        fn fd(&self) -> Option<RawFd> {
            None
        }
        fn close(&self) -> HalResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_new_mux_is_idle() {
        let mux = InterruptMux::new(InterruptConfig::default());
        assert!(!mux.is_running());
        assert_eq!(mux.registered(), 0);
        assert!(mux.unregister(&Detached).is_ok());
        assert!(!mux.is_running());
        mux.shutdown();
    }

    #[test]
    fn test_register_without_descriptor_fails() {
        let mux = InterruptMux::new(InterruptConfig::default());
        let handler: IrqHandler = Arc::new(|_| {});
        let err = mux.register(Arc::new(Detached), handler).unwrap_err();
        assert!(matches!(err, HalError::NotInterruptCapable { .. }));
        assert!(!mux.is_running());
    }

    #[test]
    fn test_first_signal_is_swallowed() {
        let mut irq = Interrupt {
            pin: Arc::new(Detached),
            handler: Arc::new(|_| {}),
            armed: false,
        };
        assert!(irq.signal().is_none());
        assert!(irq.signal().is_some());
        assert!(irq.signal().is_some());
    }

    #[test]
    fn test_panicking_handler_is_contained() {
        let handler: IrqHandler = Arc::new(|_| panic!("boom"));
        invoke(&handler, &Detached);
    }
}
