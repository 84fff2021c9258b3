//! Interrupt multiplexer integration tests.
//!
//! Edges are simulated with eventfd-backed pins, so these run on any Linux
//! host without GPIO hardware.

mod common;

use std::sync::{Arc, Barrier};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use common::{FakePin, counting_handler, wait_for};
use embr_common::config::{DispatchPolicy, InterruptConfig};
use embr_common::error::HalError;
use embr_common::hal::pin::{DigitalPin, Edge, IrqHandler};
use embr_common::pin::{Capability, PinDesc, PinMap};
use embr_hal::InterruptMux;
use embr_hal::drivers::{GpioDriver, PinFactories};

const SETTLE: Duration = Duration::from_millis(100);
const TIMEOUT: Duration = Duration::from_secs(2);

fn mux(dispatch: DispatchPolicy) -> InterruptMux {
    InterruptMux::new(InterruptConfig {
        dispatch,
        capacity: 8,
    })
}

fn first_edge_is_suppressed(dispatch: DispatchPolicy) {
    let mux = mux(dispatch);
    let pin = FakePin::detached("P1");
    let (handler, count) = counting_handler();

    mux.register(pin.clone(), handler).unwrap();
    assert!(mux.is_running());

    pin.fire();
    thread::sleep(SETTLE);
    assert_eq!(count.load(Ordering::SeqCst), 0);

    pin.fire();
    assert!(wait_for(TIMEOUT, || count.load(Ordering::SeqCst) == 1));
    thread::sleep(SETTLE);
    pin.fire();
    assert!(wait_for(TIMEOUT, || count.load(Ordering::SeqCst) == 2));

    mux.shutdown();
    assert!(!mux.is_running());
}

#[test]
fn test_first_edge_is_suppressed_inline() {
    first_edge_is_suppressed(DispatchPolicy::Inline);
}

#[test]
fn test_first_edge_is_suppressed_deferred() {
    first_edge_is_suppressed(DispatchPolicy::Deferred);
}

#[test]
fn test_duplicate_registration_is_rejected() {
    let mux = mux(DispatchPolicy::Inline);
    let pin = FakePin::detached("P1");
    let (first, first_count) = counting_handler();
    let (duplicate, duplicate_count) = counting_handler();

    mux.register(pin.clone(), first).unwrap();
    let err = mux.register(pin.clone(), duplicate).unwrap_err();
    let fd = pin.fd().unwrap();
    assert!(matches!(err, HalError::PinAlreadyRegistered { fd: f } if f == fd));
    assert_eq!(mux.registered(), 1);

    // The first registration keeps its state and keeps dispatching.
    pin.fire();
    thread::sleep(SETTLE);
    pin.fire();
    assert!(wait_for(TIMEOUT, || first_count.load(Ordering::SeqCst) == 1));
    thread::sleep(SETTLE);
    assert_eq!(first_count.load(Ordering::SeqCst), 1);
    assert_eq!(duplicate_count.load(Ordering::SeqCst), 0);
}

#[test]
fn test_unregister_restores_blocking_mode() {
    let mux = mux(DispatchPolicy::Inline);
    let pin = FakePin::detached("P1");
    let (handler, count) = counting_handler();
    assert!(!pin.is_nonblocking());

    mux.register(pin.clone(), handler).unwrap();
    assert!(pin.is_nonblocking());
    assert!(mux.is_registered(&*pin));

    mux.unregister(&*pin).unwrap();
    assert!(!pin.is_nonblocking());
    assert!(!mux.is_registered(&*pin));
    assert_eq!(mux.registered(), 0);

    // Unregistering again is a no-op.
    mux.unregister(&*pin).unwrap();

    pin.fire();
    pin.fire();
    thread::sleep(SETTLE);
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn test_pins_are_dispatched_independently() {
    let mux = mux(DispatchPolicy::Deferred);
    let a = FakePin::detached("A");
    let b = FakePin::detached("B");
    let (ha, ca) = counting_handler();
    let (hb, cb) = counting_handler();
    mux.register(a.clone(), ha).unwrap();
    mux.register(b.clone(), hb).unwrap();
    assert_eq!(mux.registered(), 2);

    // Arm both.
    a.fire();
    b.fire();
    thread::sleep(SETTLE);

    a.fire();
    assert!(wait_for(TIMEOUT, || ca.load(Ordering::SeqCst) == 1));
    assert_eq!(cb.load(Ordering::SeqCst), 0);
}

#[test]
fn test_panicking_handler_does_not_stop_the_loop() {
    let mux = mux(DispatchPolicy::Inline);
    let pin = FakePin::detached("P1");
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let handler: IrqHandler = Arc::new(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
        panic!("handler failure");
    });

    mux.register(pin.clone(), handler).unwrap();
    pin.fire();
    thread::sleep(SETTLE);
    pin.fire();
    assert!(wait_for(TIMEOUT, || calls.load(Ordering::SeqCst) == 1));
    thread::sleep(SETTLE);
    pin.fire();
    assert!(wait_for(TIMEOUT, || calls.load(Ordering::SeqCst) == 2));
}

#[test]
fn test_shutdown_then_restart() {
    let mux = mux(DispatchPolicy::Inline);
    let pin = FakePin::detached("P1");
    let (handler, count) = counting_handler();

    mux.register(pin.clone(), Arc::clone(&handler)).unwrap();
    mux.shutdown();
    assert!(!mux.is_running());
    assert!(!pin.is_nonblocking());

    mux.register(pin.clone(), handler).unwrap();
    assert!(mux.is_running());
    pin.fire();
    thread::sleep(SETTLE);
    pin.fire();
    assert!(wait_for(TIMEOUT, || count.load(Ordering::SeqCst) == 1));
}

#[test]
fn test_shutdown_racing_register_leaves_nothing_behind() {
    let mux = Arc::new(mux(DispatchPolicy::Inline));
    let pins: Vec<_> = (0..16).map(|i| FakePin::detached(&format!("P{i}"))).collect();
    let barrier = Arc::new(Barrier::new(2));

    let registrar = {
        let mux = Arc::clone(&mux);
        let pins = pins.clone();
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for pin in &pins {
                let (handler, _) = counting_handler();
                mux.register(pin.clone(), handler).unwrap();
            }
        })
    };

    barrier.wait();
    for _ in 0..16 {
        mux.shutdown();
    }
    registrar.join().unwrap();
    mux.shutdown();

    // Every loop that was stopped released its pins.
    for pin in &pins {
        assert!(!pin.is_nonblocking(), "{} left in non-blocking mode", pin.id());
    }
}

#[test]
fn test_watch_through_gpio_driver() {
    let interrupts = Arc::new(mux(DispatchPolicy::Inline));
    let map = PinMap::new(vec![
        PinDesc::new("P1", &["1"], Capability::DIGITAL).digital(1),
    ]);
    let driver = GpioDriver::new(
        map,
        PinFactories::new().digital(FakePin::factory(Arc::new(AtomicUsize::new(0)))),
        Arc::clone(&interrupts),
    );

    let pin = driver.digital_pin(1).unwrap();
    let (handler, _) = counting_handler();
    pin.watch(Edge::Both, handler).unwrap();
    assert!(interrupts.is_registered(&*pin));

    pin.stop_watching().unwrap();
    assert!(!interrupts.is_registered(&*pin));

    // Closing a watched pin also drops its registration.
    let (handler, _) = counting_handler();
    pin.watch(Edge::Rising, handler).unwrap();
    pin.close().unwrap();
    assert_eq!(interrupts.registered(), 0);
    assert_eq!(driver.open_pins(), 0);
}
