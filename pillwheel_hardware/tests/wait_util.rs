use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU32, Ordering},
};
use std::thread;
use std::time::Duration;

use pillwheel_hardware::error::HwError;
use pillwheel_hardware::util::wait_until_ready_with_timeout;

#[test]
fn wait_until_ready_success_path() {
    let ready = Arc::new(AtomicBool::new(false));
    let ready_bg = ready.clone();
    // Flip ready after a short delay
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(3));
        ready_bg.store(true, Ordering::Relaxed);
    });

    let res = wait_until_ready_with_timeout(
        || Ok(ready.load(Ordering::Relaxed)),
        Duration::from_millis(50),
        Duration::from_micros(200),
    );
    assert!(res.is_ok(), "expected success, got {res:?}");
}

#[test]
fn wait_until_ready_timeout_path() {
    let err = wait_until_ready_with_timeout(
        || Ok(false),
        Duration::from_millis(5),
        Duration::from_micros(200),
    )
    .expect_err("expected timeout error");

    match err {
        HwError::DataReadyTimeout => {}
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn wait_until_ready_propagates_poll_errors() {
    let polls = AtomicU32::new(0);
    let err = wait_until_ready_with_timeout(
        || {
            polls.fetch_add(1, Ordering::Relaxed);
            Err(HwError::I2c("nack".into()))
        },
        Duration::from_millis(50),
        Duration::from_micros(200),
    )
    .expect_err("expected i2c error");

    assert!(matches!(err, HwError::I2c(_)));
    assert_eq!(polls.load(Ordering::Relaxed), 1);
}
