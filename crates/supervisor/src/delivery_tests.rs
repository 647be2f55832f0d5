use super::*;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Testable property 7 (spec §8): with `maxRetries = k` and a deterministic
/// always-failing action, the action is called exactly `k + 1` times and
/// `deliver()` returns false.
#[tokio::test(start_paused = true)]
async fn exhausts_all_retries_on_persistent_failure() {
    let delivery = EventDelivery::new(3, Duration::from_millis(10));
    let calls = Arc::new(Mutex::new(0u32));
    let calls_cb = calls.clone();

    let delivered = delivery
        .deliver(
            move || {
                let calls = calls_cb.clone();
                async move {
                    *calls.lock() += 1;
                    false
                }
            },
            None::<fn() -> std::future::Ready<bool>>,
        )
        .await;

    assert!(!delivered);
    assert_eq!(*calls.lock(), 4);
    assert_eq!(delivery.failed_count(), 1);
    assert_eq!(delivery.delivered_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn succeeds_immediately_when_action_succeeds() {
    let delivery = EventDelivery::new(5, Duration::from_millis(10));
    let delivered = delivery
        .deliver(|| async { true }, None::<fn() -> std::future::Ready<bool>>)
        .await;
    assert!(delivered);
    assert_eq!(delivery.delivered_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn unconfirmed_success_consumes_retries_like_failure() {
    let delivery = EventDelivery::new(2, Duration::from_millis(10));
    let delivered = delivery
        .deliver(|| async { true }, Some(|| async { false }))
        .await;
    assert!(!delivered);
    assert_eq!(delivery.failed_count(), 1);
}

/// Testable property 8 (spec §8): delays between attempts grow as
/// `baseDelayMs * 2^i`, observed via Tokio's paused virtual clock.
#[tokio::test(start_paused = true)]
async fn backoff_delay_doubles_each_attempt() {
    let delivery = EventDelivery::new(3, Duration::from_millis(100));
    let start = tokio::time::Instant::now();
    let attempt_times = Arc::new(Mutex::new(Vec::new()));
    let attempt_times_cb = attempt_times.clone();

    delivery
        .deliver(
            move || {
                let attempt_times = attempt_times_cb.clone();
                async move {
                    attempt_times.lock().push(tokio::time::Instant::now());
                    false
                }
            },
            None::<fn() -> std::future::Ready<bool>>,
        )
        .await;

    let times = attempt_times.lock();
    assert_eq!(times.len(), 4);
    assert!(times[1] - start >= Duration::from_millis(100));
    assert!(times[2] - times[1] >= Duration::from_millis(200));
    assert!(times[3] - times[2] >= Duration::from_millis(400));
}
