use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Scenario S4 (spec §8): max=10, record(4) -> true, record(6) -> false
/// (exhausted once), allocate(50) -> 0.
#[test]
fn scenario_s4_budget_exhaustion() {
    let exhausted_calls = Arc::new(AtomicUsize::new(0));
    let exhausted_cb = exhausted_calls.clone();
    let governor = TurnGovernor::new(10, None, |_, _| {}, move |_, _| {
        exhausted_cb.fetch_add(1, Ordering::SeqCst);
    });

    assert!(governor.record_turns(4));
    assert!(!governor.record_turns(6));
    assert_eq!(exhausted_calls.load(Ordering::SeqCst), 1);
    assert_eq!(governor.allocate_cycle_budget(50), 0);
}

/// Testable property 4 (spec §8): allocate_cycle_budget never exceeds
/// min(cap, max - used), and returns 0 once exhausted.
#[test]
fn allocate_never_exceeds_remaining_or_cap() {
    let governor = TurnGovernor::new(30, None, |_, _| {}, |_, _| {});
    governor.record_turns(25);
    assert_eq!(governor.allocate_cycle_budget(50), 5);
    assert_eq!(governor.allocate_cycle_budget(3), 3);

    governor.record_turns(100);
    assert_eq!(governor.allocate_cycle_budget(50), 0);
}

/// Testable property 5 (spec §8): both callbacks fire at most once per
/// `reset()` epoch.
#[test]
fn callbacks_fire_once_per_epoch_then_rearm_after_reset() {
    let warnings = Arc::new(AtomicUsize::new(0));
    let exhaustions = Arc::new(AtomicUsize::new(0));
    let (w, e) = (warnings.clone(), exhaustions.clone());
    let governor = TurnGovernor::new(
        10,
        Some(0.5),
        move |_, _| {
            w.fetch_add(1, Ordering::SeqCst);
        },
        move |_, _| {
            e.fetch_add(1, Ordering::SeqCst);
        },
    );

    governor.record_turns(6); // crosses warning threshold (remaining 40% <= 50%)
    governor.record_turns(1);
    governor.record_turns(10); // exhausts
    governor.record_turns(10); // already exhausted, must not refire

    assert_eq!(warnings.load(Ordering::SeqCst), 1);
    assert_eq!(exhaustions.load(Ordering::SeqCst), 1);

    governor.reset();
    assert!(governor.can_spawn());
    governor.record_turns(6);
    assert_eq!(warnings.load(Ordering::SeqCst), 2);
}

#[test]
fn can_spawn_reflects_exhaustion() {
    let governor = TurnGovernor::new(5, None, |_, _| {}, |_, _| {});
    assert!(governor.can_spawn());
    governor.record_turns(5);
    assert!(!governor.can_spawn());
}
