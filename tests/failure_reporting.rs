use oncelog::{BarrierError, HarnessError, LoggerRegistry, Scenario, ThreadCount, WorkerFault};
use std::time::Duration;
mod common;
use common::{SCENARIO_TIMEOUT, SHORT_TIMEOUT};

fn scenario(registry: &LoggerRegistry) -> Scenario {
    Scenario::new()
        .threads(ThreadCount::Fixed(8))
        .timeout(SCENARIO_TIMEOUT)
        .registry(registry.clone())
}

#[test]
fn test_worker_failing_before_lookup_is_a_null_logger() {
    let registry = LoggerRegistry::new();
    let result = scenario(&registry)
        .fault(5, WorkerFault::PanicBeforeLookup)
        .run();

    match result {
        Err(HarnessError::NullLogger { worker }) => assert_eq!(worker, 5),
        other => panic!("expected a null logger for worker 5, got {other:?}"),
    }
    assert_eq!(registry.observer_count(), 0);
}

#[test]
fn test_worker_panic_after_lookup_is_reported() {
    let registry = LoggerRegistry::new();
    let result = scenario(&registry)
        .fault(2, WorkerFault::PanicBeforeEmit)
        .run();

    match result {
        Err(HarnessError::WorkerPanicked { worker, message }) => {
            assert_eq!(worker, 2);
            assert!(message.contains("before emit"), "unexpected message: {message}");
        }
        other => panic!("expected a worker panic, got {other:?}"),
    }
}

#[test]
fn test_failure_before_rendezvous_breaks_the_barrier() {
    let registry = LoggerRegistry::new();
    let result = scenario(&registry)
        .fault(0, WorkerFault::PanicBeforeRendezvous)
        .run();

    assert!(
        matches!(
            result,
            Err(HarnessError::BarrierBroken(BarrierError::Broken))
        ),
        "expected a broken barrier, got {result:?}"
    );
    // Nobody got past the rendezvous
    assert!(!registry.is_initialized());
    assert_eq!(registry.observer_count(), 0);
}

#[test]
fn test_stuck_worker_is_reported_as_timeout() {
    let registry = LoggerRegistry::new();
    let result = Scenario::new()
        .threads(ThreadCount::Fixed(4))
        .timeout(SHORT_TIMEOUT)
        .registry(registry.clone())
        .fault(3, WorkerFault::Stall(Duration::from_secs(5)))
        .run();

    match result {
        Err(HarnessError::Timeout { waited, pending }) => {
            assert_eq!(waited, SHORT_TIMEOUT);
            assert_eq!(pending, 1);
        }
        other => panic!("expected a timeout, got {other:?}"),
    }
    assert_eq!(registry.observer_count(), 0);
}

#[test]
fn test_repeat_stops_at_first_failure() {
    let registry = LoggerRegistry::new();
    let err = scenario(&registry)
        .fault(1, WorkerFault::PanicBeforeLookup)
        .repeat(5)
        .unwrap_err();

    assert!(err.to_string().contains("run 1 of 5 failed"));
    assert!(matches!(
        err.downcast_ref::<HarnessError>(),
        Some(HarnessError::NullLogger { worker: 1 })
    ));
}

#[test]
fn test_error_messages_carry_counts() {
    let err = HarnessError::CountMismatch {
        what: "recorded event",
        expected: 13,
        actual: 12,
    };
    assert_eq!(
        err.to_string(),
        "recorded event mismatch: expected 13 events, got 12"
    );
    assert_eq!(
        HarnessError::NullLogger { worker: 3 }.to_string(),
        "logger for worker 3 is not set"
    );
}
