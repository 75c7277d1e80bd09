#![cfg(feature = "stress-test")]

use oncelog::stress::{StressConfig, StressMode, preemption_count};
use oncelog::{LoggerRegistry, RegistryConfig, Scenario, ThreadCount};
mod common;
use common::SCENARIO_TIMEOUT;

fn stressed_registry(mode: StressMode) -> LoggerRegistry {
    LoggerRegistry::with_config(RegistryConfig {
        shards: 4,
        stress: Some(StressConfig {
            mode,
            preemption_probability: 0.8,
            min_delay_us: 50,
            max_delay_us: 2_000,
        }),
    })
}

#[test]
fn test_scenario_survives_random_preemption() {
    let before = preemption_count();

    for _ in 0..10 {
        let registry = stressed_registry(StressMode::RandomPreemption);
        let report = Scenario::new()
            .threads(ThreadCount::Fixed(24))
            .timeout(SCENARIO_TIMEOUT)
            .registry(registry.clone())
            .run()
            .expect("scenario failed under preemption");

        assert_eq!(report.recorded, 25);
        assert_eq!(registry.created(), 25);
    }

    assert!(preemption_count() > before);
}

#[test]
fn test_scenario_survives_yielding() {
    let registry = stressed_registry(StressMode::YieldOnly);
    let reports = Scenario::new()
        .threads(ThreadCount::Fixed(16))
        .timeout(SCENARIO_TIMEOUT)
        .registry(registry)
        .reuse_handles(true)
        .repeat(10)
        .expect("scenario failed while yielding");

    assert!(reports.iter().all(|r| r.recorded == 33));
}
