use oncelog::{LoggerRegistry, Scenario, ThreadCount};
mod common;
use common::SCENARIO_TIMEOUT;

const RUNS: usize = 50;

#[test]
fn test_fifty_runs_on_fresh_registries() {
    for run in 0..RUNS {
        let registry = LoggerRegistry::new();
        let report = Scenario::new()
            .threads(ThreadCount::Fixed(12))
            .timeout(SCENARIO_TIMEOUT)
            .registry(registry.clone())
            .run()
            .unwrap_or_else(|e| panic!("run {run} failed: {e}"));

        assert_eq!(report.recorded, 13, "run {run} recorded the wrong count");
        assert_eq!(registry.created(), 13, "run {run} constructed a logger twice");
    }
}

#[test]
fn test_fifty_runs_on_one_registry() {
    let registry = LoggerRegistry::new();
    let reports = Scenario::new()
        .threads(ThreadCount::Fixed(12))
        .timeout(SCENARIO_TIMEOUT)
        .registry(registry.clone())
        .repeat(RUNS)
        .expect("repeated scenario failed");

    assert_eq!(reports.len(), RUNS);
    assert!(reports.iter().all(|r| r.recorded == 13));

    let mut namespaces: Vec<&str> = reports.iter().map(|r| r.namespace.as_str()).collect();
    namespaces.sort();
    namespaces.dedup();
    assert_eq!(namespaces.len(), RUNS);

    assert_eq!(registry.len(), RUNS * 13);
    assert_eq!(registry.created(), RUNS * 13);
}
