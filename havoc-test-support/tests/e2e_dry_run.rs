//! Dry run forks every worker but none of them does any work.
use havoc::StressorKind;
use havoc_test_support::Scenario;

#[test]
fn test_dry_run_spawns_and_reaps_only() {
    let outcome = Scenario::new()
        .with_workers(StressorKind::Cpu, 2)
        .with_workers(StressorKind::Vm, 1)
        .with_workers(StressorKind::Null, 3)
        .with_dry_run()
        .run();

    let report = outcome.report().expect("run failed");
    assert!(report.is_success());
    assert_eq!(report.workers.len(), 6);
    for kind in [StressorKind::Cpu, StressorKind::Vm, StressorKind::Null] {
        assert_eq!(outcome.total_ops(kind), 0, "{kind} did work");
    }
    assert!(!outcome.shm_leaked);
}
