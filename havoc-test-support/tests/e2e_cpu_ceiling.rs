//! Four cpu workers sharing a 4000 op ceiling stop at exactly 4000.
use havoc::StressorKind;
use havoc_test_support::{ print_summary, Scenario };

#[test]
fn test_cpu_ceiling_is_exact() {
    let outcome = Scenario::new()
        .with_workers(StressorKind::Cpu, 4)
        .with_max_ops(StressorKind::Cpu, 4000)
        .run();

    let report = outcome.report().expect("run failed");
    print_summary(report);

    assert!(report.is_success());
    assert!(!report.aborted);
    assert_eq!(report.workers.len(), 4);
    assert!(report.workers.iter().all(|w| w.outcome.is_some()));

    let cpu = report.kind_metrics(StressorKind::Cpu).expect("no cpu metrics");
    assert_eq!(cpu.workers, 4);
    assert_eq!(cpu.total_ops, 4000);
    assert!(cpu.rate() > 0.0);

    // Kinds that never started have no metrics line
    assert!(report.kind_metrics(StressorKind::Vm).is_none());
    assert!(!outcome.shm_leaked);
}
