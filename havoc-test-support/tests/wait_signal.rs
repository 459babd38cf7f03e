//! wait-signal stressor driven in-process against a real shared table.
//!
//! The runner and killer signal their parent with SIGALRM, so this binary
//! installs the stop handler first and hosts nothing else.
use havoc::signals::{ self, StopToken };
use havoc::stressor::wait::WaitStressor;
use havoc::{ SharedCounterTable, StressContext, Stressor, StressorKind };

#[test]
fn test_wait_stressor_counts_continuations() {
    signals::install_stop_handler().unwrap();
    let name = format!("/havoc-wait-test-{}", std::process::id());
    let table = SharedCounterTable::allocate(&name, 1).unwrap();

    let ctx = StressContext::new(StressorKind::Wait, 0, table.slot(0), 200, StopToken::process());
    WaitStressor::new().run(&ctx).unwrap();

    assert_eq!(table.read(0), 200);
    table.release().unwrap();
}
