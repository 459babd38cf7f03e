//! # havoc-test-support
//!
//! Testing infrastructure for havoc.
//!
//! ## Components
//!
//! - **Scenario** - Small, fast run configurations with a scratch directory
//!   and a shared memory leak check around each run
//! - **MonotonicChecker** - Asserts a sampled counter never goes backwards
//!
//! Process-level tests live in `tests/`, one forking test per binary.

pub mod scenario;
pub mod verify;

use std::path::PathBuf;

use havoc::counters::object_name;
use nix::unistd::Pid;

pub use scenario::{ print_summary, Scenario, ScenarioOutcome };
pub use verify::MonotonicChecker;

/// Where the kernel exposes the counter table created by `pid`.
pub fn shm_path(pid: Pid) -> PathBuf {
    PathBuf::from("/dev/shm").join(object_name(pid).trim_start_matches('/'))
}

/// Whether the counter table of the current process still exists.
pub fn counter_table_exists() -> bool {
    shm_path(nix::unistd::getpid()).exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shm_path() {
        let path = shm_path(Pid::from_raw(42));
        assert_eq!(path, PathBuf::from("/dev/shm/havoc-42"));
    }
}
