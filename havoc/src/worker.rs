//! Worker processes.
//!
//! `fork_child` is the single place a process gets created; the child side
//! runs its body and exits, it never returns into the caller's frames.
//! `enter` is the body of an orchestrator-spawned worker.

use std::panic::{ self, AssertUnwindSafe };
use std::thread;

use nix::unistd::{ fork, getpid, ForkResult, Pid };
use tracing::{ debug, error, info_span };

use crate::config::RunConfig;
use crate::constants::{ EXIT_FAILURE, EXIT_SUCCESS };
use crate::counters::SharedCounterTable;
use crate::error::{ HavocError, Result };
use crate::signals::{ self, StopToken };
use crate::stressor::{ StressContext, StressorKind };

/// Fork; the child runs `body` and exits with its return value.
pub fn fork_child<F: FnOnce() -> i32>(body: F) -> Result<Pid> {
    // SAFETY: the child only runs `body` and then exits. It never unwinds
    // or returns into the parent's call stack.
    match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => Ok(child),
        Ok(ForkResult::Child) => {
            let code = panic::catch_unwind(AssertUnwindSafe(body)).unwrap_or(EXIT_FAILURE);
            std::process::exit(code)
        }
        Err(errno) => Err(HavocError::Spawn(errno)),
    }
}

/// Rename the process image so workers are identifiable in `ps`/`top`.
#[cfg(target_os = "linux")]
pub fn rename_process(kind: StressorKind) {
    if let Err(e) = nix::sys::prctl::set_name(kind.process_name()) {
        debug!("PR_SET_NAME failed: {e}");
    }
}

#[cfg(not(target_os = "linux"))]
pub fn rename_process(_kind: StressorKind) {}

/// Identity of one worker within the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerId {
    pub kind: StressorKind,
    /// Index within its kind
    pub instance: usize,
    /// Global spawn order, drives the stagger delay
    pub sequence: usize,
}

/// Worker body: returns the process exit status.
pub fn enter(config: &RunConfig, table: &SharedCounterTable, id: WorkerId) -> i32 {
    let _span = info_span!("worker", kind = %id.kind, instance = id.instance).entered();
    match run(config, table, id) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            error!(pid = %getpid(), "{}: {e}", id.kind.label());
            EXIT_FAILURE
        }
    }
}

fn run(config: &RunConfig, table: &SharedCounterTable, id: WorkerId) -> Result<()> {
    signals::install_stop_handler()?;
    signals::set_parent_death_signal();

    let delay = config.backoff.saturating_mul(id.sequence as u32);
    if !delay.is_zero() {
        thread::sleep(delay);
    }
    signals::arm_alarm(config.timeout);

    if config.dry_run {
        return Ok(());
    }

    rename_process(id.kind);
    debug!(pid = %getpid(), "started");

    let ctx = StressContext::new(
        id.kind,
        id.instance,
        table.slot_for(id.kind, id.instance),
        config.per_worker_ops(id.kind),
        StopToken::process()
    );
    let mut stressor = id.kind.build(config);
    stressor.run(&ctx)?;

    debug!(pid = %getpid(), ops = ctx.counter.get(), "finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::wait::{ waitpid, WaitStatus };

    #[test]
    fn test_fork_child_exit_status() {
        let pid = fork_child(|| 7).unwrap();
        assert_eq!(waitpid(pid, None).unwrap(), WaitStatus::Exited(pid, 7));
    }

    #[test]
    fn test_fork_child_panic_is_failure() {
        let pid = fork_child(|| panic!("boom")).unwrap();
        assert_eq!(waitpid(pid, None).unwrap(), WaitStatus::Exited(pid, EXIT_FAILURE));
    }
}
