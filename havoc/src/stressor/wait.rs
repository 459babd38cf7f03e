//! wait-signal: stop/continue/wait churn across three processes.
//!
//! ```text
//!   worker ──fork──> runner   pause() until woken
//!      │                ▲
//!      │                │ SIGSTOP, SIGCONT, SIGSTOP, ...
//!      └───fork──> killer  (stall watchdog)
//!
//!   worker: waitpid(runner, WCONTINUED) / waitid(runner, WCONTINUED)
//!           one continuation observed = one bogo-op
//! ```
//!
//! The killer watches the shared counter. If it has not moved for
//! `WAIT_STALL_SECS` the waits are presumed blocked and the killer gives up,
//! SIGKILLs the runner and alarms the worker, so one stuck wait cannot hang
//! the whole run.

use std::time::{ Duration, Instant };

use nix::errno::Errno;
use nix::sys::signal::{ kill, Signal };
use nix::sys::wait::{ waitid, waitpid, Id, WaitPidFlag, WaitStatus };
use nix::unistd::{ getpgrp, getpid, getppid, pause, setpgid, Pid };
use tracing::debug;

use crate::constants::{ EXIT_SUCCESS, WAIT_STALL_SECS };
use crate::error::{ HavocError, Result };
use crate::signals;
use crate::stressor::{ StressContext, Stressor };
use crate::worker::fork_child;

/// Watches a counter for progress over time.
#[derive(Debug, Clone)]
pub struct StallWatchdog {
    threshold: Duration,
    last_value: u64,
    since: Instant,
}

impl StallWatchdog {
    pub fn new(threshold: Duration, value: u64, now: Instant) -> Self {
        Self { threshold, last_value: value, since: now }
    }

    /// Feed the current counter value. Returns true once the value has sat
    /// still for longer than the threshold.
    pub fn observe(&mut self, value: u64, now: Instant) -> bool {
        if value != self.last_value {
            self.last_value = value;
            self.since = now;
            return false;
        }
        now.saturating_duration_since(self.since) > self.threshold
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillerExit {
    /// Stop token flipped or the ceiling was reached
    Finished,
    /// The watchdog fired
    Stalled,
}

pub struct WaitStressor {
    stall_threshold: Duration,
}

impl WaitStressor {
    pub fn new() -> Self {
        Self::with_stall_threshold(Duration::from_secs(WAIT_STALL_SECS))
    }

    pub fn with_stall_threshold(stall_threshold: Duration) -> Self {
        Self { stall_threshold }
    }
}

impl Default for WaitStressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Stressor for WaitStressor {
    fn run(&mut self, ctx: &StressContext<'_>) -> Result<()> {
        debug!(pid = %getpid(), "waiter started");
        let pgrp = getpgrp();

        let runner_pid = spawn_helper(ctx, pgrp, || runner(ctx))?;
        let threshold = self.stall_threshold;
        let killer_pid = match spawn_helper(ctx, pgrp, || killer(ctx, runner_pid, threshold)) {
            Ok(pid) => pid,
            Err(e) => {
                terminate(runner_pid);
                return Err(e);
            }
        };

        wait_for_continuations(ctx, runner_pid);

        terminate(killer_pid);
        terminate(runner_pid);
        Ok(())
    }
}

/// Fork a helper into `pgrp`, retrying on EAGAIN while the run is live.
fn spawn_helper<F: FnOnce() -> i32>(ctx: &StressContext<'_>, pgrp: Pid, body: F) -> Result<Pid> {
    let mut body = Some(body);
    loop {
        let attempt = fork_child(|| {
            let _ = setpgid(Pid::from_raw(0), pgrp);
            signals::set_parent_death_signal();
            body.take().map_or(EXIT_SUCCESS, |f| f())
        });
        match attempt {
            Ok(pid) => {
                let _ = setpgid(pid, pgrp);
                return Ok(pid);
            }
            Err(HavocError::Spawn(Errno::EAGAIN)) if ctx.stop.is_running() => {}
            Err(e) => {
                return Err(e);
            }
        }
    }
}

/// SIGKILL and reap.
fn terminate(pid: Pid) {
    let _ = kill(pid, Signal::SIGKILL);
    loop {
        match waitpid(pid, None) {
            Err(Errno::EINTR) => {}
            _ => break,
        }
    }
}

/// Outcome of one blocking wait on the runner.
fn observe(ctx: &StressContext<'_>, status: nix::Result<WaitStatus>) -> bool {
    match status {
        Ok(WaitStatus::Continued(_)) => {
            ctx.inc();
            true
        }
        Ok(WaitStatus::Exited(..)) | Ok(WaitStatus::Signaled(..)) => false,
        Ok(_) | Err(Errno::EINTR) => true,
        Err(_) => false,
    }
}

/// Count runner continuations until the stop condition holds or the runner
/// is gone.
fn wait_for_continuations(ctx: &StressContext<'_>, runner: Pid) {
    while ctx.keep_running() {
        if !observe(ctx, waitpid(runner, Some(WaitPidFlag::WCONTINUED))) {
            break;
        }
        if !ctx.keep_running() {
            break;
        }
        let flags = WaitPidFlag::WCONTINUED | WaitPidFlag::WEXITED;
        if !observe(ctx, waitid(Id::Pid(runner), flags)) {
            break;
        }
    }
}

fn runner(ctx: &StressContext<'_>) -> i32 {
    debug!(pid = %getpid(), "wait: runner started");
    while ctx.keep_running() {
        pause();
    }
    let _ = kill(getppid(), Signal::SIGALRM);
    EXIT_SUCCESS
}

fn killer(ctx: &StressContext<'_>, runner: Pid, threshold: Duration) -> i32 {
    debug!(pid = %getpid(), "wait: killer started");
    if killer_loop(ctx, runner, threshold) == KillerExit::Stalled {
        debug!("waits were blocked, aborting");
    }
    // Runner is reaped by the worker
    let _ = kill(runner, Signal::SIGKILL);
    let _ = kill(getppid(), Signal::SIGALRM);
    EXIT_SUCCESS
}

/// Stop and continue `runner` until told to stop or the counter stalls.
pub fn killer_loop(ctx: &StressContext<'_>, runner: Pid, threshold: Duration) -> KillerExit {
    let mut watchdog = StallWatchdog::new(threshold, ctx.counter.get(), Instant::now());
    while ctx.keep_running() {
        let _ = kill(runner, Signal::SIGSTOP);
        let _ = kill(runner, Signal::SIGCONT);
        if watchdog.observe(ctx.counter.get(), Instant::now()) {
            return KillerExit::Stalled;
        }
    }
    KillerExit::Finished
}
