//! Timeout and abort plumbing.
//!
//! Two cancellation paths end up in the same place: a per-process `alarm()`
//! armed at spawn, and an explicit SIGALRM broadcast from the orchestrator on
//! spawn failure or an interrupted reap. Either way the SIGALRM handler
//! flips the process stop flag that every stressor loop polls through its
//! [`StopToken`].
//!
//! SIGINT gets a no-op trap in the orchestrator so a blocking `wait()`
//! returns `EINTR` instead of the process dying with its children orphaned.

use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::Arc;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{ kill, sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal };
use nix::unistd::{ alarm, Pid };
use tracing::debug;

use crate::error::Result;

/// Process-wide "keep running" flag, flipped by the SIGALRM handler.
static KEEP_RUNNING: AtomicBool = AtomicBool::new(true);

extern "C" fn handle_stop(_: libc::c_int) {
    KEEP_RUNNING.store(false, Ordering::SeqCst);
}

extern "C" fn handle_interrupt(_: libc::c_int) {}

/// Cancellation token polled by stressor loops.
///
/// `StopToken::process()` is bound to the flag the SIGALRM handler flips;
/// `StopToken::new()` is a private flag for in-process use.
#[derive(Clone, Debug)]
pub struct StopToken(Flag);

#[derive(Clone, Debug)]
enum Flag {
    Process,
    Local(Arc<AtomicBool>),
}

impl StopToken {
    pub fn process() -> Self {
        Self(Flag::Process)
    }

    pub fn new() -> Self {
        Self(Flag::Local(Arc::new(AtomicBool::new(true))))
    }

    #[inline]
    fn flag(&self) -> &AtomicBool {
        match &self.0 {
            Flag::Process => &KEEP_RUNNING,
            Flag::Local(flag) => flag,
        }
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.flag().load(Ordering::Relaxed)
    }

    pub fn stop(&self) {
        self.flag().store(false, Ordering::SeqCst);
    }
}

impl Default for StopToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Install `handler` for `signal` without SA_RESTART, so blocking calls
/// return EINTR when it fires. Returns the action it replaced.
fn install(signal: Signal, handler: extern "C" fn(libc::c_int)) -> Result<SigAction> {
    let action = SigAction::new(SigHandler::Handler(handler), SaFlags::empty(), SigSet::empty());
    // SAFETY: both handlers only touch an atomic, which is async-signal-safe.
    let previous = unsafe { sigaction(signal, &action) }?;
    Ok(previous)
}

/// SIGINT becomes a no-op whose only effect is interrupting `wait()`.
/// The previous disposition comes back when the guard drops.
#[must_use = "the trap is removed as soon as the guard drops"]
pub struct InterruptTrap {
    previous: SigAction,
}

impl InterruptTrap {
    pub fn install() -> Result<Self> {
        let previous = install(Signal::SIGINT, handle_interrupt)?;
        Ok(Self { previous })
    }
}

impl Drop for InterruptTrap {
    fn drop(&mut self) {
        // SAFETY: restores whatever the process had before `install`.
        if let Err(e) = unsafe { sigaction(Signal::SIGINT, &self.previous) } {
            debug!("SIGINT disposition not restored: {e}");
        }
    }
}

/// SIGALRM flips the process stop flag.
pub fn install_stop_handler() -> Result<()> {
    install(Signal::SIGALRM, handle_stop).map(|_| ())
}

/// Arm the per-process countdown. Whole seconds, rounded up, at least one.
pub fn arm_alarm(timeout: Duration) {
    let secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
    let secs = secs.clamp(1, u64::from(libc::c_uint::MAX)) as libc::c_uint;
    let _ = alarm::set(secs);
}

/// Send the timeout signal to every pid. Returns how many were delivered;
/// workers that already exited are skipped silently.
pub fn broadcast_abort<I: IntoIterator<Item = Pid>>(pids: I) -> usize {
    let mut delivered = 0;
    for pid in pids {
        match kill(pid, Signal::SIGALRM) {
            Ok(()) => {
                delivered += 1;
            }
            Err(Errno::ESRCH) => {}
            Err(e) => debug!(%pid, "abort signal not delivered: {e}"),
        }
    }
    delivered
}

/// Have the kernel send SIGALRM if our parent dies, so orphans stop.
#[cfg(target_os = "linux")]
pub fn set_parent_death_signal() {
    if let Err(e) = nix::sys::prctl::set_pdeathsig(Signal::SIGALRM) {
        debug!("PR_SET_PDEATHSIG failed: {e}");
    }
}

#[cfg(not(target_os = "linux"))]
pub fn set_parent_death_signal() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_token_stops() {
        let token = StopToken::new();
        let clone = token.clone();
        assert!(token.is_running());
        clone.stop();
        assert!(!token.is_running());
    }

    #[test]
    fn test_local_tokens_independent() {
        let a = StopToken::new();
        let b = StopToken::new();
        a.stop();
        assert!(b.is_running());
    }

    fn sigint_handler() -> SigHandler {
        let swap = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
        let current = unsafe { sigaction(Signal::SIGINT, &swap) }.unwrap();
        unsafe { sigaction(Signal::SIGINT, &current) }.unwrap();
        current.handler()
    }

    #[test]
    fn test_interrupt_trap_restores_previous_disposition() {
        let before = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
        unsafe { sigaction(Signal::SIGINT, &before) }.unwrap();

        let trap = InterruptTrap::install().unwrap();
        assert!(matches!(sigint_handler(), SigHandler::Handler(_)));
        drop(trap);
        assert!(matches!(sigint_handler(), SigHandler::SigDfl));
    }

    #[test]
    fn test_broadcast_skips_dead_pids() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = Pid::from_raw(child.id() as i32);
        child.wait().unwrap();
        assert_eq!(broadcast_abort([pid]), 0);
    }
}
