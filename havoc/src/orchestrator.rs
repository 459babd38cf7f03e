//! Orchestrator - spawn, supervise and reap the worker population.
//!
//! ```text
//!   validate ─> allocate counters ─> trap SIGINT ─> fork round-robin
//!      │                                               │ fork failed
//!      │                                               ├──> broadcast SIGALRM
//!      ▼                                               ▼
//!   (config error,                               reap until none left
//!    nothing spawned)                  EINTR ──> broadcast SIGALRM, keep reaping
//!                                                      │
//!                                     aggregate ─> report ─> release counters
//! ```
//!
//! Single-threaded and synchronous. The counter table is released on every
//! path out of `run`, success or not, and SIGINT gets its old disposition
//! back once reaping is over.

use std::time::{ Duration, Instant };

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::{ wait, WaitStatus };
use nix::unistd::Pid;
use tracing::{ debug, error, info, warn };

use crate::config::RunConfig;
use crate::counters::SharedCounterTable;
use crate::error::Result;
use crate::metrics::{ self, KindMetrics };
use crate::signals;
use crate::stressor::{ StressorKind, KIND_COUNT };
use crate::worker::{ self, WorkerId };

/// How a worker process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    Exited(i32),
    Signaled(Signal),
}

impl WorkerOutcome {
    /// Non-zero exit or death by anything but the timeout signal.
    pub fn is_failure(&self) -> bool {
        match self {
            Self::Exited(code) => *code != 0,
            Self::Signaled(Signal::SIGALRM) => false,
            Self::Signaled(_) => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerRecord {
    pub pid: Pid,
    pub kind: StressorKind,
    pub instance: usize,
    /// Fork time plus the worker's stagger delay
    pub started: Instant,
    pub finished: Option<Instant>,
    pub outcome: Option<WorkerOutcome>,
}

impl WorkerRecord {
    fn new(pid: Pid, kind: StressorKind, instance: usize, started: Instant) -> Self {
        Self { pid, kind, instance, started, finished: None, outcome: None }
    }

    pub fn elapsed(&self) -> Duration {
        self.finished
            .map(|f| f.saturating_duration_since(self.started))
            .unwrap_or_default()
    }

    pub fn is_failure(&self) -> bool {
        self.outcome.is_some_and(|o| o.is_failure())
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub duration: Duration,
    pub workers: Vec<WorkerRecord>,
    /// Present only when metrics were requested
    pub metrics: Option<Vec<KindMetrics>>,
    /// A fork failed and the run was cut short
    pub aborted: bool,
    /// SIGINT arrived while reaping
    pub interrupted: bool,
}

impl RunReport {
    pub fn failed_workers(&self) -> impl Iterator<Item = &WorkerRecord> {
        self.workers.iter().filter(|w| w.is_failure())
    }

    pub fn is_success(&self) -> bool {
        !self.aborted && self.failed_workers().next().is_none()
    }

    pub fn kind_metrics(&self, kind: StressorKind) -> Option<&KindMetrics> {
        self.metrics.as_ref()?.iter().find(|m| m.kind == kind)
    }
}

const HOG_SUMMARY_ORDER: [StressorKind; KIND_COUNT] = [
    StressorKind::Cpu,
    StressorKind::IoSync,
    StressorKind::Vm,
    StressorKind::Hdd,
    StressorKind::Wait,
    StressorKind::Null,
];

/// Round-robin spawn plan: one worker of each kind per round, so a kind with
/// many workers does not hold back the start of the others.
pub fn spawn_order(config: &RunConfig) -> Vec<WorkerId> {
    (0..config.max_workers() as usize)
        .flat_map(|round| {
            StressorKind::ALL.into_iter()
                .filter(move |&kind| round < (config.workers(kind) as usize))
                .map(move |kind| (kind, round))
        })
        .enumerate()
        .map(|(sequence, (kind, instance))| WorkerId { kind, instance, sequence })
        .collect()
}

pub struct Orchestrator {
    config: RunConfig,
}

impl Orchestrator {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn run(&self) -> Result<RunReport> {
        if let Err(e) = self.config.validate() {
            error!("{e}");
            return Err(e);
        }

        let summary = HOG_SUMMARY_ORDER.iter()
            .map(|&k| format!("{} {}", self.config.workers(k), k))
            .collect::<Vec<_>>()
            .join(", ");
        info!("dispatching hogs: {summary}");

        let slots = (self.config.max_workers() as usize) * KIND_COUNT;
        let table = SharedCounterTable::for_process(slots).inspect_err(|e| error!("{e}"))?;

        let result = signals::InterruptTrap::install().map(|trap| {
            let report = self.supervise(&table);
            drop(trap);
            report
        });
        let released = table.release();
        let report = result?;
        released?;
        Ok(report)
    }

    fn supervise(&self, table: &SharedCounterTable) -> RunReport {
        let config = &self.config;
        let plan = spawn_order(config);
        let mut workers: Vec<WorkerRecord> = Vec::with_capacity(plan.len());
        let mut aborted = false;

        let start = Instant::now();
        debug!("starting processes");
        for id in plan {
            match worker::fork_child(|| worker::enter(config, table, id)) {
                Ok(pid) => {
                    let delay = config.backoff.saturating_mul(id.sequence as u32);
                    workers.push(WorkerRecord::new(pid, id.kind, id.instance, Instant::now() + delay));
                }
                Err(e) => {
                    error!("{}: {e}", id.kind.label());
                    signals::broadcast_abort(workers.iter().map(|w| w.pid));
                    aborted = true;
                    break;
                }
            }
        }
        debug!("{} processes running", workers.len());

        let interrupted = reap(&mut workers);
        let duration = start.elapsed();

        let failures = workers.iter().filter(|w| w.is_failure()).count();
        if aborted || failures > 0 {
            warn!(
                "unsuccessful run completed in {:.2}s, {} of {} workers failed",
                duration.as_secs_f64(),
                failures,
                workers.len()
            );
        } else {
            info!("successful run completed in {:.2}s", duration.as_secs_f64());
        }

        let metrics = config.metrics.then(|| metrics::aggregate(&workers, table));
        for m in metrics.iter().flatten() {
            info!("{m}");
        }

        RunReport { duration, workers, metrics, aborted, interrupted }
    }
}

/// Block in `wait()` until every worker is accounted for. Returns whether an
/// interrupt arrived; each one re-broadcasts the abort.
fn reap(workers: &mut [WorkerRecord]) -> bool {
    let mut remaining = workers.len();
    let mut interrupted = false;

    while remaining > 0 {
        match wait() {
            Ok(status) => {
                let outcome = match status {
                    WaitStatus::Exited(_, code) => WorkerOutcome::Exited(code),
                    WaitStatus::Signaled(_, sig, _) => WorkerOutcome::Signaled(sig),
                    _ => {
                        continue;
                    }
                };
                let Some(pid) = status.pid() else {
                    continue;
                };
                if let Some(record) = workers.iter_mut().find(|w| w.pid == pid) {
                    record.finished = Some(Instant::now());
                    record.outcome = Some(outcome);
                    remaining -= 1;
                    debug!(%pid, ?outcome, "process terminated");
                }
            }
            Err(Errno::EINTR) => {
                warn!("interrupted, stopping workers");
                interrupted = true;
                signals::broadcast_abort(
                    workers
                        .iter()
                        .filter(|w| w.finished.is_none())
                        .map(|w| w.pid)
                );
            }
            Err(Errno::ECHILD) => {
                break;
            }
            Err(e) => {
                error!("wait failed: {e}");
                break;
            }
        }
    }
    interrupted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_order_round_robin() {
        let config = RunConfig::new()
            .with_workers(StressorKind::Cpu, 3)
            .with_workers(StressorKind::Vm, 1)
            .with_workers(StressorKind::IoSync, 2);
        let order: Vec<(StressorKind, usize)> = spawn_order(&config)
            .iter()
            .map(|id| (id.kind, id.instance))
            .collect();
        assert_eq!(
            order,
            vec![
                (StressorKind::IoSync, 0),
                (StressorKind::Cpu, 0),
                (StressorKind::Vm, 0),
                (StressorKind::IoSync, 1),
                (StressorKind::Cpu, 1),
                (StressorKind::Cpu, 2)
            ]
        );
    }

    #[test]
    fn test_spawn_sequence_is_global() {
        let config = RunConfig::new()
            .with_workers(StressorKind::Hdd, 2)
            .with_workers(StressorKind::Null, 2);
        let seqs: Vec<usize> = spawn_order(&config)
            .iter()
            .map(|id| id.sequence)
            .collect();
        assert_eq!(seqs, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_outcome_classification() {
        assert!(!WorkerOutcome::Exited(0).is_failure());
        assert!(WorkerOutcome::Exited(1).is_failure());
        assert!(!WorkerOutcome::Signaled(Signal::SIGALRM).is_failure());
        assert!(WorkerOutcome::Signaled(Signal::SIGSEGV).is_failure());
    }

    #[test]
    fn test_elapsed_never_negative() {
        let now = Instant::now();
        let mut record = WorkerRecord::new(Pid::from_raw(1), StressorKind::Cpu, 0, now + Duration::from_secs(5));
        assert_eq!(record.elapsed(), Duration::ZERO);
        record.finished = Some(now);
        assert_eq!(record.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_config_error_spawns_nothing() {
        let err = Orchestrator::new(RunConfig::default()).run().unwrap_err();
        assert!(err.to_string().contains("No stress workers"));
    }
}
