//! Scenario - small end-to-end runs for tests.
//!
//! Defaults are sized to finish in well under a second per worker: 64 KiB
//! vm regions, 1 MiB hdd files in a private scratch directory, a 30 second
//! safety timeout, quiet logging and metrics on.

use std::path::Path;
use std::time::{ Duration, Instant };

use havoc::constants::MIN_HDD_BYTES;
use havoc::{ HddConfig, Orchestrator, RunConfig, RunReport, StressorKind, Verbosity, VmConfig, VmFault, VmHang };
use tempfile::TempDir;

use crate::counter_table_exists;

const SAFETY_TIMEOUT: Duration = Duration::from_secs(30);
const SMALL_VM_BYTES: usize = 64 * 1024;
const SMALL_VM_STRIDE: usize = 4096;

pub struct Scenario {
    config: RunConfig,
    scratch: Option<TempDir>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::new()
    }
}

impl Scenario {
    pub fn new() -> Self {
        let config = RunConfig::new()
            .with_timeout(SAFETY_TIMEOUT)
            .with_verbosity(Verbosity::Quiet)
            .with_metrics(true)
            .with_vm(VmConfig {
                bytes: SMALL_VM_BYTES,
                stride: SMALL_VM_STRIDE,
                ..VmConfig::default()
            })
            .with_hdd(HddConfig { bytes: MIN_HDD_BYTES, ..HddConfig::default() });
        Self { config, scratch: None }
    }

    pub fn with_workers(mut self, kind: StressorKind, workers: u32) -> Self {
        self.config = self.config.with_workers(kind, workers);
        self
    }

    pub fn with_max_ops(mut self, kind: StressorKind, max_ops: u64) -> Self {
        self.config = self.config.with_max_ops(kind, max_ops);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_timeout(timeout);
        self
    }

    pub fn with_dry_run(mut self) -> Self {
        self.config = self.config.with_dry_run(true);
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.config = self.config.with_backoff(backoff);
        self
    }

    pub fn with_vm_hang(mut self, hang: VmHang) -> Self {
        self.config.vm.hang = hang;
        self
    }

    /// Corrupt one strided byte on vm worker `instance` after every fill.
    pub fn with_vm_fault(mut self, instance: usize, stride_index: usize) -> Self {
        self.config.vm.fault = Some(VmFault { instance, offset: stride_index * SMALL_VM_STRIDE });
        self
    }

    /// Point hdd workers at a fresh temp directory owned by the scenario.
    pub fn with_scratch_dir(mut self) -> std::io::Result<Self> {
        let dir = tempfile::tempdir()?;
        self.config.hdd.directory = dir.path().to_path_buf();
        self.scratch = Some(dir);
        Ok(self)
    }

    pub fn with_hdd_noclean(mut self) -> Self {
        self.config.hdd.no_clean = true;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch.as_ref().map(|d| d.path())
    }

    pub fn run(&self) -> ScenarioOutcome {
        let start = Instant::now();
        let result = Orchestrator::new(self.config.clone()).run();
        ScenarioOutcome {
            result,
            elapsed: start.elapsed(),
            shm_leaked: counter_table_exists(),
        }
    }
}

pub struct ScenarioOutcome {
    pub result: havoc::Result<RunReport>,
    pub elapsed: Duration,
    /// The counter table outlived the run
    pub shm_leaked: bool,
}

impl ScenarioOutcome {
    pub fn report(&self) -> Option<&RunReport> {
        self.result.as_ref().ok()
    }

    /// Bogo-ops recorded for `kind`, 0 if metrics are missing.
    pub fn total_ops(&self, kind: StressorKind) -> u64 {
        self.report()
            .and_then(|r| r.kind_metrics(kind))
            .map_or(0, |m| m.total_ops)
    }
}

/// Print a summary of a run
pub fn print_summary(report: &RunReport) {
    eprintln!("\n╔══════════════════════════════════════════════════════════════╗");
    eprintln!("║                      HAVOC RUN RESULTS                       ║");
    eprintln!("╠══════════════════════════════════════════════════════════════╣");
    eprintln!("║  Duration:   {:>10.2}s", report.duration.as_secs_f64());
    eprintln!("║  Workers:    {:>10}", report.workers.len());
    eprintln!("║  Failed:     {:>10}", report.failed_workers().count());
    for m in report.metrics.iter().flatten() {
        eprintln!("║  {m}");
    }
    eprintln!("╚══════════════════════════════════════════════════════════════╝");

    if report.aborted {
        eprintln!("\nABORTED: spawn failure");
    } else if report.is_success() {
        eprintln!("\nPASSED");
    } else {
        eprintln!("\nFAILED: {} workers", report.failed_workers().count());
    }
}
