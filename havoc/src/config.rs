//! Run configuration.
//!
//! Built once before any process exists, validated, then handed to the
//! orchestrator by value. Workers get their copy through `fork()`; nothing
//! mutates it afterwards.

use std::path::PathBuf;
use std::time::Duration;

use tracing::level_filters::LevelFilter;

use crate::config_error;
use crate::constants::*;
use crate::error::Result;
use crate::stressor::{ StressorKind, KIND_COUNT };

/// Worker count and operation ceiling for one stressor kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindConfig {
    pub workers: u32,
    /// Ceiling across all workers of the kind, 0 = unbounded
    pub max_ops: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

impl Verbosity {
    pub fn level(self) -> LevelFilter {
        match self {
            Self::Quiet => LevelFilter::ERROR,
            Self::Normal => LevelFilter::INFO,
            Self::Verbose => LevelFilter::DEBUG,
        }
    }
}

/// How long a vm worker holds its dirty region before verifying it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VmHang {
    /// Verify straight away
    #[default]
    Skip,
    /// Suspend until stopped
    Forever,
    Seconds(u32),
}

impl VmHang {
    /// `--vm-hang N` semantics: 0 suspends forever.
    pub fn from_secs(secs: u32) -> Self {
        if secs == 0 { Self::Forever } else { Self::Seconds(secs) }
    }
}

/// Overwrite one strided byte after the fill, on one worker only.
/// Used to prove the verify pass catches corruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmFault {
    pub instance: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmConfig {
    pub bytes: usize,
    pub stride: usize,
    pub hang: VmHang,
    /// Re-dirty one mapping instead of remapping every iteration
    pub keep: bool,
    pub fault: Option<VmFault>,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            bytes: DEFAULT_VM_BYTES as usize,
            stride: DEFAULT_VM_STRIDE as usize,
            hang: VmHang::Skip,
            keep: false,
            fault: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HddConfig {
    pub bytes: u64,
    /// Leave written files behind
    pub no_clean: bool,
    pub directory: PathBuf,
}

impl Default for HddConfig {
    fn default() -> Self {
        Self {
            bytes: DEFAULT_HDD_BYTES,
            no_clean: false,
            directory: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    kinds: [KindConfig; KIND_COUNT],
    pub timeout: Duration,
    /// Stagger unit; worker N waits N × backoff before starting
    pub backoff: Duration,
    pub verbosity: Verbosity,
    pub dry_run: bool,
    pub metrics: bool,
    pub vm: VmConfig,
    pub hdd: HddConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            kinds: [KindConfig::default(); KIND_COUNT],
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            backoff: Duration::ZERO,
            verbosity: Verbosity::Normal,
            dry_run: false,
            metrics: false,
            vm: VmConfig::default(),
            hdd: HddConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workers(mut self, kind: StressorKind, workers: u32) -> Self {
        self.kinds[kind.ordinal()].workers = workers;
        self
    }

    pub fn with_max_ops(mut self, kind: StressorKind, max_ops: u64) -> Self {
        self.kinds[kind.ordinal()].max_ops = max_ops;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_metrics(mut self, metrics: bool) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_vm(mut self, vm: VmConfig) -> Self {
        self.vm = vm;
        self
    }

    pub fn with_hdd(mut self, hdd: HddConfig) -> Self {
        self.hdd = hdd;
        self
    }

    pub fn kind(&self, kind: StressorKind) -> KindConfig {
        self.kinds[kind.ordinal()]
    }

    pub fn workers(&self, kind: StressorKind) -> u32 {
        self.kinds[kind.ordinal()].workers
    }

    pub fn total_workers(&self) -> u32 {
        self.kinds.iter().map(|k| k.workers).sum()
    }

    /// Widest kind; the row count of the counter table.
    pub fn max_workers(&self) -> u32 {
        self.kinds.iter().map(|k| k.workers).max().unwrap_or(0)
    }

    /// Ceiling for each single worker of `kind`: the kind ceiling divided
    /// evenly, rounding down so the kind total never exceeds it.
    pub fn per_worker_ops(&self, kind: StressorKind) -> u64 {
        let k = self.kinds[kind.ordinal()];
        if k.workers == 0 { 0 } else { k.max_ops / u64::from(k.workers) }
    }

    pub fn validate(&self) -> Result<()> {
        for kind in StressorKind::ALL {
            let k = self.kind(kind);
            if k.workers > MAX_WORKERS {
                return Err(
                    config_error!(
                        "Number of {} workers must be between 0 and {}",
                        kind,
                        MAX_WORKERS
                    )
                );
            }
            if k.max_ops != 0 {
                let (lo, hi) = kind.ops_range();
                check_range(&format!("{}-ops", kind), k.max_ops, lo, hi)?;
                // A per-worker share of zero would read as unbounded
                if k.max_ops < u64::from(k.workers) {
                    return Err(
                        config_error!(
                            "{}-ops {} is smaller than the {} worker count {}",
                            kind,
                            k.max_ops,
                            kind,
                            k.workers
                        )
                    );
                }
            }
        }

        if self.total_workers() == 0 {
            return Err(config_error!("No stress workers specified"));
        }
        if self.timeout.is_zero() {
            return Err(config_error!("Timeout must be at least one second"));
        }

        check_range("vm-bytes", self.vm.bytes as u64, MIN_VM_BYTES, MAX_VM_BYTES)?;
        check_range("vm-stride", self.vm.stride as u64, MIN_VM_STRIDE, MAX_VM_STRIDE)?;
        if let VmHang::Seconds(secs) = self.vm.hang {
            check_range("vm-hang", u64::from(secs), 0, u64::from(MAX_VM_HANG_SECS))?;
        }
        if let Some(fault) = self.vm.fault {
            if fault.offset >= self.vm.bytes || fault.offset % self.vm.stride != 0 {
                return Err(
                    config_error!(
                        "vm fault offset {} must be a multiple of the stride below {}",
                        fault.offset,
                        self.vm.bytes
                    )
                );
            }
        }
        check_range("hdd-bytes", self.hdd.bytes, MIN_HDD_BYTES, MAX_HDD_BYTES)?;
        Ok(())
    }
}

fn check_range(opt: &str, val: u64, lo: u64, hi: u64) -> Result<()> {
    if val < lo || val > hi {
        return Err(config_error!("Value {} is out of range for {}, allowed: {} .. {}", val, opt, lo, hi));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HavocError;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(24 * 60 * 60));
        assert_eq!(config.backoff, Duration::ZERO);
        assert_eq!(config.vm.hang, VmHang::Skip);
        assert_eq!(config.total_workers(), 0);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = RunConfig::default().validate().unwrap_err();
        assert!(matches!(err, HavocError::InvalidConfig { .. }));
        assert!(err.to_string().contains("No stress workers"));
    }

    #[test]
    fn test_too_many_workers_rejected() {
        let config = RunConfig::new().with_workers(StressorKind::Cpu, MAX_WORKERS + 1);
        assert!(config.validate().is_err());

        let config = RunConfig::new().with_workers(StressorKind::Cpu, MAX_WORKERS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ops_range_checked() {
        let config = RunConfig::new()
            .with_workers(StressorKind::Cpu, 1)
            .with_max_ops(StressorKind::Cpu, 10);
        assert!(config.validate().is_err());

        // vm has a lower floor
        let config = RunConfig::new()
            .with_workers(StressorKind::Vm, 1)
            .with_max_ops(StressorKind::Vm, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_per_worker_ops_rounds_down() {
        let config = RunConfig::new()
            .with_workers(StressorKind::Cpu, 4)
            .with_max_ops(StressorKind::Cpu, 4000)
            .with_workers(StressorKind::Hdd, 3)
            .with_max_ops(StressorKind::Hdd, 1000);
        assert_eq!(config.per_worker_ops(StressorKind::Cpu), 1000);
        assert_eq!(config.per_worker_ops(StressorKind::Hdd), 333);
        assert_eq!(config.per_worker_ops(StressorKind::Vm), 0);
    }

    #[test]
    fn test_ceiling_below_worker_count_rejected() {
        let config = RunConfig::new()
            .with_workers(StressorKind::Vm, 200)
            .with_max_ops(StressorKind::Vm, 100);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("smaller than"));
    }

    #[test]
    fn test_max_workers() {
        let config = RunConfig::new()
            .with_workers(StressorKind::Cpu, 4)
            .with_workers(StressorKind::Vm, 2);
        assert_eq!(config.max_workers(), 4);
        assert_eq!(config.total_workers(), 6);
    }

    #[test]
    fn test_vm_ranges() {
        let base = RunConfig::new().with_workers(StressorKind::Vm, 1);

        let small = VmConfig { bytes: 1024, ..VmConfig::default() };
        assert!(base.clone().with_vm(small).validate().is_err());

        let zero_stride = VmConfig { stride: 0, ..VmConfig::default() };
        assert!(base.clone().with_vm(zero_stride).validate().is_err());

        let long_hang = VmConfig { hang: VmHang::Seconds(3601), ..VmConfig::default() };
        assert!(base.clone().with_vm(long_hang).validate().is_err());

        let forever = VmConfig { hang: VmHang::from_secs(0), ..VmConfig::default() };
        assert_eq!(forever.hang, VmHang::Forever);
        assert!(base.with_vm(forever).validate().is_ok());
    }

    #[test]
    fn test_vm_fault_must_hit_a_strided_byte() {
        let base = RunConfig::new().with_workers(StressorKind::Vm, 2);
        let vm = |offset| VmConfig {
            bytes: 64 * 1024,
            stride: 4096,
            fault: Some(VmFault { instance: 0, offset }),
            ..VmConfig::default()
        };
        assert!(base.clone().with_vm(vm(8192)).validate().is_ok());
        assert!(base.clone().with_vm(vm(8193)).validate().is_err());
        assert!(base.with_vm(vm(64 * 1024)).validate().is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = RunConfig::new()
            .with_workers(StressorKind::Null, 1)
            .with_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(Verbosity::Quiet.level(), LevelFilter::ERROR);
        assert_eq!(Verbosity::default().level(), LevelFilter::INFO);
        assert_eq!(Verbosity::Verbose.level(), LevelFilter::DEBUG);
    }
}
