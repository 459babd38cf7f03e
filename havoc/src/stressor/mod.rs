//! Stressors - one kind of resource pressure per worker process.
//!
//! - `CpuStressor` - sqrt() over pseudo-random operands
//! - `IoSyncStressor` - sync() in a loop
//! - `VmStressor` - anonymous mmap, Gray-code fill, verify
//! - `HddStressor` - 64 KiB block writes to temp files
//! - `WaitStressor` - stop/continue/wait across runner and killer processes
//! - `NullStressor` - 4 KiB writes to /dev/null
//!
//! Every variant honours the same loop contract through [`StressContext`]:
//! one completed unit, one increment; stop at the ceiling or when the stop
//! token flips; retry transient failures uncounted; return an error for
//! anything unrecoverable and let the worker exit with failure status.

pub mod cpu;
pub mod hdd;
pub mod iosync;
pub mod null;
pub mod vm;
pub mod wait;

pub use cpu::CpuStressor;
pub use hdd::HddStressor;
pub use iosync::IoSyncStressor;
pub use null::NullStressor;
pub use vm::VmStressor;
pub use wait::WaitStressor;

use std::ffi::CStr;
use std::fmt;

use crate::config::RunConfig;
use crate::counters::CounterSlot;
use crate::error::Result;
use crate::signals::StopToken;

/// Number of stressor kinds; also the row width of the counter table.
pub const KIND_COUNT: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StressorKind {
    IoSync,
    Cpu,
    Vm,
    Hdd,
    Wait,
    Null,
}

impl StressorKind {
    pub const ALL: [StressorKind; KIND_COUNT] = [
        StressorKind::IoSync,
        StressorKind::Cpu,
        StressorKind::Vm,
        StressorKind::Hdd,
        StressorKind::Wait,
        StressorKind::Null,
    ];

    #[inline]
    pub const fn ordinal(self) -> usize {
        self as usize
    }

    /// Label used in metrics output
    pub const fn label(self) -> &'static str {
        match self {
            Self::IoSync => "I/O-Sync",
            Self::Cpu => "CPU-compute",
            Self::Vm => "VM-mmap",
            Self::Hdd => "HDD-Write",
            Self::Wait => "Wait-signal",
            Self::Null => "Null-write",
        }
    }

    /// Short name, matches the CLI option
    pub const fn name(self) -> &'static str {
        match self {
            Self::IoSync => "io",
            Self::Cpu => "cpu",
            Self::Vm => "vm",
            Self::Hdd => "hdd",
            Self::Wait => "wait",
            Self::Null => "null",
        }
    }

    /// Process image name, kept under the 16 byte comm limit
    pub const fn process_name(self) -> &'static CStr {
        match self {
            Self::IoSync => c"havoc-iosync",
            Self::Cpu => c"havoc-cpu",
            Self::Vm => c"havoc-vm",
            Self::Hdd => c"havoc-hdd",
            Self::Wait => c"havoc-wait",
            Self::Null => c"havoc-null",
        }
    }

    /// Allowed range for a non-zero `--<kind>-ops` ceiling
    pub const fn ops_range(self) -> (u64, u64) {
        match self {
            Self::Vm => (100, crate::constants::MAX_OPS),
            _ => (1000, crate::constants::MAX_OPS),
        }
    }

    /// Build the stressor for this kind from the run configuration.
    pub fn build(self, config: &RunConfig) -> Box<dyn Stressor> {
        match self {
            Self::IoSync => Box::new(IoSyncStressor),
            Self::Cpu => Box::new(CpuStressor::new()),
            Self::Vm => Box::new(VmStressor::new(&config.vm)),
            Self::Hdd => Box::new(HddStressor::new(&config.hdd)),
            Self::Wait => Box::new(WaitStressor::new()),
            Self::Null => Box::new(NullStressor),
        }
    }
}

impl fmt::Display for StressorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything a stressor may touch: its own counter slot, its ceiling and
/// the stop token. Orchestrator state stays out of reach.
#[derive(Clone)]
pub struct StressContext<'a> {
    pub kind: StressorKind,
    /// Worker index within its kind
    pub instance: usize,
    pub counter: CounterSlot<'a>,
    /// Per-worker ceiling, 0 = unbounded
    pub max_ops: u64,
    pub stop: StopToken,
}

impl<'a> StressContext<'a> {
    pub fn new(
        kind: StressorKind,
        instance: usize,
        counter: CounterSlot<'a>,
        max_ops: u64,
        stop: StopToken
    ) -> Self {
        Self { kind, instance, counter, max_ops, stop }
    }

    /// Loop condition shared by every stressor.
    #[inline]
    pub fn keep_running(&self) -> bool {
        self.stop.is_running() && (self.max_ops == 0 || self.counter.get() < self.max_ops)
    }

    /// Record one completed unit of work.
    #[inline]
    pub fn inc(&self) {
        self.counter.increment();
    }
}

/// A single kind of resource pressure.
pub trait Stressor {
    /// Run until the ceiling is reached or the stop token flips.
    ///
    /// An `Err` is unrecoverable; the worker reports it and exits with
    /// failure status.
    fn run(&mut self, ctx: &StressContext<'_>) -> Result<()>;
}
