//! Havoc Constants
//!
//! Defaults and allowed ranges for run-wide and per-stressor tunables.

pub const KB: u64 = 1024;
pub const MB: u64 = KB * KB;
pub const GB: u64 = KB * KB * KB;

/// Upper bound on workers of a single kind
pub const MAX_WORKERS: u32 = 1024;

/// Default run duration (one day)
pub const DEFAULT_TIMEOUT_SECS: u64 = 60 * 60 * 24;

pub const MIN_VM_BYTES: u64 = 4 * KB;
pub const MAX_VM_BYTES: u64 = GB;
pub const DEFAULT_VM_BYTES: u64 = 256 * MB;

pub const MIN_VM_STRIDE: u64 = 1;
pub const MAX_VM_STRIDE: u64 = MB;
pub const DEFAULT_VM_STRIDE: u64 = 4 * KB;

pub const MAX_VM_HANG_SECS: u32 = 3600;

pub const MIN_HDD_BYTES: u64 = MB;
pub const MAX_HDD_BYTES: u64 = 256 * GB;
pub const DEFAULT_HDD_BYTES: u64 = GB;

/// Size of each hdd-write block; one block is one bogo-op
pub const HDD_BUF_SIZE: usize = 64 * 1024;

/// Size of each null-write block
pub const NULL_BUF_SIZE: usize = 4096;

/// sqrt() calls per cpu-compute bogo-op
pub const CPU_SQRT_ROUNDS: usize = 16384;

/// Fixed seed so every cpu-compute worker does the same work
pub const CPU_SEED: u64 = 0x1234;

/// How long the wait-signal killer tolerates a counter that does not move
pub const WAIT_STALL_SECS: u64 = 8;

pub const MAX_OPS: u64 = 100_000_000;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
