//! havoc - process-based OS stress harness.
//!
//! Forks populations of worker processes that hammer the CPU, virtual
//! memory, disk and the process/signal machinery, counts their bogo-ops in a
//! shared memory table, and reports per-kind throughput.
//!
//! ```rust,no_run
//! use havoc::{ Orchestrator, RunConfig, StressorKind };
//! use std::time::Duration;
//!
//! let config = RunConfig::new()
//!     .with_workers(StressorKind::Cpu, 4)
//!     .with_workers(StressorKind::Vm, 2)
//!     .with_timeout(Duration::from_secs(10))
//!     .with_metrics(true);
//! let report = Orchestrator::new(config).run().unwrap();
//! assert!(report.is_success());
//! ```

pub mod config;
pub mod constants;
pub mod counters;
pub mod error;
pub mod insights;
pub mod metrics;
pub mod orchestrator;
pub mod signals;
pub mod stressor;
pub mod worker;

pub use config::{ HddConfig, RunConfig, Verbosity, VmConfig, VmFault, VmHang };
pub use counters::{ CounterSlot, SharedCounterTable };
pub use error::{ HavocError, Result };
pub use insights::init_logging;
pub use metrics::KindMetrics;
pub use orchestrator::{ Orchestrator, RunReport, WorkerOutcome, WorkerRecord };
pub use signals::StopToken;
pub use stressor::{ StressContext, Stressor, StressorKind };
