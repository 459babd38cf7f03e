//! havoc - stress the CPU, memory, disk and signal paths of a system.
//!
//! Usage: havoc --cpu 8 --io 4 --vm 2 --vm-bytes 128M --timeout 10s --metrics
//! Sizes take b/k/m/g suffixes and times s/m/h/d/y.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::error;

use havoc::constants::{
    DEFAULT_HDD_BYTES,
    DEFAULT_TIMEOUT_SECS,
    DEFAULT_VM_BYTES,
    DEFAULT_VM_STRIDE,
    EXIT_FAILURE,
    EXIT_SUCCESS,
};
use havoc::{ HddConfig, Orchestrator, RunConfig, StressorKind, Verbosity, VmConfig, VmHang };

mod scale;

#[derive(Parser, Debug)]
#[command(name = "havoc")]
#[command(about = "Load and stress a system with forked worker processes", long_about = None)]
#[command(version)]
struct Cli {
    /// Start N workers spinning on sqrt(rand())
    #[arg(short, long, value_name = "N", default_value_t = 0)]
    cpu: u32,

    /// Start N workers spinning on sync()
    #[arg(short, long, value_name = "N", default_value_t = 0)]
    io: u32,

    /// Start N workers spinning on anonymous mmap
    #[arg(short = 'm', long, value_name = "N", default_value_t = 0)]
    vm: u32,

    /// Start N workers spinning on write()/unlink()
    #[arg(short = 'd', long, value_name = "N", default_value_t = 0)]
    hdd: u32,

    /// Start N workers spinning on stop/continue/wait
    #[arg(long, value_name = "N", default_value_t = 0)]
    wait: u32,

    /// Start N workers writing to /dev/null
    #[arg(long, value_name = "N", default_value_t = 0)]
    null: u32,

    /// Stop when N cpu bogo operations completed
    #[arg(long, value_name = "N", default_value_t = 0)]
    cpu_ops: u64,

    /// Stop when N io bogo operations completed
    #[arg(long, value_name = "N", default_value_t = 0)]
    io_ops: u64,

    /// Stop when N vm bogo operations completed
    #[arg(long, value_name = "N", default_value_t = 0)]
    vm_ops: u64,

    /// Stop when N hdd bogo operations completed
    #[arg(long, value_name = "N", default_value_t = 0)]
    hdd_ops: u64,

    /// Stop when N wait bogo operations completed
    #[arg(long, value_name = "N", default_value_t = 0)]
    wait_ops: u64,

    /// Stop when N null bogo operations completed
    #[arg(long, value_name = "N", default_value_t = 0)]
    null_ops: u64,

    /// Timeout after T (default 1d)
    #[arg(short, long, value_name = "T", value_parser = scale::parse_duration)]
    timeout: Option<Duration>,

    /// Wait N microseconds between each worker start
    #[arg(short, long, value_name = "USEC", default_value_t = 0)]
    backoff: u64,

    /// Print bogo-op statistics per stressor kind
    #[arg(long)]
    metrics: bool,

    /// Fork workers but do not run any stress
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Verbose output
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only report errors
    #[arg(short, long)]
    quiet: bool,

    /// Malloc N bytes per vm worker (default 256M)
    #[arg(long, value_name = "N", value_parser = scale::parse_bytes)]
    vm_bytes: Option<u64>,

    /// Touch a byte every N bytes (default 4k)
    #[arg(long, value_name = "N", value_parser = scale::parse_bytes)]
    vm_stride: Option<u64>,

    /// Sleep T before unmapping, 0 sleeps until stopped
    #[arg(long, value_name = "T", value_parser = scale::parse_duration)]
    vm_hang: Option<Duration>,

    /// Redirty memory instead of reallocating
    #[arg(long)]
    vm_keep: bool,

    /// Write N bytes per hdd file (default 1g)
    #[arg(long, value_name = "N", value_parser = scale::parse_bytes)]
    hdd_bytes: Option<u64>,

    /// Leave hdd files behind
    #[arg(long)]
    hdd_noclean: bool,

    /// Directory for hdd files
    #[arg(long, value_name = "PATH", default_value = ".")]
    hdd_dir: PathBuf,
}

impl Cli {
    fn verbosity(&self) -> Verbosity {
        if self.verbose {
            Verbosity::Verbose
        } else if self.quiet {
            Verbosity::Quiet
        } else {
            Verbosity::Normal
        }
    }

    fn into_config(self) -> anyhow::Result<RunConfig> {
        let vm_bytes = usize::try_from(self.vm_bytes.unwrap_or(DEFAULT_VM_BYTES))
            .context("vm-bytes does not fit in memory")?;
        let vm_stride = usize::try_from(self.vm_stride.unwrap_or(DEFAULT_VM_STRIDE))
            .context("vm-stride does not fit in memory")?;
        let hang = match self.vm_hang {
            None => VmHang::Skip,
            Some(d) => {
                let secs = u32::try_from(d.as_secs()).context("vm-hang is too long")?;
                VmHang::from_secs(secs)
            }
        };

        let verbosity = self.verbosity();
        let config = RunConfig::new()
            .with_workers(StressorKind::Cpu, self.cpu)
            .with_workers(StressorKind::IoSync, self.io)
            .with_workers(StressorKind::Vm, self.vm)
            .with_workers(StressorKind::Hdd, self.hdd)
            .with_workers(StressorKind::Wait, self.wait)
            .with_workers(StressorKind::Null, self.null)
            .with_max_ops(StressorKind::Cpu, self.cpu_ops)
            .with_max_ops(StressorKind::IoSync, self.io_ops)
            .with_max_ops(StressorKind::Vm, self.vm_ops)
            .with_max_ops(StressorKind::Hdd, self.hdd_ops)
            .with_max_ops(StressorKind::Wait, self.wait_ops)
            .with_max_ops(StressorKind::Null, self.null_ops)
            .with_timeout(self.timeout.unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)))
            .with_backoff(Duration::from_micros(self.backoff))
            .with_verbosity(verbosity)
            .with_dry_run(self.dry_run)
            .with_metrics(self.metrics)
            .with_vm(VmConfig {
                bytes: vm_bytes,
                stride: vm_stride,
                hang,
                keep: self.vm_keep,
                fault: None,
            })
            .with_hdd(HddConfig {
                bytes: self.hdd_bytes.unwrap_or(DEFAULT_HDD_BYTES),
                no_clean: self.hdd_noclean,
                directory: self.hdd_dir,
            });
        Ok(config)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    havoc::init_logging(cli.verbosity());

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{e:#}");
            return ExitCode::from(EXIT_FAILURE as u8);
        }
    };

    // Failures are logged where they happen; only the status is left to map
    match Orchestrator::new(config).run() {
        Ok(report) if report.is_success() => ExitCode::from(EXIT_SUCCESS as u8),
        _ => ExitCode::from(EXIT_FAILURE as u8),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("havoc").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_counts_and_ceilings() {
        let config = parse(&["-c", "4", "--cpu-ops", "4000", "-m", "2", "--wait", "1"])
            .into_config()
            .unwrap();
        assert_eq!(config.workers(StressorKind::Cpu), 4);
        assert_eq!(config.workers(StressorKind::Vm), 2);
        assert_eq!(config.workers(StressorKind::Wait), 1);
        assert_eq!(config.per_worker_ops(StressorKind::Cpu), 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_suffixes() {
        let config = parse(&["-m", "1", "--vm-bytes", "128M", "--vm-stride", "8k", "-t", "10m"])
            .into_config()
            .unwrap();
        assert_eq!(config.vm.bytes, 128 << 20);
        assert_eq!(config.vm.stride, 8192);
        assert_eq!(config.timeout, Duration::from_secs(600));
    }

    #[test]
    fn test_vm_hang_zero_is_forever() {
        let config = parse(&["-m", "1", "--vm-hang", "0"]).into_config().unwrap();
        assert_eq!(config.vm.hang, VmHang::Forever);
        let config = parse(&["-m", "1", "--vm-hang", "2s"]).into_config().unwrap();
        assert_eq!(config.vm.hang, VmHang::Seconds(2));
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["-d", "1"]).into_config().unwrap();
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.hdd.bytes, DEFAULT_HDD_BYTES);
        assert_eq!(config.hdd.directory, PathBuf::from("."));
        assert_eq!(config.verbosity, Verbosity::Normal);
        assert!(!config.metrics);
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        let args = ["havoc", "-c", "1", "-v", "-q"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_bad_suffix_rejected() {
        assert!(Cli::try_parse_from(["havoc", "-c", "1", "-t", "5x"]).is_err());
    }
}
