//! hdd-write: stream 64 KiB blocks into temp files.
//!
//! One block written is one bogo-op. With cleanup on (the default) each file
//! is unlinked as soon as it is created, so nothing survives the worker.
//! With `no_clean` the files are named `havoc-<pid>.XXXXXX` and left in
//! place.

use std::fs::File;
use std::io::Write;
use std::path::{ Path, PathBuf };

use nix::unistd::getpid;
use rand::Rng;
use tracing::debug;

use crate::config::HddConfig;
use crate::constants::HDD_BUF_SIZE;
use crate::error::{ HavocError, Result };
use crate::stressor::{ StressContext, Stressor };

pub struct HddStressor {
    bytes: u64,
    no_clean: bool,
    directory: PathBuf,
}

impl HddStressor {
    pub fn new(config: &HddConfig) -> Self {
        Self {
            bytes: config.bytes,
            no_clean: config.no_clean,
            directory: config.directory.clone(),
        }
    }

    fn create_file(&self, prefix: &str) -> Result<File> {
        if self.no_clean {
            let (file, path) = tempfile::Builder::new()
                .prefix(prefix)
                .rand_bytes(6)
                .tempfile_in(&self.directory)
                .and_then(|f| f.keep().map_err(|e| e.error))
                .map_err(|e| HavocError::op("mkstemp", e))?;
            debug!(path = %path.display(), "keeping hdd file");
            Ok(file)
        } else {
            tempfile::tempfile_in(&self.directory).map_err(|e| HavocError::op("mkstemp", e))
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl Stressor for HddStressor {
    fn run(&mut self, ctx: &StressContext<'_>) -> Result<()> {
        let prefix = format!("havoc-{}.", getpid());
        let mut buf = vec![0u8; HDD_BUF_SIZE];
        rand::thread_rng().fill(&mut buf[..]);

        while ctx.keep_running() {
            let mut file = self.create_file(&prefix)?;
            let mut written = 0u64;
            while written < self.bytes {
                file.write_all(&buf).map_err(|e| HavocError::op("write", e))?;
                written += HDD_BUF_SIZE as u64;
                ctx.inc();
                if !ctx.keep_running() {
                    break;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MB;
    use crate::counters::CounterSlot;
    use crate::signals::StopToken;
    use crate::stressor::StressorKind;
    use std::fs;
    use std::sync::atomic::AtomicU64;

    fn hdd(dir: &Path, no_clean: bool) -> HddConfig {
        HddConfig { bytes: MB, no_clean, directory: dir.to_path_buf() }
    }

    fn files_in(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }

    #[test]
    fn test_clean_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let cell = AtomicU64::new(0);
        let ctx = StressContext::new(StressorKind::Hdd, 0, CounterSlot::new(&cell), 40, StopToken::new());
        HddStressor::new(&hdd(dir.path(), false)).run(&ctx).unwrap();
        assert_eq!(ctx.counter.get(), 40);
        assert!(files_in(dir.path()).is_empty());
    }

    #[test]
    fn test_no_clean_keeps_files() {
        let dir = tempfile::tempdir().unwrap();
        let cell = AtomicU64::new(0);
        // 16 blocks per 1 MiB file, so 40 ops span three files
        let ctx = StressContext::new(StressorKind::Hdd, 0, CounterSlot::new(&cell), 40, StopToken::new());
        HddStressor::new(&hdd(dir.path(), true)).run(&ctx).unwrap();

        let files = files_in(dir.path());
        assert_eq!(files.len(), 3);
        let prefix = format!("havoc-{}.", getpid());
        let mut total = 0;
        for path in &files {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            assert!(name.starts_with(&prefix), "unexpected file {name}");
            total += fs::metadata(path).unwrap().len();
        }
        assert_eq!(total, 40 * HDD_BUF_SIZE as u64);
    }

    #[test]
    fn test_missing_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("missing");
        let cell = AtomicU64::new(0);
        let ctx = StressContext::new(StressorKind::Hdd, 0, CounterSlot::new(&cell), 0, StopToken::new());
        let err = HddStressor::new(&hdd(&gone, false)).run(&ctx).unwrap_err();
        assert!(matches!(err, HavocError::Operation { op: "mkstemp", .. }));
    }
}
