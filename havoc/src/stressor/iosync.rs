//! io-sync: flush the page cache with `sync()` as fast as possible.

use nix::unistd::sync;

use crate::error::Result;
use crate::stressor::{ StressContext, Stressor };

pub struct IoSyncStressor;

impl Stressor for IoSyncStressor {
    fn run(&mut self, ctx: &StressContext<'_>) -> Result<()> {
        while ctx.keep_running() {
            sync();
            ctx.inc();
        }
        Ok(())
    }
}
