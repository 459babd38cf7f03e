//! null-write: 4 KiB blocks into /dev/null.

use std::fs::{ File, OpenOptions };
use std::io::{ ErrorKind, Write };

use crate::constants::NULL_BUF_SIZE;
use crate::error::{ HavocError, Result };
use crate::stressor::{ StressContext, Stressor };

const NULL_DEVICE: &str = "/dev/null";

pub struct NullStressor;

/// Write blocks to `file` until the context says stop.
fn write_loop(file: &mut File, ctx: &StressContext<'_>) -> Result<()> {
    let buffer = [0xffu8; NULL_BUF_SIZE];
    while ctx.keep_running() {
        match file.write(&buffer) {
            Ok(0) => {}
            Ok(_) => ctx.inc(),
            Err(e) if matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) => {}
            Err(e) => {
                return Err(HavocError::op("write", e));
            }
        }
    }
    Ok(())
}

impl Stressor for NullStressor {
    fn run(&mut self, ctx: &StressContext<'_>) -> Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .open(NULL_DEVICE)
            .map_err(|e| HavocError::op("open", e))?;
        write_loop(&mut file, ctx)
    }
}
