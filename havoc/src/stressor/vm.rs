//! vm-mmap: anonymous mappings filled with a Gray-code pattern and read back.
//!
//! Each iteration the 8-bit generation counter advances and its Gray code
//! becomes the fill byte, so consecutive fills differ by exactly one bit.
//! A stuck bit therefore shows up within a couple of iterations. Any
//! mismatch on read-back is fatal: it means broken hardware or a kernel
//! bug, never something worth retrying.

use std::ptr;

use memmap2::MmapMut;
use nix::unistd::sleep;
use tracing::debug;

use crate::config::{ VmConfig, VmFault, VmHang };
use crate::error::{ HavocError, Result };
use crate::stressor::{ StressContext, Stressor };

/// Gray code of `v`: consecutive values differ in exactly one bit.
#[inline]
pub const fn gray_code(v: u8) -> u8 {
    v ^ (v >> 1)
}

/// Write `pattern` at every `stride`-th byte of `buf`.
pub fn fill_strided(buf: &mut [u8], stride: usize, pattern: u8) {
    debug_assert!(stride > 0);
    let base = buf.as_mut_ptr();
    for offset in (0..buf.len()).step_by(stride) {
        // SAFETY: offset < buf.len()
        unsafe { ptr::write_volatile(base.add(offset), pattern) };
    }
}

/// Read back every `stride`-th byte; the first mismatch is an error.
pub fn verify_strided(buf: &[u8], stride: usize, pattern: u8) -> Result<()> {
    debug_assert!(stride > 0);
    let base = buf.as_ptr();
    for offset in (0..buf.len()).step_by(stride) {
        // SAFETY: offset < buf.len()
        let actual = unsafe { ptr::read_volatile(base.add(offset)) };
        if actual != pattern {
            return Err(HavocError::Corruption { offset, expected: pattern, actual });
        }
    }
    Ok(())
}

pub struct VmStressor {
    bytes: usize,
    stride: usize,
    hang: VmHang,
    keep: bool,
    fault: Option<VmFault>,
}

impl VmStressor {
    pub fn new(config: &VmConfig) -> Self {
        Self {
            bytes: config.bytes,
            stride: config.stride,
            hang: config.hang,
            keep: config.keep,
            fault: config.fault,
        }
    }

    fn hold(&self, ctx: &StressContext<'_>) {
        match self.hang {
            VmHang::Skip => {}
            VmHang::Forever => {
                while ctx.stop.is_running() {
                    sleep(3600);
                }
            }
            VmHang::Seconds(secs) => {
                // Returns early when a signal lands
                sleep(secs);
            }
        }
    }

    fn inject_fault(&self, buf: &mut [u8], ctx: &StressContext<'_>, pattern: u8) {
        if let Some(fault) = self.fault.filter(|f| f.instance == ctx.instance) {
            if fault.offset < buf.len() {
                // SAFETY: bounds checked above
                unsafe { ptr::write_volatile(buf.as_mut_ptr().add(fault.offset), !pattern) };
            }
        }
    }
}

impl Stressor for VmStressor {
    fn run(&mut self, ctx: &StressContext<'_>) -> Result<()> {
        let mut generation: u8 = 0;
        let mut region: Option<MmapMut> = None;

        while ctx.keep_running() {
            let pattern = gray_code(generation);
            generation = generation.wrapping_add(1);

            if !self.keep || region.is_none() {
                match MmapMut::map_anon(self.bytes) {
                    Ok(map) => {
                        region = Some(map);
                    }
                    Err(e) => {
                        debug!("mmap of {} bytes failed, retrying: {e}", self.bytes);
                        continue;
                    }
                }
            }
            let Some(buf) = region.as_mut() else {
                continue;
            };

            fill_strided(buf, self.stride, pattern);
            self.inject_fault(buf, ctx, pattern);
            self.hold(ctx);
            verify_strided(buf, self.stride, pattern)?;

            if !self.keep {
                region = None;
            }
            ctx.inc();
        }
        Ok(())
    }
}
