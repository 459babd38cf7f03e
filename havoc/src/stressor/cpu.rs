//! cpu-compute: square roots of pseudo-random operands.

use std::hint::black_box;

use rand::rngs::StdRng;
use rand::{ Rng, SeedableRng };

use crate::constants::{ CPU_SEED, CPU_SQRT_ROUNDS };
use crate::error::Result;
use crate::stressor::{ StressContext, Stressor };

pub struct CpuStressor {
    rng: StdRng,
}

impl CpuStressor {
    pub fn new() -> Self {
        Self { rng: StdRng::seed_from_u64(CPU_SEED) }
    }
}

impl Default for CpuStressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Stressor for CpuStressor {
    fn run(&mut self, ctx: &StressContext<'_>) -> Result<()> {
        while ctx.keep_running() {
            for _ in 0..CPU_SQRT_ROUNDS {
                black_box(f64::from(self.rng.gen::<u32>()).sqrt());
            }
            ctx.inc();
        }
        Ok(())
    }
}
