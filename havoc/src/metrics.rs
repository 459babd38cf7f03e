//! Metrics for a finished run.
//!
//! Per-kind bogo-op totals and rates, read from the counter table once every
//! worker has been reaped.

use std::fmt;
use std::time::Duration;

use crate::counters::SharedCounterTable;
use crate::orchestrator::WorkerRecord;
use crate::stressor::StressorKind;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KindMetrics {
    pub kind: StressorKind,
    pub workers: usize,
    pub total_ops: u64,
    /// Sum of each worker's own lifetime, not wall time
    pub total_time: Duration,
}

impl KindMetrics {
    /// Bogo-ops per worker-second; zero when no time elapsed.
    pub fn rate(&self) -> f64 {
        let secs = self.total_time.as_secs_f64();
        if secs > 0.0 { (self.total_ops as f64) / secs } else { 0.0 }
    }
}

impl fmt::Display for KindMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} in {:.2} secs, rate: {:.2}",
            self.kind.label(),
            self.total_ops,
            self.total_time.as_secs_f64(),
            self.rate()
        )
    }
}

/// Totals for every kind that started at least one worker.
pub fn aggregate(workers: &[WorkerRecord], table: &SharedCounterTable) -> Vec<KindMetrics> {
    StressorKind::ALL.iter()
        .filter_map(|&kind| {
            let started: Vec<&WorkerRecord> = workers
                .iter()
                .filter(|w| w.kind == kind)
                .collect();
            if started.is_empty() {
                return None;
            }
            Some(KindMetrics {
                kind,
                workers: started.len(),
                total_ops: started
                    .iter()
                    .map(|w| table.slot_for(kind, w.instance).get())
                    .sum(),
                total_time: started
                    .iter()
                    .map(|w| w.elapsed())
                    .sum(),
            })
        })
        .collect()
}
