//! Counter verification.

/// Feeds on successive samples of one counter and records every time a
/// sample is lower than the one before it.
#[derive(Debug, Clone, Default)]
pub struct MonotonicChecker {
    last: u64,
    samples: u64,
    regressions: u64,
}

impl MonotonicChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if `value` went backwards.
    pub fn observe(&mut self, value: u64) -> bool {
        self.samples += 1;
        let ok = value >= self.last;
        if ok {
            self.last = value;
        } else {
            self.regressions += 1;
        }
        ok
    }

    pub fn last(&self) -> u64 {
        self.last
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn regressions(&self) -> u64 {
        self.regressions
    }
}
