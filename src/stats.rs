use std::sync::atomic::{AtomicU64, Ordering};

/// Counters collected during a run, readable from a front-end thread while it is in progress
#[derive(Default)]
pub struct RunStats {
    pub records_written: AtomicU64,
    pub rows_skipped: AtomicU64,
    pub identifiers_generated: AtomicU64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_records(&self, count: u64) {
        self.records_written.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_skipped(&self, count: u64) {
        self.rows_skipped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_generated(&self, count: u64) {
        self.identifiers_generated.fetch_add(count, Ordering::Relaxed);
    }

    pub fn records(&self) -> u64 {
        self.records_written.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> u64 {
        self.rows_skipped.load(Ordering::Relaxed)
    }

    pub fn generated(&self) -> u64 {
        self.identifiers_generated.load(Ordering::Relaxed)
    }
}
