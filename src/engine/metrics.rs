//! STRATA - Engine Metrics
//! Lock-free counters for the write path, the read path and the compactor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Atomic operation counters.
///
/// All counters use `Ordering::Relaxed`; they are observability only and
/// never synchronize anything.
#[derive(Debug)]
pub struct EngineMetrics {
    pub puts: AtomicU64,
    pub gets: AtomicU64,
    pub deletes: AtomicU64,
    /// MemTable -> segment conversions.
    pub flushes: AtomicU64,
    /// Level merges.
    pub compactions: AtomicU64,
    /// Entries written into merged segments.
    pub entries_merged: AtomicU64,
    /// Segments skipped by their table filter during reads.
    pub table_filter_skips: AtomicU64,
    /// Block scans avoided by a block filter.
    pub block_filter_skips: AtomicU64,
    /// Key + value bytes accepted by put.
    pub bytes_written: AtomicU64,
    started: Instant,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            puts: AtomicU64::new(0),
            gets: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            compactions: AtomicU64::new(0),
            entries_merged: AtomicU64::new(0),
            table_filter_skips: AtomicU64::new(0),
            block_filter_skips: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn record_put(&self, key_size: usize, value_size: usize) {
        self.puts.fetch_add(1, Ordering::Relaxed);
        self.bytes_written
            .fetch_add((key_size + value_size) as u64, Ordering::Relaxed);
    }

    pub fn record_get(&self) {
        self.gets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_compaction(&self, entries: usize) {
        self.compactions.fetch_add(1, Ordering::Relaxed);
        self.entries_merged
            .fetch_add(entries as u64, Ordering::Relaxed);
    }

    pub fn record_table_filter_skip(&self) {
        self.table_filter_skips.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_block_filter_skip(&self) {
        self.block_filter_skips.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// puts + gets + deletes
    pub fn total_ops(&self) -> u64 {
        self.puts.load(Ordering::Relaxed)
            + self.gets.load(Ordering::Relaxed)
            + self.deletes.load(Ordering::Relaxed)
    }

    pub fn ops_per_sec(&self) -> f64 {
        let uptime = self.uptime_secs();
        if uptime < 0.001 {
            return 0.0;
        }
        self.total_ops() as f64 / uptime
    }

    /// Human-readable summary.
    pub fn report(&self) -> String {
        format!(
            "\n═══ STRATA Engine Metrics ═══\n\
             Operations:\n\
               puts:      {}\n\
               gets:      {}\n\
               deletes:   {}\n\
             Background:\n\
               flushes:        {}\n\
               compactions:    {}\n\
               entries merged: {}\n\
             Filters:\n\
               table skips: {}\n\
               block skips: {}\n\
             Throughput:\n\
               total ops: {}\n\
               ops/sec:   {:.2}\n\
               written:   {} bytes\n\
             Uptime: {:.2}s",
            self.puts.load(Ordering::Relaxed),
            self.gets.load(Ordering::Relaxed),
            self.deletes.load(Ordering::Relaxed),
            self.flushes.load(Ordering::Relaxed),
            self.compactions.load(Ordering::Relaxed),
            self.entries_merged.load(Ordering::Relaxed),
            self.table_filter_skips.load(Ordering::Relaxed),
            self.block_filter_skips.load(Ordering::Relaxed),
            self.total_ops(),
            self.ops_per_sec(),
            self.bytes_written.load(Ordering::Relaxed),
            self.uptime_secs(),
        )
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}
