//! STRATA - Storage Engine Module
//! The LSM-Tree: a MemTable in front of a set of immutable segment levels.

pub mod bloom;
pub mod compaction;
pub mod events;
pub mod levels;
pub mod memtable;
pub mod metrics;
pub mod sstable;
pub mod wal;

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::types::{Key, ReadResult, Value};

use self::events::EventSender;
use self::levels::LevelSet;
use self::memtable::MemTable;
use self::metrics::EngineMetrics;

/// Coordinates the MemTable and the level set.
///
/// Writes go to the MemTable and emit one mutation event each; flushing and
/// merging happen on the consumer side of the event channel
/// (see [`compaction::CompactionEngine`]). Reads go MemTable first, then the
/// levels newest-first, and stop at the first value or tombstone.
pub struct LsmTree {
    config: Arc<Config>,
    memtable: MemTable,
    levels: LevelSet,
    events: EventSender,
    metrics: EngineMetrics,
}

impl LsmTree {
    /// Build an empty tree. Fails if `config` does not pass [`Config::validate`].
    pub fn new(config: Arc<Config>, events: EventSender) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            memtable: MemTable::new(config.memtable_max_entries),
            levels: LevelSet::new(config.levels),
            events,
            metrics: EngineMetrics::new(),
            config,
        })
    }

    /// Insert or overwrite `key`.
    pub fn put(&self, key: impl Into<Key>, value: impl Into<Value>) {
        let (key, value) = (key.into(), value.into());
        self.metrics.record_put(key.len(), value.len());
        self.memtable.put(key, value);
        self.events.notify_mutation();
    }

    /// Write a tombstone for `key`.
    pub fn delete(&self, key: impl Into<Key>) {
        self.metrics.record_delete();
        self.memtable.delete(key.into());
        self.events.notify_mutation();
    }

    /// Most recent state of `key`.
    pub fn get(&self, key: &str) -> ReadResult {
        self.metrics.record_get();
        let result = self.memtable.get(key);
        if result.is_terminal() {
            return result;
        }
        self.levels.get(key, &self.metrics)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn shared_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// Segment count per level, index 0 first.
    pub fn level_sizes(&self) -> Vec<usize> {
        self.levels.sizes()
    }

    /// Entries currently in the live MemTable.
    pub fn memtable_len(&self) -> usize {
        self.memtable.len()
    }

    pub(crate) fn memtable(&self) -> &MemTable {
        &self.memtable
    }

    pub(crate) fn levels(&self) -> &LevelSet {
        &self.levels
    }
}
