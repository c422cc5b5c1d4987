//! STRATA - Engine Configuration
//! Tunable parameters, constructed once at startup and shared read-only
//! (as `Arc<Config>`) by the tree, the segment builder and the compactor.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StrataError};

/// What a merge does with tombstones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TombstonePolicy {
    /// Carry tombstones forward through every merge.
    #[default]
    Retain,
    /// Drop tombstones in the level-0 merge, where nothing older can exist.
    DropAtBase,
}

/// Configuration for the Strata storage engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Number of levels. Flushes land on `levels - 1`, level 0 is fully merged.
    pub levels: usize,

    /// Level `L` holds up to `level_capacity_base ^ L` segments.
    pub level_capacity_base: usize,

    /// Maximum number of entries per segment block.
    pub block_capacity: usize,

    /// Target false-positive rate of the per-segment filter.
    pub table_false_positive_rate: f64,

    /// Target false-positive rate of the per-block filter.
    pub block_false_positive_rate: f64,

    /// Number of live MemTable entries that triggers a flush.
    pub memtable_max_entries: usize,

    /// Bound of the mutation-event channel.
    pub event_channel_capacity: usize,

    /// Tombstone handling during merges.
    pub tombstone_policy: TombstonePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            levels: 7,
            level_capacity_base: 2,
            block_capacity: 256,
            table_false_positive_rate: 0.01,
            block_false_positive_rate: 0.001,
            memtable_max_entries: 4096,
            event_channel_capacity: 10_000,
            tombstone_policy: TombstonePolicy::Retain,
        }
    }
}

impl Config {
    /// Set the number of levels.
    pub fn with_levels(mut self, levels: usize) -> Self {
        self.levels = levels;
        self
    }

    /// Set the base of the per-level segment capacity.
    pub fn with_level_capacity_base(mut self, base: usize) -> Self {
        self.level_capacity_base = base;
        self
    }

    /// Set the number of entries per block.
    pub fn with_block_capacity(mut self, capacity: usize) -> Self {
        self.block_capacity = capacity;
        self
    }

    /// Set the MemTable flush threshold (entry count).
    pub fn with_memtable_max_entries(mut self, entries: usize) -> Self {
        self.memtable_max_entries = entries;
        self
    }

    /// Set the table-level and block-level filter targets.
    pub fn with_false_positive_rates(mut self, table: f64, block: f64) -> Self {
        self.table_false_positive_rate = table;
        self.block_false_positive_rate = block;
        self
    }

    /// Set the bound of the mutation-event channel.
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    /// Set the tombstone policy.
    pub fn with_tombstone_policy(mut self, policy: TombstonePolicy) -> Self {
        self.tombstone_policy = policy;
        self
    }

    /// The level a MemTable flush lands on (highest index).
    pub fn first_level(&self) -> u8 {
        (self.levels - 1) as u8
    }

    /// Maximum number of segments level `level` holds before it is merged.
    pub fn level_capacity(&self, level: usize) -> usize {
        self.level_capacity_base.saturating_pow(level as u32)
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.levels == 0 || self.levels > 32 {
            return Err(StrataError::Config(format!(
                "levels must be in 1..=32, got {}",
                self.levels
            )));
        }
        if self.level_capacity_base < 2 {
            return Err(StrataError::Config(format!(
                "level_capacity_base must be >= 2, got {}",
                self.level_capacity_base
            )));
        }
        if self.block_capacity == 0 {
            return Err(StrataError::Config("block_capacity must be > 0".into()));
        }
        if self.memtable_max_entries == 0 {
            return Err(StrataError::Config(
                "memtable_max_entries must be > 0".into(),
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(StrataError::Config(
                "event_channel_capacity must be > 0".into(),
            ));
        }
        for (name, rate) in [
            ("table_false_positive_rate", self.table_false_positive_rate),
            ("block_false_positive_rate", self.block_false_positive_rate),
        ] {
            if !(rate > 0.0 && rate < 1.0) {
                return Err(StrataError::Config(format!(
                    "{} must be in (0, 1), got {}",
                    name, rate
                )));
            }
        }
        Ok(())
    }
}
