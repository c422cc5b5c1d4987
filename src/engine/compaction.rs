//! STRATA - Compaction
//! Background flush and merge of segments.
//!
//! ## Level policy
//! - Flushes append a new segment to the highest level (`levels - 1`).
//! - Level `L >= 1` holds at most `2^L` segments. Past that, all of its
//!   segments are merged into one which is appended to level `L - 1`
//!   (tiered).
//! - Level 0 holds at most one segment. Past that, its segments are merged
//!   into the single replacement (leveled).
//!
//! A sweep walks every level from the top down, so a merge that overfills
//! the level below is handled in the same sweep.
//!
//! ## Merge
//! Streaming k-way merge over per-segment cursors. Only one entry per input
//! segment sits in the frontier at a time. On equal keys the segment added
//! later to the level wins; older versions are skipped.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::{Config, TombstonePolicy};
use crate::types::Entry;

use super::events::{Batch, EventReceiver};
use super::sstable::Segment;
use super::LsmTree;

/// What to do with an overfull level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionAction {
    /// Merge `level` and append the result to `target` (tiered).
    MergeDown { level: usize, target: usize },
    /// Merge `level` into a single replacement segment (leveled).
    MergeInPlace { level: usize },
}

/// Decides when and how a level is merged.
pub trait CompactionStrategy: Send + Sync {
    /// Action for `level` currently holding `segments` segments, if any.
    fn plan(&self, level: usize, segments: usize) -> Option<CompactionAction>;

    /// Human-readable name of this strategy.
    fn name(&self) -> &str;
}

/// Tiered merges above level 0, a single fully merged segment at level 0.
pub struct TieredLeveled {
    config: Arc<Config>,
}

impl TieredLeveled {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }
}

impl CompactionStrategy for TieredLeveled {
    fn plan(&self, level: usize, segments: usize) -> Option<CompactionAction> {
        if segments <= self.config.level_capacity(level) {
            return None;
        }
        Some(match level {
            0 => CompactionAction::MergeInPlace { level },
            _ => CompactionAction::MergeDown {
                level,
                target: level - 1,
            },
        })
    }

    fn name(&self) -> &str {
        "TieredLeveled"
    }
}

/// Frontier item: the current entry of one input segment.
struct Cursor<'a> {
    entry: &'a Entry,
    /// Index in the level's segment list; higher is newer.
    source: usize,
    block: usize,
    offset: usize,
}

impl PartialEq for Cursor<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Cursor<'_> {}

impl PartialOrd for Cursor<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cursor<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: smallest key first, newest source on ties
        other
            .entry
            .key
            .cmp(&self.entry.key)
            .then_with(|| self.source.cmp(&other.source))
    }
}

/// Merge `segments` (oldest first) into one sealed segment at `level`.
///
/// With `drop_tombstones` the surviving version of a deleted key is omitted
/// entirely; only safe when nothing older than `segments` exists.
///
/// # Panics
/// If an input segment has no blocks; such segments are never installed.
pub fn merge_segments(
    segments: &[Arc<Segment>],
    level: u8,
    config: &Config,
    drop_tombstones: bool,
) -> Segment {
    let expected: usize = segments.iter().map(|segment| segment.len()).sum();
    let mut frontier = BinaryHeap::with_capacity(segments.len());

    for (source, segment) in segments.iter().enumerate() {
        let entry = match segment.entry_at(0, 0) {
            Some(entry) => entry,
            None => unreachable!(
                "segment {} of level {} has no blocks",
                source,
                segment.level()
            ),
        };
        frontier.push(Cursor {
            entry,
            source,
            block: 0,
            offset: 0,
        });
    }

    let mut output = Segment::open(level, expected, config);
    let mut last_key: Option<&str> = None;

    while let Some(cursor) = frontier.pop() {
        if last_key != Some(cursor.entry.key.as_str()) {
            last_key = Some(cursor.entry.key.as_str());
            if !(drop_tombstones && cursor.entry.is_tombstone) {
                output.add_entry(cursor.entry.clone());
            }
        }

        let segment = &segments[cursor.source];
        let next = segment
            .entry_at(cursor.block, cursor.offset + 1)
            .map(|entry| (entry, cursor.block, cursor.offset + 1))
            .or_else(|| {
                segment
                    .entry_at(cursor.block + 1, 0)
                    .map(|entry| (entry, cursor.block + 1, 0))
            });
        if let Some((entry, block, offset)) = next {
            frontier.push(Cursor {
                entry,
                source: cursor.source,
                block,
                offset,
            });
        }
    }

    output.seal()
}

/// Consumer of mutation events: flushes full MemTables and keeps the level
/// set within its capacities. It is the only writer of the level set.
pub struct CompactionEngine {
    tree: Arc<LsmTree>,
    strategy: Box<dyn CompactionStrategy>,
}

impl CompactionEngine {
    pub fn new(tree: Arc<LsmTree>) -> Self {
        let strategy = Box::new(TieredLeveled::new(tree.shared_config()));
        Self::with_strategy(tree, strategy)
    }

    pub fn with_strategy(tree: Arc<LsmTree>, strategy: Box<dyn CompactionStrategy>) -> Self {
        Self { tree, strategy }
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Handle one (possibly coalesced) mutation event. Returns `true` if a
    /// flush happened.
    pub fn on_mutation_event(&self) -> bool {
        if !self.tree.memtable().should_flush() {
            return false;
        }
        let flushed = self.flush();
        if flushed {
            self.sweep();
        }
        flushed
    }

    /// Convert the full MemTable into a segment on the highest level.
    ///
    /// The frozen table stays readable until the segment is installed, so
    /// no key is invisible at any point of the handoff.
    pub fn flush(&self) -> bool {
        let memtable = self.tree.memtable();
        let frozen = match memtable.take_flushable() {
            Some(frozen) => frozen,
            None => return false,
        };

        let config = self.tree.config();
        let level = config.first_level();
        let segment = Segment::build_from_sorted_entries(frozen.values().cloned(), level, config);
        log::debug!(
            "flushed {} entries into a level {} segment",
            segment.len(),
            level
        );

        self.tree.levels().push(level as usize, Arc::new(segment));
        memtable.retire_flushable();
        self.tree.metrics().record_flush();
        true
    }

    /// Walk every level top-down and merge the overfull ones. Returns the
    /// number of merges performed.
    pub fn sweep(&self) -> usize {
        let levels = self.tree.levels();
        let mut merges = 0;

        for level in (0..levels.depth()).rev() {
            if let Some(action) = self.strategy.plan(level, levels.segment_count(level)) {
                self.compact(action);
                merges += 1;
            }
        }
        merges
    }

    fn compact(&self, action: CompactionAction) {
        let config = self.tree.config();
        let levels = self.tree.levels();
        let (level, target) = match action {
            CompactionAction::MergeDown { level, target } => (level, target),
            CompactionAction::MergeInPlace { level } => (level, level),
        };
        let drop_tombstones = target == 0
            && level == 0
            && config.tombstone_policy == TombstonePolicy::DropAtBase;

        // merging happens outside the lock; only this thread mutates levels
        let inputs = levels.snapshot(level);
        let merged = merge_segments(&inputs, target as u8, config, drop_tombstones);
        log::debug!(
            "merged {} segments of level {} into {} entries on level {}",
            inputs.len(),
            level,
            merged.len(),
            target
        );
        self.tree.metrics().record_compaction(merged.len());

        let output = (!merged.is_empty()).then(|| Arc::new(merged));
        levels.replace(level, inputs.len(), target, output);
    }

    /// Drain queued events without blocking and act on them once.
    pub fn process_pending(&self, events: &EventReceiver) -> Batch {
        let batch = events.try_recv_batch();
        if batch.mutations > 0 {
            self.on_mutation_event();
        }
        batch
    }

    /// Consume events until a shutdown event arrives or every sender is gone.
    pub fn run(&self, events: EventReceiver) {
        while let Some(batch) = events.recv_batch() {
            if batch.mutations > 0 {
                self.on_mutation_event();
            }
            if batch.shutdown {
                break;
            }
        }
        log::info!("compaction thread exiting");
    }

    /// Run the engine on a dedicated thread.
    pub fn spawn(self, events: EventReceiver) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("strata-compaction".into())
            .spawn(move || self.run(events))
    }
}
