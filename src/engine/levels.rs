//! STRATA - Level Set
//! Segment lists per level. Index `levels - 1` receives MemTable flushes,
//! index 0 holds the fully merged base segment.
//!
//! Readers hold the read lock for a whole level scan; the compactor takes the
//! write lock only to swap `Arc<Segment>` lists, never while merging.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::types::ReadResult;

use super::metrics::EngineMetrics;
use super::sstable::Segment;

pub struct LevelSet {
    levels: RwLock<Vec<Vec<Arc<Segment>>>>,
}

impl LevelSet {
    pub fn new(levels: usize) -> Self {
        Self {
            levels: RwLock::new(vec![Vec::new(); levels]),
        }
    }

    /// Number of levels.
    pub fn depth(&self) -> usize {
        self.levels.read().len()
    }

    /// Append `segment` as the most recent segment of `level`.
    pub fn push(&self, level: usize, segment: Arc<Segment>) {
        self.levels.write()[level].push(segment);
    }

    /// Clone of the segment list at `level`, oldest first.
    pub fn snapshot(&self, level: usize) -> Vec<Arc<Segment>> {
        self.levels.read()[level].clone()
    }

    pub fn segment_count(&self, level: usize) -> usize {
        self.levels.read()[level].len()
    }

    /// Segment count per level, index 0 first.
    pub fn sizes(&self) -> Vec<usize> {
        self.levels.read().iter().map(Vec::len).collect()
    }

    /// Remove the `merged` oldest segments of `level` and append `output` to
    /// `target`, in one critical section. With `target == level` the output
    /// takes the place of the removed run.
    pub fn replace(&self, level: usize, merged: usize, target: usize, output: Option<Arc<Segment>>) {
        let mut levels = self.levels.write();
        levels[level].drain(..merged);
        if let Some(segment) = output {
            if target == level {
                levels[level].insert(0, segment);
            } else {
                levels[target].push(segment);
            }
        }
    }

    /// Newest-first search: highest level down to 0, and within a level the
    /// most recently added segment first. Stops at the first value or
    /// tombstone.
    pub fn get(&self, key: &str, metrics: &EngineMetrics) -> ReadResult {
        let levels = self.levels.read();
        for (level, segments) in levels.iter().enumerate().rev() {
            for segment in segments.iter().rev() {
                if !segment.might_contain(key) {
                    metrics.record_table_filter_skip();
                    log::trace!("level {}: table filter rules out {:?}", level, key);
                    continue;
                }

                let (result, block_skipped) = segment.read_traced(key);
                if block_skipped {
                    metrics.record_block_filter_skip();
                }
                if result.is_terminal() {
                    return result;
                }
            }
        }
        ReadResult::NotFound
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::types::Entry;

    fn segment(level: u8, entries: Vec<Entry>) -> Arc<Segment> {
        Arc::new(Segment::build_from_sorted_entries(
            entries,
            level,
            &Config::default().with_block_capacity(2),
        ))
    }

    #[test]
    fn test_newer_segment_wins_within_level() {
        let set = LevelSet::new(3);
        set.push(2, segment(2, vec![Entry::put("k", "old")]));
        set.push(2, segment(2, vec![Entry::put("k", "new")]));

        assert_eq!(set.get("k", &EngineMetrics::new()), ReadResult::Found("new".into()));
    }

    #[test]
    fn test_higher_level_wins() {
        let set = LevelSet::new(3);
        set.push(0, segment(0, vec![Entry::put("k", "base")]));
        set.push(1, segment(1, vec![Entry::tombstone("k")]));

        assert_eq!(set.get("k", &EngineMetrics::new()), ReadResult::Deleted);
    }

    #[test]
    fn test_falls_through_to_lower_levels() {
        let set = LevelSet::new(3);
        set.push(0, segment(0, vec![Entry::put("a", "1")]));
        set.push(2, segment(2, vec![Entry::put("b", "2")]));

        let metrics = EngineMetrics::new();
        assert_eq!(set.get("a", &metrics), ReadResult::Found("1".into()));
        assert_eq!(set.get("zzz", &metrics), ReadResult::NotFound);
    }

    #[test]
    fn test_replace_moves_merged_output_down() {
        let set = LevelSet::new(3);
        set.push(2, segment(2, vec![Entry::put("a", "1")]));
        set.push(2, segment(2, vec![Entry::put("b", "2")]));
        set.push(1, segment(1, vec![Entry::put("c", "3")]));

        set.replace(2, 2, 1, Some(segment(1, vec![Entry::put("a", "1")])));
        assert_eq!(set.sizes(), vec![0, 2, 0]);
        // merged output is the newest segment of its new level
        assert_eq!(set.snapshot(1)[1].iter().next().unwrap().key, "a");
    }

    #[test]
    fn test_replace_in_place_keeps_later_segments() {
        let set = LevelSet::new(1);
        set.push(0, segment(0, vec![Entry::put("a", "1")]));
        set.push(0, segment(0, vec![Entry::put("b", "2")]));

        set.replace(0, 2, 0, Some(segment(0, vec![Entry::put("ab", "x")])));
        assert_eq!(set.sizes(), vec![1]);

        set.replace(0, 1, 0, None);
        assert_eq!(set.sizes(), vec![0]);
    }
}
