//! STRATA - Segment (SSTable)
//! Immutable, key-sorted collection of fixed-capacity blocks.
//!
//! ## Layout
//! ```text
//! Segment
//! ├── header  (level, timestamp, version, block capacity, entry count, sealed)
//! ├── filter  (table-level, sized for the whole segment)
//! ├── blocks  [Block { sequence, anchor, entries[..block_capacity], filter }]
//! └── footer  (CRC32 over every appended entry)
//! ```
//!
//! Lookups go table filter -> binary search over block anchors -> block
//! filter -> linear scan of one block.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::Config;
use crate::types::{Entry, ReadResult};

use super::bloom::BloomFilter;

/// Format version written into every segment header.
pub const SEGMENT_VERSION: u16 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentHeader {
    pub level: u8,
    /// Creation time, microseconds since the Unix epoch.
    pub timestamp: u64,
    pub version: u16,
    pub block_capacity: usize,
    pub number_of_entries: usize,
    /// Once set, `add_entry` is a no-op.
    pub sealed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SegmentFooter {
    pub checksum: u32,
}

/// A sorted run of at most `block_capacity` entries.
#[derive(Debug)]
pub struct Block {
    sequence: usize,
    entries: Vec<Entry>,
    filter: BloomFilter,
}

impl Block {
    fn new(sequence: usize, capacity: usize, false_positive_rate: f64) -> Self {
        Self {
            sequence,
            entries: Vec::with_capacity(capacity),
            filter: BloomFilter::new(capacity, false_positive_rate),
        }
    }

    pub fn sequence(&self) -> usize {
        self.sequence
    }

    /// First entry of the block by key order.
    pub fn anchor(&self) -> &Entry {
        // blocks are only created together with their first entry
        &self.entries[0]
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn might_contain(&self, key: &str) -> bool {
        self.filter.might_contain(key)
    }

    fn find(&self, key: &str) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.key == key)
    }
}

/// Immutable sorted segment. Built once, sealed, then shared read-only.
pub struct Segment {
    header: SegmentHeader,
    blocks: Vec<Block>,
    filter: BloomFilter,
    footer: SegmentFooter,
    block_false_positive_rate: f64,
    hasher: crc32fast::Hasher,
}

impl Segment {
    /// Start an empty, unsealed segment sized for `expected_count` entries.
    pub fn open(level: u8, expected_count: usize, config: &Config) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_micros() as u64;

        Self {
            header: SegmentHeader {
                level,
                timestamp,
                version: SEGMENT_VERSION,
                block_capacity: config.block_capacity,
                number_of_entries: 0,
                sealed: false,
            },
            blocks: Vec::with_capacity(expected_count.div_ceil(config.block_capacity.max(1))),
            filter: BloomFilter::new(expected_count, config.table_false_positive_rate),
            footer: SegmentFooter::default(),
            block_false_positive_rate: config.block_false_positive_rate,
            hasher: crc32fast::Hasher::new(),
        }
    }

    /// Build a sealed segment from entries already sorted and deduplicated
    /// by key. The builder does not sort.
    pub fn build_from_sorted_entries<I>(entries: I, level: u8, config: &Config) -> Self
    where
        I: IntoIterator<Item = Entry>,
        I::IntoIter: ExactSizeIterator,
    {
        let entries = entries.into_iter();
        let mut segment = Self::open(level, entries.len(), config);
        for entry in entries {
            segment.add_entry(entry);
        }
        segment.seal()
    }

    /// Append `entry` after every entry added so far.
    ///
    /// Returns `false` (and drops the entry) once the segment is sealed.
    pub fn add_entry(&mut self, entry: Entry) -> bool {
        if self.header.sealed {
            return false;
        }
        debug_assert!(
            self.last_key().map_or(true, |last| last < entry.key.as_str()),
            "entries must be appended in strictly ascending key order"
        );

        let capacity = self.header.block_capacity;
        let needs_block = self
            .blocks
            .last()
            .map_or(true, |block| block.entries.len() >= capacity);
        if needs_block {
            let sequence = self.blocks.len();
            self.blocks
                .push(Block::new(sequence, capacity, self.block_false_positive_rate));
        }

        self.hasher.update(entry.key.as_bytes());
        self.hasher.update(entry.value.as_bytes());
        self.hasher.update(&[entry.is_tombstone as u8]);
        self.filter.insert(&entry.key);

        if let Some(block) = self.blocks.last_mut() {
            block.filter.insert(&entry.key);
            block.entries.push(entry);
        }
        self.header.number_of_entries += 1;
        true
    }

    /// Freeze the segment and finalize its checksum.
    pub fn seal(mut self) -> Self {
        if !self.header.sealed {
            self.footer.checksum = self.hasher.clone().finalize();
            self.header.sealed = true;
        }
        self
    }

    /// `false` means `key` is definitely not in this segment.
    pub fn might_contain(&self, key: &str) -> bool {
        self.filter.might_contain(key)
    }

    /// Point lookup: anchor binary search, block filter, then block scan.
    pub fn read(&self, key: &str) -> ReadResult {
        self.read_traced(key).0
    }

    /// Like `read`, but reports whether the block filter pruned the scan.
    pub(crate) fn read_traced(&self, key: &str) -> (ReadResult, bool) {
        // number of blocks whose anchor is <= key; the candidate is the last one
        let idx = self
            .blocks
            .partition_point(|block| block.anchor().key.as_str() <= key);
        match idx.checked_sub(1).map(|i| &self.blocks[i]) {
            Some(block) if block.might_contain(key) => (
                block
                    .find(key)
                    .map_or(ReadResult::NotFound, Entry::to_result),
                false,
            ),
            Some(_) => (ReadResult::NotFound, true),
            None => (ReadResult::NotFound, false),
        }
    }

    pub fn header(&self) -> &SegmentHeader {
        &self.header
    }

    pub fn footer(&self) -> SegmentFooter {
        self.footer
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn level(&self) -> u8 {
        self.header.level
    }

    pub fn len(&self) -> usize {
        self.header.number_of_entries
    }

    pub fn is_empty(&self) -> bool {
        self.header.number_of_entries == 0
    }

    pub fn is_sealed(&self) -> bool {
        self.header.sealed
    }

    /// Entries in key order across all blocks.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> + '_ {
        self.blocks.iter().flat_map(|block| block.entries.iter())
    }

    /// Entry at (`block`, `offset`), if any.
    pub(crate) fn entry_at(&self, block: usize, offset: usize) -> Option<&Entry> {
        self.blocks.get(block)?.entries.get(offset)
    }

    fn last_key(&self) -> Option<&str> {
        self.blocks
            .last()
            .and_then(|block| block.entries.last())
            .map(|entry| entry.key.as_str())
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("header", &self.header)
            .field("blocks", &self.blocks.len())
            .field("footer", &self.footer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(block_capacity: usize) -> Config {
        Config::default().with_block_capacity(block_capacity)
    }

    fn sorted_entries(n: usize) -> Vec<Entry> {
        (0..n)
            .map(|i| Entry::put(format!("key_{:04}", i), format!("value_{}", i)))
            .collect()
    }

    #[test]
    fn test_build_distributes_into_blocks() {
        let segment = Segment::build_from_sorted_entries(sorted_entries(25), 3, &config(10));

        assert!(segment.is_sealed());
        assert_eq!(segment.level(), 3);
        assert_eq!(segment.len(), 25);
        assert_eq!(segment.blocks().len(), 3);
        assert_eq!(segment.blocks()[2].entries().len(), 5);
        assert_eq!(segment.blocks()[1].anchor().key, "key_0010");
        assert_eq!(segment.blocks()[1].sequence(), 1);
        assert_eq!(segment.header().version, SEGMENT_VERSION);
    }

    #[test]
    fn test_read_every_entry() {
        let segment = Segment::build_from_sorted_entries(sorted_entries(100), 0, &config(7));
        for i in 0..100 {
            let key = format!("key_{:04}", i);
            assert!(segment.might_contain(&key));
            assert_eq!(segment.read(&key), ReadResult::Found(format!("value_{}", i)));
        }
    }

    #[test]
    fn test_read_missing_keys() {
        let segment = Segment::build_from_sorted_entries(sorted_entries(30), 0, &config(10));
        // before the first anchor
        assert_eq!(segment.read("a"), ReadResult::NotFound);
        // between existing keys
        assert_eq!(segment.read("key_0005x"), ReadResult::NotFound);
        // past the last key
        assert_eq!(segment.read("zzz"), ReadResult::NotFound);
    }

    #[test]
    fn test_read_tombstone() {
        let entries = vec![
            Entry::put("a", "1"),
            Entry::tombstone("b"),
            Entry::put("c", "3"),
        ];
        let segment = Segment::build_from_sorted_entries(entries, 0, &config(2));
        assert_eq!(segment.read("b"), ReadResult::Deleted);
        assert_eq!(segment.read("c"), ReadResult::Found("3".into()));
    }

    #[test]
    fn test_sealed_segment_rejects_entries() {
        let mut segment = Segment::open(1, 2, &config(4));
        assert!(segment.add_entry(Entry::put("a", "1")));
        let mut segment = segment.seal();

        assert!(!segment.add_entry(Entry::put("b", "2")));
        assert_eq!(segment.len(), 1);
        assert_eq!(segment.read("b"), ReadResult::NotFound);
    }

    #[test]
    fn test_filter_never_denies_present_keys() {
        let segment = Segment::build_from_sorted_entries(sorted_entries(500), 0, &config(16));
        for entry in segment.iter() {
            assert!(segment.might_contain(&entry.key));
        }
        assert_eq!(segment.iter().count(), 500);
    }

    #[test]
    fn test_checksum_depends_on_content() {
        let a = Segment::build_from_sorted_entries(sorted_entries(10), 0, &config(4));
        let b = Segment::build_from_sorted_entries(sorted_entries(10), 0, &config(4));
        let c = Segment::build_from_sorted_entries(
            vec![Entry::put("key_0000", "other")],
            0,
            &config(4),
        );
        assert_eq!(a.footer(), b.footer());
        assert_ne!(a.footer(), c.footer());
    }

    #[test]
    fn test_empty_segment() {
        let segment = Segment::build_from_sorted_entries(Vec::new(), 0, &config(4));
        assert!(segment.is_empty());
        assert!(segment.blocks().is_empty());
        assert_eq!(segment.read("anything"), ReadResult::NotFound);
    }
}
