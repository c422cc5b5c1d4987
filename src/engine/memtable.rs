//! STRATA - MemTable (In-Memory Sorted Map)
//! The write buffer of the LSM-Tree. Writes land in the live table; when it
//! fills up it is frozen and handed to the compactor while a fresh live
//! table takes its place, so writers never wait for a flush.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::types::{Entry, Key, ReadResult, Value};

/// A frozen table: immutable, key-ordered, shared with the compactor.
pub type FrozenTable = Arc<BTreeMap<Key, Entry>>;

#[derive(Default)]
struct Tables {
    /// Mutable table receiving writes.
    live: BTreeMap<Key, Entry>,
    /// Table being converted into a segment; still visible to reads.
    frozen: Option<FrozenTable>,
}

/// In-memory sorted key-value buffer with tombstone support.
///
/// Both tables sit behind one lock so a reader always sees a consistent
/// live/frozen pair.
pub struct MemTable {
    tables: RwLock<Tables>,
    max_entries: usize,
}

impl MemTable {
    /// Create an empty MemTable that asks to be flushed at `max_entries`.
    pub fn new(max_entries: usize) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            max_entries,
        }
    }

    /// Insert or overwrite a live entry.
    pub fn put(&self, key: Key, value: Value) {
        let entry = Entry::put(key.clone(), value);
        self.tables.write().live.insert(key, entry);
    }

    /// Insert a tombstone for `key`.
    pub fn delete(&self, key: Key) {
        let entry = Entry::tombstone(key.clone());
        self.tables.write().live.insert(key, entry);
    }

    /// Look `key` up in the live table, then in the frozen one.
    pub fn get(&self, key: &str) -> ReadResult {
        let tables = self.tables.read();
        tables
            .live
            .get(key)
            .or_else(|| tables.frozen.as_ref().and_then(|frozen| frozen.get(key)))
            .map_or(ReadResult::NotFound, Entry::to_result)
    }

    /// Number of entries in the live table.
    pub fn len(&self) -> usize {
        self.tables.read().live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True while a frozen table awaits retirement.
    pub fn has_flushable(&self) -> bool {
        self.tables.read().frozen.is_some()
    }

    /// True once the live table reached its capacity.
    pub fn should_flush(&self) -> bool {
        self.len() >= self.max_entries
    }

    /// Freeze the live table and swap in an empty one.
    ///
    /// Returns `None` if the live table is below capacity or a previous
    /// frozen table has not been retired yet. The check and the swap run
    /// under a single write lock.
    pub fn take_flushable(&self) -> Option<FrozenTable> {
        let mut tables = self.tables.write();
        if tables.live.len() < self.max_entries || tables.frozen.is_some() {
            return None;
        }
        let frozen: FrozenTable = Arc::new(std::mem::take(&mut tables.live));
        tables.frozen = Some(Arc::clone(&frozen));
        Some(frozen)
    }

    /// Drop the frozen table once its segment is installed in the level set.
    pub fn retire_flushable(&self) {
        self.tables.write().frozen = None;
    }
}
