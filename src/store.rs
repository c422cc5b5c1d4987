//! STRATA - Store
//! Thread-safe façade over the LSM-Tree and its background compactor.
//!
//! ## Concurrency Model
//! - `put`, `delete` and `get` can be called from any number of threads
//!   (share the store behind an `Arc`).
//! - One background thread consumes mutation events, flushes full MemTables
//!   and merges levels.
//! - `close` (or dropping the store) stops that thread after it has handled
//!   every mutation issued before the call.

use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::config::Config;
use crate::engine::compaction::CompactionEngine;
use crate::engine::events::{self, EventSender};
use crate::engine::metrics::EngineMetrics;
use crate::engine::LsmTree;
use crate::error::{Result, StrataError};
use crate::types::{GetResponse, Key, ReadResult, Value};

/// Embedded key-value store.
///
/// ## Example
/// ```no_run
/// use strata::{Config, ReadResult, Store};
///
/// let store = Store::open(Config::default()).unwrap();
/// store.put("key", "value");
/// assert_eq!(store.get("key"), ReadResult::Found("value".into()));
/// store.close().unwrap();
/// ```
pub struct Store {
    tree: Arc<LsmTree>,
    events: EventSender,
    compactor: Mutex<Option<JoinHandle<()>>>,
}

impl Store {
    /// Validate `config`, build the tree and start the compaction thread.
    pub fn open(config: Config) -> Result<Self> {
        let config = Arc::new(config);

        let (events, receiver) = events::channel(config.event_channel_capacity);
        let tree = Arc::new(LsmTree::new(Arc::clone(&config), events.clone())?);
        let compactor = CompactionEngine::new(Arc::clone(&tree)).spawn(receiver)?;

        log::info!(
            "Strata store opened ({} levels, memtable capacity {}, block capacity {})",
            config.levels,
            config.memtable_max_entries,
            config.block_capacity
        );

        Ok(Self {
            tree,
            events,
            compactor: Mutex::new(Some(compactor)),
        })
    }

    pub fn put(&self, key: impl Into<Key>, value: impl Into<Value>) {
        self.tree.put(key, value);
    }

    pub fn delete(&self, key: impl Into<Key>) {
        self.tree.delete(key);
    }

    pub fn get(&self, key: &str) -> ReadResult {
        self.tree.get(key)
    }

    /// `get` flattened for the request-serving layer.
    pub fn get_response(&self, key: &str) -> GetResponse {
        self.get(key).into()
    }

    pub fn metrics(&self) -> &EngineMetrics {
        self.tree.metrics()
    }

    /// Segment count per level, index 0 first.
    pub fn level_sizes(&self) -> Vec<usize> {
        self.tree.level_sizes()
    }

    pub fn tree(&self) -> &LsmTree {
        &self.tree
    }

    /// Stop the compaction thread once it has caught up. Idempotent; reads
    /// keep working afterwards, but writes are no longer flushed.
    pub fn close(&self) -> Result<()> {
        let handle = match self.compactor.lock().take() {
            Some(handle) => handle,
            None => return Ok(()),
        };
        self.events.shutdown();
        handle
            .join()
            .map_err(|e| StrataError::Shutdown(format!("compaction thread panicked: {:?}", e)))?;
        log::info!("Strata store closed, levels: {:?}", self.level_sizes());
        Ok(())
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("{}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn small_config() -> Config {
        Config::default()
            .with_levels(4)
            .with_memtable_max_entries(4)
            .with_block_capacity(4)
    }

    #[test]
    fn test_open_rejects_invalid_config() {
        assert!(matches!(
            Store::open(Config::default().with_levels(0)),
            Err(StrataError::Config(_))
        ));
    }

    #[test]
    fn test_put_get_delete() {
        let store = Store::open(small_config()).unwrap();
        store.put("test", "value");
        assert_eq!(store.get("test"), ReadResult::Found("value".into()));

        store.delete("test");
        let response = store.get_response("test");
        assert!(response.deleted && !response.found);
    }

    #[test]
    fn test_close_is_idempotent() {
        let store = Store::open(small_config()).unwrap();
        store.put("k", "v");
        store.close().unwrap();
        store.close().unwrap();
        assert_eq!(store.get("k"), ReadResult::Found("v".into()));
    }

    #[test]
    fn test_close_processes_pending_mutations() {
        let store = Store::open(small_config()).unwrap();
        for i in 0..40 {
            store.put(format!("key_{:02}", i), i.to_string());
        }
        store.close().unwrap();

        assert!(store.tree().memtable_len() < 4);
        assert!(store.level_sizes().iter().sum::<usize>() > 0);
        for i in 0..40 {
            assert_eq!(
                store.get(&format!("key_{:02}", i)),
                ReadResult::Found(i.to_string())
            );
        }
    }

    #[test]
    fn test_concurrent_writers() {
        let store = Arc::new(Store::open(small_config()).unwrap());
        let mut handles = vec![];

        for t in 0..4 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                for i in 0..50 {
                    let key = format!("t{}_k{}", t, i);
                    store.put(key.clone(), i.to_string());
                    assert_eq!(store.get(&key), ReadResult::Found(i.to_string()));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        store.close().unwrap();
        for t in 0..4 {
            for i in 0..50 {
                assert_eq!(
                    store.get(&format!("t{}_k{}", t, i)),
                    ReadResult::Found(i.to_string())
                );
            }
        }
    }
}
