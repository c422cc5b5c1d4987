//! STRATA - Embedded LSM-Tree Key-Value Engine
//!
//! An in-memory write buffer in front of immutable, block-structured sorted
//! segments organized into levels, kept in shape by a background compactor.
//!
//! ## Features
//! - **MemTable**: sorted write buffer with tombstones and a non-blocking
//!   freeze/flush handoff
//! - **Segments**: fixed-capacity blocks with anchor keys, block-level and
//!   table-level Bloom filters
//! - **Compaction**: tiered merges on upper levels, a single fully merged
//!   segment on level 0, streaming k-way merge
//! - **Event channel**: bounded queue decoupling writers from the compactor
//! - **Metrics**: lock-free atomic counters
//!
//! Point reads, point writes and tombstone deletes on string keys. No
//! durability: the WAL module exists but is not wired into the write path.
//!
//! ## Example
//! ```no_run
//! use strata::{Config, ReadResult, Store};
//!
//! let store = Store::open(Config::default()).unwrap();
//! store.put("key", "value");
//! store.delete("other");
//!
//! assert_eq!(store.get("key"), ReadResult::Found("value".into()));
//! assert_eq!(store.get("other"), ReadResult::Deleted);
//! assert_eq!(store.get("missing"), ReadResult::NotFound);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod store;
pub mod types;

pub use config::{Config, TombstonePolicy};
pub use error::{Result, StrataError};
pub use store::Store;
pub use types::{Entry, GetResponse, ReadResult};
