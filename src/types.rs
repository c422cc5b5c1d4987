//! STRATA - Core Type Definitions
//! Fundamental types shared by the memtable, segments and the read path.

/// Key type for the storage engine.
pub type Key = String;

/// Value type for the storage engine.
pub type Value = String;

/// A single key/value record. Deletes are stored as tombstones so they can
/// shadow older values in lower levels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Key,
    pub value: Value,
    pub is_tombstone: bool,
}

impl Entry {
    /// Create a live entry (PUT operation).
    pub fn put(key: impl Into<Key>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            is_tombstone: false,
        }
    }

    /// Create a tombstone entry (DELETE operation).
    pub fn tombstone(key: impl Into<Key>) -> Self {
        Self {
            key: key.into(),
            value: Value::new(),
            is_tombstone: true,
        }
    }

    /// The read result this entry produces for its key.
    pub fn to_result(&self) -> ReadResult {
        if self.is_tombstone {
            ReadResult::Deleted
        } else {
            ReadResult::Found(self.value.clone())
        }
    }
}

/// Outcome of a point lookup.
///
/// `Deleted` is distinct from `NotFound`: a tombstone ends the search, while
/// `NotFound` lets the caller continue into older data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadResult {
    Found(Value),
    Deleted,
    NotFound,
}

impl ReadResult {
    /// True when the search must stop here (value or tombstone).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReadResult::NotFound)
    }

    /// The value, if the key is live.
    pub fn into_value(self) -> Option<Value> {
        match self {
            ReadResult::Found(value) => Some(value),
            _ => None,
        }
    }
}

/// Flattened form of `ReadResult` handed to the request-serving layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetResponse {
    pub value: Value,
    pub found: bool,
    pub deleted: bool,
}

impl From<ReadResult> for GetResponse {
    fn from(result: ReadResult) -> Self {
        match result {
            ReadResult::Found(value) => Self {
                value,
                found: true,
                deleted: false,
            },
            ReadResult::Deleted => Self {
                deleted: true,
                ..Default::default()
            },
            ReadResult::NotFound => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_results() {
        assert_eq!(Entry::put("k", "v").to_result(), ReadResult::Found("v".into()));
        assert_eq!(Entry::tombstone("k").to_result(), ReadResult::Deleted);
    }

    #[test]
    fn test_terminal_results() {
        assert!(ReadResult::Found("v".into()).is_terminal());
        assert!(ReadResult::Deleted.is_terminal());
        assert!(!ReadResult::NotFound.is_terminal());
    }

    #[test]
    fn test_into_value() {
        assert_eq!(ReadResult::Found("v".into()).into_value(), Some("v".to_string()));
        assert_eq!(ReadResult::Deleted.into_value(), None);
        assert_eq!(ReadResult::NotFound.into_value(), None);
    }

    #[test]
    fn test_get_response_conversion() {
        let found = GetResponse::from(ReadResult::Found("v".into()));
        assert!(found.found && !found.deleted);
        assert_eq!(found.value, "v");

        let deleted = GetResponse::from(ReadResult::Deleted);
        assert!(!deleted.found && deleted.deleted);

        assert_eq!(GetResponse::from(ReadResult::NotFound), GetResponse::default());
    }
}
