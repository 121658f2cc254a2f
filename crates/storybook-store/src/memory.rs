//! In-memory storage implementation.
//!
//! Used by tests and by the service when it runs without `RocksDB`. All
//! operations take one lock, so conditional writes are trivially atomic.
//! Changes are published before the lock is released, so subscribers see
//! them in commit order.

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::feed::{ChangeEvent, ChangeFeed, ChangeOp, Subscription};
use crate::keys::RecordKey;
use crate::{Store, Versioned};

/// In-memory `Store`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<String, Versioned<Value>>>,
    feed: ChangeFeed,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned() -> StoreError {
        StoreError::Database("memory store lock poisoned".into())
    }

    fn write_locked(
        &self,
        key: &RecordKey,
        expected: Option<Option<u64>>,
        value: Value,
    ) -> Result<u64> {
        let mut records = self.records.write().map_err(|_| Self::poisoned())?;
        let actual = records.get(key.as_str()).map(|v| v.version);

        if let Some(expected) = expected {
            if expected != actual {
                return Err(StoreError::Conflict {
                    key: key.to_string(),
                    expected,
                    actual,
                });
            }
        }

        let version = actual.map_or(1, |v| v + 1);
        records.insert(
            key.as_str().to_string(),
            Versioned {
                version,
                value: value.clone(),
            },
        );

        self.feed.publish(ChangeEvent {
            key: key.clone(),
            op: ChangeOp::Put,
            version,
            value: Some(value),
        });
        Ok(version)
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &RecordKey) -> Result<Option<Versioned<Value>>> {
        let records = self.records.read().map_err(|_| Self::poisoned())?;
        Ok(records.get(key.as_str()).cloned())
    }

    fn put(&self, key: &RecordKey, value: Value) -> Result<u64> {
        self.write_locked(key, None, value)
    }

    fn compare_and_put(
        &self,
        key: &RecordKey,
        expected: Option<u64>,
        value: Value,
    ) -> Result<u64> {
        self.write_locked(key, Some(expected), value)
    }

    fn delete(&self, key: &RecordKey) -> Result<bool> {
        let mut records = self.records.write().map_err(|_| Self::poisoned())?;
        let removed = records.remove(key.as_str());

        if let Some(old) = &removed {
            self.feed.publish(ChangeEvent {
                key: key.clone(),
                op: ChangeOp::Delete,
                version: old.version,
                value: None,
            });
        }
        Ok(removed.is_some())
    }

    fn compare_and_delete(&self, key: &RecordKey, expected: u64) -> Result<()> {
        let mut records = self.records.write().map_err(|_| Self::poisoned())?;
        let actual = records.get(key.as_str()).map(|v| v.version);
        if actual != Some(expected) {
            return Err(StoreError::Conflict {
                key: key.to_string(),
                expected: Some(expected),
                actual,
            });
        }
        records.remove(key.as_str());

        self.feed.publish(ChangeEvent {
            key: key.clone(),
            op: ChangeOp::Delete,
            version: expected,
            value: None,
        });
        Ok(())
    }

    fn list(&self, prefix: &RecordKey) -> Result<Vec<(RecordKey, Versioned<Value>)>> {
        let records = self.records.read().map_err(|_| Self::poisoned())?;
        let mut out = Vec::new();
        for (path, value) in records.range(prefix.as_str().to_string()..) {
            if !path.starts_with(prefix.as_str()) {
                break;
            }
            let key = RecordKey::parse(path)?;
            if key.is_within(prefix) {
                out.push((key, value.clone()));
            }
        }
        Ok(out)
    }

    fn subscribe(&self, prefix: &RecordKey) -> Subscription {
        self.feed.subscribe(prefix.clone())
    }
}
