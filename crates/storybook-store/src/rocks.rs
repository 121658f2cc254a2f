//! `RocksDB` storage implementation.
//!
//! Records live in a single column family keyed by their logical path and
//! are encoded as CBOR `Versioned<Value>`. Conditional writes read the
//! current version and write under one mutex, so they are atomic with
//! respect to every other writer in this process. Change events are
//! published before the mutex is released.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options,
};
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::feed::{ChangeEvent, ChangeFeed, ChangeOp, Subscription};
use crate::keys::RecordKey;
use crate::schema::{all_column_families, cf};
use crate::{Store, Versioned};

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    write_lock: Mutex<()>,
    feed: ChangeFeed,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
            feed: ChangeFeed::new(),
        })
    }

    fn cf(&self) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(cf::RECORDS)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {}", cf::RECORDS)))
    }

    fn serialize(value: &Versioned<Value>) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    fn deserialize(data: &[u8]) -> Result<Versioned<Value>> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn read(&self, key: &RecordKey) -> Result<Option<Versioned<Value>>> {
        let cf = self.cf()?;
        self.db
            .get_cf(&cf, key.to_bytes())
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| StoreError::Database("write lock poisoned".into()))
    }

    fn write(&self, key: &RecordKey, expected: Option<Option<u64>>, value: Value) -> Result<u64> {
        let _guard = self.lock()?;
        let actual = self.read(key)?.map(|v| v.version);

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
        let stored = Versioned {
            version,
            value,
        };
        let cf = self.cf()?;
        self.db
            .put_cf(&cf, key.to_bytes(), Self::serialize(&stored)?)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        // Published under the lock so subscribers see commit order.
        self.feed.publish(ChangeEvent {
            key: key.clone(),
            op: ChangeOp::Put,
            version,
            value: Some(stored.value),
        });
        Ok(version)
    }

    fn remove(&self, key: &RecordKey, expected: Option<u64>) -> Result<Option<u64>> {
        let _guard = self.lock()?;
        let actual = self.read(key)?.map(|v| v.version);

        if let Some(expected) = expected {
            if actual != Some(expected) {
                return Err(StoreError::Conflict {
                    key: key.to_string(),
                    expected: Some(expected),
                    actual,
                });
            }
        }
        let Some(version) = actual else {
            return Ok(None);
        };

        let cf = self.cf()?;
        self.db
            .delete_cf(&cf, key.to_bytes())
            .map_err(|e| StoreError::Database(e.to_string()))?;
        // Published under the lock so subscribers see commit order.
        self.feed.publish(ChangeEvent {
            key: key.clone(),
            op: ChangeOp::Delete,
            version,
            value: None,
        });
        Ok(Some(version))
    }
}

impl Store for RocksStore {
    fn get(&self, key: &RecordKey) -> Result<Option<Versioned<Value>>> {
        self.read(key)
    }

    fn put(&self, key: &RecordKey, value: Value) -> Result<u64> {
        self.write(key, None, value)
    }

    fn compare_and_put(
        &self,
        key: &RecordKey,
        expected: Option<u64>,
        value: Value,
    ) -> Result<u64> {
        self.write(key, Some(expected), value)
    }

    fn delete(&self, key: &RecordKey) -> Result<bool> {
        Ok(self.remove(key, None)?.is_some())
    }

    fn compare_and_delete(&self, key: &RecordKey, expected: u64) -> Result<()> {
        self.remove(key, Some(expected)).map(|_| ())
    }

    fn list(&self, prefix: &RecordKey) -> Result<Vec<(RecordKey, Versioned<Value>)>> {
        let cf = self.cf()?;
        let start = prefix.to_bytes();
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&start, rocksdb::Direction::Forward));

        let mut out = Vec::new();
        for item in iter {
            let (raw_key, raw_value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !raw_key.starts_with(&start) {
                break;
            }
            let path = std::str::from_utf8(&raw_key)
                .map_err(|e| StoreError::InvalidKey(e.to_string()))?;
            let key = RecordKey::parse(path)?;
            if key.is_within(prefix) {
                out.push((key, Self::deserialize(&raw_value)?));
            }
        }
        Ok(out)
    }

    fn subscribe(&self, prefix: &RecordKey) -> Subscription {
        self.feed.subscribe(prefix.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Mutation, StoreExt};
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn key(path: &str) -> RecordKey {
        RecordKey::parse(path).unwrap()
    }

    #[test]
    fn record_crud() {
        let (store, _dir) = create_test_store();
        let k = key("storyTemplates/t1");

        assert_eq!(store.put(&k, json!({"title": "Dragons"})).unwrap(), 1);
        let stored = store.get(&k).unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.value["title"], "Dragons");

        assert!(store.delete(&k).unwrap());
        assert!(!store.delete(&k).unwrap());
        assert!(store.get(&k).unwrap().is_none());
    }

    #[test]
    fn conditional_writes() {
        let (store, _dir) = create_test_store();
        let k = key("userStories/u1/s1");

        store.compare_and_put(&k, None, json!({"n": 1})).unwrap();
        assert!(matches!(
            store.compare_and_put(&k, None, json!({})),
            Err(StoreError::Conflict { .. })
        ));
        assert_eq!(store.compare_and_put(&k, Some(1), json!({"n": 2})).unwrap(), 2);

        assert!(store.compare_and_delete(&k, 1).is_err());
        store.compare_and_delete(&k, 2).unwrap();
        assert!(store.compare_and_delete(&k, 2).is_err());
    }

    #[test]
    fn list_by_prefix() {
        let (store, _dir) = create_test_store();
        store.put(&key("userStories/u1/a"), json!(1)).unwrap();
        store.put(&key("userStories/u1/b"), json!(2)).unwrap();
        store.put(&key("userStories/u10/a"), json!(3)).unwrap();

        let listed = store.list(&key("userStories/u1")).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].0.as_str(), "userStories/u1/a");
        assert_eq!(listed[1].1.value, json!(2));
    }

    #[test]
    fn typed_update_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let k = key("counters/c");
        {
            let store = RocksStore::open(dir.path()).unwrap();
            store
                .update_record::<u32, StoreError, _>(&k, |cur| {
                    Ok(Mutation::Put(cur.unwrap_or(41) + 1))
                })
                .unwrap();
        }

        let store = RocksStore::open(dir.path()).unwrap();
        let stored = store.get_record::<u32>(&k).unwrap().unwrap();
        assert_eq!(stored.value, 42);
        assert_eq!(stored.version, 1);
    }
}
