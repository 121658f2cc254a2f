//! Record store for storybook.
//!
//! This crate models the realtime datastore as an explicit keyed document
//! store. Records are JSON documents addressed by a logical path
//! (`RecordKey`) and carry a per-key version, so callers can express
//! read-merge-write as one atomic step instead of racing each other.
//!
//! # Layout
//!
//! - `storyTemplates/{templateId}`: catalog entries
//! - `userStories/{userId}/{storyId}`: generation jobs
//! - `transformations/{userId}/{jobId}`: transient photo transform jobs
//! - `catalog/weeklyFavorite`: weekly favorite pointer
//!
//! # Example
//!
//! ```
//! use storybook_store::{MemoryStore, Mutation, RecordKey, StoreExt};
//!
//! let store = MemoryStore::new();
//! let key = RecordKey::parse("counters/visits").unwrap();
//!
//! store.put_record(&key, &1_u32).unwrap();
//! let updated = store
//!     .update_record::<u32, storybook_store::StoreError, _>(&key, |current| {
//!         Ok(Mutation::Put(current.unwrap_or(0) + 1))
//!     })
//!     .unwrap();
//! assert_eq!(updated.after, Some(2));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod feed;
pub mod keys;
pub mod memory;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use feed::{ChangeEvent, ChangeFeed, ChangeOp, Received, Subscription};
pub use keys::RecordKey;
pub use memory::MemoryStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How many times `update_record` retries after losing a version race.
pub const MAX_CAS_RETRIES: u32 = 8;

/// A stored value together with its per-key version.
///
/// Versions start at 1 and grow by one on every write of the key. A deleted
/// and recreated key starts again at 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    /// Version of this value.
    pub version: u64,
    /// The value.
    pub value: T,
}

/// The storage trait defining all record operations.
///
/// This trait abstracts the storage layer, allowing for different
/// implementations (`RocksDB`, in-memory for testing). All writes publish a
/// `ChangeEvent` to subscribers.
pub trait Store: Send + Sync {
    /// Read a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get(&self, key: &RecordKey) -> Result<Option<Versioned<Value>>>;

    /// Write a record unconditionally (last write wins). Returns the new version.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put(&self, key: &RecordKey, value: Value) -> Result<u64>;

    /// Write a record only if its current version is `expected`.
    ///
    /// `expected = None` means the record must not exist. Returns the new
    /// version.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the stored version differs.
    fn compare_and_put(&self, key: &RecordKey, expected: Option<u64>, value: Value)
        -> Result<u64>;

    /// Delete a record. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn delete(&self, key: &RecordKey) -> Result<bool>;

    /// Delete a record only if its current version is `expected`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the record is absent or its version differs.
    fn compare_and_delete(&self, key: &RecordKey, expected: u64) -> Result<()>;

    /// List every record at or below `prefix`, ordered by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list(&self, prefix: &RecordKey) -> Result<Vec<(RecordKey, Versioned<Value>)>>;

    /// Subscribe to committed changes at or below `prefix`.
    fn subscribe(&self, prefix: &RecordKey) -> Subscription;
}

/// The decision an update closure returns.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation<T> {
    /// Write this value.
    Put(T),
    /// Remove the record.
    Delete,
    /// Leave the record as it is.
    Keep,
}

/// Result of an atomic update.
#[derive(Debug, Clone, PartialEq)]
pub struct Updated<T> {
    /// Value read before the update.
    pub before: Option<T>,
    /// Value after the update (`before` for `Keep`, `None` for `Delete`).
    pub after: Option<T>,
}

impl<T> Updated<T> {
    /// Whether the update wrote or deleted anything.
    #[must_use]
    pub fn changed(&self) -> bool
    where
        T: PartialEq,
    {
        self.before != self.after
    }
}

/// Typed helpers over any `Store`.
pub trait StoreExt: Store {
    /// Read and decode a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the record cannot be decoded as `T`.
    fn get_record<T: DeserializeOwned>(&self, key: &RecordKey) -> Result<Option<Versioned<T>>> {
        self.get(key)?
            .map(|stored| {
                Ok(Versioned {
                    version: stored.version,
                    value: serde_json::from_value(stored.value)?,
                })
            })
            .transpose()
    }

    /// Encode and write a record unconditionally.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the write fails.
    fn put_record<T: Serialize>(&self, key: &RecordKey, value: &T) -> Result<u64> {
        self.put(key, serde_json::to_value(value)?)
    }

    /// Encode and write a record that must not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the record already exists.
    fn create_record<T: Serialize>(&self, key: &RecordKey, value: &T) -> Result<u64> {
        self.compare_and_put(key, None, serde_json::to_value(value)?)
    }

    /// List and decode the records below `prefix`.
    ///
    /// Records that fail to decode are skipped with a warning so one bad
    /// document does not hide the rest.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing fails.
    fn list_records<T: DeserializeOwned>(
        &self,
        prefix: &RecordKey,
    ) -> Result<Vec<(RecordKey, Versioned<T>)>> {
        let mut records = Vec::new();
        for (key, stored) in self.list(prefix)? {
            match serde_json::from_value(stored.value) {
                Ok(value) => records.push((
                    key,
                    Versioned {
                        version: stored.version,
                        value,
                    },
                )),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Skipping undecodable record");
                }
            }
        }
        Ok(records)
    }

    /// Atomically read, transform, and write one record.
    ///
    /// `f` receives the current value (or `None`) and decides what to do. The
    /// write is conditional on the version that was read; on a conflict the
    /// whole read-decide-write cycle is repeated with fresh data, up to
    /// `MAX_CAS_RETRIES` times. `f` may therefore run more than once and must
    /// not have side effects beyond its return value. An error from `f`
    /// aborts the update without writing.
    ///
    /// # Errors
    ///
    /// Returns the error from `f`, a store error, or
    /// `StoreError::RetriesExhausted` when contention never settles.
    fn update_record<T, E, F>(&self, key: &RecordKey, mut f: F) -> std::result::Result<Updated<T>, E>
    where
        T: Serialize + DeserializeOwned + Clone,
        E: From<StoreError>,
        F: FnMut(Option<T>) -> std::result::Result<Mutation<T>, E>,
    {
        for attempt in 1..=MAX_CAS_RETRIES {
            let current = self.get_record::<T>(key)?;
            let version = current.as_ref().map(|v| v.version);
            let before = current.map(|v| v.value);

            let outcome = match f(before.clone())? {
                Mutation::Keep => {
                    return Ok(Updated {
                        after: before.clone(),
                        before,
                    })
                }
                Mutation::Put(next) => {
                    let encoded = serde_json::to_value(&next).map_err(StoreError::from)?;
                    self.compare_and_put(key, version, encoded)
                        .map(|_| Updated {
                            before: before.clone(),
                            after: Some(next),
                        })
                }
                Mutation::Delete => match version {
                    None => return Ok(Updated { before, after: None }),
                    Some(version) => self.compare_and_delete(key, version).map(|()| Updated {
                        before: before.clone(),
                        after: None,
                    }),
                },
            };

            match outcome {
                Ok(updated) => return Ok(updated),
                Err(StoreError::Conflict { .. }) => {
                    tracing::debug!(key = %key, attempt = %attempt, "Version conflict, retrying update");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(StoreError::RetriesExhausted {
            key: key.to_string(),
            attempts: MAX_CAS_RETRIES,
        }
        .into())
    }
}

impl<S: Store + ?Sized> StoreExt for S {}
