//! Change notifications.
//!
//! Every backend publishes a `ChangeEvent` after each successful write or
//! delete. Subscribers filter the shared broadcast channel by key prefix.

use futures::Stream;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::keys::RecordKey;

/// Buffered events per subscriber before it starts lagging.
const FEED_CAPACITY: usize = 1024;

/// Kind of change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    /// Record created or replaced.
    Put,
    /// Record removed.
    Delete,
}

/// A committed change to one record.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent {
    /// Record path.
    pub key: RecordKey,
    /// Kind of change.
    pub op: ChangeOp,
    /// Version written, or the last version for deletes.
    pub version: u64,
    /// New value for puts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

/// Broadcast side of the change feed, owned by a store backend.
#[derive(Debug)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    /// Create an empty feed.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self { tx }
    }

    /// Publish a committed change.
    pub fn publish(&self, event: ChangeEvent) {
        // No receivers is normal.
        let _ = self.tx.send(event);
    }

    /// Subscribe to changes at or below `prefix`.
    #[must_use]
    pub fn subscribe(&self, prefix: RecordKey) -> Subscription {
        Subscription {
            prefix,
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// One delivery from `Subscription::recv_or_lag`.
#[derive(Debug, Clone)]
pub enum Received {
    /// A matching change.
    Change(ChangeEvent),
    /// This many events, matching or not, were dropped.
    Lagged(u64),
}

/// A prefix-scoped change subscription.
#[derive(Debug)]
pub struct Subscription {
    prefix: RecordKey,
    rx: broadcast::Receiver<ChangeEvent>,
}

impl Subscription {
    /// The prefix this subscription watches.
    #[must_use]
    pub fn prefix(&self) -> &RecordKey {
        &self.prefix
    }

    /// Wait for the next matching change.
    ///
    /// Returns `None` once the store has been dropped. A subscriber that
    /// falls behind skips the missed events and keeps going.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            if let Received::Change(event) = self.recv_or_lag().await? {
                return Some(event);
            }
        }
    }

    /// Like `recv`, but reports a lag instead of skipping past it.
    ///
    /// Subscribers that mirror state use this to resynchronize, since the
    /// dropped events may have touched their prefix.
    pub async fn recv_or_lag(&mut self) -> Option<Received> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.key.is_within(&self.prefix) => {
                    return Some(Received::Change(event))
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        prefix = %self.prefix,
                        skipped = %skipped,
                        "Change subscriber lagged, events dropped"
                    );
                    return Some(Received::Lagged(skipped));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Convert into a `Stream` of matching changes.
    pub fn into_stream(self) -> impl Stream<Item = ChangeEvent> + Send {
        futures::stream::unfold(self, |mut sub| async move {
            sub.recv().await.map(|event| (event, sub))
        })
    }
}
