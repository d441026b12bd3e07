pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::StoreError;
use crate::models::{Candidate, CandidatePatch, VoteRecord};
use crate::voting::compute_percentages;
use async_trait::async_trait;
use log::{debug, warn};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Persistence contract for candidate records, keyed by id.
///
/// Every successful write bumps the revision published through `changes`,
/// which is what drives [`subscribe`].
#[async_trait]
pub trait CandidateStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Candidate>, StoreError>;

    async fn all(&self) -> Result<Vec<Candidate>, StoreError>;

    /// Write a new record; fails with `AlreadyExists` if the id is taken.
    async fn insert(&self, candidate: &Candidate) -> Result<(), StoreError>;

    /// Full overwrite of a record.
    async fn set(&self, candidate: &Candidate) -> Result<(), StoreError>;

    async fn update(&self, id: &str, patch: &CandidatePatch) -> Result<(), StoreError>;

    async fn remove(&self, id: &str) -> Result<(), StoreError>;

    /// Atomically add `amount` to a candidate's vote counter.
    async fn increment(&self, id: &str, amount: u64) -> Result<(), StoreError>;

    /// Fold the votes of `removed_ids` into `survivor` and delete them, as one
    /// unit. The vote total is summed from the currently stored counters, not
    /// from `survivor.votes`. Returns the merged total.
    async fn apply_merge(
        &self,
        survivor: &Candidate,
        removed_ids: &[String],
    ) -> Result<u64, StoreError>;

    async fn record_vote(&self, record: &VoteRecord) -> Result<(), StoreError>;

    /// Delete every candidate. Returns how many were removed.
    async fn clear(&self) -> Result<usize, StoreError>;

    fn changes(&self) -> watch::Receiver<u64>;
}

// Revision counter shared by the store implementations
pub struct ChangeFeed {
    tx: watch::Sender<u64>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx }
    }

    pub fn notify(&self) {
        self.tx.send_modify(|revision| *revision += 1);
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Live subscription handle. Dropping it stops delivery.
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Deliver the collection, with percentages derived, now and after every
/// change. Intermediate revisions may be skipped; only the latest snapshot
/// matters. A failed read is logged and the subscriber keeps its last snapshot.
pub fn subscribe<F>(store: Arc<dyn CandidateStore>, on_snapshot: F) -> Subscription
where
    F: Fn(Vec<Candidate>) + Send + 'static,
{
    let mut changes = store.changes();

    let handle = tokio::spawn(async move {
        loop {
            let revision = *changes.borrow_and_update();
            match store.all().await {
                Ok(snapshot) => {
                    debug!("Delivering snapshot at revision {}", revision);
                    on_snapshot(compute_percentages(&snapshot));
                }
                Err(e) => warn!("Failed to read candidates for subscriber: {}", e),
            }

            if changes.changed().await.is_err() {
                break;
            }
        }
    });

    Subscription { handle }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    async fn next(rx: &mut mpsc::UnboundedReceiver<Vec<Candidate>>) -> Vec<Candidate> {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("snapshot not delivered in time")
            .expect("subscription closed")
    }

    #[tokio::test]
    async fn snapshots_follow_writes() {
        let store: Arc<dyn CandidateStore> = Arc::new(MemoryStore::new());
        store
            .insert(&Candidate::new("a", "A", "/a.jpg", "X").with_votes(30))
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = subscribe(Arc::clone(&store), move |snapshot| {
            let _ = tx.send(snapshot);
        });

        let first = next(&mut rx).await;
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].percentage, 100);

        store
            .insert(&Candidate::new("b", "B", "/b.jpg", "X").with_votes(70))
            .await
            .unwrap();

        let mut latest = next(&mut rx).await;
        while latest.len() < 2 {
            latest = next(&mut rx).await;
        }
        let shares: Vec<u8> = latest.iter().map(|c| c.percentage).collect();
        assert_eq!(shares, vec![30, 70]);

        subscription.unsubscribe();
        store.increment("a", 1).await.unwrap();
        // Sender was dropped with the aborted task
        let closed = timeout(Duration::from_secs(2), async {
            while rx.recv().await.is_some() {}
        })
        .await;
        assert!(closed.is_ok());
    }
}
