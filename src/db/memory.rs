use crate::db::{CandidateStore, ChangeFeed};
use crate::error::StoreError;
use crate::models::{Candidate, CandidatePatch, VoteRecord};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::{RwLock, watch};

/// In-process store. Records are kept ordered by id, the same order the
/// SQLite store returns them in.
#[derive(Default)]
pub struct MemoryStore {
    candidates: RwLock<BTreeMap<String, Candidate>>,
    votes: RwLock<Vec<VoteRecord>>,
    feed: ChangeFeed,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Seed with raw records, bypassing validation (used to reproduce legacy data)
    #[cfg(test)]
    pub fn with_records(records: impl IntoIterator<Item = Candidate>) -> Self {
        let candidates = records
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();
        Self {
            candidates: RwLock::new(candidates),
            ..Self::default()
        }
    }

    #[cfg(test)]
    pub async fn vote_records(&self) -> Vec<VoteRecord> {
        self.votes.read().await.clone()
    }
}

#[async_trait]
impl CandidateStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<Candidate>, StoreError> {
        Ok(self.candidates.read().await.get(id).cloned())
    }

    async fn all(&self) -> Result<Vec<Candidate>, StoreError> {
        Ok(self.candidates.read().await.values().cloned().collect())
    }

    async fn insert(&self, candidate: &Candidate) -> Result<(), StoreError> {
        {
            let mut candidates = self.candidates.write().await;
            if candidates.contains_key(&candidate.id) {
                return Err(StoreError::AlreadyExists(candidate.id.clone()));
            }
            candidates.insert(candidate.id.clone(), candidate.clone());
        }
        self.feed.notify();
        Ok(())
    }

    async fn set(&self, candidate: &Candidate) -> Result<(), StoreError> {
        self.candidates
            .write()
            .await
            .insert(candidate.id.clone(), candidate.clone());
        self.feed.notify();
        Ok(())
    }

    async fn update(&self, id: &str, patch: &CandidatePatch) -> Result<(), StoreError> {
        {
            let mut candidates = self.candidates.write().await;
            let candidate = candidates
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            patch.apply_to(candidate);
        }
        self.feed.notify();
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), StoreError> {
        let removed = self.candidates.write().await.remove(id);
        if removed.is_some() {
            self.feed.notify();
        }
        Ok(())
    }

    async fn increment(&self, id: &str, amount: u64) -> Result<(), StoreError> {
        {
            let mut candidates = self.candidates.write().await;
            let candidate = candidates
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            candidate.votes = candidate.votes.saturating_add(amount);
        }
        self.feed.notify();
        Ok(())
    }

    async fn apply_merge(
        &self,
        survivor: &Candidate,
        removed_ids: &[String],
    ) -> Result<u64, StoreError> {
        let merged = {
            let mut candidates = self.candidates.write().await;
            let kept_votes = candidates
                .get(&survivor.id)
                .map(|c| c.votes)
                .ok_or_else(|| StoreError::NotFound(survivor.id.clone()))?;

            let mut total = kept_votes;
            for id in removed_ids {
                if let Some(removed) = candidates.remove(id) {
                    total = total.saturating_add(removed.votes);
                }
            }

            let mut record = survivor.clone();
            record.votes = total;
            candidates.insert(record.id.clone(), record);
            total
        };
        self.feed.notify();
        Ok(merged)
    }

    async fn record_vote(&self, record: &VoteRecord) -> Result<(), StoreError> {
        self.votes.write().await.push(record.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<usize, StoreError> {
        let removed = {
            let mut candidates = self.candidates.write().await;
            let count = candidates.len();
            candidates.clear();
            count
        };
        self.feed.notify();
        Ok(removed)
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.feed.subscribe()
    }
}
