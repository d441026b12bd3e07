use crate::db::CandidateStore;
use crate::error::CandidateError;
use crate::models::{Candidate, CandidatePatch, CategoryId, NewCandidate, VoteRecord};
use crate::validation::{
    checked_votes, sanitize_input, slugify, validate_candidate_data, validate_phone_number,
    validate_vote_count,
};
use crate::voting::{
    category_leaderboard, compute_percentages, overall_leaderboard, top_per_category,
    update_candidate_percentage,
};
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct VoteRequest {
    pub vote_count: u64,
    pub phone_number: String,
    pub payment_method: Option<String>,
    pub provider: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VoteReceipt {
    pub vote_id: String,
    pub candidate: Candidate,
}

/// Candidate operations on top of an injected store: validated writes,
/// vote submission, and aggregated reads.
#[derive(Clone)]
pub struct CandidateService {
    store: Arc<dyn CandidateStore>,
    // Held from the duplicate checks through the write they guard
    writes: Arc<Mutex<()>>,
}

fn comparable_name(name: &str) -> String {
    name.trim().to_lowercase()
}

fn clean(text: &str) -> String {
    sanitize_input(text).trim().to_string()
}

impl CandidateService {
    pub fn new(store: Arc<dyn CandidateStore>) -> Self {
        Self {
            store,
            writes: Arc::new(Mutex::new(())),
        }
    }

    // Every candidate with category-relative percentages
    pub async fn list(&self) -> Result<Vec<Candidate>, CandidateError> {
        let candidates = self.store.all().await?;
        Ok(compute_percentages(&candidates))
    }

    pub async fn leaderboard(&self, limit: usize) -> Result<Vec<Candidate>, CandidateError> {
        let candidates = self.store.all().await?;
        Ok(overall_leaderboard(&candidates, limit))
    }

    pub async fn category_leaderboard(
        &self,
        category: &str,
    ) -> Result<Vec<Candidate>, CandidateError> {
        let candidates = self.store.all().await?;
        Ok(category_leaderboard(&candidates, category))
    }

    pub async fn category_leaders(&self) -> Result<Vec<Candidate>, CandidateError> {
        let candidates = compute_percentages(&self.store.all().await?);
        Ok(top_per_category(&candidates))
    }

    // Look for another record with the same comparable name in the same category
    async fn find_conflict(
        &self,
        name: &str,
        category: &CategoryId,
        except_id: &str,
    ) -> Result<Option<Candidate>, CandidateError> {
        let wanted = comparable_name(name);
        let existing = self.store.all().await?;
        Ok(existing.into_iter().find(|c| {
            c.id != except_id && c.category.key() == category.key() && comparable_name(&c.name) == wanted
        }))
    }

    /// Validate, sanitize and store a new candidate. Returns the stored id.
    pub async fn create(&self, input: NewCandidate) -> Result<String, CandidateError> {
        if [&input.id, &input.name, &input.image, &input.category]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(CandidateError::Validation(
                "Missing required fields: id, name, image, category".into(),
            ));
        }

        let name = clean(&input.name);
        let title = input
            .title
            .as_deref()
            .map(clean)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| name.clone());

        let candidate = Candidate {
            id: slugify(&sanitize_input(&input.id)),
            title: Some(title),
            name,
            image: clean(&input.image),
            category: CategoryId::new(clean(&input.category)),
            votes: checked_votes(input.votes)?,
            badge: input.badge.filter(|b| *b > 0),
            percentage: 0,
            legacy_quote: None,
        };
        validate_candidate_data(&candidate)?;

        let _guard = self.writes.lock().await;
        if self.store.get(&candidate.id).await?.is_some() {
            return Err(CandidateError::DuplicateId(candidate.id));
        }
        if let Some(existing) = self
            .find_conflict(&candidate.name, &candidate.category, &candidate.id)
            .await?
        {
            return Err(CandidateError::DuplicateEntry {
                name: candidate.name,
                category: candidate.category.key().to_string(),
                existing_id: existing.id,
            });
        }

        self.store.insert(&candidate).await?;
        info!(
            "Added candidate {} ({}) in '{}'",
            candidate.id,
            candidate.name,
            candidate.category.key()
        );
        Ok(candidate.id)
    }

    /// Apply a merge-patch to an existing candidate. The merged record is
    /// validated before anything is written.
    pub async fn update(&self, id: &str, patch: CandidatePatch) -> Result<String, CandidateError> {
        if id.trim().is_empty() {
            return Err(CandidateError::Validation("Candidate ID is required".into()));
        }

        if let Some(votes) = patch.votes {
            checked_votes(votes)?;
        }

        let patch = CandidatePatch {
            name: patch.name.as_deref().map(clean).filter(|s| !s.is_empty()),
            title: patch.title.as_deref().map(clean).filter(|s| !s.is_empty()),
            image: patch.image.as_deref().map(clean).filter(|s| !s.is_empty()),
            category: patch.category.as_deref().map(clean).filter(|s| !s.is_empty()),
            votes: patch.votes,
            badge: patch.badge.map(|b| b.filter(|b| *b > 0)),
        };

        let _guard = self.writes.lock().await;
        let mut merged = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| CandidateError::NotFound(id.to_string()))?;
        if patch.is_empty() {
            return Ok(merged.id);
        }
        patch.apply_to(&mut merged);
        validate_candidate_data(&merged)?;

        if patch.name.is_some() || patch.category.is_some() {
            if let Some(existing) = self.find_conflict(&merged.name, &merged.category, id).await? {
                return Err(CandidateError::DuplicateEntry {
                    name: merged.name,
                    category: merged.category.key().to_string(),
                    existing_id: existing.id,
                });
            }
        }

        self.store.update(id, &patch).await?;
        info!("Updated candidate {}", id);
        Ok(merged.id)
    }

    /// Record a vote submission. The counter moves through the store's atomic
    /// increment; no payment is taken here.
    pub async fn submit_vote(
        &self,
        candidate_id: &str,
        request: VoteRequest,
    ) -> Result<VoteReceipt, CandidateError> {
        if !validate_phone_number(&request.phone_number) {
            return Err(CandidateError::Validation(
                "Phone number must contain exactly 9 digits".into(),
            ));
        }
        validate_vote_count(request.vote_count)?;

        self.store.increment(candidate_id, request.vote_count).await?;

        let record = VoteRecord::new(
            candidate_id.to_string(),
            request.vote_count,
            request.phone_number.chars().filter(char::is_ascii_digit).collect(),
            request.payment_method.as_deref().map(clean),
            request.provider.as_deref().map(clean),
        );
        // The counter already moved; a ledger failure must not undo the vote
        if let Err(e) = self.store.record_vote(&record).await {
            warn!("Failed to record vote {} for {}: {}", record.id, candidate_id, e);
        }

        let all = self.store.all().await?;
        let candidate = all
            .iter()
            .find(|c| c.id == candidate_id)
            .map(|c| update_candidate_percentage(c, &all))
            .ok_or_else(|| CandidateError::NotFound(candidate_id.to_string()))?;

        info!(
            "Recorded {} vote(s) for {} (now {})",
            request.vote_count, candidate_id, candidate.votes
        );
        Ok(VoteReceipt {
            vote_id: record.id,
            candidate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn new_candidate(id: &str, name: &str, category: &str, votes: i64) -> NewCandidate {
        NewCandidate {
            id: id.into(),
            name: name.into(),
            title: None,
            image: format!("/dancers/{id}.jpg"),
            category: category.into(),
            votes,
            badge: None,
        }
    }

    fn service() -> (CandidateService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (CandidateService::new(store.clone()), store)
    }

    #[tokio::test]
    async fn create_sanitizes_and_defaults() {
        let (service, store) = service();
        let id = service
            .create(NewCandidate {
                badge: Some(0),
                ..new_candidate("  El Fally du 237 ", " <b>El Fally</b> ", "Groupe", 12)
            })
            .await
            .unwrap();
        assert_eq!(id, "el-fally-du-237");

        let stored = store.get(&id).await.unwrap().unwrap();
        assert_eq!(stored.name, "&lt;b&gt;El Fally&lt;&#x2F;b&gt;");
        assert_eq!(stored.title.as_deref(), Some(stored.name.as_str()));
        assert_eq!(stored.votes, 12);
        assert_eq!(stored.badge, None);
        assert_eq!(stored.percentage, 0);
    }

    #[tokio::test]
    async fn create_requires_fields() {
        let (service, store) = service();
        let result = service.create(new_candidate("a", "", "X", 0)).await;
        assert!(matches!(result, Err(CandidateError::Validation(_))));

        let too_many = service.create(new_candidate("b", "B", "X", 2_000_000)).await;
        assert!(matches!(too_many, Err(CandidateError::Validation(_))));
        assert!(store.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected_and_store_unchanged() {
        let (service, store) = service();
        service.create(new_candidate("a", "A", "X", 5)).await.unwrap();
        let before = store.all().await.unwrap();

        let result = service.create(new_candidate("a", "Another", "Y", 9)).await;
        assert!(matches!(result, Err(CandidateError::DuplicateId(id)) if id == "a"));
        assert_eq!(store.all().await.unwrap(), before);
    }

    #[tokio::test]
    async fn duplicate_name_in_category_names_first_id() {
        let (service, store) = service();
        service
            .create(new_candidate("test", "Test", "X", 100))
            .await
            .unwrap();

        let result = service.create(new_candidate("test-2", " test ", "X", 0)).await;
        match result {
            Err(CandidateError::DuplicateEntry { existing_id, .. }) => {
                assert_eq!(existing_id, "test")
            }
            other => panic!("expected duplicate entry, got {other:?}"),
        }
        assert_eq!(store.all().await.unwrap().len(), 1);

        // Same name in another category is a different entry
        service
            .create(new_candidate("test-y", "Test", "Y", 0))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn update_merges_and_validates() {
        let (service, store) = service();
        service.create(new_candidate("a", "A", "X", 5)).await.unwrap();
        service.create(new_candidate("b", "B", "X", 5)).await.unwrap();

        service
            .update(
                "a",
                CandidatePatch {
                    title: Some("Queen & King".into()),
                    badge: Some(Some(1)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let a = store.get("a").await.unwrap().unwrap();
        assert_eq!(a.title.as_deref(), Some("Queen &amp; King"));
        assert_eq!(a.badge, Some(1));

        let rename = CandidatePatch {
            name: Some("b".into()),
            ..Default::default()
        };
        assert!(matches!(
            service.update("a", rename).await,
            Err(CandidateError::DuplicateEntry { existing_id, .. }) if existing_id == "b"
        ));

        let overflow = CandidatePatch {
            votes: Some(5_000_000),
            ..Default::default()
        };
        assert!(matches!(
            service.update("a", overflow).await,
            Err(CandidateError::Validation(_))
        ));
        assert_eq!(store.get("a").await.unwrap().unwrap().votes, 5);

        assert!(matches!(
            service.update("ghost", CandidatePatch::default()).await,
            Err(CandidateError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn negative_vote_counters_are_rejected() {
        let (service, store) = service();
        let result = service.create(new_candidate("a", "A", "X", -5)).await;
        assert!(matches!(result, Err(CandidateError::Validation(msg)) if msg.contains("votes")));
        assert!(store.all().await.unwrap().is_empty());

        service.create(new_candidate("a", "A", "X", 5000)).await.unwrap();
        let wipe = CandidatePatch {
            votes: Some(-1),
            ..Default::default()
        };
        assert!(matches!(
            service.update("a", wipe).await,
            Err(CandidateError::Validation(_))
        ));
        assert_eq!(store.get("a").await.unwrap().unwrap().votes, 5000);
    }

    #[tokio::test]
    async fn concurrent_creates_keep_one_entry_per_name() {
        let (service, store) = service();
        let mut tasks = Vec::new();
        for id in ["kiki", "kiki-2", "kiki-3", "kiki-4"] {
            let service = service.clone();
            tasks.push(tokio::spawn(async move {
                service.create(new_candidate(id, "Kiki", "X", 0)).await
            }));
        }

        let mut created = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => created += 1,
                Err(e) => assert!(matches!(e, CandidateError::DuplicateEntry { .. })),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(store.all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn votes_increment_and_report_share() {
        let (service, store) = service();
        service.create(new_candidate("a", "A", "X", 30)).await.unwrap();
        service.create(new_candidate("b", "B", "X", 60)).await.unwrap();

        let receipt = service
            .submit_vote(
                "a",
                VoteRequest {
                    vote_count: 10,
                    phone_number: "690 12 34 56".into(),
                    payment_method: Some("om".into()),
                    provider: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(receipt.candidate.votes, 40);
        assert_eq!(receipt.candidate.percentage, 40);

        let ledger = store.vote_records().await;
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].id, receipt.vote_id);
        assert_eq!(ledger[0].phone_number, "690123456");
    }

    #[tokio::test]
    async fn invalid_votes_change_nothing() {
        let (service, store) = service();
        service.create(new_candidate("a", "A", "X", 30)).await.unwrap();

        let bad_phone = VoteRequest {
            vote_count: 1,
            phone_number: "12345".into(),
            payment_method: None,
            provider: None,
        };
        assert!(matches!(
            service.submit_vote("a", bad_phone).await,
            Err(CandidateError::Validation(_))
        ));

        let zero = VoteRequest {
            vote_count: 0,
            phone_number: "690123456".into(),
            payment_method: None,
            provider: None,
        };
        assert!(service.submit_vote("a", zero.clone()).await.is_err());

        let unknown = VoteRequest {
            vote_count: 1,
            ..zero
        };
        assert!(matches!(
            service.submit_vote("ghost", unknown).await,
            Err(CandidateError::NotFound(_))
        ));

        assert_eq!(store.get("a").await.unwrap().unwrap().votes, 30);
        assert!(store.vote_records().await.is_empty());
    }

    #[tokio::test]
    async fn end_to_end_percentages() {
        let (service, _) = service();
        service.create(new_candidate("a1", "A1", "A", 30)).await.unwrap();
        service.create(new_candidate("a2", "A2", "A", 70)).await.unwrap();
        service.create(new_candidate("b1", "B1", "B", 0)).await.unwrap();

        let listed = service.list().await.unwrap();
        let shares: Vec<(&str, u8)> = listed
            .iter()
            .map(|c| (c.id.as_str(), c.percentage))
            .collect();
        assert_eq!(shares, vec![("a1", 30), ("a2", 70), ("b1", 0)]);

        let leaders = service.category_leaders().await.unwrap();
        let leader_ids: Vec<&str> = leaders.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(leader_ids, vec!["a2", "b1"]);

        let board = service.category_leaderboard("A").await.unwrap();
        assert_eq!(board[0].id, "a2");
        assert_eq!(service.leaderboard(1).await.unwrap()[0].id, "a2");
    }
}
