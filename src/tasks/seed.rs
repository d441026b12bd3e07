use crate::db::CandidateStore;
use crate::error::{CandidateError, StoreError};
use crate::models::NewCandidate;
use crate::service::CandidateService;
use crate::voting::{category_summaries, overall_leaderboard};
use log::{info, warn};
use serde::Deserialize;
use std::path::Path;

/// Seed files are either `{"candidates": [...]}` or a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum SeedFile {
    Wrapped { candidates: Vec<NewCandidate> },
    List(Vec<NewCandidate>),
}

impl SeedFile {
    fn into_candidates(self) -> Vec<NewCandidate> {
        match self {
            SeedFile::Wrapped { candidates } | SeedFile::List(candidates) => candidates,
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedOutcome {
    pub added: usize,
    pub skipped: usize,
}

pub fn parse_seed(raw: &str) -> Result<Vec<NewCandidate>, serde_json::Error> {
    Ok(serde_json::from_str::<SeedFile>(raw)?.into_candidates())
}

/// Add every entry through the service so seeds get the same sanitizing and
/// duplicate checks as API writes. Rejected entries are logged and skipped.
pub async fn seed_candidates(
    service: &CandidateService,
    entries: Vec<NewCandidate>,
) -> Result<SeedOutcome, StoreError> {
    let mut outcome = SeedOutcome::default();
    for entry in entries {
        let label = entry.name.clone();
        match service.create(entry).await {
            Ok(_) => outcome.added += 1,
            Err(CandidateError::Store(e)) => return Err(e),
            Err(e) => {
                warn!("Skipping {}: {}", label, e);
                outcome.skipped += 1;
            }
        }
    }
    Ok(outcome)
}

pub async fn seed_from_file(
    service: &CandidateService,
    path: &Path,
) -> Result<SeedOutcome, Box<dyn std::error::Error + Send + Sync>> {
    let raw = tokio::fs::read_to_string(path).await?;
    let entries = parse_seed(&raw)?;
    info!("Seeding {} candidates from {}", entries.len(), path.display());
    let outcome = seed_candidates(service, entries).await?;
    info!(
        "Seeding finished: {} added, {} skipped",
        outcome.added, outcome.skipped
    );
    Ok(outcome)
}

/// Log counts per category, the overall vote total and the current top 5.
pub async fn check(store: &dyn CandidateStore) -> Result<u64, StoreError> {
    let candidates = store.all().await?;
    info!("{} candidates stored", candidates.len());

    for summary in category_summaries(&candidates) {
        info!(
            "  {}: {} candidates, {} votes",
            summary.category, summary.candidates, summary.total_votes
        );
    }

    let total: u64 = candidates.iter().map(|c| c.votes).sum();
    info!("Total votes: {}", total);

    for (rank, candidate) in overall_leaderboard(&candidates, 5).iter().enumerate() {
        info!(
            "  #{} {} ({}) - {} votes",
            rank + 1,
            candidate.name,
            candidate.category.key(),
            candidate.votes
        );
    }
    Ok(total)
}
