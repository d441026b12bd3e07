//! Offline repair of the candidate collection: merges same-name entries within
//! a category and rewrites records into their normalized shape.
//!
//! A run expects exclusive use of the collection. Each merge is applied as a
//! single store unit, and runs inside this process are serialized, so an
//! interrupted run can simply be started again.

pub mod normalize;

pub use normalize::{AccentFolding, LowercaseTrim, NameNormalizer};

use crate::db::CandidateStore;
use crate::error::StoreError;
use crate::models::Candidate;
use crate::voting::compute_percentages;
use lazy_static::lazy_static;
use log::{error, info, warn};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

lazy_static! {
    // One repair at a time per process
    static ref REPAIR_LOCK: Mutex<()> = Mutex::new(());

    /// Known spelling variants of category names and their canonical form.
    pub static ref CATEGORY_ALIASES: HashMap<String, String> = [
        ("Meilleur artiste danseur masculin", "Meilleur artiste danseur - masculin"),
        ("meilleur artiste danse au rythme folklorique", "Meilleur artiste danse au rythme folklorique"),
        ("meilleurs artiste danseurs mbolé", "Meilleur artiste danseur mbolé"),
    ]
    .into_iter()
    .map(|(from, to)| (from.to_string(), to.to_string()))
    .collect();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeAction {
    pub keep_id: String,
    pub removed_ids: Vec<String>,
    pub merged_votes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidRecord {
    pub id: String,
    pub missing: Vec<&'static str>,
}

#[derive(Debug, Clone, Default)]
pub struct RepairPlan {
    pub merges: Vec<MergeAction>,
    pub invalid: Vec<InvalidRecord>,
    /// Collection as it should look afterwards, with percentages derived
    /// from the post-merge vote counts.
    pub normalized: Vec<Candidate>,
}

#[derive(Debug, Clone, Default)]
pub struct RepairReport {
    pub merges: Vec<MergeAction>,
    pub failed_merges: Vec<(MergeAction, String)>,
    pub invalid: Vec<InvalidRecord>,
    pub normalized_count: usize,
    pub candidates: Vec<Candidate>,
}

fn missing_fields(candidate: &Candidate) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if candidate.name.trim().is_empty() {
        missing.push("name");
    }
    if candidate.image.trim().is_empty() {
        missing.push("image");
    }
    if candidate.category.is_missing() {
        missing.push("category");
    }
    missing
}

/// Canonical stored shape of a record: trimmed text, a title, no legacy
/// fields, aliased category.
pub fn normalize_candidate(
    candidate: &Candidate,
    id: &str,
    aliases: &HashMap<String, String>,
) -> Candidate {
    let title = candidate
        .title
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .or(candidate.legacy_quote.as_deref().filter(|q| !q.trim().is_empty()))
        .unwrap_or(&candidate.name);

    let category = match aliases.get(candidate.category.key()) {
        Some(canonical) => canonical.as_str().into(),
        None => candidate.category.clone(),
    };

    Candidate {
        id: id.to_string(),
        name: candidate.name.trim().to_string(),
        title: Some(title.trim().to_string()),
        image: candidate.image.trim().to_string(),
        category,
        votes: candidate.votes,
        badge: candidate.badge.filter(|b| *b > 0),
        percentage: candidate.percentage,
        legacy_quote: None,
    }
}

// Whether the stored record differs from its normalized shape
fn needs_rewrite(stored: &Candidate, normalized: &Candidate) -> bool {
    stored.legacy_quote.is_some()
        || stored.title.as_deref().is_none_or(|t| t.trim().is_empty())
        || stored.id != normalized.id
        || stored.name != normalized.name
        || stored.image != normalized.image
        || stored.category != normalized.category
        || stored.title != normalized.title
        || stored.badge != normalized.badge
}

/// Work out merges for a collection keyed by id, without touching any store.
pub fn plan_repair(
    candidates: &BTreeMap<String, Candidate>,
    normalizer: &dyn NameNormalizer,
    aliases: &HashMap<String, String>,
) -> RepairPlan {
    let mut invalid = Vec::new();
    let mut groups: BTreeMap<(String, String), Vec<&str>> = BTreeMap::new();

    for (id, candidate) in candidates {
        let missing = missing_fields(candidate);
        if !missing.is_empty() {
            invalid.push(InvalidRecord {
                id: id.clone(),
                missing,
            });
            continue;
        }
        let key = (
            normalizer.normalize(&candidate.name),
            candidate.category.key().to_string(),
        );
        groups.entry(key).or_default().push(id.as_str());
    }

    let mut merges = Vec::new();
    let mut merged_totals: HashMap<&str, u64> = HashMap::new();
    let mut removed: Vec<&str> = Vec::new();

    for ids in groups.values_mut().filter(|ids| ids.len() > 1) {
        // Stable: equal vote counts keep id order, so the lowest id survives
        ids.sort_by(|a, b| candidates[*b].votes.cmp(&candidates[*a].votes));

        let merged_votes = ids
            .iter()
            .fold(0u64, |sum, id| sum.saturating_add(candidates[*id].votes));
        merged_totals.insert(ids[0], merged_votes);
        removed.extend(&ids[1..]);

        merges.push(MergeAction {
            keep_id: ids[0].to_string(),
            removed_ids: ids[1..].iter().map(|id| id.to_string()).collect(),
            merged_votes,
        });
    }

    let invalid_ids: Vec<&str> = invalid.iter().map(|r| r.id.as_str()).collect();
    let after: Vec<Candidate> = candidates
        .iter()
        .filter(|(id, _)| !removed.contains(&id.as_str()))
        .map(|(id, candidate)| {
            if invalid_ids.contains(&id.as_str()) {
                return candidate.clone();
            }
            let mut normalized = normalize_candidate(candidate, id, aliases);
            if let Some(total) = merged_totals.get(id.as_str()) {
                normalized.votes = *total;
            }
            normalized
        })
        .collect();

    RepairPlan {
        merges,
        invalid,
        normalized: compute_percentages(&after),
    }
}

/// Runs the repair routine against a store.
pub struct Deduplicator {
    store: Arc<dyn CandidateStore>,
    normalizer: Box<dyn NameNormalizer>,
    aliases: HashMap<String, String>,
}

impl Deduplicator {
    pub fn new(store: Arc<dyn CandidateStore>) -> Self {
        Self {
            store,
            normalizer: Box::new(LowercaseTrim),
            aliases: CATEGORY_ALIASES.clone(),
        }
    }

    pub fn with_normalizer(mut self, normalizer: Box<dyn NameNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_aliases(mut self, aliases: HashMap<String, String>) -> Self {
        self.aliases = aliases;
        self
    }

    async fn snapshot(&self) -> Result<BTreeMap<String, Candidate>, StoreError> {
        let records = self.store.all().await?;
        Ok(records.into_iter().map(|c| (c.id.clone(), c)).collect())
    }

    /// Compute the plan without writing anything.
    pub async fn plan(&self) -> Result<RepairPlan, StoreError> {
        let snapshot = self.snapshot().await?;
        Ok(plan_repair(&snapshot, self.normalizer.as_ref(), &self.aliases))
    }

    /// Merge duplicates, normalize the remaining records, and report.
    pub async fn run(&self) -> Result<RepairReport, StoreError> {
        let _guard = REPAIR_LOCK.lock().await;

        let snapshot = self.snapshot().await?;
        info!("Found {} candidates", snapshot.len());
        let plan = plan_repair(&snapshot, self.normalizer.as_ref(), &self.aliases);

        for record in &plan.invalid {
            warn!(
                "Invalid candidate {} left in place (missing: {})",
                record.id,
                record.missing.join(", ")
            );
        }

        let planned: HashMap<&str, &Candidate> = plan
            .normalized
            .iter()
            .map(|c| (c.id.as_str(), c))
            .collect();

        let mut report = RepairReport {
            invalid: plan.invalid.clone(),
            ..Default::default()
        };

        for merge in &plan.merges {
            let Some(survivor) = planned.get(merge.keep_id.as_str()) else {
                continue;
            };
            info!(
                "Merging {} into {} ({} votes planned)",
                merge.removed_ids.join(", "),
                merge.keep_id,
                merge.merged_votes
            );
            match self.store.apply_merge(survivor, &merge.removed_ids).await {
                Ok(total) => {
                    if total != merge.merged_votes {
                        warn!(
                            "Votes for {} changed during repair: stored total is {}",
                            merge.keep_id, total
                        );
                    }
                    report.merges.push(MergeAction {
                        merged_votes: total,
                        ..merge.clone()
                    });
                }
                Err(e) => {
                    error!("Merge into {} failed: {}", merge.keep_id, e);
                    report.failed_merges.push((merge.clone(), e.to_string()));
                }
            }
        }

        let invalid_ids: Vec<&str> = plan.invalid.iter().map(|r| r.id.as_str()).collect();
        let merged_ids: Vec<&str> = plan.merges.iter().map(|m| m.keep_id.as_str()).collect();
        for normalized in &plan.normalized {
            let id = normalized.id.as_str();
            if invalid_ids.contains(&id) || merged_ids.contains(&id) {
                continue;
            }
            let Some(stored) = snapshot.get(id) else {
                continue;
            };
            if !needs_rewrite(stored, normalized) {
                continue;
            }
            // Keep the live counter; only the shape is being fixed here
            match self.store.get(id).await? {
                Some(current) => {
                    let rewritten = Candidate {
                        votes: current.votes,
                        ..normalized.clone()
                    };
                    self.store.set(&rewritten).await?;
                    report.normalized_count += 1;
                    info!("Normalized {}", normalized.name);
                }
                None => warn!("Candidate {} disappeared during repair", id),
            }
        }

        report.candidates = compute_percentages(&self.store.all().await?);
        info!(
            "Repair complete: {} merged, {} removed, {} normalized, {} invalid, {} failed",
            report.merges.len(),
            report
                .merges
                .iter()
                .map(|m| m.removed_ids.len())
                .sum::<usize>(),
            report.normalized_count,
            report.invalid.len(),
            report.failed_merges.len()
        );
        Ok(report)
    }
}
