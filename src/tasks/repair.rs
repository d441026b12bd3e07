use crate::models::Candidate;
use crate::repair::Deduplicator;
use crate::validation::validate_candidate_data;
use log::{info, warn};

/// Count how many of the given records pass validation, logging the rest.
pub fn validation_summary(candidates: &[Candidate]) -> (usize, usize) {
    let mut valid = 0;
    let mut invalid = 0;
    for candidate in candidates {
        match validate_candidate_data(candidate) {
            Ok(()) => valid += 1,
            Err(e) => {
                warn!("Candidate {} is still invalid: {}", candidate.id, e);
                invalid += 1;
            }
        }
    }
    (valid, invalid)
}

pub async fn run_repair(
    dedup: &Deduplicator,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if dry_run {
        let plan = dedup.plan().await?;
        for merge in &plan.merges {
            info!(
                "Would merge {} into {} ({} votes)",
                merge.removed_ids.join(", "),
                merge.keep_id,
                merge.merged_votes
            );
        }
        for record in &plan.invalid {
            warn!(
                "Invalid candidate {} (missing: {})",
                record.id,
                record.missing.join(", ")
            );
        }
        info!(
            "Dry run: {} merges planned, {} candidates afterwards",
            plan.merges.len(),
            plan.normalized.len()
        );
        return Ok(());
    }

    let report = dedup.run().await?;
    let (valid, invalid) = validation_summary(&report.candidates);
    info!("Validation: {} valid, {} invalid", valid, invalid);

    if !report.failed_merges.is_empty() {
        return Err(format!(
            "{} merges failed; run the repair again once the store is reachable",
            report.failed_merges.len()
        )
        .into());
    }
    Ok(())
}
