use crate::models::Candidate;
use std::collections::HashMap;

/// Share of `total` held by `votes`, as a whole percentage rounded half-up.
/// A zero total yields 0.
pub fn share_of(votes: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    // round(100 * v / t) == floor((200 * v + t) / (2 * t)) for non-negative integers
    let scaled = (u128::from(votes) * 200 + u128::from(total)) / (u128::from(total) * 2);
    scaled.min(100) as u8
}

// Vote total per category key
pub(crate) fn category_totals(candidates: &[Candidate]) -> HashMap<&str, u64> {
    let mut totals: HashMap<&str, u64> = HashMap::new();
    for candidate in candidates {
        let total = totals.entry(candidate.category.key()).or_insert(0);
        *total = total.saturating_add(candidate.votes);
    }
    totals
}

/// Recompute `percentage` for every candidate relative to its category peers.
///
/// The result has the same order and length as the input. Each category's
/// percentages are rounded independently and are not forced to sum to 100.
pub fn compute_percentages(candidates: &[Candidate]) -> Vec<Candidate> {
    let totals = category_totals(candidates);

    candidates
        .iter()
        .map(|candidate| {
            let total = totals.get(candidate.category.key()).copied().unwrap_or(0);
            Candidate {
                percentage: share_of(candidate.votes, total),
                ..candidate.clone()
            }
        })
        .collect()
}

/// Percentage for a single candidate measured against the whole collection.
pub fn update_candidate_percentage(candidate: &Candidate, all: &[Candidate]) -> Candidate {
    let total = all
        .iter()
        .filter(|c| c.category.key() == candidate.category.key())
        .fold(0u64, |sum, c| sum.saturating_add(c.votes));

    Candidate {
        percentage: share_of(candidate.votes, total),
        ..candidate.clone()
    }
}
