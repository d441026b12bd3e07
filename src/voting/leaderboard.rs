use crate::models::Candidate;
use crate::voting::percentage::compute_percentages;
use serde::Serialize;

/// Candidates of one category, ranked by votes.
///
/// Percentages are computed over the filtered subset only. Equal vote counts
/// keep their input order.
pub fn category_leaderboard(candidates: &[Candidate], category: &str) -> Vec<Candidate> {
    let subset: Vec<Candidate> = candidates
        .iter()
        .filter(|c| c.category.key() == category)
        .cloned()
        .collect();

    let mut ranked = compute_percentages(&subset);
    ranked.sort_by(|a, b| b.votes.cmp(&a.votes));
    ranked
}

/// One leader per category, in order of first appearance. The first record
/// seen keeps the lead on a tie.
pub fn top_per_category(candidates: &[Candidate]) -> Vec<Candidate> {
    let mut leaders: Vec<&Candidate> = Vec::new();

    for candidate in candidates {
        match leaders
            .iter_mut()
            .find(|leader| leader.category.key() == candidate.category.key())
        {
            Some(leader) => {
                if candidate.votes > leader.votes {
                    *leader = candidate;
                }
            }
            None => leaders.push(candidate),
        }
    }

    leaders.into_iter().cloned().collect()
}

/// Top `limit` candidates across every category, with category-relative
/// percentages.
pub fn overall_leaderboard(candidates: &[Candidate], limit: usize) -> Vec<Candidate> {
    let mut ranked = compute_percentages(candidates);
    ranked.sort_by(|a, b| b.votes.cmp(&a.votes));
    ranked.truncate(limit);
    ranked
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub category: String,
    pub candidates: usize,
    pub total_votes: u64,
}

// Candidate count and vote total per category, largest categories first
pub fn category_summaries(candidates: &[Candidate]) -> Vec<CategorySummary> {
    let mut summaries: Vec<CategorySummary> = Vec::new();

    for candidate in candidates {
        let key = candidate.category.key();
        match summaries.iter_mut().find(|s| s.category == key) {
            Some(summary) => {
                summary.candidates += 1;
                summary.total_votes = summary.total_votes.saturating_add(candidate.votes);
            }
            None => summaries.push(CategorySummary {
                category: key.to_string(),
                candidates: 1,
                total_votes: candidate.votes,
            }),
        }
    }

    summaries.sort_by(|a, b| b.candidates.cmp(&a.candidates));
    summaries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, category: &str, votes: u64) -> Candidate {
        Candidate::new(id, id, format!("/{id}.jpg"), category).with_votes(votes)
    }

    fn ids(list: &[Candidate]) -> Vec<&str> {
        list.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn category_board_sorts_by_votes_and_keeps_tie_order() {
        let input = vec![
            candidate("low", "A", 5),
            candidate("tie-first", "A", 20),
            candidate("other", "B", 500),
            candidate("tie-second", "A", 20),
            candidate("high", "A", 55),
        ];
        let board = category_leaderboard(&input, "A");
        assert_eq!(ids(&board), vec!["high", "tie-first", "tie-second", "low"]);
        assert!(board.windows(2).all(|w| w[0].votes >= w[1].votes));
        assert_eq!(board[0].percentage, 55);
        assert_eq!(board[3].percentage, 5);
    }

    #[test]
    fn category_board_matches_exact_category_only() {
        let input = vec![candidate("a", "Groupe", 10), candidate("b", "groupe ", 10)];
        let board = category_leaderboard(&input, "Groupe");
        assert_eq!(ids(&board), vec!["a"]);
        assert_eq!(board[0].percentage, 100);
        assert!(category_leaderboard(&input, "Missing").is_empty());
    }

    #[test]
    fn one_leader_per_category_first_seen_wins_ties() {
        let input = vec![
            candidate("a1", "A", 10),
            candidate("b1", "B", 3),
            candidate("a2", "A", 40),
            candidate("b2", "B", 3),
            candidate("a3", "A", 40),
            candidate("c1", "C", 0),
        ];
        let leaders = top_per_category(&input);
        assert_eq!(ids(&leaders), vec!["a2", "b1", "c1"]);
    }

    #[test]
    fn overall_board_is_truncated() {
        let input = vec![
            candidate("a", "A", 30),
            candidate("b", "A", 70),
            candidate("c", "B", 50),
        ];
        let board = overall_leaderboard(&input, 2);
        assert_eq!(ids(&board), vec!["b", "c"]);
        assert_eq!(board[0].percentage, 70);
        assert_eq!(board[1].percentage, 100);
    }

    #[test]
    fn summaries_count_candidates_and_votes() {
        let input = vec![
            candidate("a", "A", 30),
            candidate("c", "B", 50),
            candidate("b", "A", 70),
        ];
        let summaries = category_summaries(&input);
        assert_eq!(
            summaries,
            vec![
                CategorySummary {
                    category: "A".into(),
                    candidates: 2,
                    total_votes: 100
                },
                CategorySummary {
                    category: "B".into(),
                    candidates: 1,
                    total_votes: 50
                },
            ]
        );
    }
}
