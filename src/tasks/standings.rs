use crate::db::{self, CandidateStore, Subscription};
use crate::models::Candidate;
use crate::voting::top_per_category;
use log::info;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Compare the current category leaders against the last known ones and
/// return the categories whose leader changed.
pub fn leader_changes(
    known: &mut HashMap<String, String>,
    snapshot: &[Candidate],
) -> Vec<Candidate> {
    let mut changed = Vec::new();
    for leader in top_per_category(snapshot) {
        let category = leader.category.key().to_string();
        if known.get(&category) != Some(&leader.id) {
            known.insert(category, leader.id.clone());
            changed.push(leader);
        }
    }
    changed
}

/// Log every change of category leader for as long as the handle is kept.
pub fn watch_leaders(store: Arc<dyn CandidateStore>) -> Subscription {
    let known = Mutex::new(HashMap::new());
    db::subscribe(store, move |snapshot| {
        let Ok(mut known) = known.lock() else {
            return;
        };
        for leader in leader_changes(&mut known, &snapshot) {
            info!(
                "{} now leads '{}' with {} votes ({}%)",
                leader.display_title(),
                leader.category.key(),
                leader.votes,
                leader.percentage
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::voting::compute_percentages;

    fn candidate(id: &str, category: &str, votes: u64) -> Candidate {
        Candidate::new(id, id.to_uppercase(), format!("/{id}.jpg"), category).with_votes(votes)
    }

    #[test]
    fn reports_only_new_leaders() {
        let mut known = HashMap::new();
        let first = compute_percentages(&[candidate("a1", "A", 30), candidate("a2", "A", 70)]);
        let leaders: Vec<String> = leader_changes(&mut known, &first)
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(leaders, vec!["a2"]);

        assert!(leader_changes(&mut known, &first).is_empty());

        let second = [candidate("a1", "A", 90), candidate("a2", "A", 70), candidate("b1", "B", 0)];
        let leaders: Vec<String> = leader_changes(&mut known, &second)
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(leaders, vec!["a1", "b1"]);
    }

    #[tokio::test]
    async fn watcher_runs_until_dropped() {
        let store = Arc::new(MemoryStore::with_records([candidate("a1", "A", 1)]));
        let watcher = watch_leaders(store.clone());
        store.increment("a1", 2).await.unwrap();
        tokio::task::yield_now().await;
        watcher.unsubscribe();
        assert_eq!(store.get("a1").await.unwrap().unwrap().votes, 3);
    }
}
