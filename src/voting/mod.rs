pub mod leaderboard;
pub mod percentage;

pub use leaderboard::{
    CategorySummary, category_leaderboard, category_summaries, overall_leaderboard,
    top_per_category,
};
pub use percentage::{compute_percentages, share_of, update_candidate_percentage};
