use crate::handlers::{ApiError, AppState};
use crate::handlers::candidates::CandidatesResponse;
use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
}

// GET /api/leaderboard?limit=N
pub async fn overall(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<CandidatesResponse>, ApiError> {
    let limit = query.limit.unwrap_or(state.leaderboard_limit);
    let candidates = state.service.leaderboard(limit).await?;
    Ok(Json(CandidatesResponse {
        success: true,
        candidates,
    }))
}

// GET /api/categories/{category}/leaderboard
pub async fn category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<CandidatesResponse>, ApiError> {
    let candidates = state.service.category_leaderboard(&category).await?;
    Ok(Json(CandidatesResponse {
        success: true,
        candidates,
    }))
}

// GET /api/categories/leaders
pub async fn leaders(
    State(state): State<AppState>,
) -> Result<Json<CandidatesResponse>, ApiError> {
    let candidates = state.service.category_leaders().await?;
    Ok(Json(CandidatesResponse {
        success: true,
        candidates,
    }))
}
