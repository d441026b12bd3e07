use crate::handlers::{ApiError, AppJson, AppState};
use crate::models::{Candidate, CandidatePatch, NewCandidate};
use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub struct CandidatesResponse {
    pub success: bool,
    pub candidates: Vec<Candidate>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResponse {
    pub success: bool,
    pub candidate_id: String,
    pub message: &'static str,
}

#[derive(Deserialize)]
pub struct UpdateCandidateRequest {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub patch: CandidatePatch,
}

// GET /api/candidates
pub async fn list_candidates(
    State(state): State<AppState>,
) -> Result<Json<CandidatesResponse>, ApiError> {
    let candidates = state.service.list().await?;
    Ok(Json(CandidatesResponse {
        success: true,
        candidates,
    }))
}

// POST /api/candidates
pub async fn create_candidate(
    State(state): State<AppState>,
    AppJson(payload): AppJson<NewCandidate>,
) -> Result<Json<WriteResponse>, ApiError> {
    let candidate_id = state.service.create(payload).await?;
    Ok(Json(WriteResponse {
        success: true,
        candidate_id,
        message: "Candidate added successfully",
    }))
}

// PUT /api/candidates
pub async fn update_candidate(
    State(state): State<AppState>,
    AppJson(payload): AppJson<UpdateCandidateRequest>,
) -> Result<Json<WriteResponse>, ApiError> {
    let candidate_id = state.service.update(&payload.id, payload.patch).await?;
    Ok(Json(WriteResponse {
        success: true,
        candidate_id,
        message: "Candidate updated successfully",
    }))
}
