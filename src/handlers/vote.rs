use crate::handlers::{ApiError, AppJson, AppState};
use crate::models::Candidate;
use crate::service::VoteRequest;
use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteBody {
    #[serde(default)]
    pub vote_count: u64,
    #[serde(default)]
    pub phone_number: String,
    pub payment_method: Option<String>,
    pub provider: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub success: bool,
    pub vote_id: String,
    pub candidate: Candidate,
}

// POST /api/candidates/{id}/votes
pub async fn submit_vote(
    State(state): State<AppState>,
    Path(candidate_id): Path<String>,
    AppJson(body): AppJson<VoteBody>,
) -> Result<Json<VoteResponse>, ApiError> {
    let receipt = state
        .service
        .submit_vote(
            &candidate_id,
            VoteRequest {
                vote_count: body.vote_count,
                phone_number: body.phone_number,
                payment_method: body.payment_method,
                provider: body.provider,
            },
        )
        .await?;

    Ok(Json(VoteResponse {
        success: true,
        vote_id: receipt.vote_id,
        candidate: receipt.candidate,
    }))
}
