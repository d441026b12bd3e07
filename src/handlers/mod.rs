mod candidates;
mod leaderboard;
mod vote;

use crate::error::CandidateError;
use crate::service::CandidateService;
use axum::{
    Json, Router,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::error;
use serde::Serialize;
use serde::de::DeserializeOwned;

#[derive(Clone)]
pub struct AppState {
    pub service: CandidateService,
    pub leaderboard_limit: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/candidates",
            get(candidates::list_candidates)
                .post(candidates::create_candidate)
                .put(candidates::update_candidate),
        )
        .route("/api/candidates/{id}/votes", post(vote::submit_vote))
        .route("/api/leaderboard", get(leaderboard::overall))
        .route("/api/categories/leaders", get(leaderboard::leaders))
        .route(
            "/api/categories/{category}/leaderboard",
            get(leaderboard::category),
        )
        .with_state(state)
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

/// Error returned by every endpoint: rejected input is a 400 with the reason,
/// anything else is logged and reported as a 500.
#[derive(Debug)]
pub struct ApiError(pub CandidateError);

impl From<CandidateError> for ApiError {
    fn from(err: CandidateError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0 {
            CandidateError::Store(e) => {
                error!("Store error while handling request: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected error occurred".to_string(),
                )
            }
            other => (StatusCode::BAD_REQUEST, other.to_string()),
        };

        (
            status,
            Json(ErrorBody {
                success: false,
                error: message,
            }),
        )
            .into_response()
    }
}

/// `Json<T>` whose rejections come back as the API's own error body.
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError(CandidateError::Validation(e.body_text())))?;
        Ok(AppJson(value))
    }
}
