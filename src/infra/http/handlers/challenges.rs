use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;

use crate::infra::http::error::ApiError;
use crate::infra::http::middleware::CurrentUser;
use crate::infra::http::state::HttpState;

pub async fn list_challenges(
    State(state): State<HttpState>,
) -> Result<impl IntoResponse, ApiError> {
    let challenges = state.challenges.list_active().await?;
    Ok(Json(challenges))
}

pub async fn my_progress(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let progress = state.challenges.progress_of(principal.user_id).await?;
    Ok(Json(progress))
}
