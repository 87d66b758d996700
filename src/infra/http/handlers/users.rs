use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use agora_api_types::{LoginRequest, ProfileUpdateRequest, RegisterRequest};

use super::SearchQuery;
use crate::infra::http::error::ApiError;
use crate::infra::http::extract::{ApiJson, ApiPath, ApiQuery};
use crate::infra::http::middleware::CurrentUser;
use crate::infra::http::state::HttpState;

pub async fn register(
    State(state): State<HttpState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let issued = state.auth.register(payload).await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

pub async fn login(
    State(state): State<HttpState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let issued = state.auth.login(payload).await?;
    Ok(Json(issued))
}

pub async fn logout(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    state.auth.logout(&principal).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let account = state.users.me(principal.user_id).await?;
    Ok(Json(account))
}

pub async fn update_me(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
    ApiJson(payload): ApiJson<ProfileUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state
        .users
        .update_profile(principal.user_id, payload)
        .await?;
    Ok(Json(account))
}

pub async fn list_users(
    State(state): State<HttpState>,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let users = state.users.list_users(query.search.as_deref()).await?;
    Ok(Json(users))
}

pub async fn get_user(
    State(state): State<HttpState>,
    ApiPath(username): ApiPath<String>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state.users.get_user(&username).await?;
    Ok(Json(profile))
}
