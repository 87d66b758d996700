use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use agora_api_types::CommunityCreateRequest;

use super::SearchQuery;
use crate::infra::http::error::ApiError;
use crate::infra::http::extract::{ApiJson, ApiPath, ApiQuery};
use crate::infra::http::middleware::{CurrentUser, MaybeUser};
use crate::infra::http::state::HttpState;

pub async fn list_communities(
    State(state): State<HttpState>,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let communities = state.communities.list(query.search.as_deref()).await?;
    Ok(Json(communities))
}

pub async fn create_community(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
    ApiJson(payload): ApiJson<CommunityCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let community = state.communities.create(&principal, payload).await?;
    Ok((StatusCode::CREATED, Json(community)))
}

pub async fn get_community(
    State(state): State<HttpState>,
    viewer: MaybeUser,
    ApiPath(slug): ApiPath<String>,
) -> Result<impl IntoResponse, ApiError> {
    let community = state.communities.get(&slug, viewer.user_id()).await?;
    Ok(Json(community))
}

pub async fn list_members(
    State(state): State<HttpState>,
    ApiPath(slug): ApiPath<String>,
) -> Result<impl IntoResponse, ApiError> {
    let members = state.communities.members(&slug).await?;
    Ok(Json(members))
}

pub async fn join_community(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
    ApiPath(slug): ApiPath<String>,
) -> Result<impl IntoResponse, ApiError> {
    let community = state.communities.join(&principal, &slug).await?;
    Ok(Json(community))
}

pub async fn leave_community(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
    ApiPath(slug): ApiPath<String>,
) -> Result<impl IntoResponse, ApiError> {
    let community = state.communities.leave(&principal, &slug).await?;
    Ok(Json(community))
}
