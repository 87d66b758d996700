use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use uuid::Uuid;

use agora_api_types::{PollCreateRequest, PollVoteRequest};

use crate::application::repos::PollFilter;
use crate::domain::types::PollStatus;
use crate::infra::http::error::ApiError;
use crate::infra::http::extract::{ApiJson, ApiPath, ApiQuery};
use crate::infra::http::middleware::{CurrentUser, MaybeUser};
use crate::infra::http::state::HttpState;

#[derive(Debug, Deserialize)]
pub struct PollListQuery {
    pub status: Option<PollStatus>,
    pub community_id: Option<Uuid>,
}

pub async fn list_polls(
    State(state): State<HttpState>,
    ApiQuery(query): ApiQuery<PollListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let polls = state
        .polls
        .list(PollFilter {
            status: query.status,
            community_id: query.community_id,
        })
        .await?;
    Ok(Json(polls))
}

pub async fn create_poll(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
    ApiJson(payload): ApiJson<PollCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let poll = state.polls.create(&principal, payload).await?;
    Ok((StatusCode::CREATED, Json(poll)))
}

pub async fn get_poll(
    State(state): State<HttpState>,
    viewer: MaybeUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let poll = state.polls.get(id, viewer.user_id()).await?;
    Ok(Json(poll))
}

pub async fn vote_poll(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<PollVoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let poll = state
        .polls
        .vote(&principal, id, payload.option_id)
        .await?;
    Ok(Json(poll))
}

pub async fn close_poll(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let poll = state.polls.close(&principal, id).await?;
    Ok(Json(poll))
}
