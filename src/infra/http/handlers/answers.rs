use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use uuid::Uuid;

use agora_api_types::{AnswerCreateRequest, VoteRequest};

use crate::domain::types::ContentKind;
use crate::infra::http::error::ApiError;
use crate::infra::http::extract::{ApiJson, ApiPath, ApiQuery};
use crate::infra::http::middleware::{CurrentUser, MaybeUser};
use crate::infra::http::state::HttpState;

#[derive(Debug, Deserialize)]
pub struct AnswerListQuery {
    pub question_id: Uuid,
}

pub async fn list_answers(
    State(state): State<HttpState>,
    viewer: MaybeUser,
    ApiQuery(query): ApiQuery<AnswerListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let answers = state
        .answers
        .list(query.question_id, viewer.user_id())
        .await?;
    Ok(Json(answers))
}

pub async fn create_answer(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
    ApiJson(payload): ApiJson<AnswerCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let answer = state.answers.post(&principal, payload).await?;
    Ok((StatusCode::CREATED, Json(answer)))
}

pub async fn delete_answer(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.answers.delete(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn vote_answer(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<VoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tally = state
        .votes
        .vote(&principal, ContentKind::Answer, id, payload.direction)
        .await?;
    Ok(Json(tally))
}
