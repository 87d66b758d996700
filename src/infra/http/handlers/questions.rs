use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use uuid::Uuid;

use agora_api_types::{
    AcceptAnswerRequest, QuestionCreateRequest, QuestionUpdateRequest, VoteRequest,
};

use crate::application::pagination::{OffsetCursor, PageRequest};
use crate::application::questions::QuestionQuery;
use crate::application::repos::QuestionFilter;
use crate::domain::types::{ContentKind, QuestionOrder};
use crate::infra::http::error::ApiError;
use crate::infra::http::extract::{ApiJson, ApiPath, ApiQuery};
use crate::infra::http::middleware::{CurrentUser, MaybeUser};
use crate::infra::http::state::HttpState;

#[derive(Debug, Deserialize)]
pub struct QuestionListQuery {
    pub order: Option<QuestionOrder>,
    pub search: Option<String>,
    pub tag: Option<String>,
    pub community_id: Option<Uuid>,
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

pub async fn list_questions(
    State(state): State<HttpState>,
    ApiQuery(query): ApiQuery<QuestionListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let cursor = query
        .cursor
        .as_deref()
        .map(OffsetCursor::decode)
        .transpose()?;

    let page = state
        .questions
        .list(
            QuestionQuery {
                order: query.order.unwrap_or_default(),
                filter: QuestionFilter {
                    search: query.search,
                    tag: query.tag,
                    community_id: query.community_id,
                },
            },
            PageRequest::new(query.limit, cursor),
        )
        .await?;

    Ok(Json(page))
}

pub async fn create_question(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
    ApiJson(payload): ApiJson<QuestionCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state.questions.ask(&principal, payload).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn get_question(
    State(state): State<HttpState>,
    viewer: MaybeUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state.questions.get(id, viewer.user_id()).await?;
    Ok(Json(detail))
}

pub async fn update_question(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<QuestionUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state.questions.edit(&principal, id, payload).await?;
    Ok(Json(detail))
}

pub async fn delete_question(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.questions.delete(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn vote_question(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<VoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tally = state
        .votes
        .vote(&principal, ContentKind::Question, id, payload.direction)
        .await?;
    Ok(Json(tally))
}

pub async fn accept_answer(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<AcceptAnswerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .questions
        .accept_answer(&principal, id, payload.answer_id)
        .await?;
    Ok(Json(outcome))
}
