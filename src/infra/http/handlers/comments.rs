//! Comment routes. Listing and posting are nested under each commentable
//! resource; deletion and voting address the comment directly.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use agora_api_types::{CommentCreateRequest, VoteRequest};

use crate::application::auth::Principal;
use crate::domain::types::ContentKind;
use crate::infra::http::error::ApiError;
use crate::infra::http::extract::{ApiJson, ApiPath};
use crate::infra::http::middleware::CurrentUser;
use crate::infra::http::state::HttpState;

async fn list_for(
    state: &HttpState,
    kind: ContentKind,
    target_id: Uuid,
) -> Result<Response, ApiError> {
    let comments = state.comments.list(kind, target_id).await?;
    Ok(Json(comments).into_response())
}

async fn add_to(
    state: &HttpState,
    principal: &Principal,
    kind: ContentKind,
    target_id: Uuid,
    payload: CommentCreateRequest,
) -> Result<Response, ApiError> {
    let comment = state
        .comments
        .add(principal, kind, target_id, &payload.body)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)).into_response())
}

pub async fn list_question_comments(
    State(state): State<HttpState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Response, ApiError> {
    list_for(&state, ContentKind::Question, id).await
}

pub async fn add_question_comment(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<CommentCreateRequest>,
) -> Result<Response, ApiError> {
    add_to(&state, &principal, ContentKind::Question, id, payload).await
}

pub async fn list_answer_comments(
    State(state): State<HttpState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Response, ApiError> {
    list_for(&state, ContentKind::Answer, id).await
}

pub async fn add_answer_comment(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<CommentCreateRequest>,
) -> Result<Response, ApiError> {
    add_to(&state, &principal, ContentKind::Answer, id, payload).await
}

pub async fn list_article_comments(
    State(state): State<HttpState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Response, ApiError> {
    list_for(&state, ContentKind::Article, id).await
}

pub async fn add_article_comment(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<CommentCreateRequest>,
) -> Result<Response, ApiError> {
    add_to(&state, &principal, ContentKind::Article, id, payload).await
}

pub async fn delete_comment(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.comments.delete(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn vote_comment(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<VoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tally = state
        .votes
        .vote(&principal, ContentKind::Comment, id, payload.direction)
        .await?;
    Ok(Json(tally))
}
