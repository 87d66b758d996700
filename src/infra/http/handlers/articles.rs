use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use uuid::Uuid;

use agora_api_types::{ArticleCreateRequest, ArticleUpdateRequest, VoteRequest};

use crate::application::repos::ArticleFilter;
use crate::domain::types::ContentKind;
use crate::infra::http::error::ApiError;
use crate::infra::http::extract::{ApiJson, ApiPath, ApiQuery};
use crate::infra::http::middleware::{CurrentUser, MaybeUser};
use crate::infra::http::state::HttpState;

#[derive(Debug, Deserialize)]
pub struct ArticleListQuery {
    pub search: Option<String>,
    pub community_id: Option<Uuid>,
}

pub async fn list_articles(
    State(state): State<HttpState>,
    ApiQuery(query): ApiQuery<ArticleListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let articles = state
        .articles
        .list(ArticleFilter {
            search: query.search,
            community_id: query.community_id,
        })
        .await?;
    Ok(Json(articles))
}

pub async fn create_article(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
    ApiJson(payload): ApiJson<ArticleCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let article = state.articles.create(&principal, payload).await?;
    Ok((StatusCode::CREATED, Json(article)))
}

pub async fn get_article(
    State(state): State<HttpState>,
    viewer: MaybeUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let article = state.articles.get(id, viewer.user_id()).await?;
    Ok(Json(article))
}

pub async fn update_article(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<ArticleUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let article = state.articles.edit(&principal, id, payload).await?;
    Ok(Json(article))
}

pub async fn delete_article(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.articles.delete(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn vote_article(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<VoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tally = state
        .votes
        .vote(&principal, ContentKind::Article, id, payload.direction)
        .await?;
    Ok(Json(tally))
}
