use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::pagination::{NotificationCursor, PageRequest};
use crate::infra::http::error::ApiError;
use crate::infra::http::extract::{ApiPath, ApiQuery};
use crate::infra::http::middleware::CurrentUser;
use crate::infra::http::state::HttpState;

#[derive(Debug, Deserialize)]
pub struct NotificationListQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
struct UnreadCount {
    unread: i64,
}

#[derive(Debug, Serialize)]
struct MarkedRead {
    updated: u64,
}

pub async fn list_notifications(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
    ApiQuery(query): ApiQuery<NotificationListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let cursor = query
        .cursor
        .as_deref()
        .map(NotificationCursor::decode)
        .transpose()?;

    let page = state
        .notifications
        .list(
            principal.user_id,
            query.unread_only,
            PageRequest::new(query.limit, cursor),
        )
        .await?;
    Ok(Json(page))
}

pub async fn unread_count(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let unread = state.notifications.unread_count(principal.user_id).await?;
    Ok(Json(UnreadCount { unread }))
}

pub async fn mark_read(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.notifications.mark_read(principal.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_read(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let updated = state.notifications.mark_all_read(principal.user_id).await?;
    Ok(Json(MarkedRead { updated }))
}
