use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;

use super::SearchQuery;
use crate::infra::http::error::ApiError;
use crate::infra::http::extract::{ApiPath, ApiQuery};
use crate::infra::http::state::HttpState;

pub async fn list_tags(
    State(state): State<HttpState>,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let tags = state.tags.list(query.search.as_deref()).await?;
    Ok(Json(tags))
}

pub async fn get_tag(
    State(state): State<HttpState>,
    ApiPath(name): ApiPath<String>,
) -> Result<impl IntoResponse, ApiError> {
    let tag = state.tags.get(&name).await?;
    Ok(Json(tag))
}
