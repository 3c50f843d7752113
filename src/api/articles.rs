//! Article API endpoints
//!
//! Authenticated CRUD plus version lifecycle, and the public read-only
//! surface over published articles.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::middleware::{ApiError, AppState, CurrentUser};
use crate::models::{ArticleListParams, SortOrder, VersionStatus};

#[derive(Debug, Deserialize)]
pub struct CreateArticleRequest {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateVersionRequest {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListQuery {
    pub status: Option<String>,
    pub author_id: Option<i64>,
    pub tag_id: Option<i64>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
}

impl ListQuery {
    fn into_params(self) -> Result<ArticleListParams, ApiError> {
        let status = match self.status.as_deref() {
            Some(raw) => Some(
                VersionStatus::parse(raw)
                    .ok_or_else(|| ApiError::validation_error(format!("Unknown status: {raw}")))?,
            ),
            None => None,
        };

        let mut params = ArticleListParams::new(self.page.unwrap_or(1), self.limit.unwrap_or(20));
        params.status = status;
        params.author_id = self.author_id;
        params.tag_id = self.tag_id;
        params.sort_by = self.sort_by;
        params.sort_order = self.sort_order.unwrap_or_default();
        Ok(params)
    }
}

fn paged_json<T: serde::Serialize>(result: crate::models::PagedResult<T>) -> Value {
    json!({
        "items": result.items,
        "total": result.total,
        "page": result.page,
        "limit": result.limit,
        "total_pages": result.total_pages(),
    })
}

/// POST /api/v1/articles
pub async fn create_article_handler(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<CreateArticleRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let article = state
        .article_service
        .create(user.user_id, &payload.title, &payload.content, &payload.tags)
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "article": article }))))
}

/// GET /api/v1/articles
pub async fn list_articles_handler(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let params = query.into_params()?;
    let result = state
        .article_service
        .list(params, user.user_id, user.role)
        .await?;
    Ok(Json(paged_json(result)))
}

/// GET /api/v1/articles/{id}
pub async fn get_article_handler(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let article = state
        .article_service
        .get(id, user.user_id, user.role)
        .await?;
    Ok(Json(json!({ "article": article })))
}

/// DELETE /api/v1/articles/{id}
pub async fn delete_article_handler(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .article_service
        .delete(id, user.user_id, user.role)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/articles/{id}/versions
pub async fn create_version_handler(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(payload): Json<CreateVersionRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let version = state
        .article_service
        .add_version(
            id,
            user.user_id,
            user.role,
            &payload.title,
            &payload.content,
            &payload.tags,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "version": version }))))
}

/// GET /api/v1/articles/{id}/versions
pub async fn list_versions_handler(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let versions = state
        .article_service
        .list_versions(id, user.user_id, user.role)
        .await?;
    Ok(Json(json!({ "versions": versions })))
}

/// GET /api/v1/articles/{id}/versions/{version_id}
pub async fn get_version_handler(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path((id, version_id)): Path<(i64, i64)>,
) -> Result<Json<Value>, ApiError> {
    let version = state
        .article_service
        .get_version(id, version_id, user.user_id, user.role)
        .await?;
    Ok(Json(json!({ "version": version })))
}

/// PUT /api/v1/articles/{id}/versions/{version_id}/status
pub async fn update_version_status_handler(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path((id, version_id)): Path<(i64, i64)>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, ApiError> {
    let status = VersionStatus::parse(&payload.status).ok_or_else(|| {
        ApiError::validation_error(format!("Unknown status: {}", payload.status))
    })?;

    let version = state
        .article_service
        .update_version_status(id, version_id, user.user_id, user.role, status)
        .await?;
    Ok(Json(json!({ "version": version })))
}

/// GET /api/v1/public/articles
pub async fn list_public_articles_handler(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let params = query.into_params()?;
    let result = state.article_service.list_published(params).await?;
    Ok(Json(paged_json(result)))
}

/// GET /api/v1/public/articles/{id}
pub async fn get_public_article_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let article = state.article_service.get_published(id).await?;
    Ok(Json(json!({ "article": article })))
}
