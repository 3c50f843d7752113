//! Tag API endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::middleware::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateTagRequest {
    pub name: String,
}

/// POST /api/v1/tags
pub async fn create_tag_handler(
    State(state): State<AppState>,
    Json(payload): Json<CreateTagRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let tag = state.tag_service.create(&payload.name).await?;
    Ok((StatusCode::CREATED, Json(json!({ "tag": tag }))))
}

/// GET /api/v1/tags
///
/// Tags sorted by trending score, most trending first.
pub async fn list_tags_handler(
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let tags = state.tag_service.list().await?;
    Ok(Json(json!({ "tags": tags })))
}

/// GET /api/v1/tags/{id}
pub async fn get_tag_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let tag = state.tag_service.get(id).await?;
    Ok(Json(json!({ "tag": tag })))
}
