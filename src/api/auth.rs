//! Auth API endpoints

use axum::{extract::State, Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::middleware::{ApiError, AppState, CurrentUser};
use crate::models::UserRole;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<UserRole>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// POST /api/v1/auth/register
pub async fn register_handler(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<Value>, ApiError> {
    let result = state
        .auth_service
        .register(
            &payload.username,
            &payload.email,
            &payload.password,
            payload.role,
        )
        .await?;

    Ok(Json(json!({
        "token": result.token,
        "user": result.user,
    })))
}

/// POST /api/v1/auth/login
pub async fn login_handler(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let result = state
        .auth_service
        .login(&payload.username, &payload.password)
        .await?;

    Ok(Json(json!({
        "token": result.token,
        "user": result.user,
    })))
}

/// GET /api/v1/profile
pub async fn profile_handler(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Value>, ApiError> {
    let profile = state.auth_service.get_profile(user.user_id).await?;
    Ok(Json(json!({ "user": profile })))
}
