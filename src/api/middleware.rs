//! API middleware
//!
//! Shared application state, the JSON error envelope, and the
//! authentication/authorization middleware.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::UserRole;
use crate::services::{
    ArticleService, ArticleServiceError, AuthService, AuthServiceError, TagService,
    TagServiceError, TrendingUpdater,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: crate::db::DynDatabasePool,
    pub auth_service: Arc<AuthService>,
    pub article_service: Arc<ArticleService>,
    pub tag_service: Arc<TagService>,
    pub trending: Arc<TrendingUpdater>,
}

impl AppState {
    /// Wire up all services over a connected pool.
    pub fn build(pool: crate::db::DynDatabasePool, config: &crate::config::Config) -> Self {
        use crate::db::repositories::{
            SqlxArticleRepository, SqlxCorpusStatsRepository, SqlxTagRepository,
            SqlxUserRepository, SqlxVersionRepository,
        };
        use crate::services::RelationshipScorer;

        let tags = SqlxTagRepository::boxed(pool.clone());
        let corpus = SqlxCorpusStatsRepository::boxed(pool.clone());

        let auth_service = Arc::new(AuthService::new(
            SqlxUserRepository::boxed(pool.clone()),
            config.auth.jwt_secret.clone(),
            config.auth.token_ttl_hours,
        ));
        let tag_service = Arc::new(TagService::new(tags.clone()));
        let trending = Arc::new(TrendingUpdater::new(
            tags.clone(),
            corpus.clone(),
            config.trending.decay_factor,
        ));
        let article_service = Arc::new(ArticleService::new(
            SqlxArticleRepository::boxed(pool.clone()),
            SqlxVersionRepository::boxed(pool.clone()),
            tags,
            tag_service.clone(),
            Arc::new(RelationshipScorer::new(corpus)),
            trending.clone(),
        ));

        Self {
            pool,
            auth_service,
            article_service,
            tag_service,
            trending,
        }
    }
}

/// Authenticated caller, extracted from a verified token and stored in
/// request extensions by [`require_auth`].
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: i64,
    pub username: String,
    pub role: UserRole,
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

impl From<AuthServiceError> for ApiError {
    fn from(err: AuthServiceError) -> Self {
        match err {
            AuthServiceError::UsernameTaken(_) | AuthServiceError::EmailTaken(_) => {
                ApiError::conflict(err.to_string())
            }
            AuthServiceError::InvalidCredentials => ApiError::unauthorized(err.to_string()),
            AuthServiceError::InvalidToken => ApiError::unauthorized(err.to_string()),
            AuthServiceError::UserNotFound => ApiError::not_found(err.to_string()),
            AuthServiceError::ValidationError(_) => ApiError::validation_error(err.to_string()),
            AuthServiceError::InternalError(e) => {
                tracing::error!("Auth internal error: {:#}", e);
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

impl From<ArticleServiceError> for ApiError {
    fn from(err: ArticleServiceError) -> Self {
        match err {
            ArticleServiceError::NotFound(_) | ArticleServiceError::VersionNotFound(_) => {
                ApiError::not_found(err.to_string())
            }
            ArticleServiceError::Forbidden => ApiError::forbidden(err.to_string()),
            ArticleServiceError::ValidationError(_) => ApiError::validation_error(err.to_string()),
            ArticleServiceError::InvalidTransition { .. } => {
                ApiError::validation_error(err.to_string())
            }
            ArticleServiceError::InternalError(e) => {
                tracing::error!("Article internal error: {:#}", e);
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

impl From<TagServiceError> for ApiError {
    fn from(err: TagServiceError) -> Self {
        match err {
            TagServiceError::NotFound(_) => ApiError::not_found(err.to_string()),
            TagServiceError::AlreadyExists(_) => ApiError::conflict(err.to_string()),
            TagServiceError::ValidationError(_) => ApiError::validation_error(err.to_string()),
            TagServiceError::InternalError(e) => {
                tracing::error!("Tag internal error: {:#}", e);
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

/// Extract the bearer token from the Authorization header
fn extract_bearer_token(request: &Request) -> Option<String> {
    let auth_header = request.headers().get(header::AUTHORIZATION)?;
    let auth_str = auth_header.to_str().ok()?;
    auth_str.strip_prefix("Bearer ").map(str::to_string)
}

/// Authentication middleware: verifies the JWT and stores the caller in
/// request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(&request)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let claims = state.auth_service.verify_token(&token)?;

    request.extensions_mut().insert(CurrentUser {
        user_id: claims.user_id,
        username: claims.username,
        role: claims.role,
    });

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_envelope_shape() {
        let error = ApiError::not_found("Article not found: 7");
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["error"]["code"], "NOT_FOUND");
        assert_eq!(json["error"]["message"], "Article not found: 7");
        assert!(json["error"].get("details").is_none());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::unauthorized("x").into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::validation_error("x").into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::conflict("x").into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::internal_error("x").into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
