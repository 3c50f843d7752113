//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api/v1`. Authenticated routes require a
//! bearer token; the `/public` group and tag reads are open.

pub mod articles;
pub mod auth;
pub mod middleware;
pub mod tags;

use axum::{
    http::{header, Method},
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use middleware::{ApiError, AppState, CurrentUser};

/// GET /health
async fn health_handler(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<Json<Value>, ApiError> {
    state
        .pool
        .ping()
        .await
        .map_err(|e| ApiError::internal_error(format!("Database unavailable: {e}")))?;
    Ok(Json(json!({ "status": "ok" })))
}

/// Build the `/api/v1` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Routes requiring a valid token
    let protected_routes = Router::new()
        .route("/profile", get(auth::profile_handler))
        .route("/articles", post(articles::create_article_handler))
        .route("/articles", get(articles::list_articles_handler))
        .route("/articles/{id}", get(articles::get_article_handler))
        .route("/articles/{id}", delete(articles::delete_article_handler))
        .route(
            "/articles/{id}/versions",
            post(articles::create_version_handler),
        )
        .route(
            "/articles/{id}/versions",
            get(articles::list_versions_handler),
        )
        .route(
            "/articles/{id}/versions/{version_id}",
            get(articles::get_version_handler),
        )
        .route(
            "/articles/{id}/versions/{version_id}/status",
            put(articles::update_version_status_handler),
        )
        .route("/tags", post(tags::create_tag_handler))
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_auth,
        ));

    // Public routes
    Router::new()
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/tags", get(tags::list_tags_handler))
        .route("/tags/{id}", get(tags::get_tag_handler))
        .route(
            "/public/articles",
            get(articles::list_public_articles_handler),
        )
        .route(
            "/public/articles/{id}",
            get(articles::get_public_article_handler),
        )
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api/v1", build_api_router(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
