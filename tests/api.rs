//! End-to-end API tests over an in-memory SQLite database.

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};
use verso::api::{self, AppState};
use verso::config::Config;
use verso::db::{create_test_pool, migrations};

async fn spawn_server() -> TestServer {
    let pool = create_test_pool().await.expect("Failed to create test pool");
    migrations::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    let mut config = Config::default();
    config.auth.jwt_secret = "integration-test-secret".to_string();

    let app = api::build_router(AppState::build(pool, &config));
    TestServer::new(app).expect("Failed to start test server")
}

/// Register a user and return a bearer token.
async fn register(server: &TestServer, username: &str, role: Option<&str>) -> String {
    let mut body = json!({
        "username": username,
        "email": format!("{username}@example.com"),
        "password": "password123",
    });
    if let Some(role) = role {
        body["role"] = json!(role);
    }

    let response = server.post("/api/v1/auth/register").json(&body).await;
    response.assert_status(StatusCode::OK);
    response.json::<Value>()["token"]
        .as_str()
        .expect("Token missing")
        .to_string()
}

async fn create_article(server: &TestServer, token: &str, title: &str, tags: &[&str]) -> Value {
    let response = server
        .post("/api/v1/articles")
        .authorization_bearer(token)
        .json(&json!({
            "title": title,
            "content": "Some body text",
            "tags": tags,
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()["article"].clone()
}

async fn publish(server: &TestServer, token: &str, article_id: i64, version_id: i64) {
    let response = server
        .put(&format!(
            "/api/v1/articles/{article_id}/versions/{version_id}/status"
        ))
        .authorization_bearer(token)
        .json(&json!({ "status": "published" }))
        .await;
    response.assert_status(StatusCode::OK);
}

#[tokio::test]
async fn test_health() {
    let server = spawn_server().await;
    let response = server.get("/health").await;
    response.assert_status(StatusCode::OK);
}

#[tokio::test]
async fn test_register_login_profile() {
    let server = spawn_server().await;
    register(&server, "alice", None).await;

    let response = server
        .post("/api/v1/auth/login")
        .json(&json!({ "username": "alice", "password": "password123" }))
        .await;
    response.assert_status(StatusCode::OK);
    let token = response.json::<Value>()["token"].as_str().unwrap().to_string();

    let response = server
        .get("/api/v1/profile")
        .authorization_bearer(&token)
        .await;
    response.assert_status(StatusCode::OK);
    let profile = response.json::<Value>();
    assert_eq!(profile["user"]["username"], "alice");
    assert_eq!(profile["user"]["role"], "writer");
    // The password hash must never leave the server
    assert!(profile["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_duplicate_registration_conflict() {
    let server = spawn_server().await;
    register(&server, "alice", None).await;

    let response = server
        .post("/api/v1/auth/register")
        .json(&json!({
            "username": "alice",
            "email": "other@example.com",
            "password": "password123",
        }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let server = spawn_server().await;

    let response = server.get("/api/v1/articles").await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = server
        .get("/api/v1/articles")
        .authorization_bearer("not-a-valid-token")
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_article_lifecycle() {
    let server = spawn_server().await;
    let token = register(&server, "writer", None).await;

    let article = create_article(&server, &token, "First post", &["rust", "web"]).await;
    let article_id = article["id"].as_i64().unwrap();
    let version = &article["latest_version"];
    let version_id = version["id"].as_i64().unwrap();
    assert_eq!(version["version_number"], 1);
    assert_eq!(version["status"], "draft");
    assert_eq!(version["tags"].as_array().unwrap().len(), 2);

    // Draft is invisible publicly
    let response = server
        .get(&format!("/api/v1/public/articles/{article_id}"))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    publish(&server, &token, article_id, version_id).await;

    // Published article is now public, and only the published version shows
    let response = server
        .get(&format!("/api/v1/public/articles/{article_id}"))
        .await;
    response.assert_status(StatusCode::OK);
    let public = response.json::<Value>();
    assert_eq!(public["article"]["published_version"]["status"], "published");
    assert!(public["article"].get("latest_version").is_none());

    let response = server.get("/api/v1/public/articles").await;
    response.assert_status(StatusCode::OK);
    assert_eq!(response.json::<Value>()["total"], 1);
}

#[tokio::test]
async fn test_new_version_and_archive_on_republish() {
    let server = spawn_server().await;
    let token = register(&server, "writer", None).await;

    let article = create_article(&server, &token, "Post", &[]).await;
    let article_id = article["id"].as_i64().unwrap();
    let v1_id = article["latest_version"]["id"].as_i64().unwrap();
    publish(&server, &token, article_id, v1_id).await;

    let response = server
        .post(&format!("/api/v1/articles/{article_id}/versions"))
        .authorization_bearer(&token)
        .json(&json!({ "title": "Post v2", "content": "Updated", "tags": ["rust"] }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let v2_id = response.json::<Value>()["version"]["id"].as_i64().unwrap();

    publish(&server, &token, article_id, v2_id).await;

    let response = server
        .get(&format!("/api/v1/articles/{article_id}/versions"))
        .authorization_bearer(&token)
        .await;
    response.assert_status(StatusCode::OK);
    let versions = response.json::<Value>()["versions"].clone();
    let versions = versions.as_array().unwrap();
    assert_eq!(versions.len(), 2);
    // Newest first; the old published version is archived
    assert_eq!(versions[0]["id"].as_i64().unwrap(), v2_id);
    assert_eq!(versions[0]["status"], "published");
    assert_eq!(versions[1]["status"], "archived_version");
}

#[tokio::test]
async fn test_invalid_status_rejected() {
    let server = spawn_server().await;
    let token = register(&server, "writer", None).await;

    let article = create_article(&server, &token, "Post", &[]).await;
    let article_id = article["id"].as_i64().unwrap();
    let version_id = article["latest_version"]["id"].as_i64().unwrap();

    let response = server
        .put(&format!(
            "/api/v1/articles/{article_id}/versions/{version_id}/status"
        ))
        .authorization_bearer(&token)
        .json(&json!({ "status": "live" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["error"]["code"],
        "VALIDATION_ERROR"
    );
}

#[tokio::test]
async fn test_writer_isolation_and_editor_access() {
    let server = spawn_server().await;
    let writer_token = register(&server, "writer", None).await;
    let other_token = register(&server, "other", None).await;
    let editor_token = register(&server, "editor", Some("editor")).await;

    let article = create_article(&server, &writer_token, "Private draft", &[]).await;
    let article_id = article["id"].as_i64().unwrap();

    // Another writer cannot read it
    let response = server
        .get(&format!("/api/v1/articles/{article_id}"))
        .authorization_bearer(&other_token)
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    // And sees an empty listing
    let response = server
        .get("/api/v1/articles")
        .authorization_bearer(&other_token)
        .await;
    assert_eq!(response.json::<Value>()["total"], 0);

    // An editor can do both
    let response = server
        .get(&format!("/api/v1/articles/{article_id}"))
        .authorization_bearer(&editor_token)
        .await;
    response.assert_status(StatusCode::OK);

    let response = server
        .get("/api/v1/articles")
        .authorization_bearer(&editor_token)
        .await;
    assert_eq!(response.json::<Value>()["total"], 1);
}

#[tokio::test]
async fn test_delete_article() {
    let server = spawn_server().await;
    let token = register(&server, "writer", None).await;

    let article = create_article(&server, &token, "Doomed", &[]).await;
    let article_id = article["id"].as_i64().unwrap();

    let response = server
        .delete(&format!("/api/v1/articles/{article_id}"))
        .authorization_bearer(&token)
        .await;
    response.assert_status(StatusCode::NO_CONTENT);

    let response = server
        .get(&format!("/api/v1/articles/{article_id}"))
        .authorization_bearer(&token)
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_tags_endpoints() {
    let server = spawn_server().await;
    let token = register(&server, "writer", None).await;

    // Creating a tag requires auth
    let response = server
        .post("/api/v1/tags")
        .json(&json!({ "name": "rust" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = server
        .post("/api/v1/tags")
        .authorization_bearer(&token)
        .json(&json!({ "name": "rust" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let tag_id = response.json::<Value>()["tag"]["id"].as_i64().unwrap();

    // Duplicates are rejected
    let response = server
        .post("/api/v1/tags")
        .authorization_bearer(&token)
        .json(&json!({ "name": "rust" }))
        .await;
    response.assert_status(StatusCode::CONFLICT);

    // Reads are public
    let response = server.get(&format!("/api/v1/tags/{tag_id}")).await;
    response.assert_status(StatusCode::OK);
    assert_eq!(response.json::<Value>()["tag"]["name"], "rust");

    let response = server.get("/api/v1/tags").await;
    response.assert_status(StatusCode::OK);
    assert_eq!(response.json::<Value>()["tags"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_trending_reflects_publishing() {
    let server = spawn_server().await;
    let token = register(&server, "writer", None).await;

    let article = create_article(&server, &token, "Tagged", &["rust"]).await;
    let article_id = article["id"].as_i64().unwrap();
    let version_id = article["latest_version"]["id"].as_i64().unwrap();

    // Draft usage doesn't count
    let response = server.get("/api/v1/tags").await;
    let tags = response.json::<Value>()["tags"].clone();
    assert_eq!(tags[0]["usage_count"], 0);

    publish(&server, &token, article_id, version_id).await;

    // Publishing triggers a refresh: usage and score move
    let response = server.get("/api/v1/tags").await;
    let tags = response.json::<Value>()["tags"].clone();
    assert_eq!(tags[0]["usage_count"], 1);
    assert!(tags[0]["trending_score"].as_f64().unwrap() > 0.9);
}

#[tokio::test]
async fn test_scores_reflect_corpus() {
    let server = spawn_server().await;
    let token = register(&server, "writer", None).await;

    // Build up a corpus where rust and web always co-occur
    create_article(&server, &token, "A", &["rust", "web"]).await;
    create_article(&server, &token, "B", &["rust", "web"]).await;
    let third = create_article(&server, &token, "C", &["rust", "web"]).await;

    let score = third["latest_version"]["tag_relationship_score"]
        .as_f64()
        .unwrap();
    // Perfectly co-occurring pair: pmi = ln(N * co / (f * f)) = ln(1) = 0
    assert!(score.abs() < 1e-9);

    // A single-tag article always scores zero
    let solo = create_article(&server, &token, "D", &["solo"]).await;
    assert_eq!(
        solo["latest_version"]["tag_relationship_score"].as_f64().unwrap(),
        0.0
    );
}
