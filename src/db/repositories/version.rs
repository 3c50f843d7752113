//! Article version repository
//!
//! Database operations for article versions. Version numbers are assigned
//! here, monotonically per article, at insert time.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{ArticleVersion, VersionStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Article version repository trait
#[async_trait]
pub trait VersionRepository: Send + Sync {
    /// Create a new version for an article. The version number is assigned
    /// automatically as one past the article's current maximum.
    async fn create(&self, article_id: i64, title: &str, content: &str)
        -> Result<ArticleVersion>;

    /// Get version by ID (tags not populated)
    async fn get_by_id(&self, id: i64) -> Result<Option<ArticleVersion>>;

    /// List all versions of an article, newest first (tags not populated)
    async fn list_by_article(&self, article_id: i64) -> Result<Vec<ArticleVersion>>;

    /// Update a version's status and published timestamp
    async fn update_status(
        &self,
        id: i64,
        status: VersionStatus,
        published_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// Store a freshly computed tag relationship score
    async fn set_score(&self, id: i64, score: f64) -> Result<()>;

    /// Attach tags to a version
    async fn attach_tags(&self, version_id: i64, tag_ids: &[i64]) -> Result<()>;

    /// Soft-delete all versions of an article
    async fn soft_delete_by_article(&self, article_id: i64) -> Result<()>;
}

/// SQLx-based version repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxVersionRepository {
    pool: DynDatabasePool,
}

impl SqlxVersionRepository {
    /// Create a new SQLx version repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn VersionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl VersionRepository for SqlxVersionRepository {
    async fn create(
        &self,
        article_id: i64,
        title: &str,
        content: &str,
    ) -> Result<ArticleVersion> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_version_sqlite(self.pool.as_sqlite().unwrap(), article_id, title, content)
                    .await
            }
            DatabaseDriver::Mysql => {
                create_version_mysql(self.pool.as_mysql().unwrap(), article_id, title, content)
                    .await
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ArticleVersion>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_version_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await
            }
            DatabaseDriver::Mysql => {
                get_version_by_id_mysql(self.pool.as_mysql().unwrap(), id).await
            }
        }
    }

    async fn list_by_article(&self, article_id: i64) -> Result<Vec<ArticleVersion>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_versions_sqlite(self.pool.as_sqlite().unwrap(), article_id).await
            }
            DatabaseDriver::Mysql => {
                list_versions_mysql(self.pool.as_mysql().unwrap(), article_id).await
            }
        }
    }

    async fn update_status(
        &self,
        id: i64,
        status: VersionStatus,
        published_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_status_sqlite(self.pool.as_sqlite().unwrap(), id, status, published_at)
                    .await
            }
            DatabaseDriver::Mysql => {
                update_status_mysql(self.pool.as_mysql().unwrap(), id, status, published_at).await
            }
        }
    }

    async fn set_score(&self, id: i64, score: f64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                set_score_sqlite(self.pool.as_sqlite().unwrap(), id, score).await
            }
            DatabaseDriver::Mysql => {
                set_score_mysql(self.pool.as_mysql().unwrap(), id, score).await
            }
        }
    }

    async fn attach_tags(&self, version_id: i64, tag_ids: &[i64]) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                attach_tags_sqlite(self.pool.as_sqlite().unwrap(), version_id, tag_ids).await
            }
            DatabaseDriver::Mysql => {
                attach_tags_mysql(self.pool.as_mysql().unwrap(), version_id, tag_ids).await
            }
        }
    }

    async fn soft_delete_by_article(&self, article_id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                soft_delete_by_article_sqlite(self.pool.as_sqlite().unwrap(), article_id).await
            }
            DatabaseDriver::Mysql => {
                soft_delete_by_article_mysql(self.pool.as_mysql().unwrap(), article_id).await
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_version_sqlite(
    pool: &SqlitePool,
    article_id: i64,
    title: &str,
    content: &str,
) -> Result<ArticleVersion> {
    let now = Utc::now();

    let row = sqlx::query(
        "SELECT COALESCE(MAX(version_number), 0) as max_version \
         FROM article_versions WHERE article_id = ?",
    )
    .bind(article_id)
    .fetch_one(pool)
    .await
    .context("Failed to get max version number")?;
    let version_number = row.get::<i64, _>("max_version") as i32 + 1;

    let result = sqlx::query(
        r#"
        INSERT INTO article_versions
            (article_id, version_number, title, content, status,
             tag_relationship_score, created_at, updated_at)
        VALUES (?, ?, ?, ?, 'draft', 0, ?, ?)
        "#,
    )
    .bind(article_id)
    .bind(version_number)
    .bind(title)
    .bind(content)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create article version")?;

    Ok(ArticleVersion {
        id: result.last_insert_rowid(),
        article_id,
        version_number,
        title: title.to_string(),
        content: content.to_string(),
        status: VersionStatus::Draft,
        tag_relationship_score: 0.0,
        tags: Vec::new(),
        published_at: None,
        created_at: now,
        updated_at: now,
    })
}

async fn get_version_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<ArticleVersion>> {
    let row = sqlx::query(
        r#"
        SELECT id, article_id, version_number, title, content, status,
               tag_relationship_score, published_at, created_at, updated_at
        FROM article_versions
        WHERE id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get version by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_version_sqlite(&row))),
        None => Ok(None),
    }
}

async fn list_versions_sqlite(pool: &SqlitePool, article_id: i64) -> Result<Vec<ArticleVersion>> {
    let rows = sqlx::query(
        r#"
        SELECT id, article_id, version_number, title, content, status,
               tag_relationship_score, published_at, created_at, updated_at
        FROM article_versions
        WHERE article_id = ? AND deleted_at IS NULL
        ORDER BY version_number DESC
        "#,
    )
    .bind(article_id)
    .fetch_all(pool)
    .await
    .context("Failed to list versions")?;

    Ok(rows.iter().map(row_to_version_sqlite).collect())
}

async fn update_status_sqlite(
    pool: &SqlitePool,
    id: i64,
    status: VersionStatus,
    published_at: Option<DateTime<Utc>>,
) -> Result<()> {
    sqlx::query(
        "UPDATE article_versions SET status = ?, published_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(status.as_str())
    .bind(published_at)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update version status")?;
    Ok(())
}

async fn set_score_sqlite(pool: &SqlitePool, id: i64, score: f64) -> Result<()> {
    sqlx::query(
        "UPDATE article_versions SET tag_relationship_score = ?, updated_at = ? WHERE id = ?",
    )
    .bind(score)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to set version score")?;
    Ok(())
}

async fn attach_tags_sqlite(pool: &SqlitePool, version_id: i64, tag_ids: &[i64]) -> Result<()> {
    for tag_id in tag_ids {
        sqlx::query(
            "INSERT OR IGNORE INTO article_version_tags (article_version_id, tag_id) \
             VALUES (?, ?)",
        )
        .bind(version_id)
        .bind(tag_id)
        .execute(pool)
        .await
        .context("Failed to attach tag to version")?;
    }
    Ok(())
}

async fn soft_delete_by_article_sqlite(pool: &SqlitePool, article_id: i64) -> Result<()> {
    sqlx::query(
        "UPDATE article_versions SET deleted_at = ? WHERE article_id = ? AND deleted_at IS NULL",
    )
    .bind(Utc::now())
    .bind(article_id)
    .execute(pool)
    .await
    .context("Failed to soft-delete versions")?;
    Ok(())
}

fn row_to_version_sqlite(row: &sqlx::sqlite::SqliteRow) -> ArticleVersion {
    let status: String = row.get("status");
    ArticleVersion {
        id: row.get("id"),
        article_id: row.get("article_id"),
        version_number: row.get("version_number"),
        title: row.get("title"),
        content: row.get("content"),
        status: VersionStatus::parse(&status).unwrap_or_default(),
        tag_relationship_score: row.get("tag_relationship_score"),
        tags: Vec::new(),
        published_at: row.get("published_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_version_mysql(
    pool: &MySqlPool,
    article_id: i64,
    title: &str,
    content: &str,
) -> Result<ArticleVersion> {
    let now = Utc::now();

    let row = sqlx::query(
        "SELECT COALESCE(MAX(version_number), 0) as max_version \
         FROM article_versions WHERE article_id = ?",
    )
    .bind(article_id)
    .fetch_one(pool)
    .await
    .context("Failed to get max version number")?;
    let version_number = row.get::<i64, _>("max_version") as i32 + 1;

    let result = sqlx::query(
        r#"
        INSERT INTO article_versions
            (article_id, version_number, title, content, status,
             tag_relationship_score, created_at, updated_at)
        VALUES (?, ?, ?, ?, 'draft', 0, ?, ?)
        "#,
    )
    .bind(article_id)
    .bind(version_number)
    .bind(title)
    .bind(content)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create article version")?;

    Ok(ArticleVersion {
        id: result.last_insert_id() as i64,
        article_id,
        version_number,
        title: title.to_string(),
        content: content.to_string(),
        status: VersionStatus::Draft,
        tag_relationship_score: 0.0,
        tags: Vec::new(),
        published_at: None,
        created_at: now,
        updated_at: now,
    })
}

async fn get_version_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<ArticleVersion>> {
    let row = sqlx::query(
        r#"
        SELECT id, article_id, version_number, title, content, status,
               tag_relationship_score, published_at, created_at, updated_at
        FROM article_versions
        WHERE id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get version by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_version_mysql(&row))),
        None => Ok(None),
    }
}

async fn list_versions_mysql(pool: &MySqlPool, article_id: i64) -> Result<Vec<ArticleVersion>> {
    let rows = sqlx::query(
        r#"
        SELECT id, article_id, version_number, title, content, status,
               tag_relationship_score, published_at, created_at, updated_at
        FROM article_versions
        WHERE article_id = ? AND deleted_at IS NULL
        ORDER BY version_number DESC
        "#,
    )
    .bind(article_id)
    .fetch_all(pool)
    .await
    .context("Failed to list versions")?;

    Ok(rows.iter().map(row_to_version_mysql).collect())
}

async fn update_status_mysql(
    pool: &MySqlPool,
    id: i64,
    status: VersionStatus,
    published_at: Option<DateTime<Utc>>,
) -> Result<()> {
    sqlx::query(
        "UPDATE article_versions SET status = ?, published_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(status.as_str())
    .bind(published_at)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update version status")?;
    Ok(())
}

async fn set_score_mysql(pool: &MySqlPool, id: i64, score: f64) -> Result<()> {
    sqlx::query(
        "UPDATE article_versions SET tag_relationship_score = ?, updated_at = ? WHERE id = ?",
    )
    .bind(score)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to set version score")?;
    Ok(())
}

async fn attach_tags_mysql(pool: &MySqlPool, version_id: i64, tag_ids: &[i64]) -> Result<()> {
    for tag_id in tag_ids {
        sqlx::query(
            "INSERT IGNORE INTO article_version_tags (article_version_id, tag_id) VALUES (?, ?)",
        )
        .bind(version_id)
        .bind(tag_id)
        .execute(pool)
        .await
        .context("Failed to attach tag to version")?;
    }
    Ok(())
}

async fn soft_delete_by_article_mysql(pool: &MySqlPool, article_id: i64) -> Result<()> {
    sqlx::query(
        "UPDATE article_versions SET deleted_at = ? WHERE article_id = ? AND deleted_at IS NULL",
    )
    .bind(Utc::now())
    .bind(article_id)
    .execute(pool)
    .await
    .context("Failed to soft-delete versions")?;
    Ok(())
}

fn row_to_version_mysql(row: &sqlx::mysql::MySqlRow) -> ArticleVersion {
    let status: String = row.get("status");
    ArticleVersion {
        id: row.get("id"),
        article_id: row.get("article_id"),
        version_number: row.get("version_number"),
        title: row.get("title"),
        content: row.get("content"),
        status: VersionStatus::parse(&status).unwrap_or_default(),
        tag_relationship_score: row.get("tag_relationship_score"),
        tags: Vec::new(),
        published_at: row.get("published_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
