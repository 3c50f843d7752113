//! Tag repository
//!
//! Database operations for tags, including the bulk metric update used by
//! the trending refresh.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Tag;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// A single tag's recomputed metrics, written during a trending refresh.
///
/// `updated_at` is chosen by the caller: reset to now when usage grew,
/// otherwise carried over unchanged so the decay clock keeps running.
#[derive(Debug, Clone, PartialEq)]
pub struct TagMetricsUpdate {
    pub id: i64,
    pub usage_count: i64,
    pub trending_score: f64,
    pub updated_at: DateTime<Utc>,
}

/// Tag repository trait
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Create a new tag
    async fn create(&self, tag: &Tag) -> Result<Tag>;

    /// Get tag by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>>;

    /// Get tag by name
    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>>;

    /// List all tags sorted by trending score (descending), name as
    /// tiebreaker
    async fn list(&self) -> Result<Vec<Tag>>;

    /// Get all tags regardless of popularity, for the trending refresh
    async fn get_all(&self) -> Result<Vec<Tag>>;

    /// Get the tags attached to an article version, sorted by name
    async fn get_by_version_id(&self, version_id: i64) -> Result<Vec<Tag>>;

    /// Write recomputed usage counts and trending scores in one pass
    async fn bulk_update_metrics(&self, updates: &[TagMetricsUpdate]) -> Result<()>;
}

/// SQLx-based tag repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxTagRepository {
    pool: DynDatabasePool,
}

impl SqlxTagRepository {
    /// Create a new SQLx tag repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn create(&self, tag: &Tag) -> Result<Tag> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_tag_sqlite(self.pool.as_sqlite().unwrap(), tag).await
            }
            DatabaseDriver::Mysql => create_tag_mysql(self.pool.as_mysql().unwrap(), tag).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_tag_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await
            }
            DatabaseDriver::Mysql => get_tag_by_id_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_tag_by_name_sqlite(self.pool.as_sqlite().unwrap(), name).await
            }
            DatabaseDriver::Mysql => {
                get_tag_by_name_mysql(self.pool.as_mysql().unwrap(), name).await
            }
        }
    }

    async fn list(&self) -> Result<Vec<Tag>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_tags_sqlite(self.pool.as_sqlite().unwrap()).await,
            DatabaseDriver::Mysql => list_tags_mysql(self.pool.as_mysql().unwrap()).await,
        }
    }

    async fn get_all(&self) -> Result<Vec<Tag>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_all_tags_sqlite(self.pool.as_sqlite().unwrap()).await,
            DatabaseDriver::Mysql => get_all_tags_mysql(self.pool.as_mysql().unwrap()).await,
        }
    }

    async fn get_by_version_id(&self, version_id: i64) -> Result<Vec<Tag>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_tags_by_version_sqlite(self.pool.as_sqlite().unwrap(), version_id).await
            }
            DatabaseDriver::Mysql => {
                get_tags_by_version_mysql(self.pool.as_mysql().unwrap(), version_id).await
            }
        }
    }

    async fn bulk_update_metrics(&self, updates: &[TagMetricsUpdate]) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                bulk_update_metrics_sqlite(self.pool.as_sqlite().unwrap(), updates).await
            }
            DatabaseDriver::Mysql => {
                bulk_update_metrics_mysql(self.pool.as_mysql().unwrap(), updates).await
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_tag_sqlite(pool: &SqlitePool, tag: &Tag) -> Result<Tag> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO tags (name, usage_count, trending_score, created_at, updated_at)
        VALUES (?, 0, 0, ?, ?)
        "#,
    )
    .bind(&tag.name)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create tag")?;

    let id = result.last_insert_rowid();

    Ok(Tag {
        id,
        name: tag.name.clone(),
        usage_count: 0,
        trending_score: 0.0,
        created_at: now,
        updated_at: now,
    })
}

async fn get_tag_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Tag>> {
    let row = sqlx::query(
        r#"
        SELECT id, name, usage_count, trending_score, created_at, updated_at
        FROM tags
        WHERE id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get tag by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_tag_sqlite(&row))),
        None => Ok(None),
    }
}

async fn get_tag_by_name_sqlite(pool: &SqlitePool, name: &str) -> Result<Option<Tag>> {
    let row = sqlx::query(
        r#"
        SELECT id, name, usage_count, trending_score, created_at, updated_at
        FROM tags
        WHERE name = ? AND deleted_at IS NULL
        "#,
    )
    .bind(name)
    .fetch_optional(pool)
    .await
    .context("Failed to get tag by name")?;

    match row {
        Some(row) => Ok(Some(row_to_tag_sqlite(&row))),
        None => Ok(None),
    }
}

async fn list_tags_sqlite(pool: &SqlitePool) -> Result<Vec<Tag>> {
    let rows = sqlx::query(
        r#"
        SELECT id, name, usage_count, trending_score, created_at, updated_at
        FROM tags
        WHERE deleted_at IS NULL
        ORDER BY trending_score DESC, name ASC
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Failed to list tags")?;

    Ok(rows.iter().map(row_to_tag_sqlite).collect())
}

async fn get_all_tags_sqlite(pool: &SqlitePool) -> Result<Vec<Tag>> {
    let rows = sqlx::query(
        r#"
        SELECT id, name, usage_count, trending_score, created_at, updated_at
        FROM tags
        WHERE deleted_at IS NULL
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Failed to get all tags")?;

    Ok(rows.iter().map(row_to_tag_sqlite).collect())
}

async fn get_tags_by_version_sqlite(pool: &SqlitePool, version_id: i64) -> Result<Vec<Tag>> {
    let rows = sqlx::query(
        r#"
        SELECT t.id, t.name, t.usage_count, t.trending_score, t.created_at, t.updated_at
        FROM tags t
        INNER JOIN article_version_tags avt ON t.id = avt.tag_id
        WHERE avt.article_version_id = ? AND t.deleted_at IS NULL
        ORDER BY t.name
        "#,
    )
    .bind(version_id)
    .fetch_all(pool)
    .await
    .context("Failed to get tags by version")?;

    Ok(rows.iter().map(row_to_tag_sqlite).collect())
}

async fn bulk_update_metrics_sqlite(
    pool: &SqlitePool,
    updates: &[TagMetricsUpdate],
) -> Result<()> {
    if updates.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    for update in updates {
        sqlx::query(
            r#"
            UPDATE tags
            SET usage_count = ?, trending_score = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(update.usage_count)
        .bind(update.trending_score)
        .bind(update.updated_at)
        .bind(update.id)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to update metrics for tag {}", update.id))?;
    }

    tx.commit().await.context("Failed to commit metric updates")?;
    Ok(())
}

fn row_to_tag_sqlite(row: &sqlx::sqlite::SqliteRow) -> Tag {
    Tag {
        id: row.get("id"),
        name: row.get("name"),
        usage_count: row.get("usage_count"),
        trending_score: row.get("trending_score"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_tag_mysql(pool: &MySqlPool, tag: &Tag) -> Result<Tag> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO tags (name, usage_count, trending_score, created_at, updated_at)
        VALUES (?, 0, 0, ?, ?)
        "#,
    )
    .bind(&tag.name)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create tag")?;

    let id = result.last_insert_id() as i64;

    Ok(Tag {
        id,
        name: tag.name.clone(),
        usage_count: 0,
        trending_score: 0.0,
        created_at: now,
        updated_at: now,
    })
}

async fn get_tag_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Tag>> {
    let row = sqlx::query(
        r#"
        SELECT id, name, usage_count, trending_score, created_at, updated_at
        FROM tags
        WHERE id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get tag by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_tag_mysql(&row))),
        None => Ok(None),
    }
}

async fn get_tag_by_name_mysql(pool: &MySqlPool, name: &str) -> Result<Option<Tag>> {
    let row = sqlx::query(
        r#"
        SELECT id, name, usage_count, trending_score, created_at, updated_at
        FROM tags
        WHERE name = ? AND deleted_at IS NULL
        "#,
    )
    .bind(name)
    .fetch_optional(pool)
    .await
    .context("Failed to get tag by name")?;

    match row {
        Some(row) => Ok(Some(row_to_tag_mysql(&row))),
        None => Ok(None),
    }
}

async fn list_tags_mysql(pool: &MySqlPool) -> Result<Vec<Tag>> {
    let rows = sqlx::query(
        r#"
        SELECT id, name, usage_count, trending_score, created_at, updated_at
        FROM tags
        WHERE deleted_at IS NULL
        ORDER BY trending_score DESC, name ASC
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Failed to list tags")?;

    Ok(rows.iter().map(row_to_tag_mysql).collect())
}

async fn get_all_tags_mysql(pool: &MySqlPool) -> Result<Vec<Tag>> {
    let rows = sqlx::query(
        r#"
        SELECT id, name, usage_count, trending_score, created_at, updated_at
        FROM tags
        WHERE deleted_at IS NULL
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Failed to get all tags")?;

    Ok(rows.iter().map(row_to_tag_mysql).collect())
}

async fn get_tags_by_version_mysql(pool: &MySqlPool, version_id: i64) -> Result<Vec<Tag>> {
    let rows = sqlx::query(
        r#"
        SELECT t.id, t.name, t.usage_count, t.trending_score, t.created_at, t.updated_at
        FROM tags t
        INNER JOIN article_version_tags avt ON t.id = avt.tag_id
        WHERE avt.article_version_id = ? AND t.deleted_at IS NULL
        ORDER BY t.name
        "#,
    )
    .bind(version_id)
    .fetch_all(pool)
    .await
    .context("Failed to get tags by version")?;

    Ok(rows.iter().map(row_to_tag_mysql).collect())
}

async fn bulk_update_metrics_mysql(pool: &MySqlPool, updates: &[TagMetricsUpdate]) -> Result<()> {
    if updates.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    for update in updates {
        sqlx::query(
            r#"
            UPDATE tags
            SET usage_count = ?, trending_score = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(update.usage_count)
        .bind(update.trending_score)
        .bind(update.updated_at)
        .bind(update.id)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to update metrics for tag {}", update.id))?;
    }

    tx.commit().await.context("Failed to commit metric updates")?;
    Ok(())
}

fn row_to_tag_mysql(row: &sqlx::mysql::MySqlRow) -> Tag {
    Tag {
        id: row.get("id"),
        name: row.get("name"),
        usage_count: row.get("usage_count"),
        trending_score: row.get("trending_score"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxTagRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxTagRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_tag() {
        let repo = setup_test_repo().await;

        let created = repo
            .create(&Tag::new("rust".to_string()))
            .await
            .expect("Failed to create tag");

        assert!(created.id > 0);
        assert_eq!(created.name, "rust");
        assert_eq!(created.usage_count, 0);
        assert_eq!(created.trending_score, 0.0);
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let repo = setup_test_repo().await;

        repo.create(&Tag::new("rust".to_string()))
            .await
            .expect("Failed to create tag");

        let result = repo.create(&Tag::new("rust".to_string())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_get_by_name() {
        let repo = setup_test_repo().await;
        repo.create(&Tag::new("async".to_string()))
            .await
            .expect("Failed to create tag");

        let found = repo
            .get_by_name("async")
            .await
            .expect("Failed to get tag")
            .expect("Tag not found");

        assert_eq!(found.name, "async");
    }

    #[tokio::test]
    async fn test_get_by_name_not_found() {
        let repo = setup_test_repo().await;
        let found = repo.get_by_name("missing").await.expect("Failed to get tag");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_list_ordered_by_trending_score() {
        let repo = setup_test_repo().await;

        let low = repo
            .create(&Tag::new("low".to_string()))
            .await
            .expect("Failed to create tag");
        let high = repo
            .create(&Tag::new("high".to_string()))
            .await
            .expect("Failed to create tag");

        let now = Utc::now();
        repo.bulk_update_metrics(&[
            TagMetricsUpdate {
                id: low.id,
                usage_count: 1,
                trending_score: 0.5,
                updated_at: now,
            },
            TagMetricsUpdate {
                id: high.id,
                usage_count: 5,
                trending_score: 4.2,
                updated_at: now,
            },
        ])
        .await
        .expect("Failed to update metrics");

        let tags = repo.list().await.expect("Failed to list tags");
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].name, "high");
        assert_eq!(tags[1].name, "low");
    }

    #[tokio::test]
    async fn test_bulk_update_metrics_writes_all_fields() {
        let repo = setup_test_repo().await;
        let tag = repo
            .create(&Tag::new("metrics".to_string()))
            .await
            .expect("Failed to create tag");

        let stamp = Utc::now();
        repo.bulk_update_metrics(&[TagMetricsUpdate {
            id: tag.id,
            usage_count: 7,
            trending_score: 3.14,
            updated_at: stamp,
        }])
        .await
        .expect("Failed to update metrics");

        let found = repo
            .get_by_id(tag.id)
            .await
            .expect("Failed to get tag")
            .expect("Tag not found");

        assert_eq!(found.usage_count, 7);
        assert!((found.trending_score - 3.14).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_bulk_update_metrics_empty_is_noop() {
        let repo = setup_test_repo().await;
        repo.bulk_update_metrics(&[])
            .await
            .expect("Empty update should succeed");
    }
}
