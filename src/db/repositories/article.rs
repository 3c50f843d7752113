//! Article repository
//!
//! Database operations for article anchor rows and their listing queries.
//! Filters and sorts resolve against the article's "active" version: the
//! published version when filtering for published articles, the latest
//! version otherwise.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Article, ArticleListParams, PagedResult, VersionStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Article repository trait
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Create a new article anchor row (no versions yet)
    async fn create(&self, author_id: i64, title: &str) -> Result<Article>;

    /// Get article by ID (version pointers only, versions not populated)
    async fn get_by_id(&self, id: i64) -> Result<Option<Article>>;

    /// List articles with filtering, sorting and pagination
    async fn list(&self, params: &ArticleListParams) -> Result<PagedResult<Article>>;

    /// Point the article at a new latest version and refresh its title
    async fn set_latest_version(&self, article_id: i64, version_id: i64, title: &str)
        -> Result<()>;

    /// Point the article at a published version, or clear the pointer
    async fn set_published_version(
        &self,
        article_id: i64,
        version_id: Option<i64>,
    ) -> Result<()>;

    /// Soft-delete an article
    async fn soft_delete(&self, id: i64) -> Result<()>;
}

/// SQLx-based article repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxArticleRepository {
    pool: DynDatabasePool,
}

impl SqlxArticleRepository {
    /// Create a new SQLx article repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ArticleRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ArticleRepository for SqlxArticleRepository {
    async fn create(&self, author_id: i64, title: &str) -> Result<Article> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_article_sqlite(self.pool.as_sqlite().unwrap(), author_id, title).await
            }
            DatabaseDriver::Mysql => {
                create_article_mysql(self.pool.as_mysql().unwrap(), author_id, title).await
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Article>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_article_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await
            }
            DatabaseDriver::Mysql => {
                get_article_by_id_mysql(self.pool.as_mysql().unwrap(), id).await
            }
        }
    }

    async fn list(&self, params: &ArticleListParams) -> Result<PagedResult<Article>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_articles_sqlite(self.pool.as_sqlite().unwrap(), params).await
            }
            DatabaseDriver::Mysql => {
                list_articles_mysql(self.pool.as_mysql().unwrap(), params).await
            }
        }
    }

    async fn set_latest_version(
        &self,
        article_id: i64,
        version_id: i64,
        title: &str,
    ) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                set_latest_version_sqlite(
                    self.pool.as_sqlite().unwrap(),
                    article_id,
                    version_id,
                    title,
                )
                .await
            }
            DatabaseDriver::Mysql => {
                set_latest_version_mysql(
                    self.pool.as_mysql().unwrap(),
                    article_id,
                    version_id,
                    title,
                )
                .await
            }
        }
    }

    async fn set_published_version(
        &self,
        article_id: i64,
        version_id: Option<i64>,
    ) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                set_published_version_sqlite(self.pool.as_sqlite().unwrap(), article_id, version_id)
                    .await
            }
            DatabaseDriver::Mysql => {
                set_published_version_mysql(self.pool.as_mysql().unwrap(), article_id, version_id)
                    .await
            }
        }
    }

    async fn soft_delete(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                soft_delete_article_sqlite(self.pool.as_sqlite().unwrap(), id).await
            }
            DatabaseDriver::Mysql => {
                soft_delete_article_mysql(self.pool.as_mysql().unwrap(), id).await
            }
        }
    }
}

// ============================================================================
// List query construction (shared by both drivers)
// ============================================================================

/// Build the article listing SQL. Bind order: author_id?, status? (non-
/// published only), tag_id?, then LIMIT and OFFSET for the page query.
fn build_list_sql(params: &ArticleListParams, count_only: bool) -> String {
    // Published filtering reads the published pointer; everything else
    // reads the latest version.
    let active_version = match params.status {
        Some(VersionStatus::Published) => "a.published_version_id",
        _ => "a.latest_version_id",
    };

    let select = if count_only {
        "SELECT COUNT(*) as count".to_string()
    } else {
        "SELECT a.id, a.author_id, a.title, a.latest_version_id, \
         a.published_version_id, a.created_at, a.updated_at"
            .to_string()
    };

    let mut sql = format!(
        "{select} FROM articles a \
         LEFT JOIN article_versions av ON av.id = {active_version} \
         WHERE a.deleted_at IS NULL"
    );

    if params.author_id.is_some() {
        sql.push_str(" AND a.author_id = ?");
    }

    match params.status {
        Some(VersionStatus::Published) => {
            sql.push_str(" AND a.published_version_id IS NOT NULL");
        }
        Some(_) => {
            sql.push_str(" AND av.status = ?");
        }
        None => {}
    }

    if params.tag_id.is_some() {
        sql.push_str(&format!(
            " AND EXISTS (SELECT 1 FROM article_version_tags avt \
             WHERE avt.article_version_id = {active_version} AND avt.tag_id = ?)"
        ));
    }

    if !count_only {
        // Sort column is whitelisted, never interpolated from user input
        let sort_column = match params.sort_by.as_deref() {
            Some("updated_at") => "a.updated_at",
            Some("tag_relationship_score") => "av.tag_relationship_score",
            _ => "a.created_at",
        };
        sql.push_str(&format!(
            " ORDER BY {} {} LIMIT ? OFFSET ?",
            sort_column,
            params.sort_order.as_sql()
        ));
    }

    sql
}

/// Extra bound status value for non-published status filters.
fn status_bind(params: &ArticleListParams) -> Option<&'static str> {
    match params.status {
        Some(VersionStatus::Published) | None => None,
        Some(status) => Some(status.as_str()),
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_article_sqlite(pool: &SqlitePool, author_id: i64, title: &str) -> Result<Article> {
    let now = Utc::now();

    let result = sqlx::query(
        "INSERT INTO articles (author_id, title, created_at, updated_at) VALUES (?, ?, ?, ?)",
    )
    .bind(author_id)
    .bind(title)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create article")?;

    Ok(Article {
        id: result.last_insert_rowid(),
        author_id,
        title: title.to_string(),
        latest_version_id: None,
        published_version_id: None,
        latest_version: None,
        published_version: None,
        created_at: now,
        updated_at: now,
    })
}

async fn get_article_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Article>> {
    let row = sqlx::query(
        r#"
        SELECT id, author_id, title, latest_version_id, published_version_id,
               created_at, updated_at
        FROM articles
        WHERE id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get article by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_article_sqlite(&row))),
        None => Ok(None),
    }
}

async fn list_articles_sqlite(
    pool: &SqlitePool,
    params: &ArticleListParams,
) -> Result<PagedResult<Article>> {
    let count_sql = build_list_sql(params, true);
    let mut count_query = sqlx::query(&count_sql);
    if let Some(author_id) = params.author_id {
        count_query = count_query.bind(author_id);
    }
    if let Some(status) = status_bind(params) {
        count_query = count_query.bind(status);
    }
    if let Some(tag_id) = params.tag_id {
        count_query = count_query.bind(tag_id);
    }
    let total: i64 = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count articles")?
        .get("count");

    let list_sql = build_list_sql(params, false);
    let mut query = sqlx::query(&list_sql);
    if let Some(author_id) = params.author_id {
        query = query.bind(author_id);
    }
    if let Some(status) = status_bind(params) {
        query = query.bind(status);
    }
    if let Some(tag_id) = params.tag_id {
        query = query.bind(tag_id);
    }
    query = query.bind(params.limit as i64).bind(params.offset() as i64);

    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to list articles")?;

    let articles = rows.iter().map(row_to_article_sqlite).collect();
    Ok(PagedResult::new(articles, total, params.page, params.limit))
}

async fn set_latest_version_sqlite(
    pool: &SqlitePool,
    article_id: i64,
    version_id: i64,
    title: &str,
) -> Result<()> {
    sqlx::query(
        "UPDATE articles SET latest_version_id = ?, title = ?, updated_at = ? WHERE id = ?",
    )
    .bind(version_id)
    .bind(title)
    .bind(Utc::now())
    .bind(article_id)
    .execute(pool)
    .await
    .context("Failed to set latest version")?;
    Ok(())
}

async fn set_published_version_sqlite(
    pool: &SqlitePool,
    article_id: i64,
    version_id: Option<i64>,
) -> Result<()> {
    sqlx::query("UPDATE articles SET published_version_id = ?, updated_at = ? WHERE id = ?")
        .bind(version_id)
        .bind(Utc::now())
        .bind(article_id)
        .execute(pool)
        .await
        .context("Failed to set published version")?;
    Ok(())
}

async fn soft_delete_article_sqlite(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("UPDATE articles SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL")
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to soft-delete article")?;
    Ok(())
}

fn row_to_article_sqlite(row: &sqlx::sqlite::SqliteRow) -> Article {
    Article {
        id: row.get("id"),
        author_id: row.get("author_id"),
        title: row.get("title"),
        latest_version_id: row.get("latest_version_id"),
        published_version_id: row.get("published_version_id"),
        latest_version: None,
        published_version: None,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_article_mysql(pool: &MySqlPool, author_id: i64, title: &str) -> Result<Article> {
    let now = Utc::now();

    let result = sqlx::query(
        "INSERT INTO articles (author_id, title, created_at, updated_at) VALUES (?, ?, ?, ?)",
    )
    .bind(author_id)
    .bind(title)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create article")?;

    Ok(Article {
        id: result.last_insert_id() as i64,
        author_id,
        title: title.to_string(),
        latest_version_id: None,
        published_version_id: None,
        latest_version: None,
        published_version: None,
        created_at: now,
        updated_at: now,
    })
}

async fn get_article_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Article>> {
    let row = sqlx::query(
        r#"
        SELECT id, author_id, title, latest_version_id, published_version_id,
               created_at, updated_at
        FROM articles
        WHERE id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get article by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_article_mysql(&row))),
        None => Ok(None),
    }
}

async fn list_articles_mysql(
    pool: &MySqlPool,
    params: &ArticleListParams,
) -> Result<PagedResult<Article>> {
    let count_sql = build_list_sql(params, true);
    let mut count_query = sqlx::query(&count_sql);
    if let Some(author_id) = params.author_id {
        count_query = count_query.bind(author_id);
    }
    if let Some(status) = status_bind(params) {
        count_query = count_query.bind(status);
    }
    if let Some(tag_id) = params.tag_id {
        count_query = count_query.bind(tag_id);
    }
    let total: i64 = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count articles")?
        .get("count");

    let list_sql = build_list_sql(params, false);
    let mut query = sqlx::query(&list_sql);
    if let Some(author_id) = params.author_id {
        query = query.bind(author_id);
    }
    if let Some(status) = status_bind(params) {
        query = query.bind(status);
    }
    if let Some(tag_id) = params.tag_id {
        query = query.bind(tag_id);
    }
    query = query.bind(params.limit as i64).bind(params.offset() as i64);

    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to list articles")?;

    let articles = rows.iter().map(row_to_article_mysql).collect();
    Ok(PagedResult::new(articles, total, params.page, params.limit))
}

async fn set_latest_version_mysql(
    pool: &MySqlPool,
    article_id: i64,
    version_id: i64,
    title: &str,
) -> Result<()> {
    sqlx::query(
        "UPDATE articles SET latest_version_id = ?, title = ?, updated_at = ? WHERE id = ?",
    )
    .bind(version_id)
    .bind(title)
    .bind(Utc::now())
    .bind(article_id)
    .execute(pool)
    .await
    .context("Failed to set latest version")?;
    Ok(())
}

async fn set_published_version_mysql(
    pool: &MySqlPool,
    article_id: i64,
    version_id: Option<i64>,
) -> Result<()> {
    sqlx::query("UPDATE articles SET published_version_id = ?, updated_at = ? WHERE id = ?")
        .bind(version_id)
        .bind(Utc::now())
        .bind(article_id)
        .execute(pool)
        .await
        .context("Failed to set published version")?;
    Ok(())
}

async fn soft_delete_article_mysql(pool: &MySqlPool, id: i64) -> Result<()> {
    sqlx::query("UPDATE articles SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL")
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to soft-delete article")?;
    Ok(())
}

fn row_to_article_mysql(row: &sqlx::mysql::MySqlRow) -> Article {
    Article {
        id: row.get("id"),
        author_id: row.get("author_id"),
        title: row.get("title"),
        latest_version_id: row.get("latest_version_id"),
        published_version_id: row.get("published_version_id"),
        latest_version: None,
        published_version: None,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
