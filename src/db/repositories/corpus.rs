//! Corpus statistics repository
//!
//! Aggregate queries over the article corpus that feed tag relationship
//! scoring and the trending refresh.
//!
//! Scoring statistics are scoped to each article's LATEST version; the
//! published-usage counts used by trending are scoped to each article's
//! PUBLISHED version. The two views deliberately differ: relationship
//! scores reflect how authors are currently tagging, trending reflects
//! what readers can see.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;

/// Build the canonical key for a tag pair: names joined by '|' with the
/// lexicographically smaller name first.
pub fn pair_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{}|{}", a, b)
    } else {
        format!("{}|{}", b, a)
    }
}

/// Corpus statistics repository trait
#[async_trait]
pub trait CorpusStatsRepository: Send + Sync {
    /// Total number of live articles in the corpus
    async fn get_total_article_count(&self) -> Result<i64>;

    /// Tag names on an article's latest version, sorted
    async fn get_tags_for_article(&self, article_id: i64) -> Result<Vec<String>>;

    /// For each requested tag name, the number of distinct articles whose
    /// latest version carries it. Names absent from the result have zero
    /// frequency.
    async fn get_tag_frequencies(&self, names: &[String]) -> Result<HashMap<String, i64>>;

    /// For each pair of requested tag names, the number of distinct articles
    /// whose latest version carries both. Keyed by [`pair_key`]; absent
    /// pairs never co-occur.
    async fn get_tag_pair_co_occurrences(&self, names: &[String])
        -> Result<HashMap<String, i64>>;

    /// For every tag, the number of distinct articles whose PUBLISHED
    /// version carries it. Tags with no published usage are absent.
    async fn count_articles_by_tag(&self) -> Result<HashMap<i64, i64>>;
}

/// SQLx-based corpus statistics implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxCorpusStatsRepository {
    pool: DynDatabasePool,
}

impl SqlxCorpusStatsRepository {
    /// Create a new SQLx corpus statistics repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CorpusStatsRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CorpusStatsRepository for SqlxCorpusStatsRepository {
    async fn get_total_article_count(&self) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_total_article_count_sqlite(self.pool.as_sqlite().unwrap()).await
            }
            DatabaseDriver::Mysql => {
                get_total_article_count_mysql(self.pool.as_mysql().unwrap()).await
            }
        }
    }

    async fn get_tags_for_article(&self, article_id: i64) -> Result<Vec<String>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_tags_for_article_sqlite(self.pool.as_sqlite().unwrap(), article_id).await
            }
            DatabaseDriver::Mysql => {
                get_tags_for_article_mysql(self.pool.as_mysql().unwrap(), article_id).await
            }
        }
    }

    async fn get_tag_frequencies(&self, names: &[String]) -> Result<HashMap<String, i64>> {
        if names.is_empty() {
            return Ok(HashMap::new());
        }
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_tag_frequencies_sqlite(self.pool.as_sqlite().unwrap(), names).await
            }
            DatabaseDriver::Mysql => {
                get_tag_frequencies_mysql(self.pool.as_mysql().unwrap(), names).await
            }
        }
    }

    async fn get_tag_pair_co_occurrences(
        &self,
        names: &[String],
    ) -> Result<HashMap<String, i64>> {
        if names.len() < 2 {
            return Ok(HashMap::new());
        }
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_tag_pair_co_occurrences_sqlite(self.pool.as_sqlite().unwrap(), names).await
            }
            DatabaseDriver::Mysql => {
                get_tag_pair_co_occurrences_mysql(self.pool.as_mysql().unwrap(), names).await
            }
        }
    }

    async fn count_articles_by_tag(&self) -> Result<HashMap<i64, i64>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                count_articles_by_tag_sqlite(self.pool.as_sqlite().unwrap()).await
            }
            DatabaseDriver::Mysql => {
                count_articles_by_tag_mysql(self.pool.as_mysql().unwrap()).await
            }
        }
    }
}

/// Comma-separated `?` placeholders for an IN clause.
fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn get_total_article_count_sqlite(pool: &SqlitePool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM articles WHERE deleted_at IS NULL")
        .fetch_one(pool)
        .await
        .context("Failed to count articles")?;
    Ok(row.get("count"))
}

async fn get_tags_for_article_sqlite(pool: &SqlitePool, article_id: i64) -> Result<Vec<String>> {
    let rows = sqlx::query(
        r#"
        SELECT t.name
        FROM tags t
        INNER JOIN article_version_tags avt ON t.id = avt.tag_id
        INNER JOIN articles a ON a.latest_version_id = avt.article_version_id
        WHERE a.id = ? AND a.deleted_at IS NULL AND t.deleted_at IS NULL
        ORDER BY t.name
        "#,
    )
    .bind(article_id)
    .fetch_all(pool)
    .await
    .context("Failed to get tags for article")?;

    Ok(rows.iter().map(|row| row.get("name")).collect())
}

async fn get_tag_frequencies_sqlite(
    pool: &SqlitePool,
    names: &[String],
) -> Result<HashMap<String, i64>> {
    let sql = format!(
        r#"
        SELECT t.name, COUNT(DISTINCT a.id) as freq
        FROM tags t
        INNER JOIN article_version_tags avt ON t.id = avt.tag_id
        INNER JOIN articles a ON a.latest_version_id = avt.article_version_id
        WHERE a.deleted_at IS NULL AND t.deleted_at IS NULL AND t.name IN ({})
        GROUP BY t.name
        "#,
        placeholders(names.len())
    );

    let mut query = sqlx::query(&sql);
    for name in names {
        query = query.bind(name);
    }

    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to get tag frequencies")?;

    let mut frequencies = HashMap::new();
    for row in rows {
        frequencies.insert(row.get("name"), row.get("freq"));
    }
    Ok(frequencies)
}

async fn get_tag_pair_co_occurrences_sqlite(
    pool: &SqlitePool,
    names: &[String],
) -> Result<HashMap<String, i64>> {
    let sql = format!(
        r#"
        SELECT t1.name as name1, t2.name as name2, COUNT(DISTINCT a.id) as pair_count
        FROM article_version_tags avt1
        INNER JOIN article_version_tags avt2
            ON avt1.article_version_id = avt2.article_version_id
        INNER JOIN tags t1 ON t1.id = avt1.tag_id
        INNER JOIN tags t2 ON t2.id = avt2.tag_id
        INNER JOIN articles a ON a.latest_version_id = avt1.article_version_id
        WHERE a.deleted_at IS NULL
          AND t1.deleted_at IS NULL AND t2.deleted_at IS NULL
          AND t1.name < t2.name
          AND t1.name IN ({placeholders})
          AND t2.name IN ({placeholders})
        GROUP BY t1.name, t2.name
        "#,
        placeholders = placeholders(names.len())
    );

    let mut query = sqlx::query(&sql);
    for name in names {
        query = query.bind(name);
    }
    for name in names {
        query = query.bind(name);
    }

    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to get tag pair co-occurrences")?;

    let mut pairs = HashMap::new();
    for row in rows {
        let name1: String = row.get("name1");
        let name2: String = row.get("name2");
        pairs.insert(pair_key(&name1, &name2), row.get("pair_count"));
    }
    Ok(pairs)
}

async fn count_articles_by_tag_sqlite(pool: &SqlitePool) -> Result<HashMap<i64, i64>> {
    let rows = sqlx::query(
        r#"
        SELECT avt.tag_id, COUNT(DISTINCT a.id) as article_count
        FROM article_version_tags avt
        INNER JOIN articles a ON a.published_version_id = avt.article_version_id
        WHERE a.deleted_at IS NULL
        GROUP BY avt.tag_id
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Failed to count published articles by tag")?;

    let mut counts = HashMap::new();
    for row in rows {
        counts.insert(row.get("tag_id"), row.get("article_count"));
    }
    Ok(counts)
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn get_total_article_count_mysql(pool: &MySqlPool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM articles WHERE deleted_at IS NULL")
        .fetch_one(pool)
        .await
        .context("Failed to count articles")?;
    Ok(row.get("count"))
}

async fn get_tags_for_article_mysql(pool: &MySqlPool, article_id: i64) -> Result<Vec<String>> {
    let rows = sqlx::query(
        r#"
        SELECT t.name
        FROM tags t
        INNER JOIN article_version_tags avt ON t.id = avt.tag_id
        INNER JOIN articles a ON a.latest_version_id = avt.article_version_id
        WHERE a.id = ? AND a.deleted_at IS NULL AND t.deleted_at IS NULL
        ORDER BY t.name
        "#,
    )
    .bind(article_id)
    .fetch_all(pool)
    .await
    .context("Failed to get tags for article")?;

    Ok(rows.iter().map(|row| row.get("name")).collect())
}

async fn get_tag_frequencies_mysql(
    pool: &MySqlPool,
    names: &[String],
) -> Result<HashMap<String, i64>> {
    let sql = format!(
        r#"
        SELECT t.name, COUNT(DISTINCT a.id) as freq
        FROM tags t
        INNER JOIN article_version_tags avt ON t.id = avt.tag_id
        INNER JOIN articles a ON a.latest_version_id = avt.article_version_id
        WHERE a.deleted_at IS NULL AND t.deleted_at IS NULL AND t.name IN ({})
        GROUP BY t.name
        "#,
        placeholders(names.len())
    );

    let mut query = sqlx::query(&sql);
    for name in names {
        query = query.bind(name);
    }

    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to get tag frequencies")?;

    let mut frequencies = HashMap::new();
    for row in rows {
        frequencies.insert(row.get("name"), row.get("freq"));
    }
    Ok(frequencies)
}

async fn get_tag_pair_co_occurrences_mysql(
    pool: &MySqlPool,
    names: &[String],
) -> Result<HashMap<String, i64>> {
    let sql = format!(
        r#"
        SELECT t1.name as name1, t2.name as name2, COUNT(DISTINCT a.id) as pair_count
        FROM article_version_tags avt1
        INNER JOIN article_version_tags avt2
            ON avt1.article_version_id = avt2.article_version_id
        INNER JOIN tags t1 ON t1.id = avt1.tag_id
        INNER JOIN tags t2 ON t2.id = avt2.tag_id
        INNER JOIN articles a ON a.latest_version_id = avt1.article_version_id
        WHERE a.deleted_at IS NULL
          AND t1.deleted_at IS NULL AND t2.deleted_at IS NULL
          AND t1.name < t2.name
          AND t1.name IN ({placeholders})
          AND t2.name IN ({placeholders})
        GROUP BY t1.name, t2.name
        "#,
        placeholders = placeholders(names.len())
    );

    let mut query = sqlx::query(&sql);
    for name in names {
        query = query.bind(name);
    }
    for name in names {
        query = query.bind(name);
    }

    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to get tag pair co-occurrences")?;

    let mut pairs = HashMap::new();
    for row in rows {
        let name1: String = row.get("name1");
        let name2: String = row.get("name2");
        pairs.insert(pair_key(&name1, &name2), row.get("pair_count"));
    }
    Ok(pairs)
}

async fn count_articles_by_tag_mysql(pool: &MySqlPool) -> Result<HashMap<i64, i64>> {
    let rows = sqlx::query(
        r#"
        SELECT avt.tag_id, COUNT(DISTINCT a.id) as article_count
        FROM article_version_tags avt
        INNER JOIN articles a ON a.published_version_id = avt.article_version_id
        WHERE a.deleted_at IS NULL
        GROUP BY avt.tag_id
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Failed to count published articles by tag")?;

    let mut counts = HashMap::new();
    for row in rows {
        counts.insert(row.get("tag_id"), row.get("article_count"));
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> (DynDatabasePool, SqlxCorpusStatsRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxCorpusStatsRepository::new(pool.clone());
        (pool, repo)
    }

    async fn seed_user(pool: &SqlitePool) -> i64 {
        let now = chrono::Utc::now();
        let result = sqlx::query(
            "INSERT INTO users (username, email, password_hash, created_at, updated_at) \
             VALUES ('author', 'author@example.com', 'hash', ?, ?)",
        )
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .expect("Failed to seed user");
        result.last_insert_rowid()
    }

    async fn seed_tag(pool: &SqlitePool, name: &str) -> i64 {
        let now = chrono::Utc::now();
        let result =
            sqlx::query("INSERT INTO tags (name, created_at, updated_at) VALUES (?, ?, ?)")
                .bind(name)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .expect("Failed to seed tag");
        result.last_insert_rowid()
    }

    /// Seed an article with a single latest version carrying the given tag
    /// IDs. Returns (article_id, version_id).
    async fn seed_article(pool: &SqlitePool, author_id: i64, tag_ids: &[i64]) -> (i64, i64) {
        let now = chrono::Utc::now();
        let result = sqlx::query(
            "INSERT INTO articles (author_id, title, created_at, updated_at) VALUES (?, 'T', ?, ?)",
        )
        .bind(author_id)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .expect("Failed to seed article");
        let article_id = result.last_insert_rowid();

        let result = sqlx::query(
            "INSERT INTO article_versions \
             (article_id, version_number, title, content, created_at, updated_at) \
             VALUES (?, 1, 'T', 'C', ?, ?)",
        )
        .bind(article_id)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .expect("Failed to seed version");
        let version_id = result.last_insert_rowid();

        sqlx::query("UPDATE articles SET latest_version_id = ? WHERE id = ?")
            .bind(version_id)
            .bind(article_id)
            .execute(pool)
            .await
            .expect("Failed to set latest version");

        for tag_id in tag_ids {
            sqlx::query(
                "INSERT INTO article_version_tags (article_version_id, tag_id) VALUES (?, ?)",
            )
            .bind(version_id)
            .bind(tag_id)
            .execute(pool)
            .await
            .expect("Failed to link tag");
        }

        (article_id, version_id)
    }

    async fn publish(pool: &SqlitePool, article_id: i64, version_id: i64) {
        sqlx::query("UPDATE articles SET published_version_id = ? WHERE id = ?")
            .bind(version_id)
            .bind(article_id)
            .execute(pool)
            .await
            .expect("Failed to publish version");
    }

    #[test]
    fn test_pair_key_is_canonical() {
        assert_eq!(pair_key("rust", "async"), "async|rust");
        assert_eq!(pair_key("async", "rust"), "async|rust");
    }

    #[tokio::test]
    async fn test_total_count_empty_corpus() {
        let (_pool, repo) = setup().await;
        let count = repo
            .get_total_article_count()
            .await
            .expect("Failed to count");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_total_count_excludes_deleted() {
        let (pool, repo) = setup().await;
        let sqlite = pool.as_sqlite().unwrap();
        let author = seed_user(sqlite).await;

        let (a1, _) = seed_article(sqlite, author, &[]).await;
        seed_article(sqlite, author, &[]).await;

        sqlx::query("UPDATE articles SET deleted_at = CURRENT_TIMESTAMP WHERE id = ?")
            .bind(a1)
            .execute(sqlite)
            .await
            .expect("Failed to soft-delete");

        let count = repo
            .get_total_article_count()
            .await
            .expect("Failed to count");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_frequencies_and_pairs_use_latest_version() {
        let (pool, repo) = setup().await;
        let sqlite = pool.as_sqlite().unwrap();
        let author = seed_user(sqlite).await;

        let rust = seed_tag(sqlite, "rust").await;
        let web = seed_tag(sqlite, "web").await;
        let db = seed_tag(sqlite, "db").await;

        // rust+web, rust+db, rust alone
        seed_article(sqlite, author, &[rust, web]).await;
        seed_article(sqlite, author, &[rust, db]).await;
        seed_article(sqlite, author, &[rust]).await;

        let names = vec!["rust".to_string(), "web".to_string(), "db".to_string()];

        let freqs = repo
            .get_tag_frequencies(&names)
            .await
            .expect("Failed to get frequencies");
        assert_eq!(freqs.get("rust"), Some(&3));
        assert_eq!(freqs.get("web"), Some(&1));
        assert_eq!(freqs.get("db"), Some(&1));

        let pairs = repo
            .get_tag_pair_co_occurrences(&names)
            .await
            .expect("Failed to get pairs");
        assert_eq!(pairs.get("rust|web"), Some(&1));
        assert_eq!(pairs.get("db|rust"), Some(&1));
        assert_eq!(pairs.get("db|web"), None);
    }

    #[tokio::test]
    async fn test_unused_tag_absent_from_frequencies() {
        let (pool, repo) = setup().await;
        let sqlite = pool.as_sqlite().unwrap();
        seed_tag(sqlite, "orphan").await;

        let freqs = repo
            .get_tag_frequencies(&["orphan".to_string()])
            .await
            .expect("Failed to get frequencies");
        assert!(freqs.is_empty());
    }

    #[tokio::test]
    async fn test_get_tags_for_article_sorted() {
        let (pool, repo) = setup().await;
        let sqlite = pool.as_sqlite().unwrap();
        let author = seed_user(sqlite).await;

        let zebra = seed_tag(sqlite, "zebra").await;
        let apple = seed_tag(sqlite, "apple").await;
        let (article_id, _) = seed_article(sqlite, author, &[zebra, apple]).await;

        let names = repo
            .get_tags_for_article(article_id)
            .await
            .expect("Failed to get tags");
        assert_eq!(names, vec!["apple".to_string(), "zebra".to_string()]);
    }

    #[tokio::test]
    async fn test_count_articles_by_tag_only_published() {
        let (pool, repo) = setup().await;
        let sqlite = pool.as_sqlite().unwrap();
        let author = seed_user(sqlite).await;

        let rust = seed_tag(sqlite, "rust").await;

        // Two articles tagged rust, only one published
        let (a1, v1) = seed_article(sqlite, author, &[rust]).await;
        seed_article(sqlite, author, &[rust]).await;
        publish(sqlite, a1, v1).await;

        let counts = repo
            .count_articles_by_tag()
            .await
            .expect("Failed to count by tag");
        assert_eq!(counts.get(&rust), Some(&1));
    }

    #[tokio::test]
    async fn test_empty_name_list_short_circuits() {
        let (_pool, repo) = setup().await;
        let freqs = repo
            .get_tag_frequencies(&[])
            .await
            .expect("Failed to get frequencies");
        assert!(freqs.is_empty());

        let pairs = repo
            .get_tag_pair_co_occurrences(&["solo".to_string()])
            .await
            .expect("Failed to get pairs");
        assert!(pairs.is_empty());
    }
}
