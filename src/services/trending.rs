//! Tag trending refresh
//!
//! Recomputes every tag's cached usage count and trending score from the
//! published corpus. The score is exponentially decayed usage:
//!
//!   score = usage * exp(-age_days / decay_factor)
//!
//! where age is measured from the tag's `updated_at`. When a tag's usage
//! grows, `updated_at` is reset to now so the decay clock restarts; a tag
//! regaining popularity trends again. Only tags whose metrics actually
//! changed are written back.

use crate::db::repositories::corpus::CorpusStatsRepository;
use crate::db::repositories::{TagMetricsUpdate, TagRepository};
use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;

/// Score changes below this are treated as noise and not written back.
const SCORE_EPSILON: f64 = 1e-6;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Recomputes tag usage counts and trending scores.
pub struct TrendingUpdater {
    tags: Arc<dyn TagRepository>,
    corpus: Arc<dyn CorpusStatsRepository>,
    decay_factor: f64,
}

impl TrendingUpdater {
    /// Create a new updater. `decay_factor` is the e-folding time of the
    /// score in days.
    pub fn new(
        tags: Arc<dyn TagRepository>,
        corpus: Arc<dyn CorpusStatsRepository>,
        decay_factor: f64,
    ) -> Self {
        Self {
            tags,
            corpus,
            decay_factor,
        }
    }

    /// Recompute metrics for every tag, returning how many were updated.
    ///
    /// Usage is the number of distinct articles whose published version
    /// carries the tag; unpublished work never counts. A full refresh on
    /// an unchanged corpus writes nothing.
    pub async fn refresh(&self) -> Result<usize> {
        let tags = self.tags.get_all().await.context("Failed to load tags")?;
        if tags.is_empty() {
            return Ok(0);
        }

        let usage_counts = self
            .corpus
            .count_articles_by_tag()
            .await
            .context("Failed to count published usage")?;

        let now = Utc::now();
        let mut updates = Vec::new();

        for tag in &tags {
            let new_usage = usage_counts.get(&tag.id).copied().unwrap_or(0);

            let age_days =
                (now - tag.updated_at).num_seconds() as f64 / SECONDS_PER_DAY;
            let new_score = new_usage as f64 * (-age_days / self.decay_factor).exp();

            let usage_changed = new_usage != tag.usage_count;
            let score_changed = (new_score - tag.trending_score).abs() > SCORE_EPSILON;
            if !usage_changed && !score_changed {
                continue;
            }

            // Restart the decay clock only on growth; compared against the
            // stored count before any overwrite
            let updated_at = if new_usage > tag.usage_count {
                now
            } else {
                tag.updated_at
            };

            updates.push(TagMetricsUpdate {
                id: tag.id,
                usage_count: new_usage,
                trending_score: new_score,
                updated_at,
            });
        }

        if updates.is_empty() {
            tracing::debug!(tags = tags.len(), "Trending refresh found no changes");
            return Ok(0);
        }

        let count = updates.len();
        self.tags
            .bulk_update_metrics(&updates)
            .await
            .context("Failed to write tag metrics")?;

        tracing::debug!(updated = count, tags = tags.len(), "Trending refresh complete");
        Ok(count)
    }

    /// Run a refresh, logging instead of propagating failure. Trending is
    /// advisory; a failed refresh must never fail the triggering write.
    pub async fn refresh_silently(&self) {
        if let Err(e) = self.refresh().await {
            tracing::warn!("Trending refresh failed: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxCorpusStatsRepository, SqlxTagRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use chrono::Duration;
    use sqlx::Row;

    async fn setup() -> (DynDatabasePool, TrendingUpdater) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let updater = TrendingUpdater::new(
            SqlxTagRepository::boxed(pool.clone()),
            SqlxCorpusStatsRepository::boxed(pool.clone()),
            7.0,
        );
        (pool, updater)
    }

    async fn seed_tag(pool: &DynDatabasePool, name: &str) -> i64 {
        let sqlite = pool.as_sqlite().unwrap();
        let now = Utc::now();
        sqlx::query("INSERT INTO tags (name, created_at, updated_at) VALUES (?, ?, ?)")
            .bind(name)
            .bind(now)
            .bind(now)
            .execute(sqlite)
            .await
            .unwrap()
            .last_insert_rowid()
    }

    /// Seed a published article carrying the given tags.
    async fn seed_published_article(pool: &DynDatabasePool, tag_ids: &[i64]) {
        let sqlite = pool.as_sqlite().unwrap();
        let now = Utc::now();

        let author_id: i64 = match sqlx::query("SELECT id FROM users LIMIT 1")
            .fetch_optional(sqlite)
            .await
            .unwrap()
        {
            Some(row) => row.get("id"),
            None => sqlx::query(
                "INSERT INTO users (username, email, password_hash, created_at, updated_at) \
                 VALUES ('seed', 'seed@example.com', 'h', ?, ?)",
            )
            .bind(now)
            .bind(now)
            .execute(sqlite)
            .await
            .unwrap()
            .last_insert_rowid(),
        };

        let article_id = sqlx::query(
            "INSERT INTO articles (author_id, title, created_at, updated_at) VALUES (?, 'T', ?, ?)",
        )
        .bind(author_id)
        .bind(now)
        .bind(now)
        .execute(sqlite)
        .await
        .unwrap()
        .last_insert_rowid();

        let version_id = sqlx::query(
            "INSERT INTO article_versions \
             (article_id, version_number, title, content, status, created_at, updated_at) \
             VALUES (?, 1, 'T', 'C', 'published', ?, ?)",
        )
        .bind(article_id)
        .bind(now)
        .bind(now)
        .execute(sqlite)
        .await
        .unwrap()
        .last_insert_rowid();

        sqlx::query(
            "UPDATE articles SET latest_version_id = ?, published_version_id = ? WHERE id = ?",
        )
        .bind(version_id)
        .bind(version_id)
        .bind(article_id)
        .execute(sqlite)
        .await
        .unwrap();

        for tag_id in tag_ids {
            sqlx::query(
                "INSERT INTO article_version_tags (article_version_id, tag_id) VALUES (?, ?)",
            )
            .bind(version_id)
            .bind(tag_id)
            .execute(sqlite)
            .await
            .unwrap();
        }
    }

    async fn load_tag(pool: &DynDatabasePool, id: i64) -> crate::models::Tag {
        SqlxTagRepository::new(pool.clone())
            .get_by_id(id)
            .await
            .unwrap()
            .expect("Tag not found")
    }

    #[tokio::test]
    async fn test_refresh_counts_published_usage() {
        let (pool, updater) = setup().await;
        let rust = seed_tag(&pool, "rust").await;
        seed_published_article(&pool, &[rust]).await;
        seed_published_article(&pool, &[rust]).await;

        let updated = updater.refresh().await.expect("Refresh should succeed");
        assert_eq!(updated, 1);

        let tag = load_tag(&pool, rust).await;
        assert_eq!(tag.usage_count, 2);
        // Fresh updated_at means essentially no decay
        assert!(tag.trending_score > 1.9 && tag.trending_score <= 2.0);
    }

    #[tokio::test]
    async fn test_unused_tag_left_alone() {
        let (pool, updater) = setup().await;
        seed_tag(&pool, "orphan").await;

        let updated = updater.refresh().await.expect("Refresh should succeed");
        assert_eq!(updated, 0);
    }

    #[tokio::test]
    async fn test_second_refresh_is_noop() {
        let (pool, updater) = setup().await;
        let rust = seed_tag(&pool, "rust").await;
        seed_published_article(&pool, &[rust]).await;

        assert_eq!(updater.refresh().await.unwrap(), 1);
        // Nothing changed since; back-to-back refresh detects no drift
        assert_eq!(updater.refresh().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_score_decays_with_age() {
        let (pool, updater) = setup().await;
        let rust = seed_tag(&pool, "rust").await;
        seed_published_article(&pool, &[rust]).await;

        // Backdate the tag 7 days: score should be usage * e^-1
        let sqlite = pool.as_sqlite().unwrap();
        let week_ago = Utc::now() - Duration::days(7);
        sqlx::query("UPDATE tags SET updated_at = ?, usage_count = 1 WHERE id = ?")
            .bind(week_ago)
            .bind(rust)
            .execute(sqlite)
            .await
            .unwrap();

        updater.refresh().await.expect("Refresh should succeed");

        let tag = load_tag(&pool, rust).await;
        assert!((tag.trending_score - (-1.0f64).exp()).abs() < 1e-3);
        // Usage did not grow, so the decay clock keeps running
        assert!((tag.updated_at - week_ago).num_seconds().abs() < 2);
    }

    #[tokio::test]
    async fn test_usage_growth_resets_decay_clock() {
        let (pool, updater) = setup().await;
        let rust = seed_tag(&pool, "rust").await;
        seed_published_article(&pool, &[rust]).await;

        let sqlite = pool.as_sqlite().unwrap();
        let month_ago = Utc::now() - Duration::days(30);
        sqlx::query("UPDATE tags SET updated_at = ? WHERE id = ?")
            .bind(month_ago)
            .bind(rust)
            .execute(sqlite)
            .await
            .unwrap();

        let before = Utc::now();
        updater.refresh().await.expect("Refresh should succeed");

        let tag = load_tag(&pool, rust).await;
        assert_eq!(tag.usage_count, 1);
        // Usage grew from 0 to 1: updated_at jumps to the refresh time
        assert!(tag.updated_at >= before - Duration::seconds(1));
    }

    #[tokio::test]
    async fn test_draft_usage_does_not_count() {
        let (pool, updater) = setup().await;
        let rust = seed_tag(&pool, "rust").await;

        // Article with a latest version but no published version
        let sqlite = pool.as_sqlite().unwrap();
        let now = Utc::now();
        let author_id = sqlx::query(
            "INSERT INTO users (username, email, password_hash, created_at, updated_at) \
             VALUES ('seed', 'seed@example.com', 'h', ?, ?)",
        )
        .bind(now)
        .bind(now)
        .execute(sqlite)
        .await
        .unwrap()
        .last_insert_rowid();
        let article_id = sqlx::query(
            "INSERT INTO articles (author_id, title, created_at, updated_at) VALUES (?, 'T', ?, ?)",
        )
        .bind(author_id)
        .bind(now)
        .bind(now)
        .execute(sqlite)
        .await
        .unwrap()
        .last_insert_rowid();
        let version_id = sqlx::query(
            "INSERT INTO article_versions \
             (article_id, version_number, title, content, created_at, updated_at) \
             VALUES (?, 1, 'T', 'C', ?, ?)",
        )
        .bind(article_id)
        .bind(now)
        .bind(now)
        .execute(sqlite)
        .await
        .unwrap()
        .last_insert_rowid();
        sqlx::query("UPDATE articles SET latest_version_id = ? WHERE id = ?")
            .bind(version_id)
            .bind(article_id)
            .execute(sqlite)
            .await
            .unwrap();
        sqlx::query("INSERT INTO article_version_tags (article_version_id, tag_id) VALUES (?, ?)")
            .bind(version_id)
            .bind(rust)
            .execute(sqlite)
            .await
            .unwrap();

        updater.refresh().await.expect("Refresh should succeed");

        let tag = load_tag(&pool, rust).await;
        assert_eq!(tag.usage_count, 0);
    }

    #[tokio::test]
    async fn test_usage_drop_keeps_clock_but_updates_count() {
        let (pool, updater) = setup().await;
        let rust = seed_tag(&pool, "rust").await;

        // Pretend the tag used to be popular
        let sqlite = pool.as_sqlite().unwrap();
        let yesterday = Utc::now() - Duration::days(1);
        sqlx::query(
            "UPDATE tags SET usage_count = 5, trending_score = 4.0, updated_at = ? WHERE id = ?",
        )
        .bind(yesterday)
        .bind(rust)
        .execute(sqlite)
        .await
        .unwrap();

        updater.refresh().await.expect("Refresh should succeed");

        let tag = load_tag(&pool, rust).await;
        assert_eq!(tag.usage_count, 0);
        assert_eq!(tag.trending_score, 0.0);
        assert!((tag.updated_at - yesterday).num_seconds().abs() < 2);
    }

    #[tokio::test]
    async fn test_refresh_silently_swallows_errors() {
        // No migrations: refresh fails internally but must not panic
        let pool = create_test_pool().await.unwrap();
        let updater = TrendingUpdater::new(
            SqlxTagRepository::boxed(pool.clone()),
            SqlxCorpusStatsRepository::boxed(pool),
            7.0,
        );
        updater.refresh_silently().await;
    }
}
