//! Article service
//!
//! Orchestrates article and version lifecycle: creation, versioning,
//! publishing, and the scoring/trending side effects of each write.
//!
//! Authorization lives here: writers operate on their own articles only,
//! editors and admins on everyone's. Public reads go through the
//! dedicated published-only methods.

use crate::db::repositories::{ArticleRepository, TagRepository, VersionRepository};
use crate::models::{
    Article, ArticleListParams, ArticleVersion, PagedResult, UserRole, VersionStatus,
};
use crate::services::{RelationshipScorer, TagService, TrendingUpdater};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

/// Error types for article operations
#[derive(Debug, thiserror::Error)]
pub enum ArticleServiceError {
    /// Article not found
    #[error("Article not found: {0}")]
    NotFound(i64),

    /// Version not found (or not belonging to the article)
    #[error("Version not found: {0}")]
    VersionNotFound(i64),

    /// The user may not act on this article
    #[error("Not allowed to modify this article")]
    Forbidden,

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The requested status change is not a legal transition
    #[error("Cannot transition version from {from} to {to}")]
    InvalidTransition {
        from: VersionStatus,
        to: VersionStatus,
    },

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Article service
pub struct ArticleService {
    articles: Arc<dyn ArticleRepository>,
    versions: Arc<dyn VersionRepository>,
    tags: Arc<dyn TagRepository>,
    tag_service: Arc<TagService>,
    scorer: Arc<RelationshipScorer>,
    trending: Arc<TrendingUpdater>,
}

impl ArticleService {
    /// Create a new article service
    pub fn new(
        articles: Arc<dyn ArticleRepository>,
        versions: Arc<dyn VersionRepository>,
        tags: Arc<dyn TagRepository>,
        tag_service: Arc<TagService>,
        scorer: Arc<RelationshipScorer>,
        trending: Arc<TrendingUpdater>,
    ) -> Self {
        Self {
            articles,
            versions,
            tags,
            tag_service,
            scorer,
            trending,
        }
    }

    /// Create an article with its initial draft version.
    pub async fn create(
        &self,
        author_id: i64,
        title: &str,
        content: &str,
        tag_names: &[String],
    ) -> Result<Article, ArticleServiceError> {
        validate_title(title)?;

        let article = self
            .articles
            .create(author_id, title.trim())
            .await
            .context("Failed to create article")?;

        let version = self
            .attach_new_version(&article, title.trim(), content, tag_names)
            .await?;

        tracing::info!(
            article_id = article.id,
            version_id = version.id,
            "Article created"
        );

        self.load_article(article.id).await
    }

    /// Get an article with both version pointers resolved. Drafts are
    /// visible to the owner and editorial roles only.
    pub async fn get(
        &self,
        id: i64,
        user_id: i64,
        role: UserRole,
    ) -> Result<Article, ArticleServiceError> {
        let article = self.load_article(id).await?;
        authorize(&article, user_id, role)?;
        Ok(article)
    }

    /// Get a published article for anonymous readers. The latest version
    /// is withheld; only the published one is returned.
    pub async fn get_published(&self, id: i64) -> Result<Article, ArticleServiceError> {
        let mut article = self.load_article(id).await?;
        if article.published_version.is_none() {
            return Err(ArticleServiceError::NotFound(id));
        }
        article.latest_version = None;
        Ok(article)
    }

    /// List articles for an authenticated user. Writers are scoped to
    /// their own articles; editorial roles see everything.
    pub async fn list(
        &self,
        mut params: ArticleListParams,
        user_id: i64,
        role: UserRole,
    ) -> Result<PagedResult<Article>, ArticleServiceError> {
        if !role.is_editorial() {
            params.author_id = Some(user_id);
        }
        self.articles
            .list(&params)
            .await
            .context("Failed to list articles")
            .map_err(Into::into)
    }

    /// List published articles for anonymous readers.
    pub async fn list_published(
        &self,
        mut params: ArticleListParams,
    ) -> Result<PagedResult<Article>, ArticleServiceError> {
        params.status = Some(VersionStatus::Published);
        self.articles
            .list(&params)
            .await
            .context("Failed to list published articles")
            .map_err(Into::into)
    }

    /// Add a new draft version to an existing article.
    pub async fn add_version(
        &self,
        article_id: i64,
        user_id: i64,
        role: UserRole,
        title: &str,
        content: &str,
        tag_names: &[String],
    ) -> Result<ArticleVersion, ArticleServiceError> {
        validate_title(title)?;

        let article = self.require_article(article_id).await?;
        authorize(&article, user_id, role)?;

        let version = self
            .attach_new_version(&article, title.trim(), content, tag_names)
            .await?;

        tracing::info!(
            article_id,
            version_id = version.id,
            version_number = version.version_number,
            "Version added"
        );

        Ok(version)
    }

    /// List all versions of an article, newest first, tags included.
    pub async fn list_versions(
        &self,
        article_id: i64,
        user_id: i64,
        role: UserRole,
    ) -> Result<Vec<ArticleVersion>, ArticleServiceError> {
        let article = self.require_article(article_id).await?;
        authorize(&article, user_id, role)?;

        let mut versions = self
            .versions
            .list_by_article(article_id)
            .await
            .context("Failed to list versions")?;
        for version in &mut versions {
            version.tags = self
                .tags
                .get_by_version_id(version.id)
                .await
                .context("Failed to load version tags")?;
        }
        Ok(versions)
    }

    /// Get a single version of an article, tags included.
    pub async fn get_version(
        &self,
        article_id: i64,
        version_id: i64,
        user_id: i64,
        role: UserRole,
    ) -> Result<ArticleVersion, ArticleServiceError> {
        let article = self.require_article(article_id).await?;
        authorize(&article, user_id, role)?;
        self.load_version(article_id, version_id).await
    }

    /// Change a version's lifecycle status.
    ///
    /// Publishing archives the article's previously published version and
    /// moves the published pointer; at most one version is ever published.
    /// Archiving the published version clears the pointer.
    pub async fn update_version_status(
        &self,
        article_id: i64,
        version_id: i64,
        user_id: i64,
        role: UserRole,
        new_status: VersionStatus,
    ) -> Result<ArticleVersion, ArticleServiceError> {
        let article = self.require_article(article_id).await?;
        authorize(&article, user_id, role)?;

        let version = self.load_version(article_id, version_id).await?;
        validate_transition(version.status, new_status)?;

        match new_status {
            VersionStatus::Published => {
                // Archive whatever was published before
                if let Some(previous_id) = article.published_version_id {
                    if previous_id != version_id {
                        self.versions
                            .update_status(previous_id, VersionStatus::ArchivedVersion, None)
                            .await
                            .context("Failed to archive previous version")?;
                    }
                }
                self.versions
                    .update_status(version_id, VersionStatus::Published, Some(Utc::now()))
                    .await
                    .context("Failed to publish version")?;
                self.articles
                    .set_published_version(article_id, Some(version_id))
                    .await
                    .context("Failed to move published pointer")?;
            }
            VersionStatus::ArchivedVersion => {
                self.versions
                    .update_status(version_id, VersionStatus::ArchivedVersion, None)
                    .await
                    .context("Failed to archive version")?;
                if article.published_version_id == Some(version_id) {
                    self.articles
                        .set_published_version(article_id, None)
                        .await
                        .context("Failed to clear published pointer")?;
                }
            }
            VersionStatus::Draft => {
                // Unreachable: validate_transition rejects moves back to draft
            }
        }

        tracing::info!(
            article_id,
            version_id,
            status = %new_status,
            "Version status changed"
        );

        // The published tag set changed, so trending is stale
        self.trending.refresh_silently().await;

        self.load_version(article_id, version_id).await
    }

    /// Soft-delete an article and all of its versions.
    pub async fn delete(
        &self,
        article_id: i64,
        user_id: i64,
        role: UserRole,
    ) -> Result<(), ArticleServiceError> {
        let article = self.require_article(article_id).await?;
        authorize(&article, user_id, role)?;

        self.versions
            .soft_delete_by_article(article_id)
            .await
            .context("Failed to delete versions")?;
        self.articles
            .soft_delete(article_id)
            .await
            .context("Failed to delete article")?;

        tracing::info!(article_id, "Article deleted");

        self.trending.refresh_silently().await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internal helpers
    // ------------------------------------------------------------------

    /// Create a version, link its tags, score it, advance the latest
    /// pointer and refresh trending.
    async fn attach_new_version(
        &self,
        article: &Article,
        title: &str,
        content: &str,
        tag_names: &[String],
    ) -> Result<ArticleVersion, ArticleServiceError> {
        let mut version = self
            .versions
            .create(article.id, title, content)
            .await
            .context("Failed to create version")?;

        let tags = self
            .tag_service
            .find_or_create_many(tag_names)
            .await
            .context("Failed to resolve tags")?;
        if !tags.is_empty() {
            let tag_ids: Vec<i64> = tags.iter().map(|tag| tag.id).collect();
            self.versions
                .attach_tags(version.id, &tag_ids)
                .await
                .context("Failed to attach tags")?;
        }
        version.tags = tags;

        self.articles
            .set_latest_version(article.id, version.id, title)
            .await
            .context("Failed to advance latest version")?;

        // Score once the version and its tag links are in place, so the
        // corpus the scorer sees includes this article
        let names: Vec<String> = version.tags.iter().map(|tag| tag.name.clone()).collect();
        let score = self.scorer.score(&names).await;
        self.versions
            .set_score(version.id, score)
            .await
            .context("Failed to store relationship score")?;
        version.tag_relationship_score = score;

        self.trending.refresh_silently().await;

        Ok(version)
    }

    async fn require_article(&self, id: i64) -> Result<Article, ArticleServiceError> {
        self.articles
            .get_by_id(id)
            .await
            .context("Failed to load article")?
            .ok_or(ArticleServiceError::NotFound(id))
    }

    /// Load an article with both version pointers resolved and tags
    /// populated.
    async fn load_article(&self, id: i64) -> Result<Article, ArticleServiceError> {
        let mut article = self.require_article(id).await?;

        if let Some(version_id) = article.latest_version_id {
            article.latest_version = Some(self.load_version(id, version_id).await?);
        }
        if let Some(version_id) = article.published_version_id {
            if article.published_version_id == article.latest_version_id {
                article.published_version = article.latest_version.clone();
            } else {
                article.published_version = Some(self.load_version(id, version_id).await?);
            }
        }

        Ok(article)
    }

    async fn load_version(
        &self,
        article_id: i64,
        version_id: i64,
    ) -> Result<ArticleVersion, ArticleServiceError> {
        let mut version = self
            .versions
            .get_by_id(version_id)
            .await
            .context("Failed to load version")?
            .filter(|version| version.article_id == article_id)
            .ok_or(ArticleServiceError::VersionNotFound(version_id))?;

        version.tags = self
            .tags
            .get_by_version_id(version.id)
            .await
            .context("Failed to load version tags")?;
        Ok(version)
    }
}

fn authorize(article: &Article, user_id: i64, role: UserRole) -> Result<(), ArticleServiceError> {
    if article.author_id == user_id || role.is_editorial() {
        Ok(())
    } else {
        Err(ArticleServiceError::Forbidden)
    }
}

fn validate_title(title: &str) -> Result<(), ArticleServiceError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ArticleServiceError::ValidationError(
            "Title cannot be empty".to_string(),
        ));
    }
    if trimmed.len() > 255 {
        return Err(ArticleServiceError::ValidationError(
            "Title too long (max 255 characters)".to_string(),
        ));
    }
    Ok(())
}

fn validate_transition(
    from: VersionStatus,
    to: VersionStatus,
) -> Result<(), ArticleServiceError> {
    let allowed = matches!(
        (from, to),
        (VersionStatus::Draft, VersionStatus::Published)
            | (VersionStatus::Draft, VersionStatus::ArchivedVersion)
            | (VersionStatus::Published, VersionStatus::ArchivedVersion)
    );
    if allowed {
        Ok(())
    } else {
        Err(ArticleServiceError::InvalidTransition { from, to })
    }
}
