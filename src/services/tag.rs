//! Tag service
//!
//! Explicit tag management plus the find-or-create path used when tags
//! arrive attached to an article version.

use crate::db::repositories::TagRepository;
use crate::models::Tag;
use anyhow::Context;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Error types for tag service operations
#[derive(Debug, thiserror::Error)]
pub enum TagServiceError {
    /// Tag not found
    #[error("Tag not found: {0}")]
    NotFound(i64),

    /// A tag with this name already exists
    #[error("Tag already exists: {0}")]
    AlreadyExists(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Tag service
pub struct TagService {
    repo: Arc<dyn TagRepository>,
}

impl TagService {
    /// Create a new tag service
    pub fn new(repo: Arc<dyn TagRepository>) -> Self {
        Self { repo }
    }

    /// Create a tag explicitly. Unlike [`find_or_create_many`], an
    /// existing name is an error here.
    ///
    /// [`find_or_create_many`]: TagService::find_or_create_many
    pub async fn create(&self, name: &str) -> Result<Tag, TagServiceError> {
        let name = normalize_name(name)?;

        if self
            .repo
            .get_by_name(&name)
            .await
            .context("Failed to check existing tag")?
            .is_some()
        {
            return Err(TagServiceError::AlreadyExists(name));
        }

        self.repo
            .create(&Tag::new(name))
            .await
            .context("Failed to create tag")
            .map_err(Into::into)
    }

    /// Get tag by ID
    pub async fn get(&self, id: i64) -> Result<Tag, TagServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get tag")?
            .ok_or(TagServiceError::NotFound(id))
    }

    /// List all tags, most trending first
    pub async fn list(&self) -> Result<Vec<Tag>, TagServiceError> {
        self.repo
            .list()
            .await
            .context("Failed to list tags")
            .map_err(Into::into)
    }

    /// Resolve a list of tag names to tags, creating any that don't exist
    /// yet. Names are trimmed, empties dropped, duplicates collapsed.
    pub async fn find_or_create_many(
        &self,
        names: &[String],
    ) -> Result<Vec<Tag>, TagServiceError> {
        let normalized: BTreeSet<String> = names
            .iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();

        let mut tags = Vec::with_capacity(normalized.len());
        for name in normalized {
            let tag = match self
                .repo
                .get_by_name(&name)
                .await
                .context("Failed to look up tag")?
            {
                Some(existing) => existing,
                None => self
                    .repo
                    .create(&Tag::new(name))
                    .await
                    .context("Failed to create tag")?,
            };
            tags.push(tag);
        }
        Ok(tags)
    }
}

fn normalize_name(name: &str) -> Result<String, TagServiceError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(TagServiceError::ValidationError(
            "Tag name cannot be empty".to_string(),
        ));
    }
    if trimmed.len() > 100 {
        return Err(TagServiceError::ValidationError(
            "Tag name too long (max 100 characters)".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}
