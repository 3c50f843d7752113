//! Article version model
//!
//! Every edit to an article creates a new immutable version row. Only
//! `status`, `published_at` and `tag_relationship_score` are updated in
//! place after creation.

use crate::models::Tag;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of an article version.
///
/// At most one version per article is published at a time; publishing a new
/// version archives the previously published one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    /// Work in progress (default)
    #[default]
    Draft,
    /// The publicly visible version
    Published,
    /// A formerly published (or retired) version
    ArchivedVersion,
}

impl VersionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionStatus::Draft => "draft",
            VersionStatus::Published => "published",
            VersionStatus::ArchivedVersion => "archived_version",
        }
    }

    /// Parse a status from its storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(VersionStatus::Draft),
            "published" => Some(VersionStatus::Published),
            "archived_version" => Some(VersionStatus::ArchivedVersion),
            _ => None,
        }
    }
}

impl std::fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Article version entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArticleVersion {
    /// Unique identifier
    pub id: i64,
    /// Owning article
    pub article_id: i64,
    /// 1-based, monotonically increasing per article
    pub version_number: i32,
    /// Title at this version
    pub title: String,
    /// Body content at this version
    pub content: String,
    /// Lifecycle status
    pub status: VersionStatus,
    /// Mean pairwise PMI over this version's tag set; 0.0 when the version
    /// has fewer than two tags or no pair has corpus support.
    pub tag_relationship_score: f64,
    /// Tags attached to this version, sorted by name
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Set when the version is published, cleared when archived
    pub published_at: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}
