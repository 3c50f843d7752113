//! Article model
//!
//! An article is a thin anchor row: it owns its versions and carries the
//! latest-version and published-version pointers that scope all corpus
//! statistics.

use crate::models::ArticleVersion;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Article entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
    /// Unique identifier
    pub id: i64,
    /// Owning author
    pub author_id: i64,
    /// Title of the initial version (kept for listing convenience)
    pub title: String,
    /// The most recently created version, regardless of status
    pub latest_version_id: Option<i64>,
    /// The currently published version, if any
    pub published_version_id: Option<i64>,
    /// Latest version with tags, populated on detail reads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<ArticleVersion>,
    /// Published version with tags, populated on detail reads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_version: Option<ArticleVersion>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Sort direction for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Filter, sort and pagination parameters for article listings
#[derive(Debug, Clone, Default)]
pub struct ArticleListParams {
    /// Filter by version status. Published filters on the published-version
    /// pointer; any other status filters on the latest version.
    pub status: Option<crate::models::VersionStatus>,
    /// Filter by author
    pub author_id: Option<i64>,
    /// Filter by tag on the active version
    pub tag_id: Option<i64>,
    /// 1-based page number
    pub page: u32,
    /// Page size
    pub limit: u32,
    /// Sort column: created_at (default), updated_at, or
    /// tag_relationship_score (sorts on the active version)
    pub sort_by: Option<String>,
    /// Sort direction
    pub sort_order: SortOrder,
}

impl ArticleListParams {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, 100),
            ..Default::default()
        }
    }

    /// Zero-based row offset for the current page.
    pub fn offset(&self) -> u32 {
        (self.page.max(1) - 1) * self.limit
    }
}

/// A page of results with total count
#[derive(Debug, Clone, Serialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, page: u32, limit: u32) -> Self {
        Self {
            items,
            total,
            page,
            limit,
        }
    }

    pub fn total_pages(&self) -> u32 {
        if self.limit == 0 {
            return 0;
        }
        ((self.total as u32) + self.limit - 1) / self.limit
    }
}
