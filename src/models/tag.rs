//! Tag model
//!
//! Tags are created lazily the first time a name appears in an article
//! version's tag list. `usage_count` and `trending_score` are derived values
//! maintained by the trending updater, never mutated anywhere else.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tag entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    /// Unique identifier
    pub id: i64,
    /// Unique tag name
    pub name: String,
    /// Number of distinct articles whose published version carries this tag.
    /// Cached and eventually consistent; recomputed by the trending updater.
    pub usage_count: i64,
    /// Time-decayed popularity score
    pub trending_score: f64,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp. Also the trending decay clock: refreshed when
    /// usage increases, so a tag regaining popularity restarts its decay.
    pub updated_at: DateTime<Utc>,
}

impl Tag {
    /// Create a new Tag with zero usage. The ID is assigned by the database.
    pub fn new(name: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name,
            usage_count: 0,
            trending_score: 0.0,
            created_at: now,
            updated_at: now,
        }
    }
}
