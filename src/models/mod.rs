//! Data models
//!
//! Data structures used throughout the Verso CMS:
//! - Database entities (User, Tag, Article, ArticleVersion)
//! - List/pagination parameter types

mod article;
mod tag;
mod user;
mod version;

pub use article::{Article, ArticleListParams, PagedResult, SortOrder};
pub use tag::Tag;
pub use user::{User, UserRole};
pub use version::{ArticleVersion, VersionStatus};
