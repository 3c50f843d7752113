//! Repository layer
//!
//! Data access for all entities. Each repository is a trait with an
//! SQLx-backed implementation that dispatches on the configured driver.

pub mod article;
pub mod corpus;
pub mod tag;
pub mod user;
pub mod version;

pub use article::{ArticleRepository, SqlxArticleRepository};
pub use corpus::{CorpusStatsRepository, SqlxCorpusStatsRepository};
pub use tag::{SqlxTagRepository, TagMetricsUpdate, TagRepository};
pub use user::{SqlxUserRepository, UserRepository};
pub use version::{SqlxVersionRepository, VersionRepository};
