//! Business logic services
//!
//! Services sit between the HTTP handlers and the repositories. Each owns
//! its repositories via `Arc<dyn Trait>` and exposes domain operations with
//! typed errors.

pub mod article;
pub mod auth;
pub mod password;
pub mod scoring;
pub mod tag;
pub mod trending;

pub use article::{ArticleService, ArticleServiceError};
pub use auth::{AuthService, AuthServiceError, Claims};
pub use scoring::RelationshipScorer;
pub use tag::{TagService, TagServiceError};
pub use trending::TrendingUpdater;
