//! Verso - a versioned content management API
//!
//! This library provides the core functionality for the Verso CMS:
//! articles with multi-version history, lazily-created tags with trending
//! analytics, and JWT-based role authentication.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
