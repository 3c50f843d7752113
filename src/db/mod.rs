//! Database layer
//!
//! Provides the database abstraction for Verso. Both SQLite (default, for
//! single-binary deployment) and MySQL are supported behind the
//! `DatabasePool` trait; the driver is selected by configuration.

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, create_test_pool, DatabasePool, DynDatabasePool};
