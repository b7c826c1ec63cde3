//! ACGE Common Library
//!
//! Shared code for the ACGE backend including:
//! - Database models and repository patterns
//! - Dossier workflow rules
//! - Error types and handling
//! - Configuration management
//! - Authentication utilities
//! - In-memory TTL cache
//! - Blob storage client
//! - Metrics and observability

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod storage;
pub mod workflow;

// Re-export commonly used types
pub use errors::{AppError, Result};
pub use config::AppConfig;
pub use db::{DbPool, Repository};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
