//! Forum Archiver: archives a single web forum into SQLite
//!
//! This crate walks a forum's board/thread hierarchy over HTTP, extracts
//! boards, threads, posts and authors from the forum's HTML, normalizes the
//! forum's locale-specific date text against a fixed reference date, and
//! persists the records through a storage adapter.

pub mod archive;
pub mod config;
pub mod crawler;
pub mod dates;
pub mod extract;
pub mod model;
pub mod output;
pub mod page;
pub mod site;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for archiver operations
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Structural parse error: {0}")]
    Extract(#[from] extract::ExtractError),

    #[error("Normalization error: {0}")]
    Normalization(#[from] dates::NormalizationError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker task failed: {0}")]
    Worker(String),
}

/// Configuration-specific errors
///
/// Any of these aborts a run before work starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid board path: {0}")]
    InvalidBoardPath(String),

    #[error(transparent)]
    Ruleset(#[from] extract::RulesetError),

    #[error("Base URL {url} is unreachable: {reason}")]
    UnreachableBaseUrl { url: String, reason: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("URL {0} does not belong to the archived site")]
    ForeignHost(String),
}

/// Result type alias for archiver operations
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use dates::DateNormalizer;
pub use extract::Ruleset;
pub use state::{TraversalState, TraversalStatus};
