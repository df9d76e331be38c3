//! Storage module for persisting the archive
//!
//! This module handles all database operations for the archiver, including:
//! - SQLite database initialization and schema management
//! - Idempotent upserts of boards, threads and authors keyed by path/name
//! - Post insertion in document order
//! - Run and traversal bookkeeping for reports and resumption

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::{TraversalKind, TraversalStatus};
use chrono::{NaiveDate, NaiveDateTime};
use std::path::Path;

/// Opens (or creates) the archive database at `path`
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// A post ready to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost<'a> {
    pub thread_id: i64,
    /// Zero-based position in the thread
    pub position: u32,
    pub author_id: i64,
    pub created_at: Option<NaiveDateTime>,
    pub body_markup: &'a str,
    pub raw_content: &'a str,
}

/// Represents an archiver run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub reference_date: NaiveDate,
    pub status: RunStatus,
}

/// Status of an archiver run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Outcome of one traversal unit within a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalRecord {
    pub kind: TraversalKind,
    /// Path of the board, thread, profile or member list
    pub key: String,
    pub status: TraversalStatus,
    /// Error that ended the traversal early, if any
    pub cause: Option<String>,
    pub records: u64,
    pub pages: u32,
}

/// Row counts of the archive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveCounts {
    pub boards: u64,
    pub threads: u64,
    pub threads_pending: u64,
    pub posts: u64,
    pub authors: u64,
    pub profiles: u64,
}
