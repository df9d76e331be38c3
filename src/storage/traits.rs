//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::model::{Author, AuthorProfile, Board, Post, Thread};
use crate::state::TraversalStatus;
use crate::storage::{ArchiveCounts, NewPost, RunRecord, RunStatus, TraversalRecord};
use chrono::NaiveDate;
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// All upserts keyed by a unique field (board path, thread path, author
/// name) are idempotent: repeating them returns the existing id and creates
/// nothing. Callers that share a backend between workers serialize access
/// (the archiver keeps it behind a mutex).
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new run anchored to `reference_date`
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str, reference_date: NaiveDate) -> StorageResult<i64>;

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Sets the final status and finish timestamp of a run
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    // ===== Boards =====

    /// Inserts a board or returns the id of the board with this path
    ///
    /// A title given here is only written if the board has none yet.
    fn upsert_board(
        &mut self,
        path: &str,
        site_id: u32,
        title: Option<&str>,
        parent_id: Option<i64>,
    ) -> StorageResult<i64>;

    /// Sets the title of a board that has none yet
    fn set_board_title(&mut self, board_id: i64, title: &str) -> StorageResult<()>;

    fn get_board_by_path(&self, path: &str) -> StorageResult<Option<Board>>;

    fn list_boards(&self) -> StorageResult<Vec<Board>>;

    // ===== Threads =====

    /// Inserts a thread or returns the id of the thread with this path
    ///
    /// The listing title and poll flag of an existing thread are refreshed.
    fn upsert_thread(
        &mut self,
        board_id: i64,
        path: &str,
        title: &str,
        has_poll: bool,
    ) -> StorageResult<i64>;

    /// Threads whose posts have not been stored yet, oldest first
    fn pending_threads(&self) -> StorageResult<Vec<Thread>>;

    /// Scraped poll-bearing threads whose plain page was never archived
    fn threads_missing_polls(&self) -> StorageResult<Vec<Thread>>;

    fn get_thread_by_path(&self, path: &str) -> StorageResult<Option<Thread>>;

    /// Marks a thread's posts as stored, replacing its title with the one
    /// from the print view
    fn mark_thread_scraped(&mut self, thread_id: i64, title: &str) -> StorageResult<()>;

    /// Records that the plain (poll-bearing) page of a thread was archived
    fn mark_poll_archived(&mut self, thread_id: i64) -> StorageResult<()>;

    // ===== Authors =====

    /// Inserts an author or returns the id of the author with this name
    fn upsert_author(&mut self, name: &str) -> StorageResult<i64>;

    fn set_author_profile_path(&mut self, author_id: i64, path: &str) -> StorageResult<()>;

    /// Writes the profile fields of an author and marks the profile scraped
    fn enrich_author(&mut self, author_id: i64, profile: &AuthorProfile) -> StorageResult<()>;

    fn get_author_by_name(&self, name: &str) -> StorageResult<Option<Author>>;

    /// Authors with a known profile path whose profile was never scraped
    fn authors_needing_profiles(&self) -> StorageResult<Vec<Author>>;

    // ===== Posts =====

    /// Inserts a post; returns false if the thread already has a post at
    /// this position
    fn insert_post(&mut self, post: &NewPost<'_>) -> StorageResult<bool>;

    /// Posts of a thread in document order
    fn posts_for_thread(&self, thread_id: i64) -> StorageResult<Vec<Post>>;

    // ===== Traversals =====

    fn record_traversal(&mut self, run_id: i64, record: &TraversalRecord) -> StorageResult<()>;

    fn traversals_for_run(&self, run_id: i64) -> StorageResult<Vec<TraversalRecord>>;

    // ===== Statistics =====

    fn counts(&self) -> StorageResult<ArchiveCounts>;

    /// Traversal statuses of a run (status -> count)
    fn traversal_status_counts(&self, run_id: i64)
        -> StorageResult<HashMap<TraversalStatus, u64>>;
}
