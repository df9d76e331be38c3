//! Run summary types
//!
//! This module defines the data gathered about one archiver run for
//! reporting, and the output error type.

use crate::state::TraversalStatus;
use crate::storage::{ArchiveCounts, StorageError, TraversalRecord};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("No archiver runs found in database")]
    NoRuns,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Everything reported about one run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    // Run metadata
    pub run_id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub duration_seconds: Option<u64>,
    pub status: String,
    pub config_hash: String,
    pub reference_date: String,

    // Archive contents after the run
    pub counts: ArchiveCounts,

    // Traversal units of the run (status -> count)
    pub traversals_by_status: HashMap<TraversalStatus, u64>,

    // Units that did not complete, in recording order
    pub incomplete: Vec<TraversalRecord>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_traversals(&self) -> u64 {
        self.traversals_by_status.values().sum()
    }

    /// Share of traversal units that completed, as a percentage
    pub fn completion_rate(&self) -> f64 {
        let total = self.total_traversals();
        if total == 0 {
            return 0.0;
        }
        let complete = self
            .traversals_by_status
            .get(&TraversalStatus::Complete)
            .copied()
            .unwrap_or(0);
        (complete as f64 / total as f64) * 100.0
    }
}
