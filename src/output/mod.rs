//! Output module for run summaries and reports
//!
//! This module handles:
//! - Printing archive statistics (`--stats`)
//! - Generating markdown summaries of the latest run (`--export-summary`)

mod markdown;
pub mod stats;
mod summary;

pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use stats::{load_statistics, print_statistics, ArchiveStatistics, ArchivedPages};
pub use summary::{OutputError, OutputResult, RunSummary};

use crate::storage::Storage;
use chrono::{DateTime, Utc};

/// Builds the summary of the most recent run
pub fn generate_summary(storage: &dyn Storage) -> OutputResult<RunSummary> {
    let run = storage.get_latest_run()?.ok_or(OutputError::NoRuns)?;

    let duration_seconds = run.finished_at.as_deref().and_then(|finished| {
        let started = run.started_at.parse::<DateTime<Utc>>().ok()?;
        let finished = finished.parse::<DateTime<Utc>>().ok()?;
        u64::try_from((finished - started).num_seconds()).ok()
    });

    let incomplete = storage
        .traversals_for_run(run.id)?
        .into_iter()
        .filter(|t| !t.status.is_complete())
        .collect();

    Ok(RunSummary {
        run_id: run.id,
        started_at: run.started_at.clone(),
        finished_at: run.finished_at.clone(),
        duration_seconds,
        status: run.status.to_db_string().to_string(),
        config_hash: run.config_hash.clone(),
        reference_date: run.reference_date.to_string(),
        counts: storage.counts()?,
        traversals_by_status: storage.traversal_status_counts(run.id)?,
        incomplete,
    })
}
