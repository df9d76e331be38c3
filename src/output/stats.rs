//! Statistics from the archive database
//!
//! This module provides functionality for extracting and displaying
//! archive statistics from the storage layer.

use crate::archive::{PageArchive, PageKind};
use crate::output::OutputResult;
use crate::state::TraversalStatus;
use crate::storage::{ArchiveCounts, RunRecord, Storage};
use std::collections::HashMap;

/// Archive statistics summary
#[derive(Debug, Clone)]
pub struct ArchiveStatistics {
    /// Row counts of the archive
    pub counts: ArchiveCounts,

    /// The most recent run, if any
    pub latest_run: Option<RunRecord>,

    /// Traversal units of the latest run by status
    pub traversals_by_status: HashMap<TraversalStatus, u64>,

    /// Files in the raw page archive, if one is configured
    pub archived: Option<ArchivedPages>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchivedPages {
    pub pages: u64,
    /// Plain pages of poll-bearing threads
    pub polls: u64,
}

/// Loads statistics from storage and the raw page archive
pub fn load_statistics(
    storage: &dyn Storage,
    archive: Option<&PageArchive>,
) -> OutputResult<ArchiveStatistics> {
    let counts = storage.counts()?;
    let latest_run = storage.get_latest_run()?;

    let traversals_by_status = match &latest_run {
        Some(run) => storage.traversal_status_counts(run.id)?,
        None => HashMap::new(),
    };

    let archived = match archive {
        Some(archive) => {
            let mut archived = ArchivedPages::default();
            for (_, kind) in archive.pages()? {
                match kind {
                    PageKind::Page => archived.pages += 1,
                    PageKind::Poll => archived.polls += 1,
                }
            }
            Some(archived)
        }
        None => None,
    };

    Ok(ArchiveStatistics {
        counts,
        latest_run,
        traversals_by_status,
        archived,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &ArchiveStatistics) {
    let counts = &stats.counts;

    println!("=== Archive Statistics ===\n");

    println!("Overview:");
    println!("  Boards: {}", counts.boards);
    println!(
        "  Threads: {} ({} not yet scraped)",
        counts.threads, counts.threads_pending
    );
    println!("  Posts: {}", counts.posts);
    println!(
        "  Authors: {} ({} with profile)",
        counts.authors, counts.profiles
    );
    if let Some(archived) = &stats.archived {
        println!(
            "  Raw pages: {} ({} poll pages)",
            archived.pages + archived.polls,
            archived.polls
        );
    }
    println!();

    let Some(run) = &stats.latest_run else {
        println!("No runs recorded.");
        return;
    };

    println!("Latest Run:");
    println!("  Run ID: {}", run.id);
    println!("  Started: {}", run.started_at);
    if let Some(finished) = &run.finished_at {
        println!("  Finished: {}", finished);
    }
    println!("  Reference date: {}", run.reference_date);
    println!("  Status: {}", run.status.to_db_string());
    println!();

    let total: u64 = stats.traversals_by_status.values().sum();
    println!("Traversals by Status:");
    for status in TraversalStatus::all_statuses() {
        let count = stats
            .traversals_by_status
            .get(&status)
            .copied()
            .unwrap_or(0);
        let percentage = if total > 0 {
            (count as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;
    use chrono::NaiveDate;

    #[test]
    fn test_statistics_of_empty_archive() {
        let storage = SqliteStorage::new_in_memory().unwrap();

        let stats = load_statistics(&storage, None).unwrap();

        assert_eq!(stats.counts, ArchiveCounts::default());
        assert!(stats.latest_run.is_none());
        assert!(stats.traversals_by_status.is_empty());
        assert!(stats.archived.is_none());
    }

    #[test]
    fn test_statistics_count_archived_pages() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let archive = PageArchive::create(dir.path()).unwrap();
        archive.store("/news_b2/", PageKind::Page, b"a").unwrap();
        archive.store("/news/umfrage_t6/komplett/", PageKind::Page, b"b").unwrap();
        archive.store("/news/umfrage_t6/", PageKind::Poll, b"c").unwrap();

        let stats = load_statistics(&storage, Some(&archive)).unwrap();

        assert_eq!(
            stats.archived,
            Some(ArchivedPages { pages: 2, polls: 1 })
        );
    }

    #[test]
    fn test_statistics_follow_latest_run() {
        use crate::state::TraversalKind;
        use crate::storage::TraversalRecord;

        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let reference = NaiveDate::from_ymd_opt(2017, 9, 8).unwrap();
        storage.create_run("old", reference).unwrap();
        let run_id = storage.create_run("new", reference).unwrap();
        storage
            .record_traversal(
                run_id,
                &TraversalRecord {
                    kind: TraversalKind::Board,
                    key: "/news_b2/".to_string(),
                    status: TraversalStatus::Truncated,
                    cause: None,
                    records: 60,
                    pages: 2,
                },
            )
            .unwrap();

        let stats = load_statistics(&storage, None).unwrap();

        assert_eq!(stats.latest_run.map(|r| r.id), Some(run_id));
        assert_eq!(
            stats.traversals_by_status.get(&TraversalStatus::Truncated),
            Some(&1)
        );
    }
}
