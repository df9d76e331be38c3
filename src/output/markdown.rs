//! Markdown summary generation
//!
//! This module generates human-readable markdown summaries of a run,
//! including archive contents and the traversal units that did not
//! complete.

use crate::output::summary::{OutputResult, RunSummary};
use crate::state::TraversalStatus;
use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes the markdown summary of a run to `output_path`
pub fn generate_markdown_summary(summary: &RunSummary, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(summary);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run summary as markdown
pub fn format_markdown_summary(summary: &RunSummary) -> String {
    let mut md = String::new();

    md.push_str("# Forum Archive Run Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    let _ = writeln!(md, "- **Run ID**: {}", summary.run_id);
    let _ = writeln!(md, "- **Started**: {}", summary.started_at);
    if let Some(finished) = &summary.finished_at {
        let _ = writeln!(md, "- **Finished**: {}", finished);
    }
    if let Some(duration) = summary.duration_seconds {
        let _ = writeln!(
            md,
            "- **Duration**: {} seconds ({:.2} minutes)",
            duration,
            duration as f64 / 60.0
        );
    }
    let _ = writeln!(md, "- **Status**: {}", summary.status);
    let _ = writeln!(md, "- **Reference Date**: {}", summary.reference_date);
    let _ = writeln!(md, "- **Config Hash**: {}\n", summary.config_hash);

    // Archive contents
    let counts = &summary.counts;
    md.push_str("## Archive Contents\n\n");
    let _ = writeln!(md, "- **Boards**: {}", counts.boards);
    let _ = writeln!(
        md,
        "- **Threads**: {} ({} not yet scraped)",
        counts.threads, counts.threads_pending
    );
    let _ = writeln!(md, "- **Posts**: {}", counts.posts);
    let _ = writeln!(
        md,
        "- **Authors**: {} ({} with profile)\n",
        counts.authors, counts.profiles
    );

    // Traversal breakdown
    md.push_str("## Traversal Breakdown\n\n");
    md.push_str("| Status | Count |\n");
    md.push_str("|--------|-------|\n");
    for status in TraversalStatus::all_statuses() {
        let count = summary
            .traversals_by_status
            .get(&status)
            .copied()
            .unwrap_or(0);
        let _ = writeln!(md, "| {} | {} |", status, count);
    }
    let _ = writeln!(
        md,
        "\n- **Completion Rate**: {:.2}%\n",
        summary.completion_rate()
    );

    if !summary.incomplete.is_empty() {
        md.push_str("## Incomplete Traversals\n\n");
        md.push_str("| Kind | Path | Status | Records | Pages | Cause |\n");
        md.push_str("|------|------|--------|---------|-------|-------|\n");

        for record in &summary.incomplete {
            let _ = writeln!(
                md,
                "| {} | {} | {} | {} | {} | {} |",
                record.kind,
                record.key,
                record.status,
                record.records,
                record.pages,
                record.cause.as_deref().unwrap_or("").replace('|', "\\|")
            );
        }
        md.push('\n');
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TraversalKind;
    use crate::storage::TraversalRecord;

    fn create_test_summary() -> RunSummary {
        let mut summary = RunSummary::new();
        summary.run_id = 1;
        summary.started_at = "2017-09-08T10:00:00+00:00".to_string();
        summary.finished_at = Some("2017-09-08T11:00:00+00:00".to_string());
        summary.duration_seconds = Some(3600);
        summary.status = "completed".to_string();
        summary.reference_date = "2017-09-08".to_string();
        summary.config_hash = "abc123".to_string();
        summary.counts.boards = 3;
        summary.counts.threads = 67;
        summary.counts.posts = 1234;
        summary
            .traversals_by_status
            .insert(TraversalStatus::Complete, 70);
        summary
    }

    #[test]
    fn test_format_markdown_summary() {
        let markdown = format_markdown_summary(&create_test_summary());

        assert!(markdown.contains("# Forum Archive Run Summary"));
        assert!(markdown.contains("Run ID"));
        assert!(markdown.contains("- **Reference Date**: 2017-09-08"));
        assert!(markdown.contains("- **Posts**: 1234"));
        assert!(markdown.contains("| complete | 70 |"));
        assert!(!markdown.contains("Incomplete Traversals"));
    }

    #[test]
    fn test_markdown_lists_incomplete_traversals() {
        let mut summary = create_test_summary();
        summary.incomplete.push(TraversalRecord {
            kind: TraversalKind::Board,
            key: "/news_b2/".to_string(),
            status: TraversalStatus::Partial,
            cause: Some("gave up | HTTP 503".to_string()),
            records: 30,
            pages: 1,
        });

        let markdown = format_markdown_summary(&summary);

        assert!(markdown.contains("## Incomplete Traversals"));
        assert!(markdown.contains("| board | /news_b2/ | partial | 30 | 1 | gave up \\| HTTP 503 |"));
    }

    #[test]
    fn test_generate_markdown_summary_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.md");

        generate_markdown_summary(&create_test_summary(), &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# Forum Archive Run Summary"));
    }
}
