//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::dates::{Birthday, LastActivity};
use crate::model::{Author, AuthorProfile, Board, Gender, Post, Thread};
use crate::state::{TraversalKind, TraversalStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{ArchiveCounts, NewPost, RunRecord, RunStatus, TraversalRecord};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path` and initializes the schema
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Runs `f` inside a transaction, rolling back if it fails
    pub fn transaction<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> StorageResult<T>,
    ) -> StorageResult<T> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        match f(self) {
            Ok(value) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK") {
                    warn!(error = %rollback, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    fn count(&self, sql: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}

fn parse_column<T, E>(
    index: usize,
    value: &str,
    parse: impl FnOnce(&str) -> Result<T, E>,
) -> rusqlite::Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    parse(value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn row_to_run(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    let reference_date: String = row.get(4)?;
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        reference_date: parse_column(4, &reference_date, |s| {
            NaiveDate::parse_from_str(s, DATE_FORMAT)
        })?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?).unwrap_or(RunStatus::Failed),
    })
}

fn row_to_board(row: &Row<'_>) -> rusqlite::Result<Board> {
    Ok(Board {
        id: row.get(0)?,
        path: row.get(1)?,
        title: row.get(2)?,
        site_id: row.get(3)?,
        parent_id: row.get(4)?,
    })
}

fn row_to_thread(row: &Row<'_>) -> rusqlite::Result<Thread> {
    Ok(Thread {
        id: row.get(0)?,
        board_id: row.get(1)?,
        path: row.get(2)?,
        title: row.get(3)?,
        has_poll: row.get(4)?,
        poll_archived: row.get(5)?,
        scraped_at: row.get(6)?,
    })
}

fn row_to_author(row: &Row<'_>) -> rusqlite::Result<Author> {
    let gender: Option<String> = row.get(3)?;
    let birthday: Option<String> = row.get(4)?;
    let registered_at: Option<String> = row.get(5)?;
    let last_activity: Option<String> = row.get(6)?;

    Ok(Author {
        id: row.get(0)?,
        name: row.get(1)?,
        profile_path: row.get(2)?,
        profile: AuthorProfile {
            gender: gender.as_deref().and_then(Gender::from_db_string),
            birthday: birthday.as_deref().and_then(Birthday::from_db_string),
            registered_at: registered_at
                .as_deref()
                .and_then(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).ok()),
            last_activity: last_activity.as_deref().and_then(LastActivity::from_db_string),
        },
        profile_scraped_at: row.get(7)?,
    })
}

const THREAD_COLUMNS: &str =
    "id, board_id, path, title, has_poll, poll_archived, scraped_at";

const AUTHOR_COLUMNS: &str = "id, name, profile_path, gender, birthday, registered_at, \
     last_activity, profile_scraped_at";

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str, reference_date: NaiveDate) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, reference_date, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                now,
                config_hash,
                reference_date.format(DATE_FORMAT).to_string(),
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, reference_date, status
                 FROM runs WHERE id = ?1",
                params![run_id],
                row_to_run,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, reference_date, status
                 FROM runs ORDER BY id DESC LIMIT 1",
                [],
                row_to_run,
            )
            .optional()?)
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Boards =====

    fn upsert_board(
        &mut self,
        path: &str,
        site_id: u32,
        title: Option<&str>,
        parent_id: Option<i64>,
    ) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO boards (path, title, site_id, parent_id) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(path) DO UPDATE SET
                 title = COALESCE(boards.title, excluded.title),
                 parent_id = COALESCE(boards.parent_id, excluded.parent_id)",
            params![path, title, site_id, parent_id],
        )?;

        Ok(self
            .conn
            .query_row("SELECT id FROM boards WHERE path = ?1", params![path], |row| {
                row.get(0)
            })?)
    }

    fn set_board_title(&mut self, board_id: i64, title: &str) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE boards SET title = ?1 WHERE id = ?2 AND title IS NULL",
            params![title, board_id],
        )?;
        Ok(())
    }

    fn get_board_by_path(&self, path: &str) -> StorageResult<Option<Board>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, path, title, site_id, parent_id FROM boards WHERE path = ?1",
                params![path],
                row_to_board,
            )
            .optional()?)
    }

    fn list_boards(&self) -> StorageResult<Vec<Board>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, path, title, site_id, parent_id FROM boards ORDER BY id")?;
        let boards = stmt
            .query_map([], row_to_board)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(boards)
    }

    // ===== Threads =====

    fn upsert_thread(
        &mut self,
        board_id: i64,
        path: &str,
        title: &str,
        has_poll: bool,
    ) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO threads (board_id, path, title, has_poll) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(path) DO UPDATE SET
                 title = CASE WHEN threads.scraped_at IS NULL THEN excluded.title ELSE threads.title END,
                 has_poll = excluded.has_poll",
            params![board_id, path, title, has_poll],
        )?;

        Ok(self
            .conn
            .query_row("SELECT id FROM threads WHERE path = ?1", params![path], |row| {
                row.get(0)
            })?)
    }

    fn pending_threads(&self) -> StorageResult<Vec<Thread>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM threads WHERE scraped_at IS NULL ORDER BY id",
            THREAD_COLUMNS
        ))?;
        let threads = stmt
            .query_map([], row_to_thread)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(threads)
    }

    fn threads_missing_polls(&self) -> StorageResult<Vec<Thread>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM threads
             WHERE scraped_at IS NOT NULL AND has_poll = 1 AND poll_archived = 0
             ORDER BY id",
            THREAD_COLUMNS
        ))?;
        let threads = stmt
            .query_map([], row_to_thread)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(threads)
    }

    fn get_thread_by_path(&self, path: &str) -> StorageResult<Option<Thread>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {} FROM threads WHERE path = ?1", THREAD_COLUMNS),
                params![path],
                row_to_thread,
            )
            .optional()?)
    }

    fn mark_thread_scraped(&mut self, thread_id: i64, title: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE threads SET scraped_at = ?1, title = ?2 WHERE id = ?3",
            params![now, title, thread_id],
        )?;
        if updated == 0 {
            return Err(StorageError::NotFound(format!("Thread {}", thread_id)));
        }
        Ok(())
    }

    fn mark_poll_archived(&mut self, thread_id: i64) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE threads SET poll_archived = 1 WHERE id = ?1",
            params![thread_id],
        )?;
        Ok(())
    }

    // ===== Authors =====

    fn upsert_author(&mut self, name: &str) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO authors (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
            params![name],
        )?;

        Ok(self
            .conn
            .query_row("SELECT id FROM authors WHERE name = ?1", params![name], |row| {
                row.get(0)
            })?)
    }

    fn set_author_profile_path(&mut self, author_id: i64, path: &str) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE authors SET profile_path = ?1 WHERE id = ?2",
            params![path, author_id],
        )?;
        Ok(())
    }

    fn enrich_author(&mut self, author_id: i64, profile: &AuthorProfile) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE authors SET gender = ?1, birthday = ?2, registered_at = ?3,
                 last_activity = ?4, profile_scraped_at = ?5
             WHERE id = ?6",
            params![
                profile.gender.map(|g| g.to_db_string()),
                profile.birthday.map(|b| b.to_string()),
                profile
                    .registered_at
                    .map(|d| d.format(DATE_FORMAT).to_string()),
                profile.last_activity.map(|a| a.to_db_string()),
                now,
                author_id
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::NotFound(format!("Author {}", author_id)));
        }
        Ok(())
    }

    fn get_author_by_name(&self, name: &str) -> StorageResult<Option<Author>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {} FROM authors WHERE name = ?1", AUTHOR_COLUMNS),
                params![name],
                row_to_author,
            )
            .optional()?)
    }

    fn authors_needing_profiles(&self) -> StorageResult<Vec<Author>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM authors
             WHERE profile_path IS NOT NULL AND profile_scraped_at IS NULL
             ORDER BY id",
            AUTHOR_COLUMNS
        ))?;
        let authors = stmt
            .query_map([], row_to_author)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(authors)
    }

    // ===== Posts =====

    fn insert_post(&mut self, post: &NewPost<'_>) -> StorageResult<bool> {
        let inserted = self.conn.execute(
            "INSERT INTO posts (thread_id, position, author_id, created_at, body_markup, raw_content)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(thread_id, position) DO NOTHING",
            params![
                post.thread_id,
                post.position,
                post.author_id,
                post.created_at.as_ref().map(format_timestamp),
                post.body_markup,
                post.raw_content
            ],
        )?;
        Ok(inserted == 1)
    }

    fn posts_for_thread(&self, thread_id: i64) -> StorageResult<Vec<Post>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.id, p.thread_id, p.position, p.author_id, a.name, p.created_at,
                    p.body_markup, p.raw_content
             FROM posts p JOIN authors a ON a.id = p.author_id
             WHERE p.thread_id = ?1
             ORDER BY p.position",
        )?;
        let posts = stmt
            .query_map(params![thread_id], |row| {
                let created_at: Option<String> = row.get(5)?;
                Ok(Post {
                    id: row.get(0)?,
                    thread_id: row.get(1)?,
                    position: row.get(2)?,
                    author_id: row.get(3)?,
                    author_name: row.get(4)?,
                    created_at: created_at
                        .as_deref()
                        .map(|s| {
                            parse_column(5, s, |s| {
                                NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
                            })
                        })
                        .transpose()?,
                    body_markup: row.get(6)?,
                    raw_content: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    // ===== Traversals =====

    fn record_traversal(&mut self, run_id: i64, record: &TraversalRecord) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO traversals (run_id, kind, key, status, cause, records, pages, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                run_id,
                record.kind.to_db_string(),
                record.key,
                record.status.to_db_string(),
                record.cause,
                record.records as i64,
                record.pages,
                now
            ],
        )?;
        Ok(())
    }

    fn traversals_for_run(&self, run_id: i64) -> StorageResult<Vec<TraversalRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT kind, key, status, cause, records, pages FROM traversals
             WHERE run_id = ?1 ORDER BY id",
        )?;
        let records = stmt
            .query_map(params![run_id], |row| {
                let kind: String = row.get(0)?;
                let status: String = row.get(2)?;
                Ok(TraversalRecord {
                    kind: TraversalKind::from_db_string(&kind).unwrap_or(TraversalKind::Board),
                    key: row.get(1)?,
                    status: TraversalStatus::from_db_string(&status)
                        .unwrap_or(TraversalStatus::Partial),
                    cause: row.get(3)?,
                    records: row.get::<_, i64>(4)?.max(0) as u64,
                    pages: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    // ===== Statistics =====

    fn counts(&self) -> StorageResult<ArchiveCounts> {
        Ok(ArchiveCounts {
            boards: self.count("SELECT COUNT(*) FROM boards")?,
            threads: self.count("SELECT COUNT(*) FROM threads")?,
            threads_pending: self.count("SELECT COUNT(*) FROM threads WHERE scraped_at IS NULL")?,
            posts: self.count("SELECT COUNT(*) FROM posts")?,
            authors: self.count("SELECT COUNT(*) FROM authors")?,
            profiles: self
                .count("SELECT COUNT(*) FROM authors WHERE profile_scraped_at IS NOT NULL")?,
        })
    }

    fn traversal_status_counts(
        &self,
        run_id: i64,
    ) -> StorageResult<HashMap<TraversalStatus, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT status, COUNT(*) FROM traversals WHERE run_id = ?1 GROUP BY status",
        )?;
        let mut counts = HashMap::new();
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (status, count) = row?;
            if let Some(status) = TraversalStatus::from_db_string(&status) {
                counts.insert(status, count.max(0) as u64);
            }
        }
        Ok(counts)
    }
}
