//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the archive database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track archiver runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    reference_date TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Forum sections
CREATE TABLE IF NOT EXISTS boards (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    title TEXT,
    site_id INTEGER NOT NULL,
    parent_id INTEGER REFERENCES boards(id)
);

-- Threads discovered in board listings
CREATE TABLE IF NOT EXISTS threads (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    board_id INTEGER NOT NULL REFERENCES boards(id),
    path TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    has_poll INTEGER NOT NULL DEFAULT 0,
    poll_archived INTEGER NOT NULL DEFAULT 0,
    scraped_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_threads_board ON threads(board_id);
CREATE INDEX IF NOT EXISTS idx_threads_scraped ON threads(scraped_at);

-- Members, resolved by name
CREATE TABLE IF NOT EXISTS authors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    profile_path TEXT,
    gender TEXT,
    birthday TEXT,
    registered_at TEXT,
    last_activity TEXT,
    profile_scraped_at TEXT
);

-- Posts in document order
CREATE TABLE IF NOT EXISTS posts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    thread_id INTEGER NOT NULL REFERENCES threads(id),
    position INTEGER NOT NULL,
    author_id INTEGER NOT NULL REFERENCES authors(id),
    created_at TEXT,
    body_markup TEXT NOT NULL,
    raw_content TEXT NOT NULL,
    UNIQUE(thread_id, position)
);

CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id);

-- Outcome of each traversal unit per run
CREATE TABLE IF NOT EXISTS traversals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    kind TEXT NOT NULL,
    key TEXT NOT NULL,
    status TEXT NOT NULL,
    cause TEXT,
    records INTEGER NOT NULL,
    pages INTEGER NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_traversals_run ON traversals(run_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
