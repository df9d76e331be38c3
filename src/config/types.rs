use chrono::NaiveDate;
use serde::Deserialize;

/// Main configuration structure for the archiver
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "board")]
    pub boards: Vec<BoardEntry>,
}

/// The archived site and the markup conventions it uses
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Absolute URL every relative forum path is resolved against
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Anchor for "today"/"yesterday" date text; defaults to the run's start date
    #[serde(default, rename = "reference-date")]
    pub reference_date: Option<NaiveDate>,

    /// Extractor ruleset identifier ("de-2017" or "en")
    #[serde(default = "default_ruleset")]
    pub ruleset: String,

    /// Site name as it appears in page title suffixes
    #[serde(default = "default_site_name", rename = "site-name")]
    pub site_name: String,

    /// Path of the paginated member list, if members should be archived
    #[serde(default, rename = "member-list-path")]
    pub member_list_path: Option<String>,

    /// Suffix appended to a thread path to reach its print view
    #[serde(default = "default_print_view_suffix", rename = "print-view-suffix")]
    pub print_view_suffix: String,
}

/// Backoff between fetch attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// Wait `retry-wait-ms` before every retry
    Fixed,
    /// Wait `retry-wait-ms * attempt` before every retry
    Linear,
}

/// HTTP fetcher configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    /// Total attempts per page, including the first one
    #[serde(default = "default_max_attempts", rename = "max-attempts")]
    pub max_attempts: u32,

    /// Base wait between attempts (milliseconds)
    #[serde(default = "default_retry_wait_ms", rename = "retry-wait-ms")]
    pub retry_wait_ms: u64,

    #[serde(default = "default_backoff")]
    pub backoff: Backoff,

    /// Per-request timeout (seconds)
    #[serde(default = "default_timeout_secs", rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Minimum time between two request starts, across all workers (milliseconds)
    #[serde(default, rename = "min-request-interval-ms")]
    pub min_request_interval_ms: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_wait_ms: default_retry_wait_ms(),
            backoff: default_backoff(),
            timeout_secs: default_timeout_secs(),
            min_request_interval_ms: 0,
        }
    }
}

/// Crawl controller configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Ceiling on pages fetched by one paginated traversal
    #[serde(
        default = "default_max_pages_per_traversal",
        rename = "max-pages-per-traversal"
    )]
    pub max_pages_per_traversal: u32,

    /// Number of boards/threads/profiles processed concurrently
    #[serde(
        default = "default_max_concurrent_workers",
        rename = "max-concurrent-workers"
    )]
    pub max_concurrent_workers: u32,

    /// Whether a cancelled traversal still returns what it gathered
    #[serde(default = "default_true", rename = "keep-partial-on-cancel")]
    pub keep_partial_on_cancel: bool,

    /// Fetch the base URL once before starting
    #[serde(default = "default_true")]
    pub preflight: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_pages_per_traversal: default_max_pages_per_traversal(),
            max_concurrent_workers: default_max_concurrent_workers(),
            keep_partial_on_cancel: true,
            preflight: true,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    pub name: String,
    pub version: String,
    #[serde(rename = "contact-url")]
    pub contact_url: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory receiving one raw file per fetched page
    #[serde(default, rename = "pages-dir")]
    pub pages_dir: Option<String>,

    /// Path to the markdown run summary
    #[serde(default, rename = "summary-path")]
    pub summary_path: Option<String>,
}

/// A board to archive
#[derive(Debug, Clone, Deserialize)]
pub struct BoardEntry {
    /// Board path, e.g. "/lifestyle/digital-world/pc-internet-smartphone_b49/"
    pub path: String,

    /// Path of the parent board, which must also be configured
    #[serde(default)]
    pub parent: Option<String>,
}

fn default_ruleset() -> String {
    "de-2017".to_string()
}

fn default_site_name() -> String {
    "Digital Nippon".to_string()
}

fn default_print_view_suffix() -> String {
    "komplett/".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_wait_ms() -> u64 {
    2000
}

fn default_backoff() -> Backoff {
    Backoff::Linear
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_pages_per_traversal() -> u32 {
    500
}

fn default_max_concurrent_workers() -> u32 {
    4
}

fn default_true() -> bool {
    true
}
