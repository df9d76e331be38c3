//! Archiver - run orchestration
//!
//! This module drives one archiver run through its phases:
//! - Boards: register the configured boards, walk their listings, store
//!   the discovered threads
//! - Threads: scrape the print view of every thread not yet scraped
//! - Members: walk the member list and record profile paths
//! - Profiles: enrich every author whose profile was never scraped
//!
//! Independent units of a phase run on the worker pool. Every unit ends in
//! a traversal record; only storage failures and worker panics fail the run.

use crate::archive::{PageArchive, PageKind};
use crate::config::{BoardEntry, Config};
use crate::crawler::{FetchError, Fetcher, Traversal, TraversalOutcome, WorkerPool};
use crate::dates::DateNormalizer;
use crate::extract::{
    extract_profile, extract_thread, BoardListing, ExtractResult, MemberListing, ProfilePage,
    Ruleset, ThreadPage,
};
use crate::model::{Author, Thread};
use crate::page;
use crate::site::{BoardPath, SiteBase};
use crate::state::{TraversalKind, TraversalStatus};
use crate::storage::{
    open_storage, NewPost, RunStatus, SqliteStorage, Storage, StorageError, StorageResult,
    TraversalRecord,
};
use crate::{ArchiveError, ConfigError, UrlResult};
use chrono::Local;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A stage of an archiver run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Boards,
    Threads,
    Members,
    Profiles,
}

impl Phase {
    /// Every phase, in the order a run executes them
    pub const ALL: [Phase; 4] = [Phase::Boards, Phase::Threads, Phase::Members, Phase::Profiles];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boards => "boards",
            Self::Threads => "threads",
            Self::Members => "members",
            Self::Profiles => "profiles",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: i64,
    pub status: RunStatus,
    /// Traversal units of the run per status
    pub traversals: HashMap<TraversalStatus, u64>,
}

/// State shared by all workers of a run
struct Shared {
    fetcher: Fetcher,
    storage: Mutex<SqliteStorage>,
    ruleset: Ruleset,
    dates: DateNormalizer,
    archive: Option<PageArchive>,
    print_view_suffix: String,
    member_list_path: Option<String>,
    max_pages: u32,
    max_workers: usize,
    keep_partial_on_cancel: bool,
    run_id: i64,
    cancel: CancellationToken,
}

/// Runs the phases of one archiver run against one site
pub struct Archiver {
    shared: Arc<Shared>,
    boards: Vec<BoardEntry>,
    preflight: bool,
}

impl Archiver {
    /// Opens the archive database and starts a new run
    ///
    /// The run is anchored to the configured reference date, or to today
    /// (local time) if none is configured.
    pub fn new(
        config: &Config,
        config_hash: &str,
        cancel: CancellationToken,
    ) -> Result<Self, ArchiveError> {
        let ruleset = Ruleset::from_id(&config.site.ruleset, &config.site.site_name)
            .map_err(ConfigError::from)?;
        let site = SiteBase::parse(&config.site.base_url)?;
        let fetcher = Fetcher::new(site, &config.fetcher, &config.user_agent)?;

        let reference = config
            .site
            .reference_date
            .unwrap_or_else(|| Local::now().date_naive());
        let dates = DateNormalizer::new(reference, ruleset.relative_days());

        let archive = config
            .output
            .pages_dir
            .as_ref()
            .map(PageArchive::create)
            .transpose()?;

        let mut storage = open_storage(Path::new(&config.output.database_path))?;
        let run_id = storage.create_run(config_hash, reference)?;
        info!(
            run_id,
            reference_date = %reference,
            ruleset = ruleset.id(),
            "Started run"
        );

        let shared = Shared {
            fetcher,
            storage: Mutex::new(storage),
            ruleset,
            dates,
            archive,
            print_view_suffix: config.site.print_view_suffix.clone(),
            member_list_path: config.site.member_list_path.clone(),
            max_pages: config.crawler.max_pages_per_traversal,
            max_workers: config.crawler.max_concurrent_workers as usize,
            keep_partial_on_cancel: config.crawler.keep_partial_on_cancel,
            run_id,
            cancel,
        };

        Ok(Self {
            shared: Arc::new(shared),
            boards: config.boards.clone(),
            preflight: config.crawler.preflight,
        })
    }

    pub fn run_id(&self) -> i64 {
        self.shared.run_id
    }

    /// Runs the selected phases in their fixed order and finishes the run
    ///
    /// An unreachable base URL fails the run before any phase starts.
    pub async fn run(&self, phases: &[Phase]) -> Result<RunReport, ArchiveError> {
        let shared = &self.shared;

        let result = match self.check_base_url().await {
            Ok(()) => self.run_phases(phases).await,
            Err(e) => Err(e),
        };

        let status = match &result {
            Ok(()) if shared.cancel.is_cancelled() => RunStatus::Cancelled,
            Ok(()) => RunStatus::Completed,
            Err(e) => {
                error!(run_id = shared.run_id, error = %e, "Run failed");
                RunStatus::Failed
            }
        };
        shared.with_storage(|s| s.finish_run(shared.run_id, status))?;
        result?;

        let traversals = shared.with_storage(|s| s.traversal_status_counts(shared.run_id))?;
        info!(run_id = shared.run_id, status = status.to_db_string(), "Run finished");

        Ok(RunReport {
            run_id: shared.run_id,
            status,
            traversals,
        })
    }

    async fn check_base_url(&self) -> Result<(), ArchiveError> {
        if !self.preflight {
            return Ok(());
        }

        let fetcher = &self.shared.fetcher;
        match fetcher.fetch("", &self.shared.cancel).await {
            Ok(_) | Err(FetchError::Cancelled { .. }) => Ok(()),
            Err(e) => Err(ConfigError::UnreachableBaseUrl {
                url: fetcher.site().url().to_string(),
                reason: e.to_string(),
            }
            .into()),
        }
    }

    async fn run_phases(&self, phases: &[Phase]) -> Result<(), ArchiveError> {
        for phase in Phase::ALL.into_iter().filter(|p| phases.contains(p)) {
            if self.shared.cancel.is_cancelled() {
                info!(phase = %phase, "Skipping phase after cancellation");
                continue;
            }

            info!(phase = %phase, "Starting phase");
            match phase {
                Phase::Boards => self.archive_boards().await?,
                Phase::Threads => self.archive_threads().await?,
                Phase::Members => self.shared.archive_member_list().await?,
                Phase::Profiles => self.archive_profiles().await?,
            }
            info!(phase = %phase, "Phase finished");
        }
        Ok(())
    }

    /// Registers the configured boards, parents before children
    fn register_boards(&self) -> Result<Vec<(i64, BoardPath)>, ArchiveError> {
        let mut pending = Vec::with_capacity(self.boards.len());
        for entry in &self.boards {
            let board = parse_board(&entry.path)?;
            let parent = entry.parent.as_deref().map(parse_board).transpose()?;
            pending.push((board, parent));
        }

        let mut ids: HashMap<String, i64> = HashMap::new();
        let mut registered = Vec::with_capacity(pending.len());

        while !pending.is_empty() {
            let before = pending.len();
            let mut waiting = Vec::new();

            for (board, parent) in pending {
                let parent_id = match &parent {
                    None => None,
                    Some(parent) => match ids.get(parent.as_str()) {
                        Some(id) => Some(*id),
                        None => {
                            waiting.push((board, Some(parent.clone())));
                            continue;
                        }
                    },
                };

                let id = self.shared.with_storage(|s| {
                    s.upsert_board(board.as_str(), board.site_id(), None, parent_id)
                })?;
                debug!(board = board.as_str(), id, parent_id, "Registered board");

                ids.insert(board.as_str().to_string(), id);
                registered.push((id, board));
            }

            if waiting.len() == before {
                return Err(ConfigError::Validation(format!(
                    "Boards with unresolvable parents: {}",
                    waiting
                        .iter()
                        .map(|(board, _)| board.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
                .into());
            }
            pending = waiting;
        }

        Ok(registered)
    }

    async fn archive_boards(&self) -> Result<(), ArchiveError> {
        let boards = self.register_boards()?;
        info!(boards = boards.len(), "Walking board listings");

        let shared = Arc::clone(&self.shared);
        let results = self
            .shared
            .pool()
            .run(boards, move |(board_id, board)| {
                let shared = Arc::clone(&shared);
                async move { shared.archive_board(board_id, board).await }
            })
            .await?;

        results.into_iter().collect()
    }

    /// Scrapes pending threads
    ///
    /// Poll pages that earlier runs failed to fetch are retried first, so a
    /// poll missed in this run waits for the next one.
    async fn archive_threads(&self) -> Result<(), ArchiveError> {
        if self.shared.archive.is_some() {
            let polls = self.shared.with_storage(|s| s.threads_missing_polls())?;
            if !polls.is_empty() {
                info!(threads = polls.len(), "Retrying missing poll pages");

                let shared = Arc::clone(&self.shared);
                let results = self
                    .shared
                    .pool()
                    .run(polls, move |thread| {
                        let shared = Arc::clone(&shared);
                        async move { shared.archive_missing_poll(thread).await }
                    })
                    .await?;
                results.into_iter().collect::<Result<(), ArchiveError>>()?;
            }
        }

        let threads = self.shared.with_storage(|s| s.pending_threads())?;
        info!(threads = threads.len(), "Scraping pending threads");

        let shared = Arc::clone(&self.shared);
        let results = self
            .shared
            .pool()
            .run(threads, move |thread| {
                let shared = Arc::clone(&shared);
                async move { shared.archive_thread(thread).await }
            })
            .await?;

        results.into_iter().collect()
    }

    async fn archive_profiles(&self) -> Result<(), ArchiveError> {
        let authors = self.shared.with_storage(|s| s.authors_needing_profiles())?;
        info!(authors = authors.len(), "Scraping member profiles");

        let shared = Arc::clone(&self.shared);
        let results = self
            .shared
            .pool()
            .run(authors, move |author| {
                let shared = Arc::clone(&shared);
                async move { shared.archive_profile(author).await }
            })
            .await?;

        results.into_iter().collect()
    }
}

impl Shared {
    /// Runs `f` with exclusive access to the store
    fn with_storage<T>(
        &self,
        f: impl FnOnce(&mut SqliteStorage) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let mut storage = self.storage.lock().map_err(|_| StorageError::LockPoisoned)?;
        f(&mut storage)
    }

    fn pool(&self) -> WorkerPool {
        WorkerPool::new(self.max_workers, self.cancel.clone())
    }

    fn traversal(&self) -> Traversal<'_> {
        Traversal {
            fetcher: &self.fetcher,
            max_pages: self.max_pages,
            keep_partial_on_cancel: self.keep_partial_on_cancel,
            cancel: &self.cancel,
        }
    }

    /// Writes a fetched page to the raw archive, if one is configured
    fn keep_page(&self, path: &str, kind: PageKind, body: &[u8]) -> bool {
        let Some(archive) = &self.archive else {
            return false;
        };
        match archive.store(path, kind, body) {
            Ok(_) => true,
            Err(e) => {
                warn!(page = path, error = %e, "Failed to archive page");
                false
            }
        }
    }

    /// Records a single-page unit that ended at its fetch
    fn record_fetch_failure(
        &self,
        kind: TraversalKind,
        key: &str,
        error: &FetchError,
    ) -> StorageResult<()> {
        let status = match error {
            FetchError::Cancelled { .. } => TraversalStatus::Cancelled,
            _ => {
                warn!(kind = %kind, key, error = %error, "Fetch failed");
                TraversalStatus::Partial
            }
        };
        self.record(TraversalRecord {
            kind,
            key: key.to_string(),
            status,
            cause: Some(error.to_string()),
            records: 0,
            pages: 0,
        })
    }

    fn record(&self, record: TraversalRecord) -> StorageResult<()> {
        self.with_storage(|s| s.record_traversal(self.run_id, &record))
    }

    async fn archive_board(&self, board_id: i64, board: BoardPath) -> Result<(), ArchiveError> {
        let listing = BoardListing {
            site: self.fetcher.site(),
            board: &board,
            ruleset: &self.ruleset,
        };

        let mut first_title: Option<Option<String>> = None;
        let outcome = self
            .traversal()
            .run(board.as_str(), &listing, |path, body, doc| {
                if first_title.is_none() {
                    first_title = Some(listing.title(doc));
                }
                self.keep_page(path, PageKind::Page, body);
            })
            .await;

        match first_title {
            Some(Some(title)) => {
                self.with_storage(|s| s.set_board_title(board_id, &title))?;
            }
            Some(None) => warn!(board = board.as_str(), "Board title not recognized"),
            None => {}
        }

        let record = traversal_record(TraversalKind::Board, board.as_str(), &outcome);
        self.with_storage(|s| {
            s.transaction(|s| {
                for thread in &outcome.records {
                    s.upsert_thread(board_id, &thread.path, &thread.title, thread.has_poll)?;
                }
                s.record_traversal(self.run_id, &record)
            })
        })?;

        info!(
            board = board.as_str(),
            threads = outcome.records.len(),
            pages = outcome.pages_fetched,
            status = %outcome.status,
            "Board archived"
        );
        Ok(())
    }

    async fn archive_thread(&self, thread: Thread) -> Result<(), ArchiveError> {
        let print_path = match print_view_path(self.fetcher.site(), &thread.path, &self.print_view_suffix) {
            Ok(path) => path,
            Err(e) => {
                warn!(thread = %thread.path, error = %e, "No print view for thread");
                self.record(TraversalRecord {
                    kind: TraversalKind::Thread,
                    key: thread.path.clone(),
                    status: TraversalStatus::Partial,
                    cause: Some(e.to_string()),
                    records: 0,
                    pages: 0,
                })?;
                return Ok(());
            }
        };

        let body = match self.fetcher.fetch(&print_path, &self.cancel).await {
            Ok(body) => body,
            Err(e) => return Ok(self.record_fetch_failure(TraversalKind::Thread, &thread.path, &e)?),
        };
        self.keep_page(&print_path, PageKind::Page, &body);

        let page = match parse_thread(&body, &print_path, &self.ruleset, &self.dates) {
            Ok(page) => page,
            Err(e) => {
                warn!(thread = %thread.path, error = %e, "Discarding thread page");
                self.record(TraversalRecord {
                    kind: TraversalKind::Thread,
                    key: thread.path.clone(),
                    status: TraversalStatus::Partial,
                    cause: Some(e.to_string()),
                    records: 0,
                    pages: 1,
                })?;
                return Ok(());
            }
        };

        let poll = if thread.has_poll && !thread.poll_archived {
            self.archive_poll(&thread.path).await
        } else {
            PollPage::NotKept
        };

        let mut record = TraversalRecord {
            kind: TraversalKind::Thread,
            key: thread.path.clone(),
            status: TraversalStatus::Complete,
            cause: None,
            records: page.posts.len() as u64,
            pages: 1,
        };
        poll.apply_to(&mut record);

        let inserted = self.with_storage(|s| {
            s.transaction(|s| {
                let mut inserted = 0u32;
                for (position, post) in page.posts.iter().enumerate() {
                    let author_id = s.upsert_author(&post.author_name)?;
                    let new_post = NewPost {
                        thread_id: thread.id,
                        position: position as u32,
                        author_id,
                        created_at: post.created_at,
                        body_markup: &post.body_markup,
                        raw_content: &post.raw_content,
                    };
                    if s.insert_post(&new_post)? {
                        inserted += 1;
                    }
                }
                s.mark_thread_scraped(thread.id, &page.title)?;
                if poll == PollPage::Archived {
                    s.mark_poll_archived(thread.id)?;
                }
                s.record_traversal(self.run_id, &record)?;
                Ok(inserted)
            })
        })?;

        debug!(
            thread = %thread.path,
            posts = page.posts.len(),
            inserted,
            status = %record.status,
            "Thread archived"
        );
        Ok(())
    }

    /// Fetches the plain page of a poll-bearing thread into the raw archive
    ///
    /// The thread's posts do not depend on it; a missing poll page only
    /// downgrades the thread's traversal and is retried by later runs.
    async fn archive_poll(&self, thread_path: &str) -> PollPage {
        let Some(archive) = &self.archive else {
            debug!(thread = thread_path, "No page archive, skipping poll page");
            return PollPage::NotKept;
        };

        let body = match self.fetcher.fetch(thread_path, &self.cancel).await {
            Ok(body) => body,
            Err(e) => {
                let status = match e {
                    FetchError::Cancelled { .. } => TraversalStatus::Cancelled,
                    _ => {
                        warn!(thread = thread_path, error = %e, "Poll page not archived");
                        TraversalStatus::Partial
                    }
                };
                return PollPage::Missing {
                    status,
                    cause: format!("poll page: {}", e),
                };
            }
        };

        match archive.store(thread_path, PageKind::Poll, &body) {
            Ok(_) => PollPage::Archived,
            Err(e) => {
                warn!(thread = thread_path, error = %e, "Failed to archive poll page");
                PollPage::Missing {
                    status: TraversalStatus::Partial,
                    cause: format!("poll page: {}", e),
                }
            }
        }
    }

    /// Fetches the poll page of a thread scraped by an earlier run
    async fn archive_missing_poll(&self, thread: Thread) -> Result<(), ArchiveError> {
        let poll = self.archive_poll(&thread.path).await;
        if poll == PollPage::NotKept {
            return Ok(());
        }

        let mut record = TraversalRecord {
            kind: TraversalKind::Thread,
            key: thread.path.clone(),
            status: TraversalStatus::Complete,
            cause: None,
            records: 0,
            pages: 0,
        };
        poll.apply_to(&mut record);

        self.with_storage(|s| {
            s.transaction(|s| {
                if poll == PollPage::Archived {
                    s.mark_poll_archived(thread.id)?;
                }
                s.record_traversal(self.run_id, &record)
            })
        })?;
        debug!(thread = %thread.path, status = %record.status, "Poll page retried");
        Ok(())
    }

    async fn archive_member_list(&self) -> Result<(), ArchiveError> {
        let Some(root) = self.member_list_path.as_deref() else {
            info!("No member list configured");
            return Ok(());
        };

        let listing = MemberListing {
            site: self.fetcher.site(),
            ruleset: &self.ruleset,
        };
        let outcome = self
            .traversal()
            .run(root, &listing, |path, body, _| {
                self.keep_page(path, PageKind::Page, body);
            })
            .await;

        let record = traversal_record(TraversalKind::MemberList, root, &outcome);
        self.with_storage(|s| {
            s.transaction(|s| {
                for member in &outcome.records {
                    let author_id = s.upsert_author(&member.name)?;
                    s.set_author_profile_path(author_id, &member.profile_path)?;
                }
                s.record_traversal(self.run_id, &record)
            })
        })?;

        info!(
            members = outcome.records.len(),
            pages = outcome.pages_fetched,
            status = %outcome.status,
            "Member list archived"
        );
        Ok(())
    }

    async fn archive_profile(&self, author: Author) -> Result<(), ArchiveError> {
        let Some(path) = author.profile_path.as_deref() else {
            return Ok(());
        };

        let body = match self.fetcher.fetch(path, &self.cancel).await {
            Ok(body) => body,
            Err(e) => return Ok(self.record_fetch_failure(TraversalKind::Profile, path, &e)?),
        };
        self.keep_page(path, PageKind::Page, &body);

        let mut record = TraversalRecord {
            kind: TraversalKind::Profile,
            key: path.to_string(),
            status: TraversalStatus::Complete,
            cause: None,
            records: 1,
            pages: 1,
        };

        let page = match parse_profile(&body, path, &self.ruleset, &self.dates) {
            Ok(page) => page,
            Err(e) => {
                warn!(author = %author.name, error = %e, "Discarding profile page");
                record.status = TraversalStatus::Partial;
                record.cause = Some(e.to_string());
                record.records = 0;
                self.record(record)?;
                return Ok(());
            }
        };

        if page.name != author.name {
            warn!(author = %author.name, profile_name = %page.name, "Profile belongs to a differently named member");
        }

        self.with_storage(|s| {
            s.transaction(|s| {
                s.enrich_author(author.id, &page.profile)?;
                s.record_traversal(self.run_id, &record)
            })
        })?;
        debug!(author = %author.name, "Profile archived");
        Ok(())
    }
}

fn traversal_record<T>(kind: TraversalKind, key: &str, outcome: &TraversalOutcome<T>) -> TraversalRecord {
    TraversalRecord {
        kind,
        key: key.to_string(),
        status: outcome.status,
        cause: outcome.cause.clone(),
        records: outcome.records.len() as u64,
        pages: outcome.pages_fetched,
    }
}

/// What became of the plain page of a poll-bearing thread
#[derive(Debug, Clone, PartialEq, Eq)]
enum PollPage {
    /// No raw archive to keep it in
    NotKept,
    Archived,
    Missing {
        status: TraversalStatus,
        cause: String,
    },
}

impl PollPage {
    fn apply_to(&self, record: &mut TraversalRecord) {
        match self {
            Self::NotKept => {}
            Self::Archived => record.pages += 1,
            Self::Missing { status, cause } => {
                record.status = *status;
                record.cause = Some(cause.clone());
            }
        }
    }
}

fn parse_board(path: &str) -> Result<BoardPath, ConfigError> {
    BoardPath::parse(path).ok_or_else(|| ConfigError::InvalidBoardPath(path.to_string()))
}

/// Path of a thread's print view
///
/// The suffix is joined onto the thread's directory; a query or fragment
/// on the thread path is dropped.
fn print_view_path(site: &SiteBase, thread_path: &str, suffix: &str) -> UrlResult<String> {
    let mut thread = site.resolve(thread_path)?;
    thread.set_query(None);
    thread.set_fragment(None);
    if !thread.path().ends_with('/') {
        let dir = format!("{}/", thread.path());
        thread.set_path(&dir);
    }
    site.follow(thread.as_str(), suffix)
}

fn parse_thread(
    body: &[u8],
    page: &str,
    ruleset: &Ruleset,
    dates: &DateNormalizer,
) -> ExtractResult<ThreadPage> {
    let doc = page::parse(body);
    extract_thread(&doc, page, ruleset, dates)
}

fn parse_profile(
    body: &[u8],
    page: &str,
    ruleset: &Ruleset,
    dates: &DateNormalizer,
) -> ExtractResult<ProfilePage> {
    let doc = page::parse(body);
    extract_profile(&doc, page, ruleset, dates)
}
