//! Integration tests for the archiver
//!
//! These tests use wiremock to serve forum pages and exercise the fetcher,
//! the paginated traversal and a full archiver run end-to-end.

use chrono::NaiveDate;
use forum_archiver::config::{
    Backoff, BoardEntry, Config, CrawlerConfig, FetcherConfig, OutputConfig, SiteConfig,
    UserAgentConfig,
};
use forum_archiver::crawler::{
    Archiver, FetchError, Fetcher, Phase, Traversal, TraversalOutcome,
};
use forum_archiver::extract::{BoardListing, Ruleset, ThreadSummary};
use forum_archiver::model::Gender;
use forum_archiver::site::{BoardPath, SiteBase};
use forum_archiver::storage::{open_storage, RunStatus, Storage};
use forum_archiver::{ArchiveError, ConfigError, TraversalStatus};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BOARD: &str = "/news_b2/";

fn user_agent() -> UserAgentConfig {
    UserAgentConfig {
        name: "TestArchiver".to_string(),
        version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
    }
}

fn fetcher_config(max_attempts: u32) -> FetcherConfig {
    FetcherConfig {
        max_attempts,
        retry_wait_ms: 1,
        backoff: Backoff::Fixed,
        timeout_secs: 5,
        min_request_interval_ms: 0,
    }
}

fn fetcher(server: &MockServer, max_attempts: u32) -> Fetcher {
    let site = SiteBase::parse(&format!("{}/", server.uri())).unwrap();
    Fetcher::new(site, &fetcher_config(max_attempts), &user_agent()).unwrap()
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(body)
}

/// A board listing page with one row per `(path, title, poll)` entry
fn board_page(title: &str, threads: &[(String, String, bool)], next: Option<&str>) -> String {
    let rows: String = threads
        .iter()
        .map(|(path, title, poll)| {
            let prefix = if *poll {
                r#"<span class="prefix"><b>Umfrage:</b></span> "#
            } else {
                ""
            };
            format!(
                r#"<tr class="threadbit"><td class="tablea"><span class="normalfont">{}<a class="threadtitle" href="{}">{}</a></span></td></tr>"#,
                prefix, path, title
            )
        })
        .collect();
    let next = next
        .map(|href| {
            format!(
                r#"<span class="smallfont pagelink"><b><a href="{}">nächste Seite</a></b></span>"#,
                href
            )
        })
        .unwrap_or_default();

    format!(
        "<html><head><title>{}</title></head><body><table>{}</table>{}</body></html>",
        title, rows, next
    )
}

fn numbered_threads(range: std::ops::RangeInclusive<u32>) -> Vec<(String, String, bool)> {
    range
        .map(|n| (format!("/news/thema-{}_t{}/", n, n), format!("Thema {}", n), false))
        .collect()
}

/// Mounts a three-page board listing with 30, 30 and 7 threads
async fn mount_three_page_board(server: &MockServer) {
    let pages = [
        (BOARD, numbered_threads(1..=30), Some("/news_b2/seite-2/")),
        ("/news_b2/seite-2/", numbered_threads(31..=60), Some("/news_b2/seite-3/")),
        ("/news_b2/seite-3/", numbered_threads(61..=67), None),
    ];

    for (page, threads, next) in pages {
        Mock::given(method("GET"))
            .and(path(page))
            .respond_with(html(board_page(
                "Neuigkeiten | Digital Nippon",
                &threads,
                next,
            )))
            .mount(server)
            .await;
    }
}

/// Walks the board; `on_page` sees every fetched page and the run's token
async fn walk_board_with<F>(
    fetcher: &Fetcher,
    max_pages: u32,
    keep_partial_on_cancel: bool,
    on_page: F,
) -> TraversalOutcome<ThreadSummary>
where
    F: Fn(&CancellationToken),
{
    let ruleset = Ruleset::from_id("de-2017", "Digital Nippon").unwrap();
    let board = BoardPath::parse(BOARD).unwrap();
    let listing = BoardListing {
        site: fetcher.site(),
        board: &board,
        ruleset: &ruleset,
    };
    let cancel = CancellationToken::new();
    let traversal = Traversal {
        fetcher,
        max_pages,
        keep_partial_on_cancel,
        cancel: &cancel,
    };

    traversal.run(BOARD, &listing, |_, _, _| on_page(&cancel)).await
}

async fn walk_board(fetcher: &Fetcher, max_pages: u32) -> TraversalOutcome<ThreadSummary> {
    walk_board_with(fetcher, max_pages, true, |_| {}).await
}

/// Mounts a three-page board whose second page lists a thread title
/// outside of any thread row
async fn mount_board_with_broken_second_page(server: &MockServer) {
    let broken = board_page(
        "Neuigkeiten (Seite 2) | Digital Nippon",
        &numbered_threads(31..=60),
        Some("/news_b2/seite-3/"),
    )
    .replace(
        "<body>",
        r#"<body><a class="threadtitle" href="/news/verirrt_t99/">Verirrt</a>"#,
    );

    let pages = [
        (BOARD, board_page("Neuigkeiten | Digital Nippon", &numbered_threads(1..=30), Some("/news_b2/seite-2/"))),
        ("/news_b2/seite-2/", broken),
        ("/news_b2/seite-3/", board_page("Neuigkeiten (Seite 3) | Digital Nippon", &numbered_threads(61..=67), None)),
    ];

    for (page, body) in pages {
        Mock::given(method("GET"))
            .and(path(page))
            .respond_with(html(body))
            .mount(server)
            .await;
    }
}

#[tokio::test]
async fn test_fetch_retries_until_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(4)
        .expect(4)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("endlich"))
        .expect(1)
        .mount(&server)
        .await;

    let body = fetcher(&server, 5)
        .fetch("/flaky/", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(body, b"endlich");
}

#[tokio::test]
async fn test_fetch_gives_up_after_max_attempts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/down/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(5)
        .mount(&server)
        .await;

    let result = fetcher(&server, 5)
        .fetch("/down/", &CancellationToken::new())
        .await;

    match result {
        Err(FetchError::Exhausted {
            attempts,
            last_status,
            ..
        }) => {
            assert_eq!(attempts, 5);
            assert_eq!(last_status, Some(500));
        }
        other => panic!("expected exhausted fetch, got {:?}", other),
    }
}

#[tokio::test]
async fn test_board_traversal_collects_every_page() {
    let server = MockServer::start().await;
    mount_three_page_board(&server).await;

    let outcome = walk_board(&fetcher(&server, 1), 100).await;

    assert_eq!(outcome.status, TraversalStatus::Complete);
    assert_eq!(outcome.records.len(), 67);
    assert_eq!(outcome.pages_fetched, 3);
    assert_eq!(outcome.cause, None);
    assert_eq!(outcome.records[0].title, "Thema 1");
    assert_eq!(outcome.records[66].path, "/news/thema-67_t67/");
}

#[tokio::test]
async fn test_board_traversal_stops_at_page_ceiling() {
    let server = MockServer::start().await;
    mount_three_page_board(&server).await;

    let outcome = walk_board(&fetcher(&server, 1), 2).await;

    assert_eq!(outcome.status, TraversalStatus::Truncated);
    assert_eq!(outcome.records.len(), 60);
    assert_eq!(outcome.pages_fetched, 2);
}

#[tokio::test]
async fn test_board_traversal_keeps_pages_before_fetch_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(BOARD))
        .respond_with(html(board_page(
            "Neuigkeiten | Digital Nippon",
            &numbered_threads(1..=30),
            Some("/news_b2/seite-2/"),
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/news_b2/seite-2/"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let outcome = walk_board(&fetcher(&server, 2), 100).await;

    assert_eq!(outcome.status, TraversalStatus::Partial);
    assert_eq!(outcome.records.len(), 30);
    assert!(outcome.cause.unwrap().contains("HTTP 502"));
}

#[tokio::test]
async fn test_board_traversal_continues_past_malformed_page() {
    let server = MockServer::start().await;
    mount_board_with_broken_second_page(&server).await;

    let outcome = walk_board(&fetcher(&server, 1), 100).await;

    assert_eq!(outcome.status, TraversalStatus::Partial);
    assert_eq!(outcome.pages_fetched, 3);
    assert_eq!(outcome.records.len(), 37, "only the malformed page is discarded");
    assert_eq!(outcome.records[29].title, "Thema 30");
    assert_eq!(outcome.records[30].title, "Thema 61");
    assert!(outcome.cause.unwrap().contains("31 thread titles but 30 thread rows"));
}

#[tokio::test]
async fn test_page_ceiling_outranks_malformed_page() {
    let server = MockServer::start().await;
    mount_board_with_broken_second_page(&server).await;

    let outcome = walk_board(&fetcher(&server, 1), 2).await;

    assert_eq!(outcome.status, TraversalStatus::Truncated);
    assert_eq!(outcome.records.len(), 30);
    assert_eq!(outcome.pages_fetched, 2);
}

#[tokio::test]
async fn test_cancelled_traversal_drops_records() {
    let server = MockServer::start().await;
    mount_three_page_board(&server).await;

    let outcome = walk_board_with(&fetcher(&server, 1), 100, false, |cancel| cancel.cancel()).await;

    assert_eq!(outcome.status, TraversalStatus::Cancelled);
    assert_eq!(outcome.pages_fetched, 1);
    assert!(outcome.records.is_empty());
}

#[tokio::test]
async fn test_cancelled_traversal_keeps_records_when_configured() {
    let server = MockServer::start().await;
    mount_three_page_board(&server).await;

    let outcome = walk_board_with(&fetcher(&server, 1), 100, true, |cancel| cancel.cancel()).await;

    assert_eq!(outcome.status, TraversalStatus::Cancelled);
    assert_eq!(outcome.pages_fetched, 1);
    assert_eq!(outcome.records.len(), 30);
    assert_eq!(outcome.records[29].title, "Thema 30");
}

fn archive_config(server: &MockServer, dir: &Path) -> Config {
    Config {
        site: SiteConfig {
            base_url: format!("{}/", server.uri()),
            reference_date: NaiveDate::from_ymd_opt(2017, 9, 8),
            ruleset: "de-2017".to_string(),
            site_name: "Digital Nippon".to_string(),
            member_list_path: Some("/mitglieder/".to_string()),
            print_view_suffix: "komplett/".to_string(),
        },
        fetcher: fetcher_config(2),
        crawler: CrawlerConfig {
            max_pages_per_traversal: 10,
            max_concurrent_workers: 2,
            keep_partial_on_cancel: true,
            preflight: true,
        },
        user_agent: user_agent(),
        output: OutputConfig {
            database_path: dir.join("archive.db").to_string_lossy().into_owned(),
            pages_dir: Some(dir.join("pages").to_string_lossy().into_owned()),
            summary_path: None,
        },
        boards: vec![BoardEntry {
            path: BOARD.to_string(),
            parent: None,
        }],
    }
}

fn print_view(title: &str, posts: &[&str]) -> String {
    format!(
        "<html><head><title>{} - Komplett | Digital Nippon</title></head><body>{}</body></html>",
        title,
        posts.concat()
    )
}

async fn mount_forum(server: &MockServer) {
    let get = |p: &str| Mock::given(method("GET")).and(path(p.to_string()));

    get("/")
        .respond_with(html("<html><body>Digital Nippon</body></html>".to_string()))
        .mount(server)
        .await;

    get(BOARD)
        .respond_with(html(board_page(
            "Neuigkeiten | Digital Nippon",
            &[
                (
                    "/news/hallo_t5/".to_string(),
                    "Hallo".to_string(),
                    false,
                ),
                (
                    "/news/umfrage_t6/".to_string(),
                    "Lieblingsspiel".to_string(),
                    true,
                ),
                (
                    "/off-topic/regeln_t1/".to_string(),
                    "Forenregeln".to_string(),
                    false,
                ),
            ],
            None,
        )))
        .mount(server)
        .await;

    get("/news/hallo_t5/komplett/")
        .respond_with(html(print_view(
            "Hallo",
            &[
                r#"<div class="normalfont"><i>Geschrieben von Hikaru am 07.09.2017 um 20:15:</i><br>Hallo zusammen!</div>"#,
                r#"<div class="normalfont"><i>Geschrieben von Yuki am Heute um 08:02:</i><div class="quote">Zitat von Hikaru:</div><div class="quotecontent">Hallo zusammen!</div>Willkommen.</div>"#,
            ],
        )))
        .mount(server)
        .await;

    get("/news/umfrage_t6/komplett/")
        .respond_with(html(print_view(
            "Lieblingsspiel",
            &[r#"<div class="normalfont"><i>Geschrieben von Yuki am Gestern um 23:59:</i>Stimmt ab!</div>"#],
        )))
        .mount(server)
        .await;

    get("/news/umfrage_t6/")
        .respond_with(html("<html><body>Umfrage: Zelda 3 Stimmen</body></html>".to_string()))
        .expect(1)
        .mount(server)
        .await;

    get("/mitglieder/")
        .respond_with(html(
            r#"<html><body><table class="memberlist"><tr><td class="membername"><a href="/mitglieder/hikaru_u12/">Hikaru</a></td></tr></table></body></html>"#
                .to_string(),
        ))
        .mount(server)
        .await;

    get("/mitglieder/hikaru_u12/")
        .respond_with(html(
            "<html><head><title>Profil von Hikaru | Digital Nippon</title></head><body><table>\n\
             <tr><td>Geschlecht:</td>\n<td>männlich</td></tr>\n\
             <tr><td>Registriert am:</td>\n<td>01.04.2004</td></tr>\n\
             <tr><td>Geburtstag:</td>\n<td>17.05.</td></tr>\n\
             <tr><td>Letzte Aktivität:</td>\n<td>Gestern 22:10</td></tr>\n\
             </table></body></html>"
                .to_string(),
        ))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_archive_run() {
    let server = MockServer::start().await;
    mount_forum(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let config = archive_config(&server, dir.path());

    let archiver = Archiver::new(&config, "hash", CancellationToken::new()).unwrap();
    let report = archiver.run(&Phase::ALL).await.unwrap();
    drop(archiver);

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.traversals.get(&TraversalStatus::Complete), Some(&5));
    assert_eq!(report.traversals.len(), 1);

    let storage = open_storage(Path::new(&config.output.database_path)).unwrap();
    let counts = storage.counts().unwrap();
    assert_eq!(counts.boards, 1);
    assert_eq!(counts.threads, 2, "sticky thread from another board is skipped");
    assert_eq!(counts.threads_pending, 0);
    assert_eq!(counts.posts, 3);
    assert_eq!(counts.authors, 2);
    assert_eq!(counts.profiles, 1);

    let board = storage.get_board_by_path(BOARD).unwrap().unwrap();
    assert_eq!(board.title.as_deref(), Some("Neuigkeiten"));
    assert_eq!(board.site_id, 2);

    let hallo = storage.get_thread_by_path("/news/hallo_t5/").unwrap().unwrap();
    let posts = storage.posts_for_thread(hallo.id).unwrap();
    let authors: Vec<&str> = posts.iter().map(|p| p.author_name.as_str()).collect();
    assert_eq!(authors, ["Hikaru", "Yuki"]);
    assert_eq!(
        posts[1].created_at,
        NaiveDate::from_ymd_opt(2017, 9, 8).unwrap().and_hms_opt(8, 2, 0)
    );
    assert!(!posts[1].body_markup.contains("quotecontent"));
    assert!(posts[1].raw_content.contains("Willkommen."));

    let poll = storage.get_thread_by_path("/news/umfrage_t6/").unwrap().unwrap();
    assert!(poll.has_poll);
    assert!(poll.poll_archived);
    assert!(dir
        .path()
        .join("pages")
        .join("%2Fnews%2Fumfrage_t6%2F.poll.html")
        .exists());

    let hikaru = storage.get_author_by_name("Hikaru").unwrap().unwrap();
    assert_eq!(hikaru.profile.gender, Some(Gender::Male));
    assert_eq!(
        hikaru.profile.registered_at,
        NaiveDate::from_ymd_opt(2004, 4, 1)
    );
    assert_eq!(
        hikaru.profile.birthday.map(|b| b.to_string()),
        Some("--05-17".to_string())
    );
}

#[tokio::test]
async fn test_rerun_skips_scraped_threads() {
    let server = MockServer::start().await;
    mount_forum(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let config = archive_config(&server, dir.path());

    for _ in 0..2 {
        let archiver = Archiver::new(&config, "hash", CancellationToken::new()).unwrap();
        archiver
            .run(&[Phase::Boards, Phase::Threads])
            .await
            .unwrap();
    }

    let storage = open_storage(Path::new(&config.output.database_path)).unwrap();
    let counts = storage.counts().unwrap();
    assert_eq!(counts.threads, 2);
    assert_eq!(counts.posts, 3);

    let latest = storage.get_latest_run().unwrap().unwrap();
    let traversals = storage.traversals_for_run(latest.id).unwrap();
    assert_eq!(traversals.len(), 1, "second run only walks the board");
}

#[tokio::test]
async fn test_unreachable_base_url_fails_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let config = archive_config(&server, dir.path());

    let archiver = Archiver::new(&config, "hash", CancellationToken::new()).unwrap();
    let result = archiver.run(&Phase::ALL).await;

    assert!(matches!(
        result,
        Err(ArchiveError::Config(ConfigError::UnreachableBaseUrl { .. }))
    ));

    let storage = open_storage(Path::new(&config.output.database_path)).unwrap();
    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(storage.counts().unwrap().boards, 0);
}

#[tokio::test]
async fn test_cancelled_run_does_no_work() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let config = archive_config(&server, dir.path());

    let cancel = CancellationToken::new();
    cancel.cancel();
    let archiver = Archiver::new(&config, "hash", cancel).unwrap();
    let report = archiver.run(&Phase::ALL).await.unwrap();

    assert_eq!(report.status, RunStatus::Cancelled);
    assert!(report.traversals.is_empty());
}

#[tokio::test]
async fn test_failed_print_view_leaves_thread_pending() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/news/hallo_t5/komplett/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;
    mount_forum(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let config = archive_config(&server, dir.path());

    let archiver = Archiver::new(&config, "hash", CancellationToken::new()).unwrap();
    let report = archiver
        .run(&[Phase::Boards, Phase::Threads])
        .await
        .unwrap();
    drop(archiver);

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.traversals.get(&TraversalStatus::Partial), Some(&1));
    assert_eq!(report.traversals.get(&TraversalStatus::Complete), Some(&2));

    let storage = open_storage(Path::new(&config.output.database_path)).unwrap();
    let traversals = storage.traversals_for_run(report.run_id).unwrap();
    let hallo = traversals
        .iter()
        .find(|t| t.key == "/news/hallo_t5/")
        .unwrap();
    assert_eq!(hallo.status, TraversalStatus::Partial);
    assert!(hallo.cause.as_deref().unwrap().contains("HTTP 500"));

    let pending = storage.pending_threads().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].path, "/news/hallo_t5/");
    assert_eq!(storage.counts().unwrap().posts, 1);
}

#[tokio::test]
async fn test_failed_poll_page_is_reported_and_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/news/umfrage_t6/"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    mount_forum(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let config = archive_config(&server, dir.path());
    let phases = [Phase::Boards, Phase::Threads];

    let first = Archiver::new(&config, "hash", CancellationToken::new())
        .unwrap()
        .run(&phases)
        .await
        .unwrap();

    let storage = open_storage(Path::new(&config.output.database_path)).unwrap();
    let poll_record = storage
        .traversals_for_run(first.run_id)
        .unwrap()
        .into_iter()
        .find(|t| t.key == "/news/umfrage_t6/")
        .unwrap();
    assert_eq!(poll_record.status, TraversalStatus::Partial);
    assert!(poll_record.cause.unwrap().contains("poll page"));

    let thread = storage.get_thread_by_path("/news/umfrage_t6/").unwrap().unwrap();
    assert!(thread.scraped_at.is_some(), "posts are kept without the poll page");
    assert!(!thread.poll_archived);
    assert_eq!(storage.counts().unwrap().posts, 3);
    drop(storage);

    let second = Archiver::new(&config, "hash", CancellationToken::new())
        .unwrap()
        .run(&phases)
        .await
        .unwrap();

    assert_eq!(second.traversals.get(&TraversalStatus::Complete), Some(&2));
    assert_eq!(second.traversals.len(), 1);

    let storage = open_storage(Path::new(&config.output.database_path)).unwrap();
    let thread = storage.get_thread_by_path("/news/umfrage_t6/").unwrap().unwrap();
    assert!(thread.poll_archived);
    assert!(dir
        .path()
        .join("pages")
        .join("%2Fnews%2Fumfrage_t6%2F.poll.html")
        .exists());
    assert_eq!(storage.counts().unwrap().posts, 3);
}

#[tokio::test]
async fn test_board_parents_match_despite_whitespace() {
    let server = MockServer::start().await;
    mount_forum(&server).await;
    Mock::given(method("GET"))
        .and(path("/news/archiv_b7/"))
        .respond_with(html(board_page("Archiv | Digital Nippon", &[], None)))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = archive_config(&server, dir.path());
    config.boards = vec![
        BoardEntry {
            path: "/news/archiv_b7/".to_string(),
            parent: Some(" /news_b2/".to_string()),
        },
        BoardEntry {
            path: " /news_b2/ ".to_string(),
            parent: None,
        },
    ];

    Archiver::new(&config, "hash", CancellationToken::new())
        .unwrap()
        .run(&[Phase::Boards])
        .await
        .unwrap();

    let storage = open_storage(Path::new(&config.output.database_path)).unwrap();
    let news = storage.get_board_by_path(BOARD).unwrap().unwrap();
    let archiv = storage.get_board_by_path("/news/archiv_b7/").unwrap().unwrap();
    assert_eq!(news.parent_id, None);
    assert_eq!(archiv.parent_id, Some(news.id));
    assert_eq!(archiv.site_id, 7);
}
