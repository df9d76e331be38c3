//! Paginated traversal of a listing
//!
//! A traversal starts at a listing's root path and follows next-page links
//! until a page has none, accumulating the extracted records in page order.
//! Fetching is the only suspension point; parsing and extraction run to
//! completion between fetches.

use crate::crawler::{FetchError, Fetcher};
use crate::extract::{ExtractResult, ListingExtractor, ListingPage};
use crate::page::{self, Document};
use crate::state::{TraversalState, TraversalStatus};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// What a finished traversal emits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalOutcome<T> {
    /// Records of every extracted page, in page and document order
    pub records: Vec<T>,
    pub status: TraversalStatus,
    /// Why the traversal is not complete
    pub cause: Option<String>,
    pub pages_fetched: u32,
}

/// Runs paginated traversals with a fixed page ceiling
#[derive(Clone, Copy)]
pub struct Traversal<'a> {
    pub fetcher: &'a Fetcher,
    pub max_pages: u32,
    pub keep_partial_on_cancel: bool,
    pub cancel: &'a CancellationToken,
}

/// Accumulator and state of one running traversal
struct Progress<T> {
    root: String,
    state: TraversalState,
    records: Vec<T>,
    pages_fetched: u32,
    /// First structural error of a discarded page
    damaged: Option<String>,
}

impl<T> Progress<T> {
    fn advance(&mut self, next: TraversalState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {} -> {}",
            self.state,
            next
        );
        trace!(root = %self.root, from = %self.state, to = %next, "Traversal transition");
        self.state = next;
    }

    fn finish(mut self, status: TraversalStatus, cause: Option<String>) -> TraversalOutcome<T> {
        self.advance(TraversalState::Finished);
        debug!(
            root = %self.root,
            status = %status,
            pages = self.pages_fetched,
            records = self.records.len(),
            "Traversal finished"
        );
        TraversalOutcome {
            records: self.records,
            status,
            cause,
            pages_fetched: self.pages_fetched,
        }
    }
}

impl Traversal<'_> {
    /// Walks the listing starting at `root`
    ///
    /// `on_page` sees every fetched page (path, raw bytes and parsed
    /// document) before its records are extracted. The traversal never
    /// fails as a whole. A fetch error ends it as `Partial` with the
    /// records of the pages before. A page with unexpected structure is
    /// discarded and the walk goes on through its next-page link, ending as
    /// `Partial` unless the page ceiling (`Truncated`) or cancellation
    /// (`Cancelled`) ends it first.
    pub async fn run<E, F>(&self, root: &str, extractor: &E, mut on_page: F) -> TraversalOutcome<E::Record>
    where
        E: ListingExtractor,
        F: FnMut(&str, &[u8], &Document),
    {
        let mut progress = Progress {
            root: root.to_string(),
            state: TraversalState::Start,
            records: Vec::new(),
            pages_fetched: 0,
            damaged: None,
        };
        let mut current = root.to_string();

        loop {
            progress.advance(TraversalState::FetchingPage);

            let body = match self.fetcher.fetch(&current, self.cancel).await {
                Ok(body) => body,
                Err(FetchError::Cancelled { .. }) => return self.cancelled(progress),
                Err(e) => {
                    warn!(root, page = %current, error = %e, "Keeping partial results after fetch failure");
                    return progress.finish(TraversalStatus::Partial, Some(e.to_string()));
                }
            };
            progress.pages_fetched += 1;

            progress.advance(TraversalState::Extracting);
            let (extracted, next_page) = extract_page(extractor, &current, &body, &mut on_page);
            match extracted {
                Ok(records) => {
                    debug!(
                        root,
                        page = %current,
                        records = records.len(),
                        has_next = next_page.is_some(),
                        "Extracted listing page"
                    );
                    progress.records.extend(records);
                }
                Err(e) => {
                    warn!(root, page = %current, error = %e, "Discarding page with unexpected structure");
                    progress.damaged.get_or_insert(e.to_string());
                }
            }

            let Some(href) = next_page else {
                progress.advance(TraversalState::Done);
                return match progress.damaged.take() {
                    Some(cause) => progress.finish(TraversalStatus::Partial, Some(cause)),
                    None => progress.finish(TraversalStatus::Complete, None),
                };
            };

            progress.advance(TraversalState::MorePages);
            if progress.pages_fetched >= self.max_pages {
                warn!(root, max_pages = self.max_pages, "Page ceiling reached");
                let cause = format!("stopped after {} pages", self.max_pages);
                return progress.finish(TraversalStatus::Truncated, Some(cause));
            }

            current = match self.fetcher.site().follow(&current, &href) {
                Ok(next) => next,
                Err(e) => {
                    warn!(root, href = %href, error = %e, "Unusable next-page link");
                    return progress.finish(TraversalStatus::Partial, Some(e.to_string()));
                }
            };
        }
    }

    fn cancelled<T>(&self, mut progress: Progress<T>) -> TraversalOutcome<T> {
        if !self.keep_partial_on_cancel {
            progress.records.clear();
        }
        progress.finish(TraversalStatus::Cancelled, Some("run cancelled".to_string()))
    }
}

/// Parses and extracts one page, returning its records and next-page href
///
/// Kept synchronous so the parsed document never lives across a fetch.
fn extract_page<E, F>(
    extractor: &E,
    path: &str,
    body: &[u8],
    on_page: &mut F,
) -> (ExtractResult<Vec<E::Record>>, Option<String>)
where
    E: ListingExtractor,
    F: FnMut(&str, &[u8], &Document),
{
    let doc = page::parse(body);
    on_page(path, body, &doc);
    match extractor.extract(&doc, path) {
        Ok(ListingPage { records, next_page }) => (Ok(records), next_page),
        Err(e) => (Err(e), extractor.next_page(&doc)),
    }
}
