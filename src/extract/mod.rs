//! Extraction of records from parsed forum pages
//!
//! Every extractor is a function of a [`Document`] (plus the page's path,
//! used to resolve relative links and to reference the page in errors).
//! Extractors never fetch and never write; the crawl controller feeds them
//! pages and stores what they return.
//!
//! - [`board`]: thread summaries and the next-page link of a board listing
//! - [`thread`]: posts of a thread's print view
//! - [`members`]: member names and profile paths of the member list
//! - [`profile`]: fields of a member profile

pub mod board;
pub mod members;
pub mod profile;
mod ruleset;
pub mod thread;

pub use board::{BoardListing, ThreadSummary};
pub use members::{MemberListing, MemberSummary};
pub use profile::{extract_profile, ProfilePage};
pub use ruleset::{PostHeader, ProfileLabels, Ruleset, RulesetError};
pub use thread::{extract_thread, ExtractedPost, ThreadPage};

use crate::page::{selectors, text_of, Document};
use thiserror::Error;

/// A page did not have the structure its extractor relies on
///
/// The page's extraction is discarded; other pages are unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("{page}: no {what} found")]
    MissingElement { page: String, what: &'static str },

    #[error("{page}: '{text}' does not match the {pattern} pattern")]
    PatternMismatch {
        page: String,
        pattern: &'static str,
        text: String,
    },

    #[error("{page}: {titles} thread titles but {rows} thread rows")]
    LengthMismatch {
        page: String,
        titles: usize,
        rows: usize,
    },
}

pub type ExtractResult<T> = Result<T, ExtractError>;

/// Records of one page of a paginated listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingPage<T> {
    /// Records in document order
    pub records: Vec<T>,
    /// Href of the next page's link, exactly as found; None on the last page
    pub next_page: Option<String>,
}

/// Extraction of one page of a paginated listing
pub trait ListingExtractor {
    type Record;

    /// Extracts the records and the next-page link of the page at `page`
    fn extract(&self, doc: &Document, page: &str) -> ExtractResult<ListingPage<Self::Record>>;

    /// Href of the page's next-page link
    ///
    /// Pagination does not depend on the records, so a page whose records
    /// cannot be extracted still leads on to the next one.
    fn next_page(&self, doc: &Document) -> Option<String>;
}

/// Href of the first pagination link whose label starts with `token`
pub fn next_page_link(doc: &Document, token: &str) -> Option<String> {
    doc.select(&selectors::PAGE_LINK)
        .find(|link| text_of(link).trim_start().starts_with(token))
        .and_then(|link| link.value().attr("href"))
        .map(str::to_string)
}
