//! Thread print views

use super::{ExtractError, ExtractResult, Ruleset};
use crate::dates::DateNormalizer;
use crate::page::{has_class, render_without, selectors, text_of, Document};
use chrono::NaiveDateTime;
use scraper::ElementRef;
use tracing::warn;

/// A post as found on the page, before it is attributed to stored records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPost {
    pub author_name: String,
    /// Date and time text exactly as printed
    pub date_text: String,
    pub time_text: String,
    /// None when the date text could not be normalized
    pub created_at: Option<NaiveDateTime>,
    /// Post markup without the header line and quoted replies
    pub body_markup: String,
    /// Flattened text of `body_markup`
    pub raw_content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadPage {
    pub title: String,
    /// Posts in document order
    pub posts: Vec<ExtractedPost>,
}

/// Extracts the title and posts of a thread's print view
///
/// A post whose header line is missing or unreadable fails the whole page,
/// since the post could not be attributed to an author. Unreadable date
/// text only leaves `created_at` unset.
pub fn extract_thread(
    doc: &Document,
    page: &str,
    ruleset: &Ruleset,
    dates: &DateNormalizer,
) -> ExtractResult<ThreadPage> {
    let raw_title = doc.title().ok_or_else(|| ExtractError::MissingElement {
        page: page.to_string(),
        what: "title",
    })?;
    let title = ruleset
        .thread_title(&raw_title)
        .ok_or_else(|| ExtractError::PatternMismatch {
            page: page.to_string(),
            pattern: "thread title",
            text: raw_title.clone(),
        })?;

    let posts = doc
        .select(&selectors::POST)
        .map(|element| extract_post(&element, page, ruleset, dates))
        .collect::<ExtractResult<Vec<_>>>()?;

    Ok(ThreadPage { title, posts })
}

fn extract_post(
    element: &ElementRef<'_>,
    page: &str,
    ruleset: &Ruleset,
    dates: &DateNormalizer,
) -> ExtractResult<ExtractedPost> {
    let header = element
        .children()
        .filter_map(ElementRef::wrap)
        .find(|child| child.value().name() == "i")
        .ok_or_else(|| ExtractError::MissingElement {
            page: page.to_string(),
            what: "post header",
        })?;

    let header_text = text_of(&header);
    let parts = ruleset
        .post_header(&header_text)
        .ok_or_else(|| ExtractError::PatternMismatch {
            page: page.to_string(),
            pattern: "post header",
            text: header_text.trim().to_string(),
        })?;

    let created_at = match dates.normalize(&parts.date, &parts.time) {
        Ok(ts) => Some(ts),
        Err(e) => {
            warn!(page, author = %parts.author, error = %e, "Keeping post without a timestamp");
            None
        }
    };

    let header_id = header.id();
    let body = render_without(element, |e| {
        e.id() == header_id || selectors::QUOTE_CLASSES.iter().any(|c| has_class(e, c))
    });

    Ok(ExtractedPost {
        author_name: parts.author,
        date_text: parts.date,
        time_text: parts.time,
        created_at,
        body_markup: body.markup,
        raw_content: body.text,
    })
}
