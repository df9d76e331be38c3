//! Member list pages

use super::{next_page_link, ExtractResult, ListingExtractor, ListingPage, Ruleset};
use crate::page::{selectors, text_of, Document};
use crate::site::SiteBase;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSummary {
    pub name: String,
    pub profile_path: String,
}

/// Extracts member names and profile paths from the member list
#[derive(Debug, Clone, Copy)]
pub struct MemberListing<'a> {
    pub site: &'a SiteBase,
    pub ruleset: &'a Ruleset,
}

impl ListingExtractor for MemberListing<'_> {
    type Record = MemberSummary;

    fn extract(&self, doc: &Document, page: &str) -> ExtractResult<ListingPage<MemberSummary>> {
        let records = doc
            .select(&selectors::MEMBER_LINK)
            .filter_map(|anchor| {
                let name = text_of(&anchor).trim().to_string();
                let href = anchor.value().attr("href")?;
                if name.is_empty() {
                    return None;
                }
                match self.site.follow(page, href) {
                    Ok(profile_path) => Some(MemberSummary { name, profile_path }),
                    Err(e) => {
                        debug!(page, href, error = %e, "Skipping member link");
                        None
                    }
                }
            })
            .collect();

        Ok(ListingPage {
            records,
            next_page: self.next_page(doc),
        })
    }

    fn next_page(&self, doc: &Document) -> Option<String> {
        next_page_link(doc, self.ruleset.next_page_token())
    }
}
