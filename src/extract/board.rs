//! Board listing pages

use super::{next_page_link, ExtractError, ExtractResult, ListingExtractor, ListingPage, Ruleset};
use crate::page::{selectors, text_of, Document};
use crate::site::{BoardPath, SiteBase};
use tracing::debug;

/// A thread as listed on a board page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadSummary {
    pub title: String,
    /// Site path of the thread
    pub path: String,
    pub has_poll: bool,
}

/// Extracts thread summaries from the listing pages of one board
#[derive(Debug, Clone, Copy)]
pub struct BoardListing<'a> {
    pub site: &'a SiteBase,
    pub board: &'a BoardPath,
    pub ruleset: &'a Ruleset,
}

impl BoardListing<'_> {
    /// Board title from the listing page's `<title>`, if it matches either
    /// title form
    pub fn title(&self, doc: &Document) -> Option<String> {
        doc.title().and_then(|t| self.ruleset.board_title(&t))
    }

    /// Poll flags of the thread rows, in document order
    ///
    /// Rows without exactly one thread title (announcements, separators)
    /// are not thread rows.
    fn poll_flags(&self, doc: &Document) -> Vec<bool> {
        doc.select(&selectors::THREAD_ROW)
            .filter(|row| row.select(&selectors::THREAD_TITLE).count() == 1)
            .map(|row| {
                let mut prefixes = row.select(&selectors::THREAD_PREFIX);
                match (prefixes.next(), prefixes.next()) {
                    (Some(prefix), None) => text_of(&prefix)
                        .trim_start()
                        .starts_with(self.ruleset.poll_token()),
                    _ => false,
                }
            })
            .collect()
    }
}

impl ListingExtractor for BoardListing<'_> {
    type Record = ThreadSummary;

    fn extract(&self, doc: &Document, page: &str) -> ExtractResult<ListingPage<ThreadSummary>> {
        let mut titles = Vec::new();
        for anchor in doc.select(&selectors::THREAD_TITLE) {
            let href = anchor
                .value()
                .attr("href")
                .ok_or_else(|| ExtractError::MissingElement {
                    page: page.to_string(),
                    what: "href on a thread title",
                })?;
            titles.push((text_of(&anchor).trim().to_string(), href));
        }

        let polls = self.poll_flags(doc);
        if titles.len() != polls.len() {
            return Err(ExtractError::LengthMismatch {
                page: page.to_string(),
                titles: titles.len(),
                rows: polls.len(),
            });
        }

        let mut records = Vec::with_capacity(titles.len());
        for ((title, href), has_poll) in titles.into_iter().zip(polls) {
            let path = match self.site.follow(page, href) {
                Ok(path) => path,
                Err(e) => {
                    debug!(page, href, error = %e, "Skipping thread link");
                    continue;
                }
            };

            if !self.board.owns(&path) {
                debug!(page, thread = %path, "Skipping thread pinned from another board");
                continue;
            }

            records.push(ThreadSummary {
                title,
                path,
                has_poll,
            });
        }

        Ok(ListingPage {
            records,
            next_page: self.next_page(doc),
        })
    }

    fn next_page(&self, doc: &Document) -> Option<String> {
        next_page_link(doc, self.ruleset.next_page_token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOARD: &str = "/lifestyle/digital-world/pc-internet-smartphone_b49/";

    fn row(path: &str, title: &str, prefix: Option<&str>) -> String {
        let prefix = prefix
            .map(|p| format!(r#"<span class="prefix"><b>{}</b></span> "#, p))
            .unwrap_or_default();
        format!(
            r#"<tr class="threadbit"><td class="tablea"><span class="normalfont">{}<a class="threadtitle" href="{}">{}</a></span></td></tr>"#,
            prefix, path, title
        )
    }

    fn listing(title: &str, rows: &[String], next: Option<&str>) -> Document {
        let next = next
            .map(|href| {
                format!(
                    r#"<span class="smallfont pagelink"><b><a href="{}">nächste Seite</a></b></span>"#,
                    href
                )
            })
            .unwrap_or_default();
        Document::parse_str(&format!(
            "<html><head><title>{}</title></head><body><table>{}</table>{}</body></html>",
            title,
            rows.concat(),
            next
        ))
    }

    fn extract(doc: &Document) -> ExtractResult<ListingPage<ThreadSummary>> {
        let site = SiteBase::parse("http://www.digitalnippon.de/").unwrap();
        let board = BoardPath::parse(BOARD).unwrap();
        let ruleset = Ruleset::from_id("de-2017", "Digital Nippon").unwrap();
        let listing = BoardListing {
            site: &site,
            board: &board,
            ruleset: &ruleset,
        };
        listing.extract(doc, BOARD)
    }

    #[test]
    fn test_extracts_threads_in_order_with_poll_flags() {
        let doc = listing(
            "PC, Internet & Smartphone | Digital Nippon",
            &[
                row(
                    "/lifestyle/digital-world/pc-internet-smartphone/welches-handy_t100/",
                    "Welches Handy?",
                    Some("Umfrage:"),
                ),
                row(
                    "/lifestyle/digital-world/pc-internet-smartphone/windows-10_t101/",
                    "Windows 10",
                    Some("Frage"),
                ),
                row(
                    "/lifestyle/digital-world/pc-internet-smartphone/router_t102/",
                    "Router",
                    None,
                ),
            ],
            Some("seite-2/"),
        );

        let page = extract(&doc).unwrap();
        let flags: Vec<(&str, bool)> = page
            .records
            .iter()
            .map(|t| (t.title.as_str(), t.has_poll))
            .collect();
        assert_eq!(
            flags,
            vec![
                ("Welches Handy?", true),
                ("Windows 10", false),
                ("Router", false)
            ]
        );
        assert_eq!(page.next_page, Some("seite-2/".to_string()));
    }

    #[test]
    fn test_filters_threads_from_other_boards() {
        let doc = listing(
            "PC, Internet & Smartphone (Seite 2)",
            &[
                row("/news/forenregeln_t1/", "Forenregeln", None),
                row(
                    "/lifestyle/digital-world/pc-internet-smartphone/router_t102/",
                    "Router",
                    None,
                ),
                row(
                    "http://www.digitalnippon.de/lifestyle/digital-world/pc-internet-smartphone/nas_t103/",
                    "NAS",
                    None,
                ),
            ],
            None,
        );

        let page = extract(&doc).unwrap();
        let paths: Vec<&str> = page.records.iter().map(|t| t.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "/lifestyle/digital-world/pc-internet-smartphone/router_t102/",
                "/lifestyle/digital-world/pc-internet-smartphone/nas_t103/",
            ]
        );
        assert_eq!(page.next_page, None);
    }

    #[test]
    fn test_title_without_row_is_length_mismatch() {
        let mut rows = vec![row(
            "/lifestyle/digital-world/pc-internet-smartphone/router_t102/",
            "Router",
            None,
        )];
        rows.push(
            r#"<tr><td><a class="threadtitle" href="/lifestyle/digital-world/pc-internet-smartphone/x_t9/">X</a></td></tr>"#
                .to_string(),
        );
        let doc = listing("Board | Digital Nippon", &rows, None);

        assert_eq!(
            extract(&doc),
            Err(ExtractError::LengthMismatch {
                page: BOARD.to_string(),
                titles: 2,
                rows: 1
            })
        );
    }

    #[test]
    fn test_empty_listing() {
        let doc = listing("Board | Digital Nippon", &[], None);
        let page = extract(&doc).unwrap();
        assert!(page.records.is_empty());
        assert!(page.next_page.is_none());
    }

    #[test]
    fn test_board_title() {
        let site = SiteBase::parse("http://www.digitalnippon.de/").unwrap();
        let board = BoardPath::parse(BOARD).unwrap();
        let ruleset = Ruleset::from_id("de-2017", "Digital Nippon").unwrap();
        let listing_rules = BoardListing {
            site: &site,
            board: &board,
            ruleset: &ruleset,
        };

        let doc = listing("PC, Internet & Smartphone (Seite 3)", &[], None);
        assert_eq!(
            listing_rules.title(&doc),
            Some("PC, Internet & Smartphone".to_string())
        );

        let doc = listing("Wartungsarbeiten", &[], None);
        assert_eq!(listing_rules.title(&doc), None);
    }
}
