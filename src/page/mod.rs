//! Page parsing and element queries
//!
//! Forum pages are parsed permissively into a [`Document`]; parsing never
//! fails, malformed markup yields a best-effort tree. Queries use CSS
//! selectors (tag names, exact class tokens, descendant and child
//! combinators), and iterate lazily in document order.

mod clean;
pub mod selectors;

pub use clean::{render_without, CleanedFragment};

use scraper::{ElementRef, Html, Selector};

/// A parsed HTML page
///
/// The document is read-only; derived output (such as a post body without
/// its header and quotes) is produced as a new value instead of mutating
/// the tree.
pub struct Document {
    html: Html,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document").finish_non_exhaustive()
    }
}

/// Parses raw response bytes into a document
///
/// Invalid UTF-8 sequences are replaced rather than rejected.
pub fn parse(bytes: &[u8]) -> Document {
    Document::parse_str(&String::from_utf8_lossy(bytes))
}

impl Document {
    pub fn parse_str(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
        }
    }

    /// Elements matching `selector`, in document order
    ///
    /// Each call starts a fresh traversal.
    pub fn select<'a, 'b>(&'a self, selector: &'b Selector) -> scraper::html::Select<'a, 'b> {
        self.html.select(selector)
    }

    /// First element matching `selector`
    pub fn first<'a>(&'a self, selector: &Selector) -> Option<ElementRef<'a>> {
        self.html.select(selector).next()
    }

    /// Trimmed text content of the `<title>` element
    pub fn title(&self) -> Option<String> {
        self.first(&selectors::TITLE)
            .map(|element| text_of(&element).trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Flattened text of the `<body>` element
    pub fn body_text(&self) -> String {
        self.first(&selectors::BODY)
            .map(|body| text_of(&body))
            .unwrap_or_default()
    }
}

/// Concatenated text of all descendant text nodes
pub fn text_of(element: &ElementRef<'_>) -> String {
    element.text().collect()
}

/// Whether the element carries the class token `class`
pub fn has_class(element: &ElementRef<'_>, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}
