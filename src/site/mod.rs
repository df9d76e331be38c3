//! Site addressing for the archived forum
//!
//! The forum is addressed by paths (`/lifestyle/..._b49/`) relative to a
//! single configured base URL. This module resolves paths against that base,
//! reduces same-site hrefs back to paths, and interprets board paths.

mod board_path;

pub use board_path::BoardPath;

use crate::{UrlError, UrlResult};
use url::Url;

/// The configured base URL of the archived site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteBase {
    base: Url,
}

impl SiteBase {
    /// Parses and validates the base URL
    ///
    /// The URL must be absolute, use HTTP or HTTPS, and carry a host.
    ///
    /// # Examples
    ///
    /// ```
    /// use forum_archiver::site::SiteBase;
    ///
    /// let site = SiteBase::parse("http://www.digitalnippon.de/").unwrap();
    /// let url = site.resolve("/news_b2/").unwrap();
    /// assert_eq!(url.as_str(), "http://www.digitalnippon.de/news_b2/");
    /// ```
    pub fn parse(base_url: &str) -> UrlResult<Self> {
        let base = Url::parse(base_url).map_err(|e| UrlError::Parse(e.to_string()))?;

        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(UrlError::InvalidScheme(format!(
                "Only HTTP and HTTPS schemes are supported, got: {}",
                base.scheme()
            )));
        }

        if base.host_str().is_none() {
            return Err(UrlError::Parse(format!("{} has no host", base_url)));
        }

        Ok(Self { base })
    }

    /// Returns the base URL
    pub fn url(&self) -> &Url {
        &self.base
    }

    /// Resolves a forum path (or an absolute URL) against the base
    pub fn resolve(&self, path: &str) -> UrlResult<Url> {
        self.base
            .join(path.trim())
            .map_err(|e| UrlError::Parse(format!("{}: {}", path, e)))
    }

    /// Reduces an href found on the page at `current` to a site path
    ///
    /// Relative hrefs such as `seite-2/` are resolved against the page they
    /// appear on. Hrefs pointing at another host are rejected. Fragments
    /// are dropped, queries kept.
    pub fn follow(&self, current: &str, href: &str) -> UrlResult<String> {
        let url = self
            .resolve(current)?
            .join(href.trim())
            .map_err(|e| UrlError::Parse(format!("{}: {}", href, e)))?;
        self.path_of(&url)
    }

    fn path_of(&self, url: &Url) -> UrlResult<String> {
        if url.host_str() != self.base.host_str() || url.port() != self.base.port() {
            return Err(UrlError::ForeignHost(url.to_string()));
        }

        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }
        Ok(path)
    }
}
