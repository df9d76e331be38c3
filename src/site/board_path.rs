use regex::Regex;
use std::sync::LazyLock;

static BOARD_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(/.+)_b([0-9]+)/?$").expect("hardcoded regex pattern is valid")
});

/// A board path such as `/lifestyle/digital-world/pc-internet-smartphone_b49/`
///
/// The part before `_b<N>` is the prefix shared by every thread of the
/// board (`/lifestyle/digital-world/pc-internet-smartphone/...`), and `N` is
/// the forum's own numeric board id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoardPath {
    path: String,
    thread_prefix: String,
    site_id: u32,
}

impl BoardPath {
    /// Parses a board path; returns None if it does not end in `_b<N>`
    pub fn parse(path: &str) -> Option<Self> {
        let captures = BOARD_PATH.captures(path.trim())?;
        let site_id = captures.get(2)?.as_str().parse().ok()?;

        Some(Self {
            path: path.trim().to_string(),
            thread_prefix: format!("{}/", captures.get(1)?.as_str()),
            site_id,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Prefix (with trailing slash) every thread of this board starts with
    pub fn thread_prefix(&self) -> &str {
        &self.thread_prefix
    }

    /// The forum's numeric id of this board
    pub fn site_id(&self) -> u32 {
        self.site_id
    }

    /// Whether a thread path belongs to this board
    ///
    /// Sticky threads pinned from other boards fail this check.
    pub fn owns(&self, thread_path: &str) -> bool {
        thread_path.starts_with(&self.thread_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_board_path() {
        let board = BoardPath::parse("/lifestyle/digital-world/pc-internet-smartphone_b49/").unwrap();
        assert_eq!(
            board.thread_prefix(),
            "/lifestyle/digital-world/pc-internet-smartphone/"
        );
        assert_eq!(board.site_id(), 49);
        assert_eq!(
            board.as_str(),
            "/lifestyle/digital-world/pc-internet-smartphone_b49/"
        );
    }

    #[test]
    fn test_parse_without_trailing_slash() {
        let board = BoardPath::parse("/news_b2").unwrap();
        assert_eq!(board.thread_prefix(), "/news/");
        assert_eq!(board.site_id(), 2);
    }

    #[test]
    fn test_parse_rejects_non_board_paths() {
        assert!(BoardPath::parse("/lifestyle/").is_none());
        assert!(BoardPath::parse("/news_bx/").is_none());
        assert!(BoardPath::parse("").is_none());
    }

    #[test]
    fn test_owns_filters_foreign_threads() {
        let board = BoardPath::parse("/lifestyle/digital-world/pc-internet-smartphone_b49/").unwrap();
        assert!(board.owns("/lifestyle/digital-world/pc-internet-smartphone/neues-handy_t1234/"));
        assert!(!board.owns("/forum-intern/ankuendigungen/regeln_t1/"));
        // Shares the text prefix but is a different board
        assert!(!board.owns("/lifestyle/digital-world/pc-internet-smartphones/x_t9/"));
    }
}
