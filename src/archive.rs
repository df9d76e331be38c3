//! Raw page archive
//!
//! Every fetched page can be kept on disk as the exact response bytes, one
//! file per page. File names are the form-urlencoded site path plus
//! `.html`, so `/news/hallo_t5/komplett/` becomes
//! `%2Fnews%2Fhallo_t5%2Fkomplett%2F.html`. The plain page of a
//! poll-bearing thread is kept next to its print view as `.poll.html`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use url::form_urlencoded;

const PAGE_SUFFIX: &str = ".html";
const POLL_SUFFIX: &str = ".poll.html";

/// What an archived file holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Page,
    /// The plain page of a poll-bearing thread
    Poll,
}

impl PageKind {
    fn suffix(&self) -> &'static str {
        match self {
            Self::Page => PAGE_SUFFIX,
            Self::Poll => POLL_SUFFIX,
        }
    }
}

/// File name for the page at `path`
pub fn encode_name(path: &str, kind: PageKind) -> String {
    let mut name: String = form_urlencoded::byte_serialize(path.as_bytes()).collect();
    name.push_str(kind.suffix());
    name
}

/// Site path and kind of an archived file name; None if the name was not
/// produced by [`encode_name`]
pub fn decode_name(file_name: &str) -> Option<(String, PageKind)> {
    let (stem, kind) = match file_name.strip_suffix(POLL_SUFFIX) {
        Some(stem) => (stem, PageKind::Poll),
        None => (file_name.strip_suffix(PAGE_SUFFIX)?, PageKind::Page),
    };

    if stem.is_empty() || stem.contains(['&', '=']) {
        return None;
    }

    let (path, _) = form_urlencoded::parse(stem.as_bytes()).next()?;
    Some((path.into_owned(), kind))
}

/// Directory of archived pages
#[derive(Debug, Clone)]
pub struct PageArchive {
    dir: PathBuf,
}

impl PageArchive {
    /// Archive rooted at `dir`, without touching the filesystem
    pub fn at(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Opens the archive directory, creating it if needed
    pub fn create(dir: impl AsRef<Path>) -> io::Result<Self> {
        let archive = Self::at(dir);
        fs::create_dir_all(&archive.dir)?;
        Ok(archive)
    }

    pub fn file_path(&self, path: &str, kind: PageKind) -> PathBuf {
        self.dir.join(encode_name(path, kind))
    }

    /// Writes the response bytes of the page at `path`, replacing an
    /// earlier copy
    pub fn store(&self, path: &str, kind: PageKind, body: &[u8]) -> io::Result<PathBuf> {
        let file = self.file_path(path, kind);
        fs::write(&file, body)?;
        Ok(file)
    }

    /// Site paths of every archived page, sorted
    ///
    /// Files not named by [`encode_name`] are ignored. A directory that does
    /// not exist yet holds no pages.
    pub fn pages(&self) -> io::Result<Vec<(String, PageKind)>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut pages = Vec::new();
        for entry in entries {
            let entry = entry?;
            if let Some(page) = entry.file_name().to_str().and_then(decode_name) {
                pages.push(page);
            }
        }
        pages.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.suffix().cmp(b.1.suffix())));
        Ok(pages)
    }
}
