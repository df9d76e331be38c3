//! CSS selectors for the forum's markup

use scraper::Selector;
use std::sync::LazyLock;

fn compile(selector: &str) -> Selector {
    Selector::parse(selector).expect("hardcoded selector is valid")
}

pub static TITLE: LazyLock<Selector> = LazyLock::new(|| compile("head > title"));
pub static BODY: LazyLock<Selector> = LazyLock::new(|| compile("body"));

/// Anchors linking to a thread on a board listing page
pub static THREAD_TITLE: LazyLock<Selector> = LazyLock::new(|| compile("a.threadtitle"));

/// One cell per thread row on a board listing page
pub static THREAD_ROW: LazyLock<Selector> =
    LazyLock::new(|| compile("tr.threadbit > td.tablea > span.normalfont"));

/// Thread prefix label ("Umfrage: ...") inside a thread row
pub static THREAD_PREFIX: LazyLock<Selector> = LazyLock::new(|| compile("span.prefix > b"));

/// Pagination anchors on listing pages
pub static PAGE_LINK: LazyLock<Selector> =
    LazyLock::new(|| compile("span.smallfont.pagelink > b > a"));

/// Post containers on a thread's print view
pub static POST: LazyLock<Selector> = LazyLock::new(|| compile("html > body > div.normalfont"));

/// Profile links on the member list
pub static MEMBER_LINK: LazyLock<Selector> =
    LazyLock::new(|| compile("table.memberlist td.membername a"));

/// Class tokens of quoted-reply blocks inside a post
pub const QUOTE_CLASSES: [&str; 2] = ["quote", "quotecontent"];
