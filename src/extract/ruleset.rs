use crate::dates::RelativeDayTokens;
use crate::model::Gender;
use regex::Regex;
use thiserror::Error;

/// A ruleset could not be built
#[derive(Debug, Error)]
pub enum RulesetError {
    #[error("Unknown ruleset '{id}', expected one of: {known}")]
    Unknown { id: String, known: String },

    #[error("Ruleset '{id}' has an invalid {pattern} pattern: {source}")]
    Pattern {
        id: &'static str,
        pattern: &'static str,
        #[source]
        source: regex::Error,
    },
}

/// Labels on a member profile page, each on a line of its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileLabels {
    pub gender: &'static str,
    pub registered_at: &'static str,
    pub birthday: &'static str,
    pub last_activity: &'static str,
}

impl ProfileLabels {
    pub fn all(&self) -> [&'static str; 4] {
        [
            self.gender,
            self.registered_at,
            self.birthday,
            self.last_activity,
        ]
    }
}

struct Tokens {
    id: &'static str,
    next_page: &'static str,
    poll: &'static str,
    days: RelativeDayTokens,
    labels: ProfileLabels,
    male: &'static str,
    female: &'static str,
    posted_by: &'static str,
    on: &'static str,
    at: &'static str,
    full: &'static str,
    page: &'static str,
    profile_of: &'static str,
}

const GERMAN_2017: Tokens = Tokens {
    id: "de-2017",
    next_page: "nächste",
    poll: "Umfrage",
    days: RelativeDayTokens::GERMAN,
    labels: ProfileLabels {
        gender: "Geschlecht:",
        registered_at: "Registriert am:",
        birthday: "Geburtstag:",
        last_activity: "Letzte Aktivität:",
    },
    male: "männlich",
    female: "weiblich",
    posted_by: "Geschrieben von",
    on: "am",
    at: "um",
    full: "Komplett",
    page: "Seite",
    profile_of: "Profil von",
};

const ENGLISH: Tokens = Tokens {
    id: "en",
    next_page: "next",
    poll: "Poll",
    days: RelativeDayTokens::ENGLISH,
    labels: ProfileLabels {
        gender: "Gender:",
        registered_at: "Registered on:",
        birthday: "Birthday:",
        last_activity: "Last activity:",
    },
    male: "male",
    female: "female",
    posted_by: "Posted by",
    on: "on",
    at: "at",
    full: "Full",
    page: "Page",
    profile_of: "Profile of",
};

/// The post header line, split into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostHeader {
    pub author: String,
    pub date: String,
    pub time: String,
}

/// Every fixed token and text pattern for one version of the forum markup
///
/// A change to the site's wording is a new ruleset, not an edit of an
/// existing one.
#[derive(Debug, Clone)]
pub struct Ruleset {
    id: &'static str,
    next_page: &'static str,
    poll: &'static str,
    days: RelativeDayTokens,
    labels: ProfileLabels,
    male: &'static str,
    female: &'static str,
    post_header: Regex,
    thread_title: Regex,
    board_title_paged: Regex,
    board_title_plain: Regex,
    profile_title: Regex,
}

impl Ruleset {
    pub const KNOWN_IDS: [&'static str; 2] = [GERMAN_2017.id, ENGLISH.id];

    /// Builds the ruleset `id` for a site whose page titles end in `site_name`
    pub fn from_id(id: &str, site_name: &str) -> Result<Self, RulesetError> {
        let tokens = match id {
            "de-2017" => GERMAN_2017,
            "en" => ENGLISH,
            _ => {
                return Err(RulesetError::Unknown {
                    id: id.to_string(),
                    known: Self::KNOWN_IDS.join(", "),
                })
            }
        };
        Self::build(tokens, site_name)
    }

    fn build(t: Tokens, site_name: &str) -> Result<Self, RulesetError> {
        let post_header = compile(
            t.id,
            "post header",
            &format!(
                r"^\s*{} (.*) {} (.*) {} (.*):",
                regex::escape(t.posted_by),
                regex::escape(t.on),
                regex::escape(t.at)
            ),
        )?;
        let thread_title = compile(
            t.id,
            "thread title",
            &format!(r"^(.*) - {} \|", regex::escape(t.full)),
        )?;
        let board_title_paged = compile(
            t.id,
            "paged board title",
            &format!(r"^(.+) \({} [0-9]+\)", regex::escape(t.page)),
        )?;
        let board_title_plain = compile(
            t.id,
            "board title",
            &format!(r"^(.+) \| {}", regex::escape(site_name)),
        )?;
        let profile_title = compile(
            t.id,
            "profile title",
            &format!(r"^{} (.*) \|", regex::escape(t.profile_of)),
        )?;

        Ok(Self {
            id: t.id,
            next_page: t.next_page,
            poll: t.poll,
            days: t.days,
            labels: t.labels,
            male: t.male,
            female: t.female,
            post_header,
            thread_title,
            board_title_paged,
            board_title_plain,
            profile_title,
        })
    }

    pub fn id(&self) -> &'static str {
        self.id
    }

    /// Label prefix of the pagination link to the following page
    pub fn next_page_token(&self) -> &'static str {
        self.next_page
    }

    /// Label prefix marking a thread as poll-bearing in board listings
    pub fn poll_token(&self) -> &'static str {
        self.poll
    }

    pub fn relative_days(&self) -> RelativeDayTokens {
        self.days
    }

    pub fn profile_labels(&self) -> ProfileLabels {
        self.labels
    }

    /// Splits a post header line into author, date and time text
    pub fn post_header(&self, line: &str) -> Option<PostHeader> {
        let captures = self.post_header.captures(line)?;
        Some(PostHeader {
            author: captures.get(1)?.as_str().trim().to_string(),
            date: captures.get(2)?.as_str().trim().to_string(),
            time: captures.get(3)?.as_str().trim().to_string(),
        })
    }

    /// Thread title from a print view's `<title>`
    pub fn thread_title(&self, title: &str) -> Option<String> {
        capture_first(&self.thread_title, title)
    }

    /// Board title from a listing page's `<title>`
    pub fn board_title(&self, title: &str) -> Option<String> {
        capture_first(&self.board_title_paged, title)
            .or_else(|| capture_first(&self.board_title_plain, title))
    }

    /// Member name from a profile page's `<title>`
    pub fn profile_name(&self, title: &str) -> Option<String> {
        capture_first(&self.profile_title, title)
    }

    /// Maps the gender value of a profile; anything outside the vocabulary
    /// is unspecified
    pub fn gender(&self, value: &str) -> Gender {
        let value = value.trim();
        if value.eq_ignore_ascii_case(self.male) {
            Gender::Male
        } else if value.eq_ignore_ascii_case(self.female) {
            Gender::Female
        } else {
            Gender::Unspecified
        }
    }
}

fn capture_first(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn compile(id: &'static str, pattern: &'static str, source: &str) -> Result<Regex, RulesetError> {
    Regex::new(source).map_err(|source| RulesetError::Pattern {
        id,
        pattern,
        source,
    })
}
