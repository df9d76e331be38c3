//! Archived records
//!
//! These are the rows the archive holds, as read back from storage. Values
//! produced by extraction (before ids exist) live in [`crate::extract`].

use crate::dates::{Birthday, LastActivity};
use chrono::{NaiveDate, NaiveDateTime};

/// A forum section, optionally nested under a parent board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    pub id: i64,
    pub path: String,
    /// Set from the first listing page; None until the board is scraped
    pub title: Option<String>,
    /// The forum's numeric board id (`_b<N>` in the path)
    pub site_id: u32,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thread {
    pub id: i64,
    pub board_id: i64,
    pub path: String,
    pub title: String,
    pub has_poll: bool,
    /// Whether the plain (poll-bearing) page has been archived
    pub poll_archived: bool,
    /// When the posts were stored; None means the thread is still pending
    pub scraped_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: i64,
    pub thread_id: i64,
    /// Zero-based position within the thread, in document order
    pub position: u32,
    pub author_id: i64,
    pub author_name: String,
    /// None when the page's date text could not be normalized
    pub created_at: Option<NaiveDateTime>,
    pub body_markup: String,
    pub raw_content: String,
}

/// Gender as shown on a member profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gender {
    Unspecified,
    Male,
    Female,
}

impl Gender {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Unspecified => "unspecified",
            Self::Male => "male",
            Self::Female => "female",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "unspecified" => Some(Self::Unspecified),
            "male" => Some(Self::Male),
            "female" => Some(Self::Female),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: i64,
    pub name: String,
    pub profile_path: Option<String>,
    pub profile: AuthorProfile,
    /// When the profile page was last scraped
    pub profile_scraped_at: Option<String>,
}

/// Fields filled in from a member's profile page
///
/// Every field is optional: a label that is missing or carries an
/// unreadable value leaves its field unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorProfile {
    pub gender: Option<Gender>,
    pub birthday: Option<Birthday>,
    pub registered_at: Option<NaiveDate>,
    pub last_activity: Option<LastActivity>,
}
