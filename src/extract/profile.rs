//! Member profile pages
//!
//! A profile is a column of label lines ("Geschlecht:") each followed by its
//! value on the next line of the flattened body text.

use super::{ExtractError, ExtractResult, Ruleset};
use crate::dates::DateNormalizer;
use crate::model::AuthorProfile;
use crate::page::Document;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilePage {
    pub name: String,
    pub profile: AuthorProfile,
}

/// Extracts the member name and profile fields
///
/// Only a missing or unreadable name fails the page. A field whose label is
/// absent, or whose value is missing or malformed, is left unset.
pub fn extract_profile(
    doc: &Document,
    page: &str,
    ruleset: &Ruleset,
    dates: &DateNormalizer,
) -> ExtractResult<ProfilePage> {
    let raw_title = doc.title().ok_or_else(|| ExtractError::MissingElement {
        page: page.to_string(),
        what: "title",
    })?;
    let name = ruleset
        .profile_name(&raw_title)
        .ok_or_else(|| ExtractError::PatternMismatch {
            page: page.to_string(),
            pattern: "profile title",
            text: raw_title.clone(),
        })?;

    let body = doc.body_text();
    let lines: Vec<&str> = body
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let labels = ruleset.profile_labels();
    let all_labels = labels.all();
    let field = |label: &str| value_after(&lines, &all_labels, label);

    let mut profile = AuthorProfile::default();

    if let Some(value) = field(labels.gender) {
        profile.gender = Some(ruleset.gender(value));
    }

    if let Some(value) = field(labels.registered_at) {
        profile.registered_at = dates
            .parse_date(value)
            .map_err(|e| warn!(page, field = "registered_at", error = %e, "Leaving field unset"))
            .ok();
    }

    if let Some(value) = field(labels.birthday) {
        profile.birthday = dates
            .parse_birthday(value)
            .map_err(|e| warn!(page, field = "birthday", error = %e, "Leaving field unset"))
            .ok();
    }

    if let Some(value) = field(labels.last_activity) {
        profile.last_activity = dates
            .parse_last_activity(value)
            .map_err(|e| warn!(page, field = "last_activity", error = %e, "Leaving field unset"))
            .ok();
    }

    Ok(ProfilePage { name, profile })
}

/// The line following `label`, unless that line is itself a label
fn value_after<'a>(lines: &[&'a str], labels: &[&str], label: &str) -> Option<&'a str> {
    let index = lines.iter().position(|line| *line == label)?;
    lines
        .get(index + 1)
        .copied()
        .filter(|value| !labels.contains(value))
}
