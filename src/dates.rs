//! Date normalization for forum date text
//!
//! The forum prints dates as `08.09.2017` with a separate `14:30` time, or
//! relative to the day the page was rendered ("Heute", "Gestern"). Relative
//! text is resolved against a reference date fixed once per crawl run.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;
use thiserror::Error;

const DATE_FORMAT: &str = "%d.%m.%Y";
const TIME_FORMAT: &str = "%H:%M";

/// Date text that matched none of the known forms
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot interpret '{raw}' as a date: {reason}")]
pub struct NormalizationError {
    /// The offending text, as found on the page
    pub raw: String,
    pub reason: String,
}

impl NormalizationError {
    fn new(raw: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self {
            raw: raw.into(),
            reason: reason.to_string(),
        }
    }
}

/// Words the forum uses for the current and the previous day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelativeDayTokens {
    pub today: &'static str,
    pub yesterday: &'static str,
}

impl RelativeDayTokens {
    pub const GERMAN: Self = Self {
        today: "Heute",
        yesterday: "Gestern",
    };

    pub const ENGLISH: Self = Self {
        today: "Today",
        yesterday: "Yesterday",
    };
}

/// A birthday; members may hide the year
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Birthday {
    pub year: Option<i32>,
    pub month: u32,
    pub day: u32,
}

impl Birthday {
    /// Parses the stored form (`YYYY-MM-DD` or `--MM-DD`)
    pub fn from_db_string(s: &str) -> Option<Self> {
        if let Some(rest) = s.strip_prefix("--") {
            let (month, day) = rest.split_once('-')?;
            let (month, day) = (month.parse().ok()?, day.parse().ok()?);
            NaiveDate::from_ymd_opt(2000, month, day)?;
            return Some(Self {
                year: None,
                month,
                day,
            });
        }

        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
        Some(Self {
            year: Some(date.year()),
            month: date.month(),
            day: date.day(),
        })
    }
}

impl fmt::Display for Birthday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.year {
            Some(year) => write!(f, "{:04}-{:02}-{:02}", year, self.month, self.day),
            None => write!(f, "--{:02}-{:02}", self.month, self.day),
        }
    }
}

/// A member's last activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastActivity {
    /// The profile shows "-": the member was never active
    Never,
    On(NaiveDate),
}

impl LastActivity {
    pub fn to_db_string(&self) -> String {
        match self {
            Self::Never => "never".to_string(),
            Self::On(date) => date.format("%Y-%m-%d").to_string(),
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "never" => Some(Self::Never),
            _ => NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().map(Self::On),
        }
    }
}

/// Converts forum date text into absolute dates
///
/// The reference date is set at construction and cannot change afterwards,
/// so every record of a run is anchored to the same day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateNormalizer {
    reference: NaiveDate,
    tokens: RelativeDayTokens,
}

impl DateNormalizer {
    pub fn new(reference: NaiveDate, tokens: RelativeDayTokens) -> Self {
        Self { reference, tokens }
    }

    pub fn reference(&self) -> NaiveDate {
        self.reference
    }

    /// Normalizes a post's date and time text
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use forum_archiver::dates::{DateNormalizer, RelativeDayTokens};
    ///
    /// let reference = NaiveDate::from_ymd_opt(2017, 9, 8).unwrap();
    /// let normalizer = DateNormalizer::new(reference, RelativeDayTokens::GERMAN);
    /// let ts = normalizer.normalize("Gestern", "09:00").unwrap();
    /// assert_eq!(ts.to_string(), "2017-09-07 09:00:00");
    /// ```
    pub fn normalize(
        &self,
        date_text: &str,
        time_text: &str,
    ) -> Result<NaiveDateTime, NormalizationError> {
        let date_text = date_text.trim();
        let time_text = time_text.trim();

        if let Some(day) = self.relative_day(date_text) {
            let time = NaiveTime::parse_from_str(time_text, TIME_FORMAT)
                .map_err(|e| NormalizationError::new(time_text, e))?;
            return Ok(day.and_time(time));
        }

        let combined = format!("{} {}", date_text, time_text);
        NaiveDateTime::parse_from_str(&combined, &format!("{} {}", DATE_FORMAT, TIME_FORMAT))
            .map_err(|e| NormalizationError::new(combined.clone(), e))
    }

    /// Parses an absolute `dd.mm.yyyy` date
    pub fn parse_date(&self, text: &str) -> Result<NaiveDate, NormalizationError> {
        let text = text.trim();
        NaiveDate::parse_from_str(text, DATE_FORMAT).map_err(|e| NormalizationError::new(text, e))
    }

    /// Parses a birthday, falling back to `dd.mm.` when the year is hidden
    pub fn parse_birthday(&self, text: &str) -> Result<Birthday, NormalizationError> {
        let text = text.trim();

        if let Ok(date) = NaiveDate::parse_from_str(text, DATE_FORMAT) {
            return Ok(Birthday {
                year: Some(date.year()),
                month: date.month(),
                day: date.day(),
            });
        }

        let invalid = || NormalizationError::new(text, "expected dd.mm.yyyy or dd.mm.");
        let (day, month) = text
            .strip_suffix('.')
            .and_then(|rest| rest.split_once('.'))
            .ok_or_else(invalid)?;
        let day: u32 = day.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;

        // Leap year, so 29.02. is accepted
        NaiveDate::from_ymd_opt(2000, month, day).ok_or_else(invalid)?;

        Ok(Birthday {
            year: None,
            month,
            day,
        })
    }

    /// Parses a profile's "last activity" value
    ///
    /// A leading "-" means the member was never active, which is a value in
    /// its own right and not an error.
    pub fn parse_last_activity(&self, text: &str) -> Result<LastActivity, NormalizationError> {
        let text = text.trim();

        if text.starts_with('-') {
            return Ok(LastActivity::Never);
        }

        if let Some(day) = self.relative_day(text) {
            return Ok(LastActivity::On(day));
        }

        let date = text.split_whitespace().next().unwrap_or_default();
        NaiveDate::parse_from_str(date, DATE_FORMAT)
            .map(LastActivity::On)
            .map_err(|e| NormalizationError::new(text, e))
    }

    fn relative_day(&self, text: &str) -> Option<NaiveDate> {
        if starts_with_token(text, self.tokens.today) {
            Some(self.reference)
        } else if starts_with_token(text, self.tokens.yesterday) {
            Some(self.reference - Duration::days(1))
        } else {
            None
        }
    }
}

fn starts_with_token(text: &str, token: &str) -> bool {
    text.to_lowercase().starts_with(&token.to_lowercase())
}
