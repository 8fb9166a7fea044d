//! Lab-report date standardization.
//!
//! Report dates arrive in whatever shape the extraction service saw on the
//! page. The ladder below turns any of them into a canonical `YYYY-MM-DD`
//! and never fails: the last rung is today's date plus a warning.
//!
//! 1. already canonical and a real calendar date
//! 2. generic parsing of common written forms
//! 3. an embedded `YYYY-MM-DD` anywhere in the string
//! 4. `M/D/YYYY` or `MM/DD/YYYY` (month first)
//! 5. today

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::Serialize;

use crate::models::CANONICAL_DATE_FORMAT;

static CANONICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid canonical date regex"));

static EMBEDDED_ISO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").expect("valid embedded date regex"));

static MONTH_FIRST_SLASH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\d])(\d{1,2})/(\d{1,2})/(\d{4})(?:[^\d]|$)")
        .expect("valid slash date regex")
});

/// Date-only written forms tried by the generic rung.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%A, %B %d, %Y",
    "%a, %b %d, %Y",
];

/// Date-time forms tried by the generic rung; only the date is kept.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Which rung of the ladder produced the date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DateSource {
    Canonical,
    Parsed,
    Embedded,
    MonthFirstSlash,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StandardizedDate {
    pub date: NaiveDate,
    pub source: DateSource,
}

impl StandardizedDate {
    pub fn canonical(&self) -> String {
        self.date.format(CANONICAL_DATE_FORMAT).to_string()
    }

    pub fn is_fallback(&self) -> bool {
        self.source == DateSource::Fallback
    }
}

/// Standardize `raw`, falling back to `today`. Never fails.
pub fn standardize_date(raw: &str, today: NaiveDate) -> StandardizedDate {
    match try_standardize(raw) {
        Some(found) => found,
        None => {
            tracing::warn!(raw, fallback = %today, "Unreadable test date, using today");
            StandardizedDate {
                date: today,
                source: DateSource::Fallback,
            }
        }
    }
}

/// The first four rungs only. `None` when nothing matched.
pub fn try_standardize(raw: &str) -> Option<StandardizedDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let found = |date: NaiveDate, source: DateSource| Some(StandardizedDate { date, source });

    if CANONICAL.is_match(trimmed) {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, CANONICAL_DATE_FORMAT) {
            return found(date, DateSource::Canonical);
        }
    }

    if let Some(date) = parse_generic(trimmed) {
        return found(date, DateSource::Parsed);
    }

    for caps in EMBEDDED_ISO.captures_iter(trimmed) {
        if let Some(date) = ymd_from_captures(&caps[1], &caps[2], &caps[3]) {
            return found(date, DateSource::Embedded);
        }
    }

    for caps in MONTH_FIRST_SLASH.captures_iter(trimmed) {
        if let Some(date) = ymd_from_captures(&caps[3], &caps[1], &caps[2]) {
            return found(date, DateSource::MonthFirstSlash);
        }
    }

    None
}

fn parse_generic(text: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.date_naive());
    }
    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
    {
        return Some(dt.date());
    }
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
}

fn ymd_from_captures(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}
