use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::MarkerFlag;

/// Canonical calendar date format used everywhere a group date is stored.
pub const CANONICAL_DATE_FORMAT: &str = "%Y-%m-%d";

/// Strict `YYYY-MM-DD`: the date must format back to exactly `raw`, so
/// unpadded (`2024-3-1`) or signed (`+2024-03-01`) years are rejected.
pub fn parse_canonical_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, CANONICAL_DATE_FORMAT)
        .ok()
        .filter(|date| date.format(CANONICAL_DATE_FORMAT).to_string() == raw)
}

/// One extracted blood marker.
///
/// `name` is not unique across dates; the same marker appears once per visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub name: String,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub flag: MarkerFlag,
    #[serde(default)]
    pub category: String,
}

impl Measurement {
    pub fn new(name: &str, value: Option<f64>, unit: &str, category: &str) -> Self {
        Self {
            name: name.to_string(),
            value,
            unit: unit.to_string(),
            flag: MarkerFlag::None,
            category: category.to_string(),
        }
    }

    pub fn with_flag(mut self, flag: MarkerFlag) -> Self {
        self.flag = flag;
        self
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some_and(f64::is_finite)
    }
}

/// A date group as the extraction collaborator reports it, before the date
/// is standardized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDateGroup {
    pub test_date: String,
    #[serde(default)]
    pub markers: Vec<Measurement>,
}

/// Measurements associated with one canonical date.
///
/// `date` stays a string because the review step may edit it; it is
/// re-parsed at save time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateGroup {
    pub date: String,
    pub markers: Vec<Measurement>,
}

/// Marker counts for a group: everything extracted vs. what can be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MarkerCounts {
    pub total: usize,
    pub with_value: usize,
}

impl DateGroup {
    pub fn new(date: NaiveDate, markers: Vec<Measurement>) -> Self {
        Self {
            date: date.format(CANONICAL_DATE_FORMAT).to_string(),
            markers,
        }
    }

    /// Strict re-parse of the stored canonical date.
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        parse_canonical_date(&self.date)
    }

    /// Displayable markers grouped by category. Null values are dropped here
    /// but stay in `markers`.
    pub fn by_category(&self) -> BTreeMap<&str, Vec<&Measurement>> {
        let mut categories: BTreeMap<&str, Vec<&Measurement>> = BTreeMap::new();
        for marker in self.markers.iter().filter(|m| m.has_value()) {
            let category = if marker.category.trim().is_empty() {
                "Other"
            } else {
                marker.category.as_str()
            };
            categories.entry(category).or_default().push(marker);
        }
        categories
    }

    pub fn counts(&self) -> MarkerCounts {
        MarkerCounts {
            total: self.markers.len(),
            with_value: self.markers.iter().filter(|m| m.has_value()).count(),
        }
    }

    /// Markers with a value, in extraction order, as sent to persistence.
    pub fn savable_markers(&self) -> Vec<Measurement> {
        self.markers.iter().filter(|m| m.has_value()).cloned().collect()
    }
}
