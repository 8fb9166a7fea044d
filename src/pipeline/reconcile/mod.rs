//! Date-group reconciliation: raw extraction output into canonical,
//! most-recent-first `DateGroup`s.

pub mod dates;
pub mod review;

pub use dates::{standardize_date, try_standardize, DateSource, StandardizedDate};
pub use review::{EditError, ReviewSession};

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use super::extraction::MarkerExtraction;
use crate::models::enums::ErrorKind;
use crate::models::{DateGroup, Measurement};

/// Non-fatal findings of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum ReconcileWarning {
    /// A raw group date was unreadable and today was used instead.
    InvalidDate { raw: String, fallback: String },
    /// The caller's date hint was unreadable and today was used instead.
    InvalidHint { raw: String, fallback: String },
    /// Several raw groups share one canonical date. They are kept apart.
    DuplicateDate { date: String, occurrences: usize },
}

impl ReconcileWarning {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::InvalidDate { .. } | Self::InvalidHint { .. } => Some(ErrorKind::InvalidDate),
            Self::DuplicateDate { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    /// Sorted descending by canonical date.
    pub groups: Vec<DateGroup>,
    pub has_multiple_dates: bool,
    pub warnings: Vec<ReconcileWarning>,
}

/// Reconcile against the local calendar day.
pub fn reconcile_today(extraction: &MarkerExtraction, hint: Option<&str>) -> Reconciliation {
    reconcile(extraction, hint, chrono::Local::now().date_naive())
}

/// Turn one extraction into date groups.
///
/// With at most one raw group the extraction is a single group dated by
/// `hint` (or `today`). With two or more, every raw group is standardized
/// on its own and the result is multi-date.
pub fn reconcile(
    extraction: &MarkerExtraction,
    hint: Option<&str>,
    today: NaiveDate,
) -> Reconciliation {
    let mut warnings = Vec::new();

    if extraction.date_groups.len() <= 1 {
        let date = single_group_date(hint, today, &mut warnings);
        let markers = single_group_markers(extraction);
        tracing::debug!(date = %date, markers = markers.len(), "Reconciled single-date extraction");
        return Reconciliation {
            groups: vec![DateGroup::new(date, markers)],
            has_multiple_dates: false,
            warnings,
        };
    }

    let mut groups: Vec<DateGroup> = extraction
        .date_groups
        .iter()
        .map(|raw| {
            let standardized = dates::standardize_date(&raw.test_date, today);
            if standardized.is_fallback() {
                warnings.push(ReconcileWarning::InvalidDate {
                    raw: raw.test_date.clone(),
                    fallback: standardized.canonical(),
                });
            }
            DateGroup::new(standardized.date, raw.markers.clone())
        })
        .collect();

    // Stable: groups sharing a date keep extraction order.
    groups.sort_by(|a, b| b.date.cmp(&a.date));

    let mut occurrences: BTreeMap<&str, usize> = BTreeMap::new();
    for group in &groups {
        *occurrences.entry(group.date.as_str()).or_default() += 1;
    }
    for (date, count) in occurrences.into_iter().rev().filter(|(_, n)| *n > 1) {
        tracing::warn!(date, occurrences = count, "Duplicate test date kept as separate groups");
        warnings.push(ReconcileWarning::DuplicateDate {
            date: date.to_string(),
            occurrences: count,
        });
    }

    tracing::debug!(groups = groups.len(), warnings = warnings.len(), "Reconciled multi-date extraction");

    Reconciliation {
        groups,
        has_multiple_dates: true,
        warnings,
    }
}

fn single_group_date(
    hint: Option<&str>,
    today: NaiveDate,
    warnings: &mut Vec<ReconcileWarning>,
) -> NaiveDate {
    let Some(raw) = hint.map(str::trim).filter(|h| !h.is_empty()) else {
        return today;
    };
    match dates::try_standardize(raw) {
        Some(found) => found.date,
        None => {
            tracing::warn!(hint = raw, "Unreadable date hint, using today");
            warnings.push(ReconcileWarning::InvalidHint {
                raw: raw.to_string(),
                fallback: DateGroup::new(today, Vec::new()).date,
            });
            today
        }
    }
}

/// The flat list wins; a lone raw group fills in when the flat list is empty.
fn single_group_markers(extraction: &MarkerExtraction) -> Vec<Measurement> {
    if !extraction.markers.is_empty() {
        return extraction.markers.clone();
    }
    extraction
        .date_groups
        .first()
        .map(|g| g.markers.clone())
        .unwrap_or_default()
}
