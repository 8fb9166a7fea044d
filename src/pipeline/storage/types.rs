use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::SaveError;
use crate::models::enums::SaveStatus;
use crate::models::Measurement;

/// Request body for group persistence.
#[derive(Debug, Serialize)]
pub struct GroupSaveRequest<'a> {
    pub markers: &'a [Measurement],
    pub date: &'a str,
}

/// Response body from group persistence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupSaveResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GroupSaveResponse {
    pub fn saved(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }
}

/// Persists one date group.
#[async_trait]
pub trait GroupSaver: Send + Sync {
    /// `date` is canonical `YYYY-MM-DD`.
    async fn save_group(
        &self,
        date: &str,
        markers: &[Measurement],
    ) -> Result<GroupSaveResponse, SaveError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupOutcome {
    pub date: String,
    pub status: SaveStatus,
    pub markers: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-group outcomes of one save pass, in save order, plus totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReport {
    pub outcomes: Vec<GroupOutcome>,
    pub saved: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Markers across saved groups only.
    pub markers_saved: usize,
    pub cancelled: bool,
}

impl SaveReport {
    pub(crate) fn push(&mut self, outcome: GroupOutcome) {
        match outcome.status {
            SaveStatus::Saved => {
                self.saved += 1;
                self.markers_saved += outcome.markers;
            }
            SaveStatus::Failed => self.failed += 1,
            SaveStatus::Skipped => self.skipped += 1,
        }
        self.outcomes.push(outcome);
    }

    pub fn all_saved(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }

    /// `"N saved / N failed / N skipped"`
    pub fn summary(&self) -> String {
        format!(
            "{} saved / {} failed / {} skipped",
            self.saved, self.failed, self.skipped
        )
    }
}

impl fmt::Display for SaveReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// Aggregate notifications of a save pass. At most one of each per pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "notice", rename_all = "snake_case")]
pub enum SaveNotice {
    DataChanged { groups: usize, markers: usize },
    GroupsFailed { failed: usize, skipped: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(status: SaveStatus, markers: usize) -> GroupOutcome {
        GroupOutcome {
            date: "2024-03-01".into(),
            status,
            markers,
            error: None,
        }
    }

    #[test]
    fn report_counts_and_summary() {
        let mut report = SaveReport::default();
        report.push(outcome(SaveStatus::Saved, 4));
        report.push(outcome(SaveStatus::Saved, 2));
        report.push(outcome(SaveStatus::Failed, 3));
        report.push(outcome(SaveStatus::Skipped, 1));
        assert_eq!(report.markers_saved, 6);
        assert_eq!(report.summary(), "2 saved / 1 failed / 1 skipped");
        assert!(!report.all_saved());
    }

    #[test]
    fn response_parses_minimal_body() {
        let response: GroupSaveResponse = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(response.success);
        assert!(response.message.is_none());
    }

    #[test]
    fn request_uses_contract_field_names() {
        let markers = [Measurement::new("TSH", Some(2.0), "mIU/L", "Thyroid")];
        let json = serde_json::to_value(GroupSaveRequest {
            markers: &markers,
            date: "2024-03-01",
        })
        .unwrap();
        assert_eq!(json["date"], "2024-03-01");
        assert_eq!(json["markers"][0]["name"], "TSH");
    }
}
