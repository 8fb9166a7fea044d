use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::types::{GroupOutcome, GroupSaveResponse, GroupSaver, SaveNotice, SaveReport};
use super::SaveError;
use crate::models::enums::SaveStatus;
use crate::models::DateGroup;

/// Saves reconciled date groups through a `GroupSaver`.
///
/// Groups are saved one at a time in the order given. Pass summaries go to
/// the notice channel the caller handed in.
pub struct SaveOrchestrator<S: GroupSaver> {
    saver: S,
    notices: mpsc::UnboundedSender<SaveNotice>,
}

impl<S: GroupSaver> SaveOrchestrator<S> {
    pub fn new(saver: S, notices: mpsc::UnboundedSender<SaveNotice>) -> Self {
        Self { saver, notices }
    }

    /// Orchestrator plus the receiving end of its notice channel.
    pub fn with_channel(saver: S) -> (Self, mpsc::UnboundedReceiver<SaveNotice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(saver, tx), rx)
    }

    pub fn saver(&self) -> &S {
        &self.saver
    }

    /// Save every group.
    ///
    /// A single group goes straight to the saver and its error comes back
    /// unchanged. With several groups, failures are recorded per group and
    /// the pass always completes with a report.
    pub async fn save_all(
        &self,
        groups: &[DateGroup],
        cancel: &CancellationToken,
    ) -> Result<SaveReport, SaveError> {
        let mut report = SaveReport::default();

        match groups {
            [] => return Ok(report),
            [group] => {
                if cancel.is_cancelled() {
                    return Err(SaveError::Cancelled);
                }
                let markers = group.savable_markers();
                let response = self.saver.save_group(&group.date, &markers).await?;
                report.push(outcome_from_response(group, markers.len(), response));
            }
            _ => {
                for (index, group) in groups.iter().enumerate() {
                    if cancel.is_cancelled() {
                        tracing::info!(remaining = groups.len() - index, "Save pass cancelled");
                        report.cancelled = true;
                        for rest in &groups[index..] {
                            report.push(skipped(rest, "Save cancelled"));
                        }
                        break;
                    }
                    report.push(self.save_one(group).await);
                }
            }
        }

        self.notify(&report);
        tracing::info!(
            saved = report.saved,
            failed = report.failed,
            skipped = report.skipped,
            markers = report.markers_saved,
            "Save pass finished"
        );
        Ok(report)
    }

    async fn save_one(&self, group: &DateGroup) -> GroupOutcome {
        if group.parsed_date().is_none() {
            tracing::warn!(date = %group.date, "Group date does not parse, skipping");
            return skipped(group, &format!("Invalid date '{}'", group.date));
        }

        let markers = group.savable_markers();
        match self.saver.save_group(&group.date, &markers).await {
            Ok(response) => outcome_from_response(group, markers.len(), response),
            Err(e) => {
                tracing::warn!(date = %group.date, error = %e, "Group save failed");
                GroupOutcome {
                    date: group.date.clone(),
                    status: SaveStatus::Failed,
                    markers: markers.len(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    fn notify(&self, report: &SaveReport) {
        let mut notices = Vec::with_capacity(2);
        if report.saved > 0 {
            notices.push(SaveNotice::DataChanged {
                groups: report.saved,
                markers: report.markers_saved,
            });
        }
        if report.failed > 0 || report.skipped > 0 {
            notices.push(SaveNotice::GroupsFailed {
                failed: report.failed,
                skipped: report.skipped,
            });
        }
        for notice in notices {
            if self.notices.send(notice).is_err() {
                tracing::debug!("Save notice receiver dropped");
            }
        }
    }
}

fn outcome_from_response(
    group: &DateGroup,
    markers: usize,
    response: GroupSaveResponse,
) -> GroupOutcome {
    if response.success {
        tracing::debug!(date = %group.date, markers, "Group saved");
        GroupOutcome {
            date: group.date.clone(),
            status: SaveStatus::Saved,
            markers,
            error: None,
        }
    } else {
        let error = response
            .error
            .unwrap_or_else(|| "Persistence reported failure".to_string());
        tracing::warn!(date = %group.date, error = %error, "Group rejected");
        GroupOutcome {
            date: group.date.clone(),
            status: SaveStatus::Failed,
            markers,
            error: Some(error),
        }
    }
}

fn skipped(group: &DateGroup, reason: &str) -> GroupOutcome {
    GroupOutcome {
        date: group.date.clone(),
        status: SaveStatus::Skipped,
        markers: group.savable_markers().len(),
        error: Some(reason.to_string()),
    }
}
