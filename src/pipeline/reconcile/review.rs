use std::future::Future;

use serde::Serialize;
use thiserror::Error;

use super::{ReconcileWarning, Reconciliation};
use crate::models::{DateGroup, Measurement};

#[derive(Error, Debug, PartialEq)]
pub enum EditError<E> {
    #[error("No marker {marker} in group {group}")]
    OutOfRange { group: usize, marker: usize },

    #[error("Edit not persisted: {0}")]
    Persist(E),
}

/// Reconciled groups under review before saving.
///
/// `has_multiple_dates` is sticky: once an extraction produced two or more
/// groups, no later edit turns the session back into a single-date one.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSession {
    groups: Vec<DateGroup>,
    has_multiple_dates: bool,
    active_tab: usize,
    warnings: Vec<ReconcileWarning>,
}

impl ReviewSession {
    pub fn new(reconciliation: Reconciliation) -> Self {
        Self {
            has_multiple_dates: reconciliation.has_multiple_dates
                || reconciliation.groups.len() > 1,
            groups: reconciliation.groups,
            active_tab: 0,
            warnings: reconciliation.warnings,
        }
    }

    pub fn groups(&self) -> &[DateGroup] {
        &self.groups
    }

    pub fn has_multiple_dates(&self) -> bool {
        self.has_multiple_dates
    }

    pub fn warnings(&self) -> &[ReconcileWarning] {
        &self.warnings
    }

    pub fn active_tab(&self) -> usize {
        self.active_tab
    }

    pub fn active_group(&self) -> Option<&DateGroup> {
        self.groups.get(self.active_tab)
    }

    /// Switch tabs. Out-of-range indices are ignored.
    pub fn select_tab(&mut self, index: usize) -> bool {
        if index < self.groups.len() {
            self.active_tab = index;
            true
        } else {
            false
        }
    }

    /// Replace the group's date with whatever the reviewer typed. It is
    /// validated when the group is saved.
    pub fn set_group_date(&mut self, group: usize, date: &str) -> bool {
        match self.groups.get_mut(group) {
            Some(g) => {
                g.date = date.trim().to_string();
                true
            }
            None => false,
        }
    }

    pub fn remove_group(&mut self, group: usize) -> Option<DateGroup> {
        if group >= self.groups.len() {
            return None;
        }
        let removed = self.groups.remove(group);
        if self.active_tab >= self.groups.len() {
            self.active_tab = self.groups.len().saturating_sub(1);
        }
        Some(removed)
    }

    /// Optimistically replace one marker, then persist the edited group.
    ///
    /// The new value is visible while `persist` runs. If it fails the prior
    /// marker is put back before the error is returned.
    pub async fn apply_edit<F, Fut, E>(
        &mut self,
        group: usize,
        marker: usize,
        edited: Measurement,
        persist: F,
    ) -> Result<(), EditError<E>>
    where
        F: FnOnce(DateGroup) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        let slot = self
            .groups
            .get_mut(group)
            .and_then(|g| g.markers.get_mut(marker))
            .ok_or(EditError::OutOfRange { group, marker })?;
        let snapshot = std::mem::replace(slot, edited);

        let pending = self.groups[group].clone();
        match persist(pending).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(group, marker, "Marker edit rejected, restoring previous value");
                self.groups[group].markers[marker] = snapshot;
                Err(EditError::Persist(e))
            }
        }
    }

    pub fn into_groups(self) -> Vec<DateGroup> {
        self.groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn group(day: u32, values: &[f64]) -> DateGroup {
        DateGroup::new(
            NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            values
                .iter()
                .map(|v| Measurement::new("Glucose", Some(*v), "mg/dL", "Metabolic"))
                .collect(),
        )
    }

    fn session(groups: Vec<DateGroup>) -> ReviewSession {
        ReviewSession::new(Reconciliation {
            has_multiple_dates: groups.len() > 1,
            groups,
            warnings: Vec::new(),
        })
    }

    #[test]
    fn multi_date_flag_survives_collapsing_to_one_group() {
        let mut s = session(vec![group(15, &[95.0]), group(1, &[90.0])]);
        assert!(s.has_multiple_dates());
        s.remove_group(1);
        assert_eq!(s.groups().len(), 1);
        assert!(s.has_multiple_dates());
    }

    #[test]
    fn tabs_follow_groups() {
        let mut s = session(vec![group(15, &[95.0]), group(1, &[90.0])]);
        assert!(s.select_tab(1));
        assert_eq!(s.active_group().unwrap().date, "2024-03-01");
        assert!(!s.select_tab(5));
        s.remove_group(1);
        assert_eq!(s.active_tab(), 0);
    }

    #[tokio::test]
    async fn successful_edit_is_kept() {
        let mut s = session(vec![group(1, &[90.0])]);
        let edited = Measurement::new("Glucose", Some(101.0), "mg/dL", "Metabolic");
        let result: Result<(), EditError<String>> = s
            .apply_edit(0, 0, edited, |g| async move {
                assert_eq!(g.markers[0].value, Some(101.0));
                Ok(())
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(s.groups()[0].markers[0].value, Some(101.0));
    }

    #[tokio::test]
    async fn failed_edit_restores_previous_value() {
        let mut s = session(vec![group(1, &[90.0])]);
        let edited = Measurement::new("Glucose", Some(101.0), "mg/dL", "Metabolic");
        let result = s
            .apply_edit(0, 0, edited, |_| async { Err("storage down".to_string()) })
            .await;
        assert_eq!(result, Err(EditError::Persist("storage down".to_string())));
        assert_eq!(s.groups()[0].markers[0].value, Some(90.0));
    }

    #[tokio::test]
    async fn edit_out_of_range_never_persists() {
        let mut s = session(vec![group(1, &[90.0])]);
        let edited = Measurement::new("Glucose", Some(1.0), "mg/dL", "Metabolic");
        let result = s
            .apply_edit(0, 3, edited, |_| async { Err::<(), _>("persisted".to_string()) })
            .await;
        assert_eq!(result, Err(EditError::OutOfRange { group: 0, marker: 3 }));
    }

    #[test]
    fn edited_date_is_stored_verbatim() {
        let mut s = session(vec![group(1, &[90.0])]);
        assert!(s.set_group_date(0, " not a date "));
        assert_eq!(s.groups()[0].date, "not a date");
        assert!(s.groups()[0].parsed_date().is_none());
    }
}
