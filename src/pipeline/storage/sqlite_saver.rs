use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::Connection;

use super::types::{GroupSaveResponse, GroupSaver};
use super::SaveError;
use crate::db::repository;
use crate::models::{parse_canonical_date, Measurement};

/// Saves groups straight into the local marker database.
#[derive(Clone)]
pub struct SqliteGroupSaver {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteGroupSaver {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Arc<Mutex<Connection>> {
        &self.conn
    }
}

#[async_trait]
impl GroupSaver for SqliteGroupSaver {
    async fn save_group(
        &self,
        date: &str,
        markers: &[Measurement],
    ) -> Result<GroupSaveResponse, SaveError> {
        let test_date =
            parse_canonical_date(date).ok_or_else(|| SaveError::InvalidDate(date.to_string()))?;

        let conn = self.conn.lock().map_err(|_| SaveError::LockPoisoned)?;
        let group_id = repository::insert_marker_group(&conn, &test_date, markers)?;
        tracing::debug!(group_id = %group_id, date, markers = markers.len(), "Group stored");

        Ok(GroupSaveResponse::saved(format!(
            "Saved {} markers for {date}",
            markers.len()
        )))
    }
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;

    use chrono::NaiveDate;

    use super::*;
    use crate::db::open_memory_database;
    use crate::models::DateGroup;
    use crate::pipeline::storage::SaveOrchestrator;

    fn saver() -> SqliteGroupSaver {
        SqliteGroupSaver::new(Arc::new(Mutex::new(open_memory_database().unwrap())))
    }

    #[tokio::test]
    async fn stores_group_and_reports_success() {
        let saver = saver();
        let markers = [Measurement::new("Glucose", Some(92.0), "mg/dL", "Metabolic")];
        let response = saver.save_group("2024-03-01", &markers).await.unwrap();
        assert!(response.success);

        let conn = saver.connection().lock().unwrap();
        assert_eq!(repository::count_markers(&conn).unwrap(), 1);
    }

    #[tokio::test]
    async fn rejects_non_canonical_date() {
        for date in ["03/01/2024", "2024-3-1"] {
            let err = saver().save_group(date, &[]).await.unwrap_err();
            assert!(matches!(err, SaveError::InvalidDate(_)));
        }
    }

    #[tokio::test]
    async fn duplicate_dates_become_separate_rows() {
        let saver = saver();
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let groups = vec![
            DateGroup::new(date, vec![Measurement::new("A", Some(1.0), "", "")]),
            DateGroup::new(date, vec![Measurement::new("B", Some(2.0), "", "")]),
        ];
        let (orchestrator, _rx) = SaveOrchestrator::with_channel(saver.clone());
        let report = orchestrator.save_all(&groups, &CancellationToken::new()).await.unwrap();
        assert_eq!(report.saved, 2);

        let conn = saver.connection().lock().unwrap();
        assert_eq!(repository::get_groups_by_date(&conn, &date).unwrap().len(), 2);
    }
}
