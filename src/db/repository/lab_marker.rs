use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{params, Connection};
use serde::Serialize;
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::MarkerFlag;
use crate::models::{Measurement, CANONICAL_DATE_FORMAT};

/// A persisted date group with its markers in saved order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredGroup {
    pub id: Uuid,
    pub test_date: NaiveDate,
    pub markers: Vec<Measurement>,
    pub created_at: String,
}

/// Insert one group and all its markers in a single transaction.
pub fn insert_marker_group(
    conn: &Connection,
    test_date: &NaiveDate,
    markers: &[Measurement],
) -> Result<Uuid, DatabaseError> {
    let group_id = Uuid::new_v4();
    let date = test_date.format(CANONICAL_DATE_FORMAT).to_string();

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO marker_groups (id, test_date, marker_count) VALUES (?1, ?2, ?3)",
        params![group_id.to_string(), date, markers.len() as i64],
    )?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO lab_markers (id, group_id, test_date, name, value, unit, flag, category, position)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )?;
        for (position, marker) in markers.iter().enumerate() {
            if marker.name.trim().is_empty() {
                return Err(DatabaseError::ConstraintViolation(format!(
                    "Marker at position {position} has no name"
                )));
            }
            stmt.execute(params![
                Uuid::new_v4().to_string(),
                group_id.to_string(),
                date,
                marker.name,
                marker.value,
                marker.unit,
                marker.flag.as_str(),
                marker.category,
                position as i64,
            ])?;
        }
    }
    tx.commit()?;

    Ok(group_id)
}

/// Groups saved for `test_date`, oldest save first.
pub fn get_groups_by_date(
    conn: &Connection,
    test_date: &NaiveDate,
) -> Result<Vec<StoredGroup>, DatabaseError> {
    let date = test_date.format(CANONICAL_DATE_FORMAT).to_string();
    let mut stmt = conn.prepare(
        "SELECT id, test_date, created_at FROM marker_groups
         WHERE test_date = ?1 ORDER BY created_at, rowid",
    )?;
    let rows = stmt.query_map(params![date], group_row_from_rusqlite)?;
    collect_groups(conn, rows)
}

/// Every saved group, most recent test date first.
pub fn get_all_groups(conn: &Connection) -> Result<Vec<StoredGroup>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, test_date, created_at FROM marker_groups
         ORDER BY test_date DESC, created_at, rowid",
    )?;
    let rows = stmt.query_map([], group_row_from_rusqlite)?;
    collect_groups(conn, rows)
}

pub fn count_markers(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM lab_markers", [], |row| row.get(0))?;
    Ok(count)
}

fn get_group_markers(conn: &Connection, group_id: &str) -> Result<Vec<Measurement>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT name, value, unit, flag, category FROM lab_markers
         WHERE group_id = ?1 ORDER BY position",
    )?;
    let rows = stmt.query_map(params![group_id], |row| {
        Ok(MarkerRow {
            name: row.get(0)?,
            value: row.get(1)?,
            unit: row.get(2)?,
            flag: row.get(3)?,
            category: row.get(4)?,
        })
    })?;

    let mut markers = Vec::new();
    for row in rows {
        markers.push(marker_from_row(row?)?);
    }
    Ok(markers)
}

fn collect_groups(
    conn: &Connection,
    rows: impl Iterator<Item = Result<GroupRow, rusqlite::Error>>,
) -> Result<Vec<StoredGroup>, DatabaseError> {
    let mut groups = Vec::new();
    for row in rows {
        let row = row?;
        let markers = get_group_markers(conn, &row.id)?;
        groups.push(group_from_row(row, markers)?);
    }
    Ok(groups)
}

// Internal row types
struct GroupRow {
    id: String,
    test_date: String,
    created_at: String,
}

struct MarkerRow {
    name: String,
    value: Option<f64>,
    unit: String,
    flag: String,
    category: String,
}

fn group_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<GroupRow, rusqlite::Error> {
    Ok(GroupRow {
        id: row.get(0)?,
        test_date: row.get(1)?,
        created_at: row.get(2)?,
    })
}

fn group_from_row(row: GroupRow, markers: Vec<Measurement>) -> Result<StoredGroup, DatabaseError> {
    Ok(StoredGroup {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        test_date: NaiveDate::parse_from_str(&row.test_date, CANONICAL_DATE_FORMAT)
            .map_err(|e| DatabaseError::ConstraintViolation(format!("test_date: {e}")))?,
        markers,
        created_at: row.created_at,
    })
}

fn marker_from_row(row: MarkerRow) -> Result<Measurement, DatabaseError> {
    Ok(Measurement {
        name: row.name,
        value: row.value,
        unit: row.unit,
        flag: MarkerFlag::from_str(&row.flag)?,
        category: row.category,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn markers() -> Vec<Measurement> {
        vec![
            Measurement::new("LDL", Some(160.0), "mg/dL", "Lipids").with_flag(MarkerFlag::High),
            Measurement::new("HDL", Some(55.0), "mg/dL", "Lipids"),
        ]
    }

    #[test]
    fn insert_and_read_back_group() {
        let conn = open_memory_database().unwrap();
        let id = insert_marker_group(&conn, &date(1), &markers()).unwrap();

        let groups = get_groups_by_date(&conn, &date(1)).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].id, id);
        assert_eq!(groups[0].markers, markers());
        assert_eq!(count_markers(&conn).unwrap(), 2);
    }

    #[test]
    fn same_date_saved_twice_is_two_groups() {
        let conn = open_memory_database().unwrap();
        insert_marker_group(&conn, &date(1), &markers()).unwrap();
        insert_marker_group(&conn, &date(1), &markers()[..1]).unwrap();
        let groups = get_groups_by_date(&conn, &date(1)).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].markers.len(), 1);
    }

    #[test]
    fn invalid_marker_rolls_back_whole_group() {
        let conn = open_memory_database().unwrap();
        let mut bad = markers();
        bad.push(Measurement::new("  ", Some(1.0), "", ""));
        let err = insert_marker_group(&conn, &date(1), &bad).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
        assert_eq!(count_markers(&conn).unwrap(), 0);
        assert!(get_all_groups(&conn).unwrap().is_empty());
    }

    #[test]
    fn all_groups_most_recent_first() {
        let conn = open_memory_database().unwrap();
        insert_marker_group(&conn, &date(1), &markers()).unwrap();
        insert_marker_group(&conn, &date(15), &markers()).unwrap();
        let dates: Vec<NaiveDate> = get_all_groups(&conn)
            .unwrap()
            .into_iter()
            .map(|g| g.test_date)
            .collect();
        assert_eq!(dates, [date(15), date(1)]);
    }
}
