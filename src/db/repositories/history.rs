use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    helpers::{parse_action_type, parse_datetime, parse_history_status, to_optional_u32},
    models::HistoryEntry,
    Database,
};

const SELECT_COLUMNS: &str = "SELECT id, owner_id, action_type, file_name, recorded_at, status,
        error_count, warning_count, country
 FROM history_entries";

fn row_to_history_entry(row: &Row) -> Result<HistoryEntry> {
    let action_type: String = row.get("action_type")?;
    let recorded_at: String = row.get("recorded_at")?;
    let status: String = row.get("status")?;

    Ok(HistoryEntry {
        id: row.get("id")?,
        owner_id: row.get("owner_id")?,
        action_type: parse_action_type(&action_type)?,
        file_name: row.get("file_name")?,
        recorded_at: parse_datetime(&recorded_at, "recorded_at")?,
        status: parse_history_status(&status)?,
        error_count: to_optional_u32(row.get("error_count")?, "error_count")?,
        warning_count: to_optional_u32(row.get("warning_count")?, "warning_count")?,
        country: row.get("country")?,
    })
}

impl Database {
    /// Insert `entry`. Returns `false` without writing if the id is taken.
    pub async fn insert_history_entry(&self, entry: &HistoryEntry) -> Result<bool> {
        let record = entry.clone();
        self.execute(move |conn| {
            let existing: Option<i64> = conn
                .query_row(
                    "SELECT seq FROM history_entries WHERE id = ?1",
                    params![record.id],
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_some() {
                return Ok(false);
            }

            conn.execute(
                "INSERT INTO history_entries (id, owner_id, action_type, file_name, recorded_at, status, error_count, warning_count, country)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.id,
                    record.owner_id,
                    record.action_type.as_str(),
                    record.file_name,
                    record.recorded_at.to_rfc3339(),
                    record.status.as_str(),
                    record.error_count,
                    record.warning_count,
                    record.country,
                ],
            )
            .with_context(|| "failed to insert history entry")?;
            Ok(true)
        })
        .await
    }

    /// Entries newest-first, optionally for one owner.
    pub async fn list_history_entries(&self, owner_id: Option<String>) -> Result<Vec<HistoryEntry>> {
        self.execute(move |conn| {
            let mut entries = Vec::new();
            match owner_id {
                Some(owner_id) => {
                    let mut stmt = conn.prepare(&format!(
                        "{SELECT_COLUMNS} WHERE owner_id = ?1 ORDER BY seq DESC"
                    ))?;
                    let mut rows = stmt.query(params![owner_id])?;
                    while let Some(row) = rows.next()? {
                        entries.push(row_to_history_entry(row)?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY seq DESC"))?;
                    let mut rows = stmt.query([])?;
                    while let Some(row) = rows.next()? {
                        entries.push(row_to_history_entry(row)?);
                    }
                }
            }
            Ok(entries)
        })
        .await
    }

    pub async fn delete_history_entries(&self, ids: Vec<String>) -> Result<usize> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let mut removed = 0;
            {
                let mut stmt = tx.prepare("DELETE FROM history_entries WHERE id = ?1")?;
                for id in &ids {
                    removed += stmt.execute(params![id])?;
                }
            }
            tx.commit().with_context(|| "failed to delete history entries")?;
            Ok(removed)
        })
        .await
    }

    pub async fn count_history_entries(&self, owner_id: Option<String>) -> Result<usize> {
        self.execute(move |conn| {
            let count: i64 = match owner_id {
                Some(owner_id) => conn.query_row(
                    "SELECT COUNT(*) FROM history_entries WHERE owner_id = ?1",
                    params![owner_id],
                    |row| row.get(0),
                )?,
                None => conn.query_row("SELECT COUNT(*) FROM history_entries", [], |row| {
                    row.get(0)
                })?,
            };
            Ok(usize::try_from(count)?)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::HistoryStatus;

    fn open() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("history.sqlite3")).unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn entries_round_trip_newest_first() {
        let (_dir, db) = open();
        let first = HistoryEntry::validation("alice", "a.pdf", HistoryStatus::Completed, 2, 1)
            .with_id("h1");
        let second = HistoryEntry::translation("alice", "a.pdf", HistoryStatus::Failed, "CA")
            .with_id("h2");
        let other = HistoryEntry::validation("bob", "b.pdf", HistoryStatus::Completed, 0, 0)
            .with_id("h3");

        for entry in [&first, &second, &other] {
            assert!(db.insert_history_entry(entry).await.unwrap());
        }
        assert!(!db.insert_history_entry(&first).await.unwrap());

        let alice = db.list_history_entries(Some("alice".into())).await.unwrap();
        assert_eq!(alice.len(), 2);
        assert_eq!(alice[0].id, "h2");
        assert_eq!(alice[0].country.as_deref(), Some("CA"));
        assert_eq!(alice[1].error_count, Some(2));
        assert_eq!(alice[1].recorded_at, first.recorded_at);

        assert_eq!(db.count_history_entries(None).await.unwrap(), 3);
        assert_eq!(db.count_history_entries(Some("bob".into())).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_counts_only_existing_rows() {
        let (_dir, db) = open();
        for id in ["h1", "h2", "h3"] {
            let entry = HistoryEntry::validation("alice", "x.pdf", HistoryStatus::Completed, 0, 0)
                .with_id(id);
            db.insert_history_entry(&entry).await.unwrap();
        }

        let removed = db
            .delete_history_entries(vec!["h1".into(), "h9".into()])
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let ids: Vec<_> = db
            .list_history_entries(None)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, ["h3", "h2"]);
    }
}
