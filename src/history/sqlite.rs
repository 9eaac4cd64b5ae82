use std::collections::HashSet;

use async_trait::async_trait;
use log::info;

use crate::{
    db::Database,
    error::{EngineError, EngineResult},
};

use super::{HistoryEntry, HistoryRepository};

/// History persisted through the SQLite worker.
#[derive(Clone)]
pub struct SqliteHistoryRepository {
    db: Database,
}

impl SqliteHistoryRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl HistoryRepository for SqliteHistoryRepository {
    async fn append(&self, entry: HistoryEntry) -> EngineResult<HistoryEntry> {
        entry.check()?;
        if !self.db.insert_history_entry(&entry).await? {
            return Err(EngineError::InvalidEntry(format!(
                "history entry '{}' already exists",
                entry.id
            )));
        }
        info!(
            "Recorded {} entry {} for {}",
            entry.action_type.as_str(),
            entry.id,
            entry.owner_id
        );
        Ok(entry)
    }

    async fn query_by_owner(&self, owner_id: &str) -> EngineResult<Vec<HistoryEntry>> {
        Ok(self.db.list_history_entries(Some(owner_id.to_string())).await?)
    }

    async fn query_all(&self) -> EngineResult<Vec<HistoryEntry>> {
        Ok(self.db.list_history_entries(None).await?)
    }

    async fn delete_by_ids(&self, ids: &HashSet<String>) -> EngineResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let removed = self
            .db
            .delete_history_entries(ids.iter().cloned().collect())
            .await?;
        info!("Deleted {removed} of {} requested history entries", ids.len());
        Ok(removed)
    }

    async fn count(&self, owner_id: Option<&str>) -> EngineResult<usize> {
        Ok(self
            .db
            .count_history_entries(owner_id.map(str::to_string))
            .await?)
    }
}
