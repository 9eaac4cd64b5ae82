use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{EngineError, EngineResult};

use super::{HistoryEntry, HistoryRepository};

/// Repository kept in process memory, in append order.
#[derive(Debug, Default)]
pub struct InMemoryHistoryRepository {
    entries: RwLock<Vec<HistoryEntry>>,
}

impl InMemoryHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryRepository for InMemoryHistoryRepository {
    async fn append(&self, entry: HistoryEntry) -> EngineResult<HistoryEntry> {
        entry.check()?;
        let mut entries = self.entries.write().await;
        if entries.iter().any(|existing| existing.id == entry.id) {
            return Err(EngineError::InvalidEntry(format!(
                "history entry '{}' already exists",
                entry.id
            )));
        }
        entries.push(entry.clone());
        Ok(entry)
    }

    async fn query_by_owner(&self, owner_id: &str) -> EngineResult<Vec<HistoryEntry>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .rev()
            .filter(|entry| entry.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn query_all(&self) -> EngineResult<Vec<HistoryEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.iter().rev().cloned().collect())
    }

    async fn delete_by_ids(&self, ids: &HashSet<String>) -> EngineResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|entry| !ids.contains(&entry.id));
        Ok(before - entries.len())
    }

    async fn count(&self, owner_id: Option<&str>) -> EngineResult<usize> {
        let entries = self.entries.read().await;
        Ok(match owner_id {
            Some(owner_id) => entries.iter().filter(|e| e.owner_id == owner_id).count(),
            None => entries.len(),
        })
    }
}
