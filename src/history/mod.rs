//! Append-only log of validate and translate actions.

mod memory;
mod sqlite;
mod view;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::{
    error::{EngineError, EngineResult},
    identity::Identity,
};

pub use crate::db::models::{ActionType, HistoryEntry, HistoryStatus};
pub use memory::InMemoryHistoryRepository;
pub use sqlite::SqliteHistoryRepository;
pub use view::{HistoryFilter, HistoryListView, HistoryStats};

/// Storage contract for history entries. Entries are never updated in place.
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// Store `entry` after checking its optional fields against its action
    /// type. Returns the stored entry.
    async fn append(&self, entry: HistoryEntry) -> EngineResult<HistoryEntry>;

    /// Entries owned by `owner_id`, most recently appended first.
    async fn query_by_owner(&self, owner_id: &str) -> EngineResult<Vec<HistoryEntry>>;

    /// Every entry, most recently appended first.
    async fn query_all(&self) -> EngineResult<Vec<HistoryEntry>>;

    /// Remove the entries whose id is in `ids`. Unknown ids are ignored.
    /// Returns how many entries were removed.
    async fn delete_by_ids(&self, ids: &HashSet<String>) -> EngineResult<usize>;

    /// Number of entries, optionally restricted to one owner.
    async fn count(&self, owner_id: Option<&str>) -> EngineResult<usize>;
}

/// Entries visible to `identity`: everything for privileged identities, their
/// own entries otherwise.
pub async fn query_for(
    repo: &dyn HistoryRepository,
    identity: &Identity,
) -> EngineResult<Vec<HistoryEntry>> {
    if identity.is_privileged {
        repo.query_all().await
    } else {
        repo.query_by_owner(&identity.owner_id).await
    }
}

/// Delete `ids` on behalf of `identity`. A non-privileged identity touching
/// another owner's entry gets `Forbidden` and nothing is deleted.
pub async fn delete_owned(
    repo: &dyn HistoryRepository,
    identity: &Identity,
    ids: &HashSet<String>,
) -> EngineResult<usize> {
    if ids.is_empty() {
        return Ok(0);
    }

    if !identity.is_privileged {
        let foreign = repo
            .query_all()
            .await?
            .into_iter()
            .find(|entry| ids.contains(&entry.id) && !identity.owns(&entry.owner_id));
        if let Some(entry) = foreign {
            return Err(EngineError::Forbidden(format!(
                "'{}' may not delete history entry '{}'",
                identity.owner_id, entry.id
            )));
        }
    }

    repo.delete_by_ids(ids).await
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> InMemoryHistoryRepository {
        let repo = InMemoryHistoryRepository::new();
        for (id, owner) in [("h1", "alice"), ("h2", "bob"), ("h3", "alice")] {
            repo.append(
                HistoryEntry::validation(owner, format!("{id}.pdf"), HistoryStatus::Completed, 0, 0)
                    .with_id(id),
            )
            .await
            .unwrap();
        }
        repo
    }

    fn ids(values: &[&str]) -> HashSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn owner_cannot_delete_foreign_entries() {
        let repo = seeded().await;
        let alice = Identity::user("alice", "Alice");

        let err = delete_owned(&repo, &alice, &ids(&["h1", "h2"]))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));
        assert_eq!(repo.count(None).await.unwrap(), 3);

        let removed = delete_owned(&repo, &alice, &ids(&["h1", "h9"])).await.unwrap();
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn privileged_identity_deletes_any() {
        let repo = seeded().await;
        let admin = Identity::privileged("admin", "Admin");

        assert_eq!(delete_owned(&repo, &admin, &ids(&["h1", "h2"])).await.unwrap(), 2);
        assert_eq!(query_for(&repo, &admin).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_id_set_is_a_noop() {
        let repo = seeded().await;
        let bob = Identity::user("bob", "Bob");
        assert_eq!(delete_owned(&repo, &bob, &HashSet::new()).await.unwrap(), 0);
        assert_eq!(query_for(&repo, &bob).await.unwrap().len(), 1);
    }
}
