use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    error::{EngineError, EngineResult},
    identity::Identity,
    pagination::{Page, PageWindow, Paginator},
    review::{SelectAllPolicy, SelectionSet},
};

use super::{delete_owned, query_for, ActionType, HistoryEntry, HistoryRepository, HistoryStatus};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryFilter {
    pub action: Option<ActionType>,
    pub status: Option<HistoryStatus>,
    /// Case-insensitive substring of the file name.
    pub file_name_contains: Option<String>,
}

impl HistoryFilter {
    pub fn matches(&self, entry: &HistoryEntry) -> bool {
        if self.action.is_some_and(|action| action != entry.action_type) {
            return false;
        }
        if self.status.is_some_and(|status| status != entry.status) {
            return false;
        }
        match self.file_name_contains.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => entry
                .file_name
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub total: usize,
    pub validations: usize,
    pub translations: usize,
}

impl HistoryStats {
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a HistoryEntry>) -> Self {
        let mut stats = Self::default();
        for entry in entries {
            stats.record(entry);
        }
        stats
    }

    /// Stats keyed by owner id.
    pub fn per_owner<'a>(
        entries: impl IntoIterator<Item = &'a HistoryEntry>,
    ) -> BTreeMap<String, HistoryStats> {
        let mut by_owner: BTreeMap<String, HistoryStats> = BTreeMap::new();
        for entry in entries {
            by_owner
                .entry(entry.owner_id.clone())
                .or_default()
                .record(entry);
        }
        by_owner
    }

    fn record(&mut self, entry: &HistoryEntry) {
        self.total += 1;
        match entry.action_type {
            ActionType::Validate => self.validations += 1,
            ActionType::Translate => self.translations += 1,
        }
    }
}

/// One paginated, filterable history screen with its own selection.
pub struct HistoryListView {
    repo: Arc<dyn HistoryRepository>,
    identity: Identity,
    policy: SelectAllPolicy,
    paginator: Paginator,
    filter: HistoryFilter,
    entries: Vec<HistoryEntry>,
    page: usize,
    selection: SelectionSet<String>,
}

impl HistoryListView {
    pub fn new(
        repo: Arc<dyn HistoryRepository>,
        identity: Identity,
        policy: SelectAllPolicy,
        page_size: usize,
    ) -> Self {
        Self {
            repo,
            identity,
            policy,
            paginator: Paginator::new(page_size),
            filter: HistoryFilter::default(),
            entries: Vec::new(),
            page: 1,
            selection: SelectionSet::new(),
        }
    }

    /// The per-user screen: "select all" takes the visible page.
    pub fn for_user(repo: Arc<dyn HistoryRepository>, identity: Identity, page_size: usize) -> Self {
        Self::new(repo, identity, SelectAllPolicy::CurrentPage, page_size)
    }

    /// The admin screen: every owner's entries, "select all" takes the whole
    /// collection.
    pub fn for_admin(
        repo: Arc<dyn HistoryRepository>,
        identity: Identity,
        page_size: usize,
    ) -> EngineResult<Self> {
        if !identity.is_privileged {
            return Err(EngineError::Forbidden(format!(
                "'{}' cannot open the admin history view",
                identity.owner_id
            )));
        }
        Ok(Self::new(
            repo,
            identity,
            SelectAllPolicy::EntireCollection,
            page_size,
        ))
    }

    pub fn policy(&self) -> SelectAllPolicy {
        self.policy
    }

    /// Reload from the repository and re-apply the filter.
    pub async fn refresh(&mut self) -> EngineResult<()> {
        let entries = query_for(self.repo.as_ref(), &self.identity).await?;
        self.entries = entries
            .into_iter()
            .filter(|entry| self.filter.matches(entry))
            .collect();
        self.page = self.window().page;
        self.selection
            .retain(|id| self.entries.iter().any(|entry| &entry.id == id));
        Ok(())
    }

    pub async fn set_filter(&mut self, filter: HistoryFilter) -> EngineResult<()> {
        self.filter = filter;
        self.page = 1;
        self.selection.clear();
        self.refresh().await
    }

    pub fn filter(&self) -> &HistoryFilter {
        &self.filter
    }

    pub fn window(&self) -> PageWindow {
        self.paginator.window(self.entries.len(), self.page)
    }

    pub fn current_page(&self) -> Page<'_, HistoryEntry> {
        self.paginator.page(&self.entries, self.page)
    }

    /// Move to `page` (clamped). Any selection is dropped.
    pub fn go_to(&mut self, page: usize) -> PageWindow {
        self.page = page;
        let window = self.window();
        self.page = window.page;
        self.selection.clear();
        window
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn stats(&self) -> HistoryStats {
        HistoryStats::from_entries(&self.entries)
    }

    pub fn toggle(&mut self, id: &str) -> bool {
        self.selection.toggle(id.to_string())
    }

    pub fn select_all(&mut self) {
        let page_ids: Vec<String> = self
            .current_page()
            .items
            .iter()
            .map(|entry| entry.id.clone())
            .collect();
        let all_ids = self.entries.iter().map(|entry| entry.id.clone());
        self.selection.select_all_with(self.policy, page_ids, all_ids);
    }

    /// Whether the "select all" checkbox should render as checked.
    pub fn all_selected(&self) -> bool {
        let page = self.current_page();
        match self.policy {
            SelectAllPolicy::CurrentPage => {
                !page.items.is_empty() && self.selection.covers(page.items.iter().map(|e| &e.id))
            }
            SelectAllPolicy::EntireCollection => {
                !self.entries.is_empty()
                    && self.selection.covers(self.entries.iter().map(|e| &e.id))
            }
        }
    }

    pub fn selection(&self) -> &SelectionSet<String> {
        &self.selection
    }

    /// Delete the selected entries. The selection is consumed even when the
    /// delete is refused.
    pub async fn delete_selected(&mut self) -> EngineResult<usize> {
        let ids = self.selection.take();
        if ids.is_empty() {
            return Ok(0);
        }
        let removed = delete_owned(self.repo.as_ref(), &self.identity, &ids).await?;
        self.refresh().await?;
        Ok(removed)
    }
}
