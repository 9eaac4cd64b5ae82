use std::collections::HashSet;
use std::hash::Hash;

/// How a list's "select all" checkbox chooses its ids. Each list picks one
/// explicitly: the per-user history view selects the visible page, the admin
/// history view selects the whole collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectAllPolicy {
    CurrentPage,
    EntireCollection,
}

/// Ids currently checked for a bulk action.
#[derive(Debug, Clone)]
pub struct SelectionSet<Id> {
    ids: HashSet<Id>,
}

impl<Id> Default for SelectionSet<Id> {
    fn default() -> Self {
        Self {
            ids: HashSet::new(),
        }
    }
}

impl<Id: Eq + Hash + Clone> SelectionSet<Id> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership of `id`. Returns whether it is selected afterwards.
    pub fn toggle(&mut self, id: Id) -> bool {
        if self.ids.remove(&id) {
            false
        } else {
            self.ids.insert(id);
            true
        }
    }

    pub fn set(&mut self, id: Id, selected: bool) {
        if selected {
            self.ids.insert(id);
        } else {
            self.ids.remove(&id);
        }
    }

    /// Select exactly `ids`, replacing any previous selection.
    pub fn select_all<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = Id>,
    {
        self.ids = ids.into_iter().collect();
    }

    /// Apply `policy` to choose between the visible ids and the whole
    /// collection.
    pub fn select_all_with<P, A>(&mut self, policy: SelectAllPolicy, page_ids: P, all_ids: A)
    where
        P: IntoIterator<Item = Id>,
        A: IntoIterator<Item = Id>,
    {
        match policy {
            SelectAllPolicy::CurrentPage => self.select_all(page_ids),
            SelectAllPolicy::EntireCollection => self.select_all(all_ids),
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn is_selected(&self, id: &Id) -> bool {
        self.ids.contains(id)
    }

    pub fn size(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// True when every id in `ids` is selected and `ids` is non-empty; drives
    /// the tri-state "select all" checkbox.
    pub fn covers<'a, I>(&self, ids: I) -> bool
    where
        I: IntoIterator<Item = &'a Id>,
        Id: 'a,
    {
        let mut any = false;
        for id in ids {
            if !self.ids.contains(id) {
                return false;
            }
            any = true;
        }
        any
    }

    /// Drop selected ids that fail `keep`, e.g. after the collection reloads.
    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&Id) -> bool,
    {
        self.ids.retain(keep);
    }

    /// Consume the current selection for a bulk action, leaving it empty.
    pub fn take(&mut self) -> HashSet<Id> {
        std::mem::take(&mut self.ids)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Id> {
        self.ids.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_after_select_all_drops_one() {
        let mut selection = SelectionSet::new();
        selection.select_all(["a", "b", "c", "d", "e"]);
        assert_eq!(selection.size(), 5);

        assert!(!selection.toggle("c"));
        assert_eq!(selection.size(), 4);
        assert!(!selection.is_selected(&"c"));
    }

    #[test]
    fn policy_picks_page_or_collection() {
        let page = vec![1, 2];
        let all = vec![1, 2, 3, 4];

        let mut selection = SelectionSet::new();
        selection.select_all_with(SelectAllPolicy::CurrentPage, page.clone(), all.clone());
        assert_eq!(selection.size(), 2);

        selection.select_all_with(SelectAllPolicy::EntireCollection, page, all);
        assert_eq!(selection.size(), 4);
    }

    #[test]
    fn take_empties_the_selection() {
        let mut selection = SelectionSet::new();
        selection.toggle(7u32);
        selection.toggle(9u32);

        let taken = selection.take();
        assert_eq!(taken.len(), 2);
        assert!(selection.is_empty());
    }

    #[test]
    fn covers_requires_non_empty_subset() {
        let mut selection = SelectionSet::new();
        assert!(!selection.covers(std::iter::empty::<&u8>()));

        selection.select_all([1u8, 2, 3]);
        assert!(selection.covers(&[1u8, 2]));
        assert!(!selection.covers(&[1u8, 4]));
    }
}
