use serde::{Deserialize, Serialize};
use tracing::trace;

use super::SearchStore;

/// Keys the result list reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationKey {
    Down,
    Up,
    Home,
    End,
    Escape,
}

/// Keyboard and pointer navigation over the last committed results.
///
/// Moves are clamped to the snapshot bounds without wrapping and every move
/// goes through [`SearchStore::select_record`]. On an empty snapshot every
/// move is a no-op returning `None`.
#[derive(Debug)]
pub struct SelectionController<'a> {
    store: &'a mut SearchStore,
}

impl<'a> SelectionController<'a> {
    pub const fn new(store: &'a mut SearchStore) -> Self {
        Self { store }
    }

    /// Select the snapshot entry at `index`, clamped to the last one.
    pub fn select_at(&mut self, index: usize) -> Option<usize> {
        let last = self.store.snapshot().len().checked_sub(1)?;
        let index = index.min(last);
        let record = self.store.snapshot()[index].clone();
        trace!(index, id = record.id, "Selecting record");
        self.store.select_record(record);
        Some(index)
    }

    pub fn select_next(&mut self) -> Option<usize> {
        let index = self
            .store
            .selected_index()
            .map_or(0, |current| current.saturating_add(1));
        self.select_at(index)
    }

    pub fn select_previous(&mut self) -> Option<usize> {
        let index = self
            .store
            .selected_index()
            .map_or(0, |current| current.saturating_sub(1));
        self.select_at(index)
    }

    pub fn select_first(&mut self) -> Option<usize> {
        self.select_at(0)
    }

    pub fn select_last(&mut self) -> Option<usize> {
        self.select_at(usize::MAX)
    }

    /// Apply `key`. Returns the selected index, `None` after Escape or when
    /// there is nothing to select.
    pub fn handle_key(&mut self, key: NavigationKey) -> Option<usize> {
        match key {
            NavigationKey::Down => self.select_next(),
            NavigationKey::Up => self.select_previous(),
            NavigationKey::Home => self.select_first(),
            NavigationKey::End => self.select_last(),
            NavigationKey::Escape => {
                self.store.deselect();
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        client::SearchStatus,
        search::{QueryKind, SearchEngine},
        store::MemoryGazetteer,
    };
    use cepmap_data_processing::test_data::sample_rows;
    use rstest::rstest;

    fn loaded(query: &str) -> SearchStore {
        let engine = SearchEngine::new(MemoryGazetteer::from_rows(sample_rows()));
        let mut store = SearchStore::default();
        let ticket = store.set_query(query).ticket().unwrap();
        store.begin(&ticket);
        store.commit(&ticket, Ok(engine.search(query, QueryKind::FreeText).unwrap()));
        store
    }

    fn selected_street(store: &SearchStore) -> &str {
        &store.selection().unwrap().street_name
    }

    #[test]
    fn test_next_after_auto_select_moves_to_second() {
        let mut store = loaded("flo");
        assert_eq!(store.selected_index(), Some(0));

        let index = SelectionController::new(&mut store).select_next();
        assert_eq!(index, Some(1));
        assert_eq!(selected_street(&store), "Rua das Flores");
        assert_eq!(store.state().results.len(), 1);
        assert_eq!(store.state().query_text, "Rua das Flores");
    }

    #[test]
    fn test_moves_are_clamped() {
        let mut store = loaded("flo");
        let mut controller = SelectionController::new(&mut store);
        assert_eq!(controller.select_previous(), Some(0));
        assert_eq!(controller.select_last(), Some(2));
        assert_eq!(controller.select_next(), Some(2));
        assert_eq!(controller.select_at(99), Some(2));
        assert_eq!(selected_street(&store), "Rua Florianópolis");
    }

    #[rstest]
    #[case(NavigationKey::Down, Some(1))]
    #[case(NavigationKey::Up, Some(0))]
    #[case(NavigationKey::Home, Some(0))]
    #[case(NavigationKey::End, Some(4))]
    #[case(NavigationKey::Escape, None)]
    fn test_handle_key(#[case] key: NavigationKey, #[case] expected: Option<usize>) {
        let mut store = loaded("rua");
        assert_eq!(SelectionController::new(&mut store).handle_key(key), expected);
        assert_eq!(store.selected_index(), expected);
    }

    #[test]
    fn test_escape_restores_list() {
        let mut store = loaded("rua");
        let mut controller = SelectionController::new(&mut store);
        controller.select_next();
        controller.handle_key(NavigationKey::Escape);
        assert!(store.selection().is_none());
        assert_eq!(store.state().results.len(), 5);
    }

    #[test]
    fn test_empty_snapshot_is_noop() {
        let mut store = SearchStore::default();
        store.set_query("zz");
        let mut controller = SelectionController::new(&mut store);
        for key in [
            NavigationKey::Down,
            NavigationKey::Up,
            NavigationKey::Home,
            NavigationKey::End,
        ] {
            assert_eq!(controller.handle_key(key), None);
        }
        assert!(store.selection().is_none());
        assert_eq!(store.state().status, SearchStatus::Idle);
    }
}
