//! The search state machine.
//!
//! [`SearchStore`] owns the [`SearchState`] and decides which fetch responses
//! may touch it. Every scheduled fetch receives a fresh [`Generation`]; only a
//! response carrying the latest generation commits, older ones are dropped.
//! The store does no IO itself: callers run the fetch described by a
//! [`FetchTicket`] and hand the outcome back to [`SearchStore::commit`].
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ClientError, SearchState, SearchStatus};
use crate::{
    model::AddressRecord,
    normalize::normalized_len,
    search::{QueryKind, RankedPage},
};

/// Monotonic fetch counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Generation(pub u64);

impl Generation {
    #[must_use]
    const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// What caused a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Keystrokes in the search box. The typed text is kept on commit.
    Typing,
    /// Explicit submit.
    Submit,
    /// Street resolved from a map click.
    MapClick,
}

/// A fetch the caller should run and hand back to [`SearchStore::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: Generation,
    pub query: String,
    pub kind: QueryKind,
    pub trigger: Trigger,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryTransition {
    /// Query too short; state is back to idle and nothing must be fetched.
    Idle,
    Scheduled(FetchTicket),
}

impl QueryTransition {
    pub fn ticket(self) -> Option<FetchTicket> {
        match self {
            Self::Idle => None,
            Self::Scheduled(ticket) => Some(ticket),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Applied,
    /// A newer fetch was scheduled since; the response was discarded.
    Stale,
}

#[derive(Debug, Clone)]
pub struct SearchStore {
    state: SearchState,
    /// Results of the last successful commit, for keyboard navigation.
    snapshot: Vec<AddressRecord>,
    latest: Generation,
    dispatched: Generation,
    min_query_len: usize,
}

impl Default for SearchStore {
    fn default() -> Self {
        Self::new(3)
    }
}

impl SearchStore {
    pub fn new(min_query_len: usize) -> Self {
        Self {
            state: SearchState::default(),
            snapshot: Vec::new(),
            latest: Generation::default(),
            dispatched: Generation::default(),
            min_query_len: min_query_len.max(1),
        }
    }

    pub const fn state(&self) -> &SearchState {
        &self.state
    }

    pub fn snapshot(&self) -> &[AddressRecord] {
        &self.snapshot
    }

    pub const fn latest_generation(&self) -> Generation {
        self.latest
    }

    /// Latest generation handed to [`SearchStore::begin`].
    pub const fn dispatched_generation(&self) -> Generation {
        self.dispatched
    }

    pub fn selection(&self) -> Option<&AddressRecord> {
        self.state.selected.as_ref()
    }

    /// Index of the selected record in the navigation snapshot.
    pub fn selected_index(&self) -> Option<usize> {
        let id = self.state.selected_id()?;
        self.snapshot.iter().position(|record| record.id == id)
    }

    fn bump(&mut self) -> Generation {
        self.latest = self.latest.next();
        self.latest
    }

    fn reset(&mut self, status: SearchStatus) {
        self.state.results.clear();
        self.state.selected = None;
        self.state.total_matches = 0;
        self.state.status = status;
    }

    /// Record typed text and schedule a free-text fetch when it is long enough.
    ///
    /// Short text invalidates any in-flight fetch and returns to idle.
    pub fn set_query(&mut self, text: &str) -> QueryTransition {
        self.state.query_text = text.to_string();
        self.schedule(text, QueryKind::FreeText, Trigger::Typing)
    }

    /// Schedule a fetch for the current query text under `kind`.
    pub fn submit(&mut self, kind: QueryKind) -> QueryTransition {
        let text = self.state.query_text.clone();
        self.schedule(&text, kind, Trigger::Submit)
    }

    /// Schedule a street lookup for a name resolved from the map.
    pub fn lookup_street(&mut self, street: &str) -> QueryTransition {
        self.state.query_text = street.to_string();
        self.schedule(street, QueryKind::FreeText, Trigger::MapClick)
    }

    fn schedule(&mut self, text: &str, kind: QueryKind, trigger: Trigger) -> QueryTransition {
        let generation = self.bump();
        if normalized_len(text) < self.min_query_len {
            debug!(generation = generation.0, "Query below minimum length, idle");
            self.snapshot.clear();
            self.reset(SearchStatus::Idle);
            return QueryTransition::Idle;
        }
        QueryTransition::Scheduled(FetchTicket {
            generation,
            query: text.trim().to_string(),
            kind,
            trigger,
        })
    }

    /// Mark `ticket` as dispatched. `false` when it is already stale and
    /// should not be sent.
    pub fn begin(&mut self, ticket: &FetchTicket) -> bool {
        if ticket.generation != self.latest {
            debug!(generation = ticket.generation.0, latest = self.latest.0, "Skipping stale fetch");
            return false;
        }
        self.dispatched = self.dispatched.max(ticket.generation);
        self.state.status = SearchStatus::Loading;
        true
    }

    /// Apply the outcome of `ticket`'s fetch if it is still the latest.
    pub fn commit(
        &mut self,
        ticket: &FetchTicket,
        outcome: Result<RankedPage, ClientError>,
    ) -> CommitOutcome {
        if ticket.generation != self.latest {
            debug!(
                generation = ticket.generation.0,
                latest = self.latest.0,
                "Discarding stale response"
            );
            return CommitOutcome::Stale;
        }

        match outcome {
            Ok(page) => {
                debug!(
                    generation = ticket.generation.0,
                    total = page.total,
                    shown = page.shown,
                    "Committing results"
                );
                self.state.status = SearchStatus::Ready;
                self.state.total_matches = page.total;
                self.snapshot.clone_from(&page.records);
                self.state.selected = page.records.first().cloned();
                if ticket.trigger != Trigger::Typing
                    && let Some(first) = &self.state.selected
                {
                    self.state.query_text.clone_from(&first.street_name);
                }
                self.state.results = page.records;
            }
            Err(err) => {
                warn!(generation = ticket.generation.0, error = %err, "Search request failed");
                self.snapshot.clear();
                self.reset(SearchStatus::Error);
            }
        }
        CommitOutcome::Applied
    }

    /// Select `record`, collapsing the result list to it.
    ///
    /// Invalidates any fetch still in flight so it cannot replace the selection.
    pub fn select_record(&mut self, record: AddressRecord) {
        self.bump();
        self.state.query_text.clone_from(&record.street_name);
        self.state.results = vec![record.clone()];
        self.state.selected = Some(record);
        if self.state.status == SearchStatus::Loading {
            self.state.status = SearchStatus::Ready;
        }
    }

    /// Drop the selection and show the last committed results again.
    pub fn deselect(&mut self) {
        self.state.selected = None;
        self.state.results.clone_from(&self.snapshot);
    }

    pub fn clear(&mut self) {
        self.bump();
        self.snapshot.clear();
        self.reset(SearchStatus::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{search::SearchEngine, store::MemoryGazetteer};
    use cepmap_data_processing::test_data::sample_rows;

    fn engine() -> SearchEngine<MemoryGazetteer> {
        SearchEngine::new(MemoryGazetteer::from_rows(sample_rows()))
    }

    fn run(store: &mut SearchStore, ticket: &FetchTicket) -> CommitOutcome {
        assert!(store.begin(ticket));
        let page = engine().search(&ticket.query, ticket.kind).unwrap();
        store.commit(ticket, Ok(page))
    }

    #[test]
    fn test_short_query_goes_idle() {
        let mut store = SearchStore::default();
        assert_eq!(store.set_query("fl"), QueryTransition::Idle);
        assert_eq!(store.state().status, SearchStatus::Idle);
        assert_eq!(store.state().query_text, "fl");
        assert!(store.state().results.is_empty());
    }

    #[test]
    fn test_typing_keeps_raw_text_and_auto_selects() {
        let mut store = SearchStore::default();
        let ticket = store.set_query("flo").ticket().unwrap();
        assert_eq!(ticket.kind, QueryKind::FreeText);
        assert_eq!(run(&mut store, &ticket), CommitOutcome::Applied);

        let state = store.state();
        assert_eq!(state.status, SearchStatus::Ready);
        assert_eq!(state.query_text, "flo");
        assert_eq!(state.results.len(), 3);
        assert_eq!(state.total_matches, 3);
        assert_eq!(state.selected.as_ref().unwrap().street_name, "Avenida Flórida");
        assert_eq!(store.selected_index(), Some(0));
    }

    #[test]
    fn test_submit_replaces_query_text_with_street() {
        let mut store = SearchStore::default();
        store.set_query("77600-040");
        let ticket = store.submit(QueryKind::PostalCode).ticket().unwrap();
        assert_eq!(ticket.trigger, Trigger::Submit);
        run(&mut store, &ticket);
        assert_eq!(store.state().query_text, "Rua Tiradentes");
        assert_eq!(store.state().results.len(), 1);
    }

    #[test]
    fn test_only_latest_generation_commits() {
        let mut store = SearchStore::default();
        let first = store.set_query("flores").ticket().unwrap();
        assert!(store.begin(&first));
        let second = store.set_query("tiradentes").ticket().unwrap();
        assert!(second.generation > first.generation);
        assert!(store.begin(&second));

        let engine = engine();
        let newer = engine.search(&second.query, second.kind).unwrap();
        assert_eq!(store.commit(&second, Ok(newer)), CommitOutcome::Applied);
        let older = engine.search(&first.query, first.kind).unwrap();
        assert_eq!(store.commit(&first, Ok(older)), CommitOutcome::Stale);

        assert_eq!(store.state().results[0].street_name, "Rua Tiradentes");
        assert!(!store.begin(&first));
    }

    #[test]
    fn test_short_query_discards_in_flight_fetch() {
        let mut store = SearchStore::default();
        let ticket = store.set_query("flores").ticket().unwrap();
        assert!(store.begin(&ticket));
        assert_eq!(store.set_query("fl"), QueryTransition::Idle);

        let page = engine().search("flores", QueryKind::FreeText).unwrap();
        assert_eq!(store.commit(&ticket, Ok(page)), CommitOutcome::Stale);
        assert_eq!(store.state().status, SearchStatus::Idle);
        assert!(store.state().results.is_empty());
    }

    #[test]
    fn test_failure_clears_and_sets_error() {
        let mut store = SearchStore::default();
        let ticket = store.set_query("flores").ticket().unwrap();
        run(&mut store, &ticket);
        assert!(store.selection().is_some());

        let ticket = store.set_query("tiradentes").ticket().unwrap();
        store.begin(&ticket);
        assert!(store.state().is_loading());
        let failure = ClientError::Status {
            status: 500,
            message: "Store unavailable".into(),
        };
        assert_eq!(store.commit(&ticket, Err(failure)), CommitOutcome::Applied);

        let state = store.state();
        assert_eq!(state.status, SearchStatus::Error);
        assert!(state.results.is_empty());
        assert!(state.selected.is_none());
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_select_collapses_and_deselect_restores() {
        let mut store = SearchStore::default();
        let ticket = store.set_query("rua").ticket().unwrap();
        run(&mut store, &ticket);
        let listed = store.state().results.clone();
        assert_eq!(listed.len(), 5);

        store.select_record(listed[2].clone());
        assert_eq!(store.state().results, vec![listed[2].clone()]);
        assert_eq!(store.state().query_text, listed[2].street_name);
        assert_eq!(store.selected_index(), Some(2));

        store.deselect();
        assert!(store.selection().is_none());
        assert_eq!(store.state().results, listed);
    }

    #[test]
    fn test_selection_invalidates_pending_fetch() {
        let mut store = SearchStore::default();
        let first = store.set_query("rua").ticket().unwrap();
        run(&mut store, &first);
        let record = store.state().results[1].clone();

        let pending = store.set_query("avenida").ticket().unwrap();
        store.begin(&pending);
        store.select_record(record.clone());
        assert_eq!(store.state().status, SearchStatus::Ready);

        let page = engine().search("avenida", QueryKind::FreeText).unwrap();
        assert_eq!(store.commit(&pending, Ok(page)), CommitOutcome::Stale);
        assert_eq!(store.selection(), Some(&record));
    }

    #[test]
    fn test_clear() {
        let mut store = SearchStore::default();
        let ticket = store.set_query("flores").ticket().unwrap();
        run(&mut store, &ticket);
        let before = store.latest_generation();
        store.clear();
        assert!(store.latest_generation() > before);
        assert_eq!(store.state().status, SearchStatus::Idle);
        assert!(store.state().results.is_empty());
        assert!(store.selection().is_none());
    }
}
