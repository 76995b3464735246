use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use super::{
    ClientError, FetchTicket, Generation, NavigationKey, QueryTransition, SearchState, SearchStore,
    SelectionController,
};
use crate::{
    api::{ErrorBody, GetSearchResponse, PostSearchRequest, PostSearchResponse},
    config::SessionConfig,
    map::{MapProvider, MapSync},
    model::{AddressRecord, LatLng, Location},
    search::{QueryKind, RankedPage, SearchEngine},
    store::GazetteerStore,
};

/// Where a session's fetches go.
pub trait SearchBackend: Send + Sync {
    fn search(
        &self,
        query: &str,
        kind: QueryKind,
    ) -> impl Future<Output = Result<RankedPage, ClientError>> + Send;
}

/// In-process backend over a [`SearchEngine`].
#[derive(Debug, Clone)]
pub struct LocalBackend<S> {
    engine: SearchEngine<S>,
}

impl<S: GazetteerStore> LocalBackend<S> {
    pub const fn new(engine: SearchEngine<S>) -> Self {
        Self { engine }
    }
}

impl<S: GazetteerStore> SearchBackend for LocalBackend<S> {
    async fn search(&self, query: &str, kind: QueryKind) -> Result<RankedPage, ClientError> {
        Ok(self.engine.search(query, kind)?)
    }
}

/// Backend talking to the search endpoints over HTTP.
///
/// Broad queries use `GET search?q=`, the other kinds `POST search`.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/search", self.base_url)
    }

    async fn checked(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.message,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string(),
        };
        Err(ClientError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

impl SearchBackend for HttpBackend {
    #[instrument(name = "HTTP search", skip(self), level = "debug")]
    async fn search(&self, query: &str, kind: QueryKind) -> Result<RankedPage, ClientError> {
        let request = match kind {
            QueryKind::Broad => {
                let response = self
                    .client
                    .get(self.endpoint())
                    .query(&[("q", query)])
                    .send()
                    .await?;
                let body: GetSearchResponse = Self::checked(response).await?.json().await?;
                return Ok(body.into());
            }
            QueryKind::FreeText => PostSearchRequest::name(query),
            QueryKind::PostalCode => PostSearchRequest::cep(query),
            QueryKind::Neighborhood => PostSearchRequest::bairro(query),
        };
        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await?;
        let body: PostSearchResponse = Self::checked(response).await?.json().await?;
        Ok(post_response_page(body))
    }
}

/// `POST search` answers are already ranked and limited by the server.
fn post_response_page(response: PostSearchResponse) -> RankedPage {
    match response {
        PostSearchResponse::Records(records) => RankedPage {
            total: records.len(),
            shown: records.len(),
            records,
        },
        PostSearchResponse::Record(record) => RankedPage::single(*record),
        PostSearchResponse::Empty(_) => RankedPage::empty(),
    }
}

fn lock(store: &Mutex<SearchStore>) -> MutexGuard<'_, SearchStore> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn run_fetch<B: SearchBackend>(
    store: Arc<Mutex<SearchStore>>,
    backend: Arc<B>,
    ticket: FetchTicket,
) {
    if !lock(&store).begin(&ticket) {
        return;
    }
    debug!(generation = ticket.generation.0, query = %ticket.query, kind = ?ticket.kind, "Dispatching fetch");
    let outcome = backend.search(&ticket.query, ticket.kind).await;
    let applied = lock(&store).commit(&ticket, outcome);
    debug!(generation = ticket.generation.0, ?applied, "Fetch finished");
}

/// A search box bound to a backend.
///
/// Typing is debounced: each call to [`SearchSession::input`] restarts the
/// quiet period and only the last text is fetched. Fetches already on the
/// wire are left to finish; the store discards their responses when a newer
/// query has been scheduled since. The store lock is never held across an
/// await.
#[derive(Debug)]
pub struct SearchSession<B> {
    store: Arc<Mutex<SearchStore>>,
    backend: Arc<B>,
    config: SessionConfig,
    pending: Option<(Generation, JoinHandle<()>)>,
    in_flight: Vec<JoinHandle<()>>,
}

impl<B: SearchBackend + 'static> SearchSession<B> {
    pub fn new(backend: B, config: SessionConfig) -> Self {
        Self {
            store: Arc::new(Mutex::new(SearchStore::new(config.min_query_len))),
            backend: Arc::new(backend),
            config,
            pending: None,
            in_flight: Vec::new(),
        }
    }

    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Copy of the current state.
    pub fn state(&self) -> SearchState {
        lock(&self.store).state().clone()
    }

    /// Run `f` against the store under its lock.
    pub fn with_store<R>(&self, f: impl FnOnce(&mut SearchStore) -> R) -> R {
        f(&mut *lock(&self.store))
    }

    /// Drop the pending timer unless its fetch is already on the wire.
    fn cancel_pending(&mut self) {
        let Some((generation, handle)) = self.pending.take() else {
            return;
        };
        if lock(&self.store).dispatched_generation() >= generation {
            self.in_flight.push(handle);
        } else {
            debug!(generation = generation.0, "Cancelling debounced fetch");
            handle.abort();
        }
        self.in_flight.retain(|handle| !handle.is_finished());
    }

    /// Cancel the pending fetch only once the store has moved past its
    /// generation. Keys that leave the query alone keep it scheduled.
    fn cancel_superseded(&mut self) {
        let Some((generation, _)) = &self.pending else {
            return;
        };
        if *generation != lock(&self.store).latest_generation() {
            self.cancel_pending();
        }
    }

    fn spawn(&mut self, transition: QueryTransition, delay: Option<Duration>) {
        self.cancel_pending();
        let Some(ticket) = transition.ticket() else {
            return;
        };
        let generation = ticket.generation;
        let store = Arc::clone(&self.store);
        let backend = Arc::clone(&self.backend);
        let handle = tokio::spawn(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            run_fetch(store, backend, ticket).await;
        });
        self.pending = Some((generation, handle));
    }

    /// Keystroke: update the text and restart the debounce window.
    pub fn input(&mut self, text: &str) {
        let transition = lock(&self.store).set_query(text);
        self.spawn(transition, Some(self.config.debounce));
    }

    /// Fetch the current text as `kind` right away.
    pub fn submit(&mut self, kind: QueryKind) {
        let transition = lock(&self.store).submit(kind);
        self.spawn(transition, None);
    }

    pub fn select_record(&mut self, record: AddressRecord) {
        lock(&self.store).select_record(record);
        self.cancel_superseded();
    }

    /// Apply a navigation key to the committed results.
    pub fn navigate(&mut self, key: NavigationKey) -> Option<usize> {
        let index = SelectionController::new(&mut *lock(&self.store)).handle_key(key);
        self.cancel_superseded();
        index
    }

    pub fn clear(&mut self) {
        lock(&self.store).clear();
        self.cancel_superseded();
    }

    /// Resolve a map click and look up the street found there.
    pub async fn click_map<P: MapProvider>(
        &mut self,
        sync: &MapSync<P>,
        point: LatLng,
    ) -> Result<Location, ClientError> {
        let location = sync.click(point).await?;
        match location.street.as_deref() {
            Some(street) => {
                let transition = lock(&self.store).lookup_street(street);
                self.spawn(transition, None);
            }
            None => debug!(?point, "No street at clicked point"),
        }
        Ok(location)
    }

    /// Wait for every scheduled and in-flight fetch to finish.
    pub async fn settle(&mut self) {
        let mut handles = std::mem::take(&mut self.in_flight);
        handles.extend(self.pending.take().map(|(_, handle)| handle));
        for result in join_all(handles).await {
            if let Err(err) = result
                && !err.is_cancelled()
            {
                warn!(error = %err, "Search task failed");
            }
        }
    }
}

impl<B> Drop for SearchSession<B> {
    fn drop(&mut self) {
        if let Some((_, handle)) = self.pending.take() {
            handle.abort();
        }
        for handle in self.in_flight.drain(..) {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{api::EmptyObject, client::SearchStatus, store::MemoryGazetteer};
    use cepmap_data_processing::test_data::sample_rows;

    fn session() -> SearchSession<LocalBackend<MemoryGazetteer>> {
        let engine = SearchEngine::new(MemoryGazetteer::from_rows(sample_rows()));
        SearchSession::new(LocalBackend::new(engine), SessionConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_input_fetches_after_debounce() {
        let mut session = session();
        session.input("flo");
        assert_eq!(session.state().status, SearchStatus::Idle);

        session.settle().await;
        let state = session.state();
        assert_eq!(state.status, SearchStatus::Ready);
        assert_eq!(state.query_text, "flo");
        assert_eq!(state.results.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_postal_code() {
        let mut session = session();
        session.input("77600-050");
        session.submit(QueryKind::PostalCode);
        session.settle().await;

        let state = session.state();
        assert_eq!(state.results.len(), 1);
        assert_eq!(state.query_text, "Rua Ótica Central");
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigate_and_clear() {
        let mut session = session();
        session.input("rua");
        session.settle().await;

        assert_eq!(session.navigate(NavigationKey::End), Some(4));
        assert_eq!(session.state().results.len(), 1);
        assert_eq!(session.navigate(NavigationKey::Escape), None);
        assert_eq!(session.state().results.len(), 5);

        session.clear();
        let state = session.state();
        assert_eq!(state.status, SearchStatus::Idle);
        assert!(state.results.is_empty());
        assert!(state.selected.is_none());
    }

    #[test]
    fn test_post_response_page() {
        assert_eq!(
            post_response_page(PostSearchResponse::Empty(EmptyObject {})),
            RankedPage::empty()
        );
        let record = MemoryGazetteer::from_rows(sample_rows()).records()[0].clone();
        let page = post_response_page(PostSearchResponse::Records(vec![record.clone(); 2]));
        assert_eq!((page.total, page.shown), (2, 2));
        let page = post_response_page(PostSearchResponse::Record(Box::new(record.clone())));
        assert_eq!(page.records, vec![record]);
    }

    #[test]
    fn test_http_backend_endpoint() {
        let backend = HttpBackend::new("http://localhost:3000/api/");
        assert_eq!(backend.endpoint(), "http://localhost:3000/api/search");
    }
}
