//! Client-side search state.
//!
//! [`SearchStore`] is the synchronous state machine (query gate, generation
//! counter, commit rules, selection). [`SelectionController`] navigates the
//! committed results. [`SearchSession`] drives both on a tokio runtime with a
//! debounce timer and a [`SearchBackend`], local or over HTTP.
pub use error::ClientError;
pub use selection::{NavigationKey, SelectionController};
pub use session::{HttpBackend, LocalBackend, SearchBackend, SearchSession};
pub use state::{SearchState, SearchStatus};
pub use store::{CommitOutcome, FetchTicket, Generation, QueryTransition, SearchStore, Trigger};

mod selection;
mod session;
mod state;
mod store;

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum ClientError {
        #[error("Network error: {0}")]
        Network(#[from] reqwest::Error),
        #[error("Server answered {status}: {message}")]
        Status { status: u16, message: String },
        #[error("Search failed: {0}")]
        Search(#[from] crate::search::SearchError),
        #[error("Map error: {0}")]
        Map(#[from] crate::map::MapError),
    }
}
