use serde::{Deserialize, Serialize};

use crate::model::AddressRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Error,
}

/// Everything a search UI renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchState {
    pub query_text: String,
    pub results: Vec<AddressRecord>,
    pub selected: Option<AddressRecord>,
    pub status: SearchStatus,
    pub total_matches: usize,
}

impl SearchState {
    pub fn selected_id(&self) -> Option<u64> {
        self.selected.as_ref().map(|record| record.id)
    }

    pub const fn is_loading(&self) -> bool {
        matches!(self.status, SearchStatus::Loading)
    }
}
