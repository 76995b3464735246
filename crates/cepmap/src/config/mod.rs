use std::time::Duration;

use crate::model::LatLng;

/// Environment variable holding the map provider key.
pub const MAP_API_KEY_VAR: &str = "GOOGLE_MAPS_API_KEY";

/// Default Google Geocoding endpoint.
pub const GEOCODE_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Engine limits shared by every query kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// Queries shorter than this (normalized, trimmed) never reach the store.
    pub min_query_len: usize,
    /// Page size for street-name and neighborhood searches.
    pub page_size: usize,
    /// Page size for the top-level free-text endpoint.
    pub top_level_page_size: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_query_len: 3,
            page_size: 20,
            top_level_page_size: 50,
        }
    }
}

/// Builder for creating search configurations with ergonomic defaults
#[derive(Debug, Clone, Default)]
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    /// Create a new builder with sensible defaults
    pub fn new() -> Self {
        Self {
            config: SearchConfig::default(),
        }
    }

    /// Small pages for dropdown-style result lists
    pub fn compact() -> Self {
        let mut builder = Self::new();
        builder.config.page_size = 8;
        builder.config.top_level_page_size = 20;
        builder
    }

    /// Minimum normalized query length, never below 1
    pub fn min_query_len(mut self, len: usize) -> Self {
        self.config.min_query_len = len.max(1);
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.config.page_size = size.max(1);
        self
    }

    pub fn top_level_page_size(mut self, size: usize) -> Self {
        self.config.top_level_page_size = size.max(1);
        self
    }

    /// Build the final configuration
    pub fn build(self) -> SearchConfig {
        self.config
    }
}

/// Client session timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Quiet period after the last keystroke before a fetch is dispatched.
    pub debounce: Duration,
    pub min_query_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            min_query_len: 3,
        }
    }
}

impl SessionConfig {
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_min_query_len(mut self, len: usize) -> Self {
        self.min_query_len = len.max(1);
        self
    }
}

/// Map provider settings and default viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct MapConfig {
    /// Provider key. `None` disables every map feature; search is unaffected.
    pub api_key: Option<String>,
    pub geocode_endpoint: String,
    pub center: LatLng,
    pub zoom: u8,
    /// Zoom applied when focusing a selected record.
    pub focus_zoom: u8,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            geocode_endpoint: GEOCODE_ENDPOINT.to_string(),
            center: LatLng {
                lat: -10.1722,
                lng: -48.881,
            },
            zoom: 15,
            focus_zoom: 17,
        }
    }
}

impl MapConfig {
    /// Read the key from `GOOGLE_MAPS_API_KEY`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`MapConfig::from_env`] with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let api_key = lookup(MAP_API_KEY_VAR)
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        if api_key.is_none() {
            tracing::warn!("{MAP_API_KEY_VAR} not set, map features disabled");
        }
        Self {
            api_key,
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_geocode_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.geocode_endpoint = endpoint.into();
        self
    }

    pub const fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }
}
