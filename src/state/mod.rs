mod ceremony;
mod remote;

use crate::backend::{RestBackend, VoteBackend};
use crate::config::AppConfig;
use crate::media::{MediaProbe, StaticDirProbe, TrailerSearch, YouTubeSearch};
use crate::storage::KeyValueStore;
use crate::types::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    /// Loaded once at startup, read-only afterwards
    pub ceremonies: Arc<BTreeMap<Year, Arc<Ceremony>>>,
    /// Durable store shared by all visitors
    pub store: Arc<dyn KeyValueStore>,
    pub backend: Option<Arc<dyn VoteBackend>>,
    pub trailers: Option<Arc<dyn TrailerSearch>>,
    pub probe: Arc<dyn MediaProbe>,
    /// Preloaded image names per year
    pub image_cache: Arc<RwLock<HashMap<Year, Arc<HashSet<String>>>>>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        ceremonies: BTreeMap<Year, Ceremony>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let probe = Arc::new(StaticDirProbe::new(config.static_dir.clone()));
        Self {
            config,
            ceremonies: Arc::new(
                ceremonies
                    .into_iter()
                    .map(|(year, c)| (year, Arc::new(c)))
                    .collect(),
            ),
            store,
            backend: None,
            trailers: None,
            probe,
            image_cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Build the state with whatever remote services the config enables
    pub fn from_config(
        config: AppConfig,
        ceremonies: BTreeMap<Year, Ceremony>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let backend = config.backend.as_ref().and_then(|b| {
            match RestBackend::new(b.url.clone(), b.api_key.clone(), config.remote_timeout) {
                Ok(backend) => Some(Arc::new(backend) as Arc<dyn VoteBackend>),
                Err(e) => {
                    tracing::warn!("Hosted vote backend disabled: {}", e);
                    None
                }
            }
        });
        let trailers = config.youtube_api_key.clone().map(|key| {
            Arc::new(YouTubeSearch::new(key, config.remote_timeout)) as Arc<dyn TrailerSearch>
        });

        let mut state = Self::new(config, ceremonies, store);
        state.backend = backend;
        state.trailers = trailers;
        state
    }

    pub fn with_backend(mut self, backend: Arc<dyn VoteBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_trailer_search(mut self, trailers: Arc<dyn TrailerSearch>) -> Self {
        self.trailers = Some(trailers);
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn MediaProbe>) -> Self {
        self.probe = probe;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use crate::storage::MemoryStore;

    fn ceremonies() -> BTreeMap<Year, Ceremony> {
        [2025, 2026]
            .into_iter()
            .map(|year| {
                (
                    year,
                    Ceremony {
                        year,
                        categories: Vec::new(),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_from_config_without_remote_services() {
        let state = AppState::from_config(
            AppConfig::default(),
            ceremonies(),
            Arc::new(MemoryStore::new()),
        );
        assert!(state.backend.is_none());
        assert!(state.trailers.is_none());
        assert_eq!(state.ceremonies.len(), 2);
    }

    #[test]
    fn test_from_config_with_remote_services() {
        let config = AppConfig {
            backend: Some(BackendConfig {
                url: "https://x.supabase.co".to_string(),
                api_key: "anon".to_string(),
            }),
            youtube_api_key: Some("yt".to_string()),
            ..AppConfig::default()
        };
        let state = AppState::from_config(config, ceremonies(), Arc::new(MemoryStore::new()));
        assert_eq!(state.backend.as_ref().map(|b| b.name()), Some("rest"));
        assert!(state.trailers.is_some());
    }

    #[test]
    fn test_invalid_backend_url_is_disabled() {
        let config = AppConfig {
            backend: Some(BackendConfig {
                url: "ftp://nope".to_string(),
                api_key: "anon".to_string(),
            }),
            ..AppConfig::default()
        };
        let state = AppState::from_config(config, ceremonies(), Arc::new(MemoryStore::new()));
        assert!(state.backend.is_none());
    }
}
