use super::*;
use crate::ledger::VOTE_STATS_KEY;
use crate::media::preload_images;
use crate::session::Presentation;
use crate::storage::ScopedStore;

/// Longest visitor token accepted from a client
const MAX_VISITOR_ID_LEN: usize = 64;

fn is_valid_visitor_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_VISITOR_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl AppState {
    pub fn years(&self) -> Vec<Year> {
        self.ceremonies.keys().copied().collect()
    }

    pub fn ceremony(&self, year: Year) -> Option<Arc<Ceremony>> {
        self.ceremonies.get(&year).cloned()
    }

    /// The configured default year, or the latest one loaded
    pub fn initial_ceremony(&self) -> Option<Arc<Ceremony>> {
        self.ceremony(self.config.default_year).or_else(|| {
            tracing::warn!(
                "Default year {} not loaded, falling back to the latest",
                self.config.default_year
            );
            self.ceremonies.values().next_back().cloned()
        })
    }

    /// Names with an existing guessed image, probed once per year
    pub async fn valid_images(&self, ceremony: &Ceremony) -> Arc<HashSet<String>> {
        if let Some(cached) = self.image_cache.read().await.get(&ceremony.year) {
            return cached.clone();
        }

        let found = Arc::new(preload_images(self.probe.as_ref(), ceremony).await);
        self.image_cache
            .write()
            .await
            .insert(ceremony.year, found.clone());
        found
    }

    /// Start a page session. A missing or malformed token gets a fresh
    /// visitor id.
    pub async fn open_session(&self, token: Option<&str>) -> Option<Presentation> {
        let ceremony = self.initial_ceremony()?;

        let visitor_id = match token {
            Some(t) if is_valid_visitor_id(t) => t.to_string(),
            Some(t) => {
                tracing::warn!("Ignoring malformed visitor token ({} chars)", t.len());
                ulid::Ulid::new().to_string()
            }
            None => ulid::Ulid::new().to_string(),
        };

        let store: Arc<dyn KeyValueStore> =
            Arc::new(ScopedStore::new(self.store.clone(), visitor_id.clone()).share(VOTE_STATS_KEY));

        let mut presentation = Presentation::new(
            visitor_id,
            ceremony.clone(),
            store,
            self.config.animated_tail,
            self.config.scroll_interrupt_px,
        );
        presentation.set_valid_images(self.valid_images(&ceremony).await.as_ref().clone());

        tracing::info!(
            "Session opened for visitor {} ({})",
            presentation.visitor_id(),
            ceremony.year
        );
        Some(presentation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaProbe;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProbe {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MediaProbe for CountingProbe {
        async fn exists(&self, path: &str) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            path.starts_with("/films/")
        }
    }

    fn ceremony(year: Year) -> Ceremony {
        Ceremony {
            year,
            categories: vec![Category {
                id: "best-picture".to_string(),
                name: "Best Picture".to_string(),
                nominees: vec![Nominee {
                    id: "a".to_string(),
                    film: Film {
                        id: "alpha".to_string(),
                        title: "Alpha".to_string(),
                        poster: None,
                        trailer: None,
                    },
                    person: None,
                    crew: Vec::new(),
                    metadata: NomineeMetadata::default(),
                }],
                winners: Winners::default(),
                reveal_video: None,
            }],
        }
    }

    fn state(years: &[Year], default_year: Year) -> AppState {
        let config = AppConfig {
            default_year,
            ..AppConfig::default()
        };
        AppState::new(
            config,
            years.iter().map(|y| (*y, ceremony(*y))).collect(),
            Arc::new(MemoryStore::new()),
        )
    }

    #[test]
    fn test_visitor_id_validation() {
        assert!(is_valid_visitor_id("01HZX3-abc_def"));
        assert!(!is_valid_visitor_id(""));
        assert!(!is_valid_visitor_id("../etc"));
        assert!(!is_valid_visitor_id(&"a".repeat(65)));
    }

    #[test]
    fn test_initial_ceremony_falls_back_to_latest() {
        let state = state(&[2024, 2025], 2026);
        assert_eq!(state.initial_ceremony().map(|c| c.year), Some(2025));
        assert_eq!(state.years(), vec![2024, 2025]);

        let empty = self::state(&[], 2026);
        assert!(empty.initial_ceremony().is_none());
    }

    #[tokio::test]
    async fn test_open_session_assigns_visitor_ids() {
        let state = state(&[2025, 2026], 2026);

        let session = state.open_session(Some("visitor-1")).await.unwrap();
        assert_eq!(session.visitor_id(), "visitor-1");
        assert_eq!(session.year(), 2026);

        let fresh = state.open_session(Some("bad/token")).await.unwrap();
        assert_ne!(fresh.visitor_id(), "bad/token");
        assert!(ulid::Ulid::from_string(fresh.visitor_id()).is_ok());
    }

    #[tokio::test]
    async fn test_valid_images_probed_once_per_year() {
        let probe = Arc::new(CountingProbe {
            calls: AtomicUsize::new(0),
        });
        let state = state(&[2026], 2026).with_probe(probe.clone());
        let ceremony = state.ceremony(2026).unwrap();

        let first = state.valid_images(&ceremony).await;
        assert!(first.contains("Alpha"));
        let calls = probe.calls.load(Ordering::SeqCst);
        assert_eq!(calls, 1);

        state.valid_images(&ceremony).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), calls);
    }
}
