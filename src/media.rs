//! Supplementary media: image path guessing, existence probing and trailer
//! lookup. Nothing in here affects reveal or vote state; every failure just
//! means a picture or trailer does not show up.

use crate::types::{Ceremony, Nominee, Year};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Unexpected response: {0}")]
    Response(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),
}

/// File-name slug: whitespace runs become `-`, accents are stripped
pub fn slugify(name: &str) -> String {
    let joined = name.split_whitespace().collect::<Vec<_>>().join("-");
    joined
        .as_str()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// Portrait for a person; index 0 is the main one, then `-1`, `-2`, ...
pub fn actor_image_path(year: Year, name: &str, index: usize) -> String {
    let base = format!("/actors/{}/{}", year, slugify(name));
    if index == 0 {
        format!("{}.jpg", base)
    } else {
        format!("{}-{}.jpg", base, index)
    }
}

pub fn film_image_path(year: Year, title: &str) -> String {
    format!("/films/{}/{}.jpg", year, slugify(title))
}

/// Images the dataset lists for a nominee's person, in rotation order
pub fn nominee_image_paths(nominee: &Nominee) -> Vec<String> {
    nominee
        .person
        .as_ref()
        .and_then(|p| p.images.as_ref())
        .map(|images| images.paths())
        .unwrap_or_default()
}

/// Pull the 11-character video id out of any common YouTube URL shape
pub fn youtube_video_id(url: &str) -> Option<String> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(
            r#"(?:youtube\.com/(?:[^/]+/.+/|(?:v|e(?:mbed)?)/|.*[?&]v=)|youtu\.be/)([^"&?/\s]{11})"#,
        )
        .map_err(|e| tracing::error!("Invalid YouTube URL pattern: {}", e))
        .ok()
    });
    pattern
        .as_ref()?
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Answers whether an image path can be loaded
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn exists(&self, path: &str) -> bool;
}

/// Probe backed by the directory the static files are served from
#[derive(Debug, Clone)]
pub struct StaticDirProbe {
    root: PathBuf,
}

impl StaticDirProbe {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a URL path onto the static root, refusing anything that escapes it
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

#[async_trait]
impl MediaProbe for StaticDirProbe {
    async fn exists(&self, path: &str) -> bool {
        let Some(full) = self.resolve(path) else {
            tracing::warn!("Rejected media path outside static root: {}", path);
            return false;
        };
        tokio::fs::try_exists(&full).await.unwrap_or(false)
    }
}

/// Names (film titles and person names) whose guessed image exists.
///
/// Mirrors what the page preloads before rendering the ceremony.
pub async fn preload_images(probe: &dyn MediaProbe, ceremony: &Ceremony) -> HashSet<String> {
    let mut people = HashSet::new();
    let mut films = HashSet::new();
    for nominee in ceremony.categories.iter().flat_map(|c| &c.nominees) {
        if let Some(person) = &nominee.person {
            people.insert(person.name.clone());
        }
        films.insert(nominee.film.title.clone());
    }

    let year = ceremony.year;
    let checks = people
        .into_iter()
        .map(|name| (actor_image_path(year, &name, 0), name))
        .chain(
            films
                .into_iter()
                .map(|title| (film_image_path(year, &title), title)),
        )
        .map(|(path, name)| async move { probe.exists(&path).await.then_some(name) });

    let found: HashSet<String> = futures::future::join_all(checks)
        .await
        .into_iter()
        .flatten()
        .collect();

    tracing::debug!("Preloaded {} images for {}", found.len(), year);
    found
}

/// Finds a trailer video for a film title
#[async_trait]
pub trait TrailerSearch: Send + Sync {
    async fn search(&self, title: &str) -> Result<Option<String>, MediaError>;
}

/// YouTube Data API v3 search
pub struct YouTubeSearch {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

impl YouTubeSearch {
    pub fn new(api_key: String, timeout: Duration) -> Self {
        Self {
            api_key,
            base_url: "https://www.googleapis.com/youtube/v3".to_string(),
            client: reqwest::Client::new(),
            timeout,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl TrailerSearch for YouTubeSearch {
    async fn search(&self, title: &str) -> Result<Option<String>, MediaError> {
        if self.api_key.is_empty() {
            return Err(MediaError::NotConfigured("YouTube API key".to_string()));
        }

        let query = format!("{} trailer official", title);
        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("part", "snippet"),
                ("maxResults", "1"),
                ("type", "video"),
                ("q", query.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| MediaError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MediaError::Response(format!(
                "YouTube search returned status: {}",
                response.status()
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| MediaError::Response(e.to_string()))?;

        Ok(body.items.into_iter().find_map(|item| item.id.video_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, Film, NomineeMetadata, Person, Winners};

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Timothée Chalamet"), "Timothee-Chalamet");
        assert_eq!(slugify("Zoe  Saldaña"), "Zoe-Saldana");
        assert_eq!(slugify("  Anora "), "Anora");
        assert_eq!(slugify("Wallace & Gromit"), "Wallace-&-Gromit");
    }

    #[test]
    fn test_image_paths() {
        assert_eq!(
            actor_image_path(2026, "Monica Barbaro", 0),
            "/actors/2026/Monica-Barbaro.jpg"
        );
        assert_eq!(
            actor_image_path(2025, "Monica Barbaro", 2),
            "/actors/2025/Monica-Barbaro-2.jpg"
        );
        assert_eq!(
            film_image_path(2025, "Emilia Pérez"),
            "/films/2025/Emilia-Perez.jpg"
        );
    }

    #[test]
    fn test_youtube_video_id() {
        assert_eq!(
            youtube_video_id("https://www.youtube.com/watch?v=2TAZJHgGt_c").as_deref(),
            Some("2TAZJHgGt_c")
        );
        assert_eq!(
            youtube_video_id("https://youtu.be/dQw4w9WgXcQ?t=10").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            youtube_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(youtube_video_id("https://vimeo.com/12345"), None);
    }

    #[test]
    fn test_static_probe_rejects_escapes() {
        let probe = StaticDirProbe::new("/srv/static");
        assert!(probe.resolve("/films/2026/x.jpg").is_some());
        assert!(probe.resolve("/../etc/passwd").is_none());
        assert!(probe.resolve("/films/../../secret").is_none());
    }

    #[tokio::test]
    async fn test_preload_images_from_static_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("films/2026")).unwrap();
        std::fs::create_dir_all(dir.path().join("actors/2026")).unwrap();
        std::fs::write(dir.path().join("films/2026/Alpha.jpg"), b"jpg").unwrap();
        std::fs::write(dir.path().join("actors/2026/Jane-Doe.jpg"), b"jpg").unwrap();

        let film = |title: &str| Film {
            id: title.to_lowercase(),
            title: title.to_string(),
            poster: None,
            trailer: None,
        };
        let ceremony = Ceremony {
            year: 2026,
            categories: vec![Category {
                id: "c".to_string(),
                name: "C".to_string(),
                nominees: vec![
                    Nominee {
                        id: "a".to_string(),
                        film: film("Alpha"),
                        person: Some(Person {
                            id: "jane".to_string(),
                            name: "Jane Doe".to_string(),
                            images: None,
                        }),
                        crew: Vec::new(),
                        metadata: NomineeMetadata::default(),
                    },
                    Nominee {
                        id: "b".to_string(),
                        film: film("Beta"),
                        person: None,
                        crew: Vec::new(),
                        metadata: NomineeMetadata::default(),
                    },
                ],
                winners: Winners::default(),
                reveal_video: None,
            }],
        };

        let probe = StaticDirProbe::new(dir.path());
        let found = preload_images(&probe, &ceremony).await;
        assert!(found.contains("Alpha"));
        assert!(found.contains("Jane Doe"));
        assert!(!found.contains("Beta"));
    }

    #[tokio::test]
    async fn test_youtube_search_without_key() {
        let search = YouTubeSearch::new(String::new(), Duration::from_secs(1));
        let result = search.search("Anora").await;
        assert!(matches!(result, Err(MediaError::NotConfigured(_))));
    }
}
