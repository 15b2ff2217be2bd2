//! Runtime configuration, read from the environment (and `.env` via dotenvy
//! in `main`).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::reveal::{DEFAULT_ANIMATED_TAIL, MAX_REVEAL_ANIMATION};
use crate::types::Year;

/// Hosted backend credentials; both parts are required
#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Directory holding one ceremony JSON file per year
    pub data_dir: PathBuf,
    /// Directory served as the site root (also probed for images)
    pub static_dir: PathBuf,
    /// JSON file backing the vote store
    pub store_path: PathBuf,
    /// Year shown when a visitor connects
    pub default_year: Year,
    /// How many trailing categories get the curtain animation
    pub animated_tail: usize,
    pub reveal_animation: Duration,
    /// Scroll distance (px) that interrupts a running curtain
    pub scroll_interrupt_px: f64,
    pub backend: Option<BackendConfig>,
    pub youtube_api_key: Option<String>,
    /// Timeout for backend and trailer requests
    pub remote_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            // 2026 for the 98th ceremony's year
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 2026)),
            data_dir: PathBuf::from("data"),
            static_dir: PathBuf::from("static"),
            store_path: PathBuf::from("votes.json"),
            default_year: 2026,
            animated_tail: DEFAULT_ANIMATED_TAIL,
            reveal_animation: Duration::from_millis(8200),
            scroll_interrupt_px: 50.0,
            backend: None,
            youtube_api_key: None,
            remote_timeout: Duration::from_secs(10),
        }
    }
}

/// Read a variable, treating blank values as unset
fn env_trimmed(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env_trimmed(name)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid value for {}: '{}'", name, raw);
            None
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let backend = match (env_trimmed("SUPABASE_URL"), env_trimmed("SUPABASE_ANON_KEY")) {
            (Some(url), Some(api_key)) => {
                tracing::info!("Hosted vote backend enabled at {}", url);
                Some(BackendConfig { url, api_key })
            }
            (None, None) => {
                tracing::info!("No hosted vote backend configured, using local votes only");
                None
            }
            _ => {
                tracing::warn!(
                    "SUPABASE_URL and SUPABASE_ANON_KEY must both be set to enable the hosted backend"
                );
                None
            }
        };

        let youtube_api_key = env_trimmed("YOUTUBE_API_KEY");
        if youtube_api_key.is_none() {
            tracing::info!("YOUTUBE_API_KEY not set, trailer search disabled");
        }

        Self {
            bind_addr: env_parsed("OSCARS_BIND_ADDR").unwrap_or(defaults.bind_addr),
            data_dir: env_trimmed("OSCARS_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            static_dir: env_trimmed("OSCARS_STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
            store_path: env_trimmed("OSCARS_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_path),
            default_year: env_parsed("OSCARS_DEFAULT_YEAR").unwrap_or(defaults.default_year),
            animated_tail: env_parsed("OSCARS_ANIMATED_TAIL").unwrap_or(defaults.animated_tail),
            reveal_animation: env_parsed("OSCARS_REVEAL_ANIMATION_MS")
                .map(reveal_animation_from_ms)
                .unwrap_or(defaults.reveal_animation),
            scroll_interrupt_px: env_parsed("OSCARS_SCROLL_INTERRUPT_PX")
                .unwrap_or(defaults.scroll_interrupt_px),
            backend,
            youtube_api_key,
            remote_timeout: env_parsed("REMOTE_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.remote_timeout),
        }
    }
}

fn reveal_animation_from_ms(ms: u64) -> Duration {
    let requested = Duration::from_millis(ms);
    if requested > MAX_REVEAL_ANIMATION {
        tracing::warn!(
            "OSCARS_REVEAL_ANIMATION_MS={} is too long, using {}ms",
            ms,
            MAX_REVEAL_ANIMATION.as_millis()
        );
        return MAX_REVEAL_ANIMATION;
    }
    requested
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "OSCARS_BIND_ADDR",
        "OSCARS_DATA_DIR",
        "OSCARS_STATIC_DIR",
        "OSCARS_STORE_PATH",
        "OSCARS_DEFAULT_YEAR",
        "OSCARS_ANIMATED_TAIL",
        "OSCARS_REVEAL_ANIMATION_MS",
        "OSCARS_SCROLL_INTERRUPT_PX",
        "SUPABASE_URL",
        "SUPABASE_ANON_KEY",
        "YOUTUBE_API_KEY",
        "REMOTE_TIMEOUT",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.default_year, 2026);
        assert_eq!(config.animated_tail, 4);
        assert_eq!(config.reveal_animation, Duration::from_millis(8200));
        assert_eq!(config.scroll_interrupt_px, 50.0);
        assert!(config.backend.is_none());
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        let config = AppConfig::from_env();
        assert_eq!(config.bind_addr, AppConfig::default().bind_addr);
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert!(config.backend.is_none());
        assert!(config.youtube_api_key.is_none());
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        std::env::set_var("OSCARS_BIND_ADDR", "127.0.0.1:8080");
        std::env::set_var("OSCARS_DEFAULT_YEAR", "2025");
        std::env::set_var("OSCARS_ANIMATED_TAIL", " 2 ");
        std::env::set_var("OSCARS_REVEAL_ANIMATION_MS", "100");
        std::env::set_var("YOUTUBE_API_KEY", "yt-key");
        std::env::set_var("SUPABASE_URL", "https://x.supabase.co");
        std::env::set_var("SUPABASE_ANON_KEY", "anon");

        let config = AppConfig::from_env();
        assert_eq!(config.bind_addr, SocketAddr::from(([127, 0, 0, 1], 8080)));
        assert_eq!(config.default_year, 2025);
        assert_eq!(config.animated_tail, 2);
        assert_eq!(config.reveal_animation, Duration::from_millis(100));
        assert_eq!(config.youtube_api_key.as_deref(), Some("yt-key"));
        assert_eq!(
            config.backend,
            Some(BackendConfig {
                url: "https://x.supabase.co".to_string(),
                api_key: "anon".to_string(),
            })
        );
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_caps_reveal_animation() {
        clear_env();
        std::env::set_var("OSCARS_REVEAL_ANIMATION_MS", u64::MAX.to_string());

        let config = AppConfig::from_env();
        assert_eq!(config.reveal_animation, MAX_REVEAL_ANIMATION);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_partial_backend_is_disabled() {
        clear_env();
        std::env::set_var("SUPABASE_URL", "https://x.supabase.co");
        std::env::set_var("OSCARS_DEFAULT_YEAR", "not-a-year");

        let config = AppConfig::from_env();
        assert!(config.backend.is_none());
        assert_eq!(config.default_year, 2026);
        clear_env();
    }
}
