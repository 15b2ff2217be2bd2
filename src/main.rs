use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use oscars::{config::AppConfig, dataset, state::AppState, storage::JsonFileStore};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oscars=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Oscars presentation...");

    let config = AppConfig::from_env();

    let ceremonies = dataset::load_dir(&config.data_dir);
    if ceremonies.is_empty() {
        tracing::warn!(
            "No ceremony data found in {}; sessions will be refused",
            config.data_dir.display()
        );
    } else {
        tracing::info!(
            "Loaded ceremonies: {:?}",
            ceremonies.keys().collect::<Vec<_>>()
        );
    }

    let store = Arc::new(JsonFileStore::open_or_reset(config.store_path.clone()));
    let addr = config.bind_addr;

    let state = Arc::new(AppState::from_config(config, ceremonies, store));
    let app = oscars::app(state);

    tracing::info!("Listening on http://{}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
