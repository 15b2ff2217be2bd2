// Public API for integration tests and potential library usage

pub mod api;
pub mod backend;
pub mod config;
pub mod dataset;
pub mod ledger;
pub mod media;
pub mod protocol;
pub mod reveal;
pub mod session;
pub mod state;
pub mod storage;
pub mod types;
pub mod ws;

use axum::{routing::get, Router};
use state::AppState;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

/// Full HTTP surface: WebSocket, JSON API, static site as fallback
pub fn app(state: Arc<AppState>) -> Router {
    let static_dir = state.config.static_dir.clone();
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .merge(api::router())
        .fallback_service(ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
