//! HTTP API endpoints.
//!
//! Read-only access to the loaded ceremonies, for pages that render without
//! a WebSocket session.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;
use crate::types::Year;

#[derive(Debug, Clone, Serialize)]
pub struct YearsResponse {
    pub years: Vec<Year>,
    /// Year a new session starts on
    pub default_year: Option<Year>,
}

/// GET /api/years
pub async fn list_years(State(state): State<Arc<AppState>>) -> Json<YearsResponse> {
    Json(YearsResponse {
        years: state.years(),
        default_year: state.initial_ceremony().map(|c| c.year),
    })
}

/// GET /api/ceremony/{year}
///
/// The normalized dataset. Picks are part of it, so this is the curator's
/// view and not something the reveal flow depends on.
pub async fn get_ceremony(State(state): State<Arc<AppState>>, Path(year): Path<Year>) -> Response {
    match state.ceremony(year) {
        Some(ceremony) => Json(ceremony.as_ref().clone()).into_response(),
        None => (StatusCode::NOT_FOUND, format!("No ceremony for {}", year)).into_response(),
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/years", get(list_years))
        .route("/api/ceremony/{year}", get(get_ceremony))
}
