//! Optional hosted vote backend.
//!
//! When a hosted database is configured, every local vote is mirrored to it
//! and the "show results" view can pull the aggregate counts of all visitors.
//! Without one the local ledger is the only source of truth.

mod rest;

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use crate::types::{NomineeId, VisitorId, Year};

pub use rest::RestBackend;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors that can occur while talking to the hosted backend
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Response parsing failed: {0}")]
    ParseError(String),
}

/// A vote as the backend stores it
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteVote {
    pub year: Year,
    /// Category name, not its id
    pub category: String,
    pub nominee_id: NomineeId,
    pub voter_id: VisitorId,
}

/// Remote vote submission and aggregation
#[async_trait]
pub trait VoteBackend: Send + Sync {
    /// Record one vote
    async fn submit_vote(&self, vote: RemoteVote) -> BackendResult<()>;

    /// Vote counts per nominee for a category
    async fn category_stats(
        &self,
        year: Year,
        category: &str,
    ) -> BackendResult<HashMap<NomineeId, u32>>;

    /// Name used in logs
    fn name(&self) -> &str;
}
