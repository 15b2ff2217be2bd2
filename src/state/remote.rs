//! Calls to optional remote services. None of these ever fail the caller:
//! errors are logged and turn into "nothing".

use super::*;
use crate::backend::RemoteVote;

impl AppState {
    /// Mirror a local vote to the hosted backend in the background
    pub fn mirror_vote(&self, vote: RemoteVote) {
        let Some(backend) = self.backend.clone() else {
            return;
        };
        tokio::spawn(async move {
            let label = format!("{}_{}", vote.year, vote.category);
            match backend.submit_vote(vote).await {
                Ok(()) => tracing::debug!("Vote for {} mirrored to {}", label, backend.name()),
                Err(e) => tracing::warn!("Failed to mirror vote for {}: {}", label, e),
            }
        });
    }

    /// Aggregate counts of all visitors, when a backend is configured
    pub async fn remote_tally(
        &self,
        year: Year,
        category: &str,
    ) -> Option<HashMap<NomineeId, u32>> {
        let backend = self.backend.as_ref()?;
        match backend.category_stats(year, category).await {
            Ok(counts) => Some(counts),
            Err(e) => {
                tracing::warn!(
                    "Failed to fetch {} stats for {}_{}: {}",
                    backend.name(),
                    year,
                    category,
                    e
                );
                None
            }
        }
    }

    pub async fn search_trailer(&self, title: &str) -> Option<String> {
        let trailers = self.trailers.as_ref()?;
        match trailers.search(title).await {
            Ok(found) => {
                if found.is_none() {
                    tracing::debug!("No trailer found for {}", title);
                }
                found
            }
            Err(e) => {
                tracing::warn!("Trailer search for {} failed: {}", title, e);
                None
            }
        }
    }
}
