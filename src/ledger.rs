//! Per-category vote ledger.
//!
//! One ledger exists per voting period, a period being `(year, category)`.
//! Storage layout, shared with every other ledger on the same store:
//!
//! - `oscars_vote_{year}_{category}` → `"true"` once this client voted
//! - `oscars_vote_{year}_{category}_choice` → the chosen nominee id
//! - `oscars_vote_stats` → `{ "{year}_{category}": { nomineeId: count } }`
//!
//! Storage failures never escape the ledger: unreadable records start a fresh
//! period and failed writes only log, keeping the in-memory vote.

use crate::storage::KeyValueStore;
use crate::types::{NomineeId, Year};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

pub const STORAGE_KEY_PREFIX: &str = "oscars_vote_";
pub const VOTE_STATS_KEY: &str = "oscars_vote_stats";

pub type Tally = HashMap<NomineeId, u32>;

/// All tallies keyed by period
type AllStats = HashMap<String, Tally>;

/// Identifies a voting period
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeriodKey {
    pub year: Year,
    pub category: String,
}

impl PeriodKey {
    pub fn new(year: Year, category: impl Into<String>) -> Self {
        Self {
            year,
            category: category.into(),
        }
    }

    /// `{year}_{category}`, the key inside the stats record
    pub fn stats_key(&self) -> String {
        format!("{}_{}", self.year, self.category)
    }

    pub fn receipt_key(&self) -> String {
        format!("{}{}", STORAGE_KEY_PREFIX, self.stats_key())
    }

    pub fn choice_key(&self) -> String {
        format!("{}_choice", self.receipt_key())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoteState {
    pub has_voted: bool,
    pub user_choice: Option<NomineeId>,
    pub tally: Tally,
    /// Volatile, never persisted
    #[serde(skip)]
    pub pending_selection: Option<NomineeId>,
}

/// Outcome of [`VoteLedger::submit`]
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Recorded { nominee: NomineeId, count: u32 },
    NoSelection,
    AlreadyVoted,
}

pub struct VoteLedger {
    key: PeriodKey,
    store: Arc<dyn KeyValueStore>,
    state: VoteState,
    show_results: bool,
    show_my_vote: bool,
}

impl VoteLedger {
    /// Load the period from storage, starting fresh on any read failure
    pub fn load(key: PeriodKey, store: Arc<dyn KeyValueStore>) -> Self {
        let has_voted = match store.get(&key.receipt_key()) {
            Ok(receipt) => receipt.is_some(),
            Err(e) => {
                tracing::warn!("Failed to read vote receipt for {}: {}", key.stats_key(), e);
                false
            }
        };

        let user_choice = if has_voted {
            store.get(&key.choice_key()).unwrap_or_else(|e| {
                tracing::warn!("Failed to read vote choice for {}: {}", key.stats_key(), e);
                None
            })
        } else {
            None
        };

        let tally = read_stats(store.as_ref())
            .and_then(|mut all| all.remove(&key.stats_key()))
            .unwrap_or_default();

        Self {
            key,
            store,
            state: VoteState {
                has_voted,
                user_choice,
                tally,
                pending_selection: None,
            },
            show_results: false,
            show_my_vote: true,
        }
    }

    pub fn key(&self) -> &PeriodKey {
        &self.key
    }

    pub fn state(&self) -> &VoteState {
        &self.state
    }

    pub fn has_voted(&self) -> bool {
        self.state.has_voted
    }

    pub fn user_choice(&self) -> Option<&NomineeId> {
        self.state.user_choice.as_ref()
    }

    pub fn pending_selection(&self) -> Option<&NomineeId> {
        self.state.pending_selection.as_ref()
    }

    pub fn show_results(&self) -> bool {
        self.show_results
    }

    pub fn show_my_vote(&self) -> bool {
        self.show_my_vote
    }

    /// Select a nominee before voting; selecting the same one again clears it.
    /// Returns false when the ledger ignored the call.
    pub fn select(&mut self, nominee: &str) -> bool {
        if self.state.has_voted {
            return false;
        }

        if self.state.pending_selection.as_deref() == Some(nominee) {
            self.state.pending_selection = None;
        } else {
            self.state.pending_selection = Some(nominee.to_string());
        }
        true
    }

    /// Cast the pending selection as this client's vote
    pub fn submit(&mut self) -> SubmitOutcome {
        if self.state.has_voted {
            return SubmitOutcome::AlreadyVoted;
        }
        let Some(nominee) = self.state.pending_selection.take() else {
            return SubmitOutcome::NoSelection;
        };

        let stats_key = self.key.stats_key();

        // Merge with what other ledgers wrote since we loaded, never going
        // below a count this ledger has already seen
        let mut all = read_stats(self.store.as_ref()).unwrap_or_default();
        let tally = all.entry(stats_key.clone()).or_default();
        for (seen, seen_count) in &self.state.tally {
            let stored = tally.entry(seen.clone()).or_insert(0);
            *stored = (*stored).max(*seen_count);
        }
        let count = tally.entry(nominee.clone()).or_insert(0);
        *count += 1;
        let count = *count;

        self.state.tally = tally.clone();
        self.state.has_voted = true;
        self.state.user_choice = Some(nominee.clone());

        self.persist(&all, &nominee);

        tracing::info!("Vote recorded for {}: {} ({} total)", stats_key, nominee, count);
        SubmitOutcome::Recorded { nominee, count }
    }

    /// Write stats, receipt and choice as one store update
    fn persist(&self, all: &AllStats, nominee: &str) {
        let receipt_key = self.key.receipt_key();
        let choice_key = self.key.choice_key();
        let stats = match serde_json::to_string(all) {
            Ok(json) => Some(json),
            Err(e) => {
                tracing::warn!("Failed to serialize vote stats: {}", e);
                None
            }
        };

        let mut pairs = vec![(receipt_key.as_str(), "true"), (choice_key.as_str(), nominee)];
        if let Some(json) = &stats {
            pairs.push((VOTE_STATS_KEY, json.as_str()));
        }
        if let Err(e) = self.store.set_many(&pairs) {
            tracing::warn!("Failed to persist vote for {}: {}", self.key.stats_key(), e);
        }
    }

    /// Re-read the tally from storage; never lowers an in-memory count
    pub fn refresh_tally(&mut self) {
        let Some(mut all) = read_stats(self.store.as_ref()) else {
            return;
        };
        let stored = all.remove(&self.key.stats_key()).unwrap_or_default();
        for (nominee, count) in stored {
            let current = self.state.tally.entry(nominee).or_insert(0);
            *current = (*current).max(count);
        }
    }

    pub fn toggle_show_results(&mut self) {
        self.show_results = !self.show_results;
    }

    pub fn toggle_show_my_vote(&mut self) {
        self.show_my_vote = !self.show_my_vote;
    }

    pub fn display_count(&self, nominee: &str) -> u32 {
        self.state.tally.get(nominee).copied().unwrap_or(0)
    }

    pub fn should_show_counts(&self) -> bool {
        self.show_results || self.state.has_voted
    }

    /// Whether the vote button can do anything right now
    pub fn can_submit(&self) -> bool {
        !self.state.has_voted && self.state.pending_selection.is_some()
    }
}

/// Read the shared stats record; `None` when it is unreadable or corrupt
fn read_stats(store: &dyn KeyValueStore) -> Option<AllStats> {
    match store.get(VOTE_STATS_KEY) {
        Ok(None) => Some(AllStats::new()),
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(all) => Some(all),
            Err(e) => {
                tracing::warn!("Corrupt vote stats record, ignoring it: {}", e);
                None
            }
        },
        Err(e) => {
            tracing::warn!("Failed to read vote stats: {}", e);
            None
        }
    }
}
