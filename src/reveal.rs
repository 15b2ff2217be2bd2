//! Reveal sequencing for the curator's picks.
//!
//! Each category moves between `Hidden`, `Animating` and `Revealed`. The last
//! few categories of a ceremony get a one-time curtain animation before the
//! pick is shown; everything else reveals instantly. Only one curtain can be
//! up at a time since it covers the whole page.

use crate::types::{Category, CategoryId, NomineeId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Number of trailing categories that get the curtain animation
pub const DEFAULT_ANIMATED_TAIL: usize = 4;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevealPhase {
    #[default]
    Hidden,
    Animating,
    Revealed,
}

/// Snapshot of one category's reveal state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RevealState {
    pub phase: RevealPhase,
    /// Set when the curtain was shown once; never cleared within a session
    pub animated: bool,
}

/// What a trigger did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealOutcome {
    Revealed,
    Hidden,
    AnimationStarted,
    Ignored,
}

/// Pure transition for a reveal trigger.
///
/// `eligible` says whether the category is in the animated tail, `busy`
/// whether some category's curtain is currently up.
pub fn on_trigger(state: RevealState, eligible: bool, busy: bool) -> (RevealState, RevealOutcome) {
    match state.phase {
        RevealPhase::Revealed => (
            RevealState {
                phase: RevealPhase::Hidden,
                ..state
            },
            RevealOutcome::Hidden,
        ),
        RevealPhase::Animating => (state, RevealOutcome::Ignored),
        RevealPhase::Hidden if busy => (state, RevealOutcome::Ignored),
        RevealPhase::Hidden if eligible && !state.animated => (
            RevealState {
                phase: RevealPhase::Animating,
                animated: true,
            },
            RevealOutcome::AnimationStarted,
        ),
        RevealPhase::Hidden => (
            RevealState {
                phase: RevealPhase::Revealed,
                ..state
            },
            RevealOutcome::Revealed,
        ),
    }
}

/// Pure transition for the end of a curtain animation
pub fn on_complete(state: RevealState) -> RevealState {
    match state.phase {
        RevealPhase::Animating => RevealState {
            phase: RevealPhase::Revealed,
            ..state
        },
        _ => state,
    }
}

/// Reveal state for every category of one page session
#[derive(Debug, Clone)]
pub struct RevealController {
    order: Vec<CategoryId>,
    picks: HashMap<CategoryId, NomineeId>,
    states: HashMap<CategoryId, RevealState>,
    animating: Option<CategoryId>,
    animated_tail: usize,
}

impl RevealController {
    pub fn new(categories: &[Category], animated_tail: usize) -> Self {
        Self {
            order: categories.iter().map(|c| c.id.clone()).collect(),
            picks: categories
                .iter()
                .filter_map(|c| c.curator_pick().map(|pick| (c.id.clone(), pick.clone())))
                .collect(),
            states: HashMap::new(),
            animating: None,
            animated_tail,
        }
    }

    pub fn state(&self, category: &str) -> RevealState {
        self.states.get(category).copied().unwrap_or_default()
    }

    pub fn phase(&self, category: &str) -> RevealPhase {
        self.state(category).phase
    }

    /// Category whose curtain is currently up
    pub fn animating(&self) -> Option<&CategoryId> {
        self.animating.as_ref()
    }

    /// Whether the category sits in the animated tail of the ceremony
    pub fn is_eligible(&self, category: &str) -> bool {
        match self.order.iter().position(|id| id == category) {
            Some(index) => index + self.animated_tail >= self.order.len(),
            None => false,
        }
    }

    pub fn trigger(&mut self, category: &str) -> RevealOutcome {
        if !self.order.iter().any(|id| id == category) {
            tracing::warn!("Reveal requested for unknown category {}", category);
            return RevealOutcome::Ignored;
        }
        if !self.picks.contains_key(category) {
            tracing::debug!("Category {} has no pick to reveal", category);
            return RevealOutcome::Ignored;
        }

        let busy = self.animating.is_some();
        let (next, outcome) = on_trigger(self.state(category), self.is_eligible(category), busy);
        self.states.insert(category.to_string(), next);

        match outcome {
            RevealOutcome::AnimationStarted => {
                self.animating = Some(category.to_string());
                tracing::info!("Curtain animation started for {}", category);
            }
            RevealOutcome::Ignored => {
                tracing::debug!("Reveal of {} ignored, another curtain is up", category);
            }
            RevealOutcome::Revealed | RevealOutcome::Hidden => {}
        }
        outcome
    }

    /// Finish the curtain for `category`. Returns false if it was not the one
    /// animating.
    pub fn complete_animation(&mut self, category: &str) -> bool {
        if self.animating.as_deref() != Some(category) {
            return false;
        }
        self.animating = None;
        let next = on_complete(self.state(category));
        self.states.insert(category.to_string(), next);
        tracing::info!("Curtain animation completed for {}", category);
        true
    }

    /// The viewer navigated away mid-animation: finish it now
    pub fn on_external_interrupt(&mut self) -> Option<CategoryId> {
        let category = self.animating.clone()?;
        tracing::debug!("Curtain animation for {} interrupted", category);
        self.complete_animation(&category);
        Some(category)
    }

    pub fn is_winner_highlighted(&self, category: &str, nominee: &str) -> bool {
        self.phase(category) == RevealPhase::Revealed
            && self.picks.get(category).map(String::as_str) == Some(nominee)
    }

    pub fn is_losing_nominee(&self, category: &str, nominee: &str) -> bool {
        self.phase(category) == RevealPhase::Revealed
            && self.picks.get(category).map(String::as_str) != Some(nominee)
    }
}

/// Visual stage of the curtain animation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CurtainStage {
    Closing,
    ShowingText,
    FadingText,
    Opening,
}

/// Longest curtain animation accepted; keeps timer deadlines representable
pub const MAX_REVEAL_ANIMATION: Duration = Duration::from_secs(60);

/// When each curtain stage starts, relative to the start of the animation
#[derive(Debug, Clone, PartialEq)]
pub struct CurtainTimeline {
    pub stages: Vec<(Duration, CurtainStage)>,
    pub total: Duration,
}

impl Default for CurtainTimeline {
    fn default() -> Self {
        Self {
            stages: vec![
                (Duration::from_millis(100), CurtainStage::Closing),
                (Duration::from_millis(1700), CurtainStage::ShowingText),
                (Duration::from_millis(5700), CurtainStage::FadingText),
                (Duration::from_millis(6700), CurtainStage::Opening),
            ],
            total: Duration::from_millis(8200),
        }
    }
}

impl CurtainTimeline {
    /// Default choreography stretched or squeezed to `total`, capped at
    /// [`MAX_REVEAL_ANIMATION`]
    pub fn scaled(total: Duration) -> Self {
        let total = total.min(MAX_REVEAL_ANIMATION);
        let base = Self::default();
        let ratio = total.as_secs_f64() / base.total.as_secs_f64();
        Self {
            stages: base
                .stages
                .into_iter()
                .map(|(at, stage)| (at.mul_f64(ratio), stage))
                .collect(),
            total,
        }
    }

    /// Stage visible `elapsed` after the start, `None` before the curtain
    /// starts closing or once it is fully open
    pub fn stage_at(&self, elapsed: Duration) -> Option<CurtainStage> {
        if elapsed >= self.total {
            return None;
        }
        self.stages
            .iter()
            .take_while(|(at, _)| *at <= elapsed)
            .last()
            .map(|(_, stage)| *stage)
    }
}
