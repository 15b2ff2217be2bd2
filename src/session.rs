//! One visitor's page session.
//!
//! A `Presentation` owns the reveal controller for the ceremony being shown,
//! one vote ledger per category, and the purely presentational state around
//! them (scroll position, image rotation, trailer modal, language). It is
//! driven by a single task, so nothing in here is shared or locked.

use crate::ledger::{PeriodKey, SubmitOutcome, VoteLedger};
use crate::media::{actor_image_path, film_image_path, nominee_image_paths, youtube_video_id};
use crate::reveal::{RevealController, RevealOutcome, RevealPhase};
use crate::storage::KeyValueStore;
use crate::types::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Category whose portraits never rotate on click
const ROTATION_EXEMPT_CATEGORY: &str = "Directing";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Unknown nominee {nominee} in {category}")]
    UnknownNominee { category: String, nominee: String },
}

pub type SessionResult<T> = Result<T, SessionError>;

/// A curtain that came down, and the video it opened if any
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationEnd {
    pub category: CategoryId,
    pub trailer: Option<String>,
}

/// Result of a reveal trigger
#[derive(Debug, Clone, PartialEq)]
pub struct RevealResult {
    pub outcome: RevealOutcome,
    /// Video opened because the pick was revealed
    pub trailer: Option<String>,
}

/// What to do about a trailer after a nominee click
#[derive(Debug, Clone, PartialEq)]
pub enum TrailerLookup {
    /// The dataset had a usable link
    Open(String),
    /// Needs a search by film title; the result is only applied if `seq` is
    /// still current
    Search { seq: u64, title: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct NomineeClick {
    /// New image after rotation, if the card rotated
    pub image: Option<String>,
    pub trailer: TrailerLookup,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScrollOutcome {
    /// Set when the active section changed
    pub active_section: Option<usize>,
    /// Set when the scroll cut a running curtain short
    pub interrupted: Option<AnimationEnd>,
}

/// Scroll bookkeeping; sections are the intro, one per category, then the
/// closing section
#[derive(Debug, Clone)]
struct ScrollTracker {
    last_y: f64,
    active: usize,
    threshold: f64,
}

impl ScrollTracker {
    fn new(threshold: f64) -> Self {
        Self {
            last_y: 0.0,
            active: 0,
            threshold,
        }
    }

    /// Returns the new active section if it changed, and whether the move
    /// was large enough to count as navigating away
    fn update(&mut self, y: f64, viewport: f64, categories: usize) -> (Option<usize>, bool) {
        let y = y.max(0.0);
        let jumped = (y - self.last_y).abs() > self.threshold;
        self.last_y = y;

        let section = if viewport > 0.0 {
            ((y / viewport).floor() as usize).min(categories + 1)
        } else {
            self.active
        };
        let changed = (section != self.active).then(|| {
            self.active = section;
            section
        });
        (changed, jumped)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NomineeView {
    pub id: NomineeId,
    pub title: String,
    pub description: String,
    pub not_seen: bool,
    pub image: Option<String>,
    pub is_winner: bool,
    pub is_losing: bool,
    /// Only set once the category is revealed
    pub is_official: bool,
    pub is_selected: bool,
    pub is_user_choice: bool,
    /// Present when the category shows its counts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub votes: Option<u32>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryView {
    pub id: CategoryId,
    pub name: String,
    pub phase: RevealPhase,
    pub has_voted: bool,
    pub can_submit: bool,
    pub show_results: bool,
    pub show_my_vote: bool,
    pub show_counts: bool,
    pub nominees: Vec<NomineeView>,
}

pub struct Presentation {
    visitor_id: VisitorId,
    ceremony: Arc<Ceremony>,
    reveal: RevealController,
    ledgers: HashMap<CategoryId, VoteLedger>,
    store: Arc<dyn KeyValueStore>,
    animated_tail: usize,
    scroll: ScrollTracker,
    image_indices: HashMap<String, usize>,
    valid_images: HashSet<String>,
    language: Language,
    trailer: Option<String>,
    trailer_seq: u64,
}

impl Presentation {
    pub fn new(
        visitor_id: VisitorId,
        ceremony: Arc<Ceremony>,
        store: Arc<dyn KeyValueStore>,
        animated_tail: usize,
        scroll_threshold: f64,
    ) -> Self {
        let reveal = RevealController::new(&ceremony.categories, animated_tail);
        let ledgers = load_ledgers(&ceremony, &store);
        Self {
            visitor_id,
            ceremony,
            reveal,
            ledgers,
            store,
            animated_tail,
            scroll: ScrollTracker::new(scroll_threshold),
            image_indices: HashMap::new(),
            valid_images: HashSet::new(),
            language: Language::default(),
            trailer: None,
            trailer_seq: 0,
        }
    }

    pub fn visitor_id(&self) -> &str {
        &self.visitor_id
    }

    pub fn ceremony(&self) -> &Arc<Ceremony> {
        &self.ceremony
    }

    pub fn year(&self) -> Year {
        self.ceremony.year
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn trailer(&self) -> Option<&str> {
        self.trailer.as_deref()
    }

    pub fn active_section(&self) -> usize {
        self.scroll.active
    }

    pub fn animating(&self) -> Option<&CategoryId> {
        self.reveal.animating()
    }

    /// Swap in another year. Everything but the language starts over.
    pub fn switch_ceremony(&mut self, ceremony: Arc<Ceremony>) {
        tracing::debug!(
            "Visitor {} switching from {} to {}",
            self.visitor_id,
            self.ceremony.year,
            ceremony.year
        );
        self.reveal = RevealController::new(&ceremony.categories, self.animated_tail);
        self.ledgers = load_ledgers(&ceremony, &self.store);
        self.ceremony = ceremony;
        self.scroll = ScrollTracker::new(self.scroll.threshold);
        self.image_indices.clear();
        self.valid_images.clear();
        self.close_trailer();
    }

    /// Names whose guessed poster or portrait exists
    pub fn set_valid_images(&mut self, names: HashSet<String>) {
        self.valid_images = names;
    }

    pub fn toggle_language(&mut self) -> Language {
        self.language = self.language.toggled();
        self.language
    }

    fn category(&self, category: &str) -> SessionResult<&Category> {
        self.ceremony
            .category(category)
            .ok_or_else(|| SessionError::UnknownCategory(category.to_string()))
    }

    fn ledger_mut(&mut self, category: &str) -> SessionResult<&mut VoteLedger> {
        self.ledgers
            .get_mut(category)
            .ok_or_else(|| SessionError::UnknownCategory(category.to_string()))
    }

    pub fn ledger(&self, category: &str) -> SessionResult<&VoteLedger> {
        self.ledgers
            .get(category)
            .ok_or_else(|| SessionError::UnknownCategory(category.to_string()))
    }

    pub fn reveal_phase(&self, category: &str) -> RevealPhase {
        self.reveal.phase(category)
    }

    pub fn reveal(&mut self, category: &str) -> SessionResult<RevealResult> {
        self.category(category)?;
        let outcome = self.reveal.trigger(category);
        let trailer = match outcome {
            RevealOutcome::Revealed => self.open_reveal_video(category),
            RevealOutcome::Hidden => {
                let has_video = self
                    .ceremony
                    .category(category)
                    .is_some_and(|c| c.reveal_video.is_some());
                if has_video {
                    self.close_trailer();
                }
                None
            }
            RevealOutcome::AnimationStarted | RevealOutcome::Ignored => None,
        };
        Ok(RevealResult { outcome, trailer })
    }

    /// The curtain for `category` finished; stale completions return `None`
    pub fn complete_animation(&mut self, category: &str) -> Option<AnimationEnd> {
        if !self.reveal.complete_animation(category) {
            return None;
        }
        Some(AnimationEnd {
            category: category.to_string(),
            trailer: self.open_reveal_video(category),
        })
    }

    pub fn interrupt_animation(&mut self) -> Option<AnimationEnd> {
        let category = self.reveal.on_external_interrupt()?;
        let trailer = self.open_reveal_video(&category);
        Some(AnimationEnd { category, trailer })
    }

    fn open_reveal_video(&mut self, category: &str) -> Option<String> {
        let video = self.ceremony.category(category)?.reveal_video.clone()?;
        let id = youtube_video_id(&video).unwrap_or(video);
        self.trailer_seq += 1;
        self.trailer = Some(id.clone());
        Some(id)
    }

    pub fn scroll(&mut self, y: f64, viewport: f64) -> ScrollOutcome {
        let categories = self.ceremony.categories.len();
        let (active_section, jumped) = self.scroll.update(y, viewport, categories);
        let interrupted = if jumped && self.reveal.animating().is_some() {
            self.interrupt_animation()
        } else {
            None
        };
        ScrollOutcome {
            active_section,
            interrupted,
        }
    }

    pub fn select_nominee(&mut self, category: &str, nominee: &str) -> SessionResult<bool> {
        let known = self.category(category)?.nominee(nominee).is_some();
        if !known {
            return Err(SessionError::UnknownNominee {
                category: category.to_string(),
                nominee: nominee.to_string(),
            });
        }
        Ok(self.ledger_mut(category)?.select(nominee))
    }

    pub fn submit_vote(&mut self, category: &str) -> SessionResult<SubmitOutcome> {
        Ok(self.ledger_mut(category)?.submit())
    }

    pub fn toggle_results(&mut self, category: &str) -> SessionResult<bool> {
        let ledger = self.ledger_mut(category)?;
        ledger.toggle_show_results();
        if ledger.show_results() {
            ledger.refresh_tally();
        }
        Ok(ledger.show_results())
    }

    pub fn toggle_my_vote(&mut self, category: &str) -> SessionResult<bool> {
        let ledger = self.ledger_mut(category)?;
        ledger.toggle_show_my_vote();
        Ok(ledger.show_my_vote())
    }

    /// Rotate the portrait (outside the exempt category) and work out which
    /// trailer to open
    pub fn click_nominee(&mut self, category: &str, nominee: &str) -> SessionResult<NomineeClick> {
        let cat = self.category(category)?;
        let exempt = cat.name == ROTATION_EXEMPT_CATEGORY;
        let found = cat
            .nominee(nominee)
            .cloned()
            .ok_or_else(|| SessionError::UnknownNominee {
                category: category.to_string(),
                nominee: nominee.to_string(),
            })?;

        let image = match &found.person {
            Some(person) if !exempt => {
                let total = nominee_image_paths(&found).len().max(1);
                let index = self.image_indices.entry(person.name.clone()).or_insert(0);
                *index = (*index + 1) % total;
                self.nominee_image(&found)
            }
            _ => None,
        };

        self.trailer_seq += 1;
        let trailer = match found.film.trailer.as_deref().and_then(youtube_video_id) {
            Some(id) => {
                self.trailer = Some(id.clone());
                TrailerLookup::Open(id)
            }
            None => TrailerLookup::Search {
                seq: self.trailer_seq,
                title: found.film.title.clone(),
            },
        };

        Ok(NomineeClick { image, trailer })
    }

    /// Apply a finished trailer search. Returns false if a newer click or a
    /// close superseded it.
    pub fn trailer_found(&mut self, seq: u64, video_id: Option<String>) -> bool {
        if seq != self.trailer_seq {
            tracing::debug!("Dropping stale trailer result (seq {} != {})", seq, self.trailer_seq);
            return false;
        }
        self.trailer = video_id;
        true
    }

    pub fn close_trailer(&mut self) {
        self.trailer = None;
        self.trailer_seq += 1;
    }

    /// Image currently shown on a nominee card
    pub fn nominee_image(&self, nominee: &Nominee) -> Option<String> {
        let year = self.ceremony.year;
        match &nominee.person {
            Some(person) => {
                let index = self.image_indices.get(&person.name).copied().unwrap_or(0);
                let listed = nominee_image_paths(nominee);
                if let Some(path) = listed.get(index) {
                    Some(path.clone())
                } else if index > 0 || self.valid_images.contains(&person.name) {
                    Some(actor_image_path(year, &person.name, index))
                } else {
                    None
                }
            }
            None => {
                if let Some(poster) = &nominee.film.poster {
                    Some(poster.path.clone())
                } else if self.valid_images.contains(&nominee.film.title) {
                    Some(film_image_path(year, &nominee.film.title))
                } else {
                    None
                }
            }
        }
    }

    pub fn category_view(&self, category: &str) -> SessionResult<CategoryView> {
        let cat = self.category(category)?;
        let ledger = self.ledger(category)?;
        let phase = self.reveal.phase(category);
        let show_counts = ledger.should_show_counts();

        let nominees = cat
            .nominees
            .iter()
            .map(|n| NomineeView {
                id: n.id.clone(),
                title: n.title().to_string(),
                description: n.description(),
                not_seen: n.metadata.not_seen,
                image: self.nominee_image(n),
                is_winner: self.reveal.is_winner_highlighted(category, &n.id),
                is_losing: self.reveal.is_losing_nominee(category, &n.id),
                is_official: phase == RevealPhase::Revealed
                    && cat.winners.official.as_deref() == Some(n.id.as_str()),
                is_selected: ledger.pending_selection().map(String::as_str) == Some(n.id.as_str()),
                is_user_choice: ledger.has_voted()
                    && ledger.show_my_vote()
                    && ledger.user_choice().map(String::as_str) == Some(n.id.as_str()),
                votes: show_counts.then(|| ledger.display_count(&n.id)),
            })
            .collect();

        Ok(CategoryView {
            id: cat.id.clone(),
            name: cat.name.clone(),
            phase,
            has_voted: ledger.has_voted(),
            can_submit: ledger.can_submit(),
            show_results: ledger.show_results(),
            show_my_vote: ledger.show_my_vote(),
            show_counts,
            nominees,
        })
    }

    pub fn ceremony_view(&self) -> Vec<CategoryView> {
        self.ceremony
            .categories
            .iter()
            .filter_map(|c| self.category_view(&c.id).ok())
            .collect()
    }
}

fn load_ledgers(
    ceremony: &Ceremony,
    store: &Arc<dyn KeyValueStore>,
) -> HashMap<CategoryId, VoteLedger> {
    ceremony
        .categories
        .iter()
        .map(|c| {
            // Periods are filed under the category name
            let key = PeriodKey::new(ceremony.year, c.name.clone());
            (c.id.clone(), VoteLedger::load(key, store.clone()))
        })
        .collect()
}
