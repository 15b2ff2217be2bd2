//! WebSocket message dispatch
//!
//! Client messages and internal session events both end up here. Each call
//! returns the messages to send back to the page, in order.

use crate::backend::RemoteVote;
use crate::ledger::SubmitOutcome;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::reveal::{CurtainTimeline, RevealOutcome};
use crate::session::{AnimationEnd, Presentation, SessionError, TrailerLookup};
use crate::state::AppState;
use std::sync::Arc;
use tokio::task::AbortHandle;

use super::tasks::{self, EventSender, SessionEvent};

/// Everything a handler needs besides the presentation itself
pub struct SessionContext {
    pub state: Arc<AppState>,
    pub events: EventSender,
    curtain: Option<AbortHandle>,
}

impl SessionContext {
    pub fn new(state: Arc<AppState>, events: EventSender) -> Self {
        Self {
            state,
            events,
            curtain: None,
        }
    }

    fn start_curtain(&mut self, category: &str) {
        self.stop_curtain();
        let timeline = CurtainTimeline::scaled(self.state.config.reveal_animation);
        self.curtain = Some(tasks::spawn_curtain(
            self.events.clone(),
            category.to_string(),
            timeline,
        ));
    }

    /// Cancel the running curtain timer, if any
    pub fn stop_curtain(&mut self) {
        if let Some(handle) = self.curtain.take() {
            handle.abort();
        }
    }
}

impl Drop for SessionContext {
    fn drop(&mut self) {
        self.stop_curtain();
    }
}

fn session_error(e: SessionError) -> ServerMessage {
    let code = match e {
        SessionError::UnknownCategory(_) => "UNKNOWN_CATEGORY",
        SessionError::UnknownNominee { .. } => "UNKNOWN_NOMINEE",
    };
    ServerMessage::error(code, e.to_string())
}

/// Full render of the current ceremony
pub fn ceremony_message(presentation: &Presentation) -> ServerMessage {
    ServerMessage::Ceremony {
        year: presentation.year(),
        active_section: presentation.active_section(),
        categories: presentation.ceremony_view(),
    }
}

/// Name the category's votes are filed under, locally and remotely
fn period_name(presentation: &Presentation, category: &str) -> String {
    presentation
        .ledger(category)
        .map(|ledger| ledger.key().category.clone())
        .unwrap_or_else(|_| category.to_string())
}

fn category_message(presentation: &Presentation, category: &str) -> ServerMessage {
    match presentation.category_view(category) {
        Ok(view) => ServerMessage::Category { category: view },
        Err(e) => session_error(e),
    }
}

/// Push a trailer update only when the modal content changed
fn push_trailer_change(
    out: &mut Vec<ServerMessage>,
    before: Option<String>,
    presentation: &Presentation,
) {
    if before.as_deref() != presentation.trailer() {
        out.push(ServerMessage::Trailer {
            video_id: presentation.trailer().map(str::to_string),
        });
    }
}

fn finish_animation(
    out: &mut Vec<ServerMessage>,
    end: AnimationEnd,
    presentation: &Presentation,
    trailer_before: Option<String>,
) {
    out.push(category_message(presentation, &end.category));
    push_trailer_change(out, trailer_before, presentation);
}

/// Handle a client message and return the responses
pub async fn handle_message(
    msg: ClientMessage,
    presentation: &mut Presentation,
    ctx: &mut SessionContext,
) -> Vec<ServerMessage> {
    let trailer_before = presentation.trailer().map(str::to_string);
    let mut out = Vec::new();

    match msg {
        ClientMessage::SelectYear { year } => {
            let Some(ceremony) = ctx.state.ceremony(year) else {
                tracing::warn!("Visitor {} asked for unknown year {}", presentation.visitor_id(), year);
                return vec![ServerMessage::error(
                    "UNKNOWN_YEAR",
                    format!("No ceremony for {}", year),
                )];
            };
            ctx.stop_curtain();
            presentation.switch_ceremony(ceremony.clone());
            let images = ctx.state.valid_images(&ceremony).await;
            presentation.set_valid_images(images.as_ref().clone());
            out.push(ceremony_message(presentation));
        }

        ClientMessage::Reveal { category } => {
            let result = match presentation.reveal(&category) {
                Ok(result) => result,
                Err(e) => return vec![session_error(e)],
            };
            if result.outcome == RevealOutcome::AnimationStarted {
                ctx.start_curtain(&category);
                out.push(ServerMessage::AnimationStarted {
                    category: category.clone(),
                    duration_ms: ctx.state.config.reveal_animation.as_millis() as u64,
                });
            }
            out.push(category_message(presentation, &category));
        }

        ClientMessage::AnimationDone { category } => {
            if let Some(end) = presentation.complete_animation(&category) {
                ctx.stop_curtain();
                finish_animation(&mut out, end, presentation, trailer_before);
            }
        }

        ClientMessage::SelectNominee { category, nominee } => {
            if let Err(e) = presentation.select_nominee(&category, &nominee) {
                return vec![session_error(e)];
            }
            out.push(category_message(presentation, &category));
        }

        ClientMessage::SubmitVote { category } => {
            match presentation.submit_vote(&category) {
                Ok(SubmitOutcome::Recorded { nominee, .. }) => {
                    ctx.state.mirror_vote(RemoteVote {
                        year: presentation.year(),
                        category: period_name(presentation, &category),
                        nominee_id: nominee,
                        voter_id: presentation.visitor_id().to_string(),
                    });
                }
                Ok(outcome) => {
                    tracing::debug!("Vote in {} not recorded: {:?}", category, outcome);
                }
                Err(e) => return vec![session_error(e)],
            }
            out.push(category_message(presentation, &category));
        }

        ClientMessage::ToggleResults { category } => {
            match presentation.toggle_results(&category) {
                Ok(true) if ctx.state.backend.is_some() => tasks::spawn_remote_tally(
                    ctx.state.clone(),
                    ctx.events.clone(),
                    presentation.year(),
                    category.clone(),
                    period_name(presentation, &category),
                ),
                Ok(_) => {}
                Err(e) => return vec![session_error(e)],
            }
            out.push(category_message(presentation, &category));
        }

        ClientMessage::ToggleMyVote { category } => {
            if let Err(e) = presentation.toggle_my_vote(&category) {
                return vec![session_error(e)];
            }
            out.push(category_message(presentation, &category));
        }

        ClientMessage::Scroll { y, viewport } => {
            let outcome = presentation.scroll(y, viewport);
            if let Some(section) = outcome.active_section {
                out.push(ServerMessage::ActiveSection { section });
            }
            if let Some(end) = outcome.interrupted {
                ctx.stop_curtain();
                finish_animation(&mut out, end, presentation, trailer_before);
            }
        }

        ClientMessage::NomineeClicked { category, nominee } => {
            let click = match presentation.click_nominee(&category, &nominee) {
                Ok(click) => click,
                Err(e) => return vec![session_error(e)],
            };
            if click.image.is_some() {
                out.push(category_message(presentation, &category));
            }
            match click.trailer {
                TrailerLookup::Open(_) => push_trailer_change(&mut out, trailer_before, presentation),
                TrailerLookup::Search { seq, title } => {
                    if ctx.state.trailers.is_some() {
                        tasks::spawn_trailer_search(ctx.state.clone(), ctx.events.clone(), seq, title);
                    } else {
                        tracing::debug!("No trailer link for {} and search is disabled", title);
                    }
                }
            }
        }

        ClientMessage::CloseTrailer => {
            presentation.close_trailer();
            out.push(ServerMessage::Trailer { video_id: None });
        }

        ClientMessage::ToggleLanguage => {
            let language = presentation.toggle_language();
            out.push(ServerMessage::Language { language });
        }
    }

    out
}

/// Handle an internal event; stale ones produce nothing
pub fn handle_event(
    event: SessionEvent,
    presentation: &mut Presentation,
    ctx: &mut SessionContext,
) -> Vec<ServerMessage> {
    let trailer_before = presentation.trailer().map(str::to_string);
    let mut out = Vec::new();

    match event {
        SessionEvent::Curtain { category, stage } => {
            if presentation.animating().map(String::as_str) == Some(category.as_str()) {
                out.push(ServerMessage::CurtainStage { category, stage });
            }
        }

        SessionEvent::AnimationElapsed { category } => {
            if let Some(end) = presentation.complete_animation(&category) {
                ctx.curtain = None;
                finish_animation(&mut out, end, presentation, trailer_before);
            }
        }

        SessionEvent::TrailerFound { seq, video_id } => {
            if presentation.trailer_found(seq, video_id) {
                out.push(ServerMessage::Trailer {
                    video_id: presentation.trailer().map(str::to_string),
                });
            }
        }

        SessionEvent::RemoteTally {
            year,
            category,
            counts,
        } => {
            if year == presentation.year() {
                out.push(ServerMessage::RemoteTally {
                    year,
                    category,
                    counts,
                });
            } else {
                tracing::debug!("Dropping remote tally for {} after year switch", year);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::reveal::{CurtainStage, RevealPhase};
    use crate::storage::MemoryStore;
    use crate::types::*;
    use std::collections::BTreeMap;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn nominee(id: &str) -> Nominee {
        Nominee {
            id: id.to_string(),
            film: Film {
                id: id.to_lowercase(),
                title: format!("Film {}", id),
                poster: None,
                trailer: None,
            },
            person: None,
            crew: Vec::new(),
            metadata: NomineeMetadata::default(),
        }
    }

    fn ceremony(year: Year) -> Ceremony {
        Ceremony {
            year,
            categories: ["c1", "c2", "c3", "c4", "c5"]
                .iter()
                .map(|id| Category {
                    id: id.to_string(),
                    name: id.to_uppercase(),
                    nominees: vec![nominee("A"), nominee("B")],
                    winners: Winners {
                        my_choice: Some("B".to_string()),
                        official: None,
                    },
                    reveal_video: None,
                })
                .collect(),
        }
    }

    async fn setup() -> (
        Presentation,
        SessionContext,
        mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        let config = AppConfig {
            reveal_animation: Duration::from_millis(40),
            ..AppConfig::default()
        };
        let ceremonies: BTreeMap<Year, Ceremony> =
            [(2025, ceremony(2025)), (2026, ceremony(2026))].into();
        let state = Arc::new(AppState::new(config, ceremonies, Arc::new(MemoryStore::new())));
        let presentation = state.open_session(Some("visitor")).await.unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        (presentation, SessionContext::new(state, tx), rx)
    }

    #[tokio::test]
    async fn test_unknown_year_and_category() {
        let (mut p, mut ctx, _rx) = setup().await;
        let out = handle_message(ClientMessage::SelectYear { year: 1999 }, &mut p, &mut ctx).await;
        assert!(matches!(&out[..], [ServerMessage::Error { code, .. }] if code == "UNKNOWN_YEAR"));

        let out = handle_message(
            ClientMessage::Reveal {
                category: "nope".to_string(),
            },
            &mut p,
            &mut ctx,
        )
        .await;
        assert!(matches!(&out[..], [ServerMessage::Error { code, .. }] if code == "UNKNOWN_CATEGORY"));
    }

    #[tokio::test]
    async fn test_curtain_runs_through_events() {
        let (mut p, mut ctx, mut rx) = setup().await;
        let out = handle_message(
            ClientMessage::Reveal {
                category: "c5".to_string(),
            },
            &mut p,
            &mut ctx,
        )
        .await;
        assert!(matches!(
            &out[0],
            ServerMessage::AnimationStarted { category, duration_ms: 40 } if category == "c5"
        ));

        let mut stages = Vec::new();
        while let Some(event) = rx.recv().await {
            for msg in handle_event(event, &mut p, &mut ctx) {
                match msg {
                    ServerMessage::CurtainStage { stage, .. } => stages.push(stage),
                    ServerMessage::Category { category } => {
                        assert_eq!(category.phase, RevealPhase::Revealed);
                        assert!(category.nominees[1].is_winner);
                    }
                    other => panic!("unexpected message: {:?}", other),
                }
            }
            if p.animating().is_none() {
                break;
            }
        }
        assert_eq!(stages.first(), Some(&CurtainStage::Closing));
        assert_eq!(p.reveal_phase("c5"), RevealPhase::Revealed);
    }

    #[tokio::test]
    async fn test_client_side_completion_cancels_timer() {
        let (mut p, mut ctx, _rx) = setup().await;
        handle_message(
            ClientMessage::Reveal {
                category: "c4".to_string(),
            },
            &mut p,
            &mut ctx,
        )
        .await;

        let out = handle_message(
            ClientMessage::AnimationDone {
                category: "c4".to_string(),
            },
            &mut p,
            &mut ctx,
        )
        .await;
        assert_eq!(out.len(), 1);
        assert_eq!(p.reveal_phase("c4"), RevealPhase::Revealed);

        // A late timer event is a no-op
        let out = handle_event(
            SessionEvent::AnimationElapsed {
                category: "c4".to_string(),
            },
            &mut p,
            &mut ctx,
        );
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_stale_remote_tally_is_dropped() {
        let (mut p, mut ctx, _rx) = setup().await;
        handle_message(ClientMessage::SelectYear { year: 2025 }, &mut p, &mut ctx).await;

        let out = handle_event(
            SessionEvent::RemoteTally {
                year: 2026,
                category: "c1".to_string(),
                counts: [("A".to_string(), 3)].into(),
            },
            &mut p,
            &mut ctx,
        );
        assert!(out.is_empty());

        let out = handle_event(
            SessionEvent::RemoteTally {
                year: 2025,
                category: "c1".to_string(),
                counts: [("A".to_string(), 3)].into(),
            },
            &mut p,
            &mut ctx,
        );
        assert_eq!(out.len(), 1);
    }

    #[tokio::test]
    async fn test_vote_flow() {
        let (mut p, mut ctx, _rx) = setup().await;
        let out = handle_message(
            ClientMessage::SubmitVote {
                category: "c1".to_string(),
            },
            &mut p,
            &mut ctx,
        )
        .await;
        let [ServerMessage::Category { category }] = &out[..] else {
            panic!("expected a category update");
        };
        assert!(!category.has_voted);

        handle_message(
            ClientMessage::SelectNominee {
                category: "c1".to_string(),
                nominee: "A".to_string(),
            },
            &mut p,
            &mut ctx,
        )
        .await;
        let out = handle_message(
            ClientMessage::SubmitVote {
                category: "c1".to_string(),
            },
            &mut p,
            &mut ctx,
        )
        .await;
        let [ServerMessage::Category { category }] = &out[..] else {
            panic!("expected a category update");
        };
        assert!(category.has_voted);
        assert_eq!(category.nominees[0].votes, Some(1));
        assert!(category.nominees[0].is_user_choice);
    }
}
