//! Background work for one page session. Every task reports back through the
//! session's event channel and never touches the `Presentation` directly.

use crate::reveal::{CurtainStage, CurtainTimeline};
use crate::state::AppState;
use crate::types::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::AbortHandle;
use tokio::time::Instant;

/// Internal events multiplexed with client messages
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Curtain {
        category: CategoryId,
        stage: CurtainStage,
    },
    AnimationElapsed {
        category: CategoryId,
    },
    TrailerFound {
        seq: u64,
        video_id: Option<String>,
    },
    RemoteTally {
        year: Year,
        category: CategoryId,
        counts: HashMap<NomineeId, u32>,
    },
}

pub type EventSender = UnboundedSender<SessionEvent>;

/// Play the curtain stages, then report the animation as elapsed
pub fn spawn_curtain(
    events: EventSender,
    category: CategoryId,
    timeline: CurtainTimeline,
) -> AbortHandle {
    let handle = tokio::spawn(async move {
        let start = Instant::now();
        for (at, stage) in timeline.stages {
            tokio::time::sleep_until(start + at).await;
            let event = SessionEvent::Curtain {
                category: category.clone(),
                stage,
            };
            if events.send(event).is_err() {
                return;
            }
        }
        tokio::time::sleep_until(start + timeline.total).await;
        // Session gone is fine
        let _ = events.send(SessionEvent::AnimationElapsed { category });
    });
    handle.abort_handle()
}

pub fn spawn_trailer_search(state: Arc<AppState>, events: EventSender, seq: u64, title: String) {
    tokio::spawn(async move {
        let video_id = state.search_trailer(&title).await;
        let _ = events.send(SessionEvent::TrailerFound { seq, video_id });
    });
}

/// Fetch the hosted tally filed under `name`, reported back for `category`
pub fn spawn_remote_tally(
    state: Arc<AppState>,
    events: EventSender,
    year: Year,
    category: CategoryId,
    name: String,
) {
    tokio::spawn(async move {
        if let Some(counts) = state.remote_tally(year, &name).await {
            let _ = events.send(SessionEvent::RemoteTally {
                year,
                category,
                counts,
            });
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn test_curtain_emits_stages_then_elapsed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        spawn_curtain(tx, "score".to_string(), CurtainTimeline::default());

        let mut stages = Vec::new();
        loop {
            match rx.recv().await {
                Some(SessionEvent::Curtain { stage, .. }) => stages.push(stage),
                Some(SessionEvent::AnimationElapsed { category }) => {
                    assert_eq!(category, "score");
                    break;
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }
        assert_eq!(
            stages,
            vec![
                CurtainStage::Closing,
                CurtainStage::ShowingText,
                CurtainStage::FadingText,
                CurtainStage::Opening,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_curtain_still_finishes() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let timeline = CurtainTimeline::scaled(Duration::from_millis(u64::MAX));
        spawn_curtain(tx, "score".to_string(), timeline);

        let mut elapsed = false;
        while let Some(event) = rx.recv().await {
            if matches!(event, SessionEvent::AnimationElapsed { .. }) {
                elapsed = true;
                break;
            }
        }
        assert!(elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_curtain_stays_silent() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = spawn_curtain(tx, "score".to_string(), CurtainTimeline::default());
        handle.abort();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.recv().await.is_none());
    }
}
