use crate::reveal::CurtainStage;
use crate::session::CategoryView;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const PROTOCOL_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    SelectYear {
        year: Year,
    },
    /// Toggle the curator's pick for a category
    Reveal {
        category: CategoryId,
    },
    /// The page finished playing the curtain early
    AnimationDone {
        category: CategoryId,
    },
    SelectNominee {
        category: CategoryId,
        nominee: NomineeId,
    },
    SubmitVote {
        category: CategoryId,
    },
    ToggleResults {
        category: CategoryId,
    },
    ToggleMyVote {
        category: CategoryId,
    },
    Scroll {
        y: f64,
        viewport: f64,
    },
    NomineeClicked {
        category: CategoryId,
        nominee: NomineeId,
    },
    CloseTrailer,
    ToggleLanguage,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        visitor_id: VisitorId,
        years: Vec<Year>,
        language: Language,
        server_now: String,
    },
    /// Full render of the ceremony being shown
    Ceremony {
        year: Year,
        active_section: usize,
        categories: Vec<CategoryView>,
    },
    /// One category changed
    Category {
        category: CategoryView,
    },
    AnimationStarted {
        category: CategoryId,
        duration_ms: u64,
    },
    CurtainStage {
        category: CategoryId,
        stage: CurtainStage,
    },
    ActiveSection {
        section: usize,
    },
    /// Trailer modal content; `None` closes it
    Trailer {
        video_id: Option<String>,
    },
    /// Aggregate counts from the hosted backend
    RemoteTally {
        year: Year,
        category: CategoryId,
        counts: HashMap<NomineeId, u32>,
    },
    Language {
        language: Language,
    },
    Error {
        code: String,
        msg: String,
    },
}

impl ServerMessage {
    pub fn error(code: &str, msg: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: code.to_string(),
            msg: msg.into(),
        }
    }
}
