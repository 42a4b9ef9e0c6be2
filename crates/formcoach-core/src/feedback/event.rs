use crate::exercise::{FormCheck, Phase};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Feedback produced for one frame, consumed by the arbiter and the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEvent {
    pub message: String,
    pub is_correct: bool,
    pub phase: Phase,
    pub timestamp: DateTime<Utc>,
}

impl FeedbackEvent {
    pub fn new(message: impl Into<String>, is_correct: bool, phase: Phase) -> Self {
        Self {
            message: message.into(),
            is_correct,
            phase,
            timestamp: Utc::now(),
        }
    }

    pub fn from_check(check: FormCheck, phase: Phase) -> Self {
        Self::new(check.message, check.is_correct, phase)
    }
}
