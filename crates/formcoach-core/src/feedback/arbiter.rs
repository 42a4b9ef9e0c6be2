//! Feedback arbiter: decides when the advisory service is worth asking.
//!
//! Requests are debounced and only fire on interesting frames (a rep just completed
//! or form is currently incorrect). Routine good-form frames never trigger one.

use super::event::FeedbackEvent;
use crate::exercise::{ExerciseProfile, Phase};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::debug;

/// Distinct form issues remembered for advisory context.
pub const ISSUE_HISTORY_CAPACITY: usize = 3;

/// Bounded, insertion-ordered set of recent distinct form issues.
#[derive(Debug, Clone)]
pub struct FormIssuesHistory {
    issues: VecDeque<String>,
    capacity: usize,
}

impl FormIssuesHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            issues: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Add `message` unless already present (exact match). Returns true if added.
    pub fn record(&mut self, message: &str) -> bool {
        if self.issues.iter().any(|m| m == message) {
            return false;
        }
        self.issues.push_back(message.to_string());
        while self.issues.len() > self.capacity {
            self.issues.pop_front();
        }
        true
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.issues.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn clear(&mut self) {
        self.issues.clear();
    }
}

impl Default for FormIssuesHistory {
    fn default() -> Self {
        Self::new(ISSUE_HISTORY_CAPACITY)
    }
}

/// Compact advisory request context. Raw keypoints are deliberately excluded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvicePayload {
    pub exercise_id: String,
    pub exercise_name: String,
    pub phase: Phase,
    pub form_issues: Vec<String>,
    pub is_correct: bool,
}

/// Session-scoped debounce and issue-history state.
#[derive(Debug, Clone)]
pub struct FeedbackArbiter {
    debounce: Duration,
    last_request: Option<Instant>,
    history: FormIssuesHistory,
}

impl FeedbackArbiter {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            last_request: None,
            history: FormIssuesHistory::default(),
        }
    }

    /// Remember a form issue for advisory context.
    pub fn record_issue(&mut self, message: &str) {
        self.history.record(message);
    }

    /// Record the frame and return a payload when an advisory request should go out.
    /// Opening the gate counts as a request for debounce purposes.
    ///
    /// On a rep-complete frame the event carries the completion message, so the
    /// caller records any form issue for that frame with `record_issue`.
    pub fn observe(
        &mut self,
        event: &FeedbackEvent,
        rep_complete: bool,
        profile: &ExerciseProfile,
        now: Instant,
    ) -> Option<AdvicePayload> {
        if !event.is_correct && !rep_complete {
            self.history.record(&event.message);
        }

        let interesting = rep_complete || !event.is_correct;
        let cooled_down = self
            .last_request
            .map_or(true, |last| now.saturating_duration_since(last) >= self.debounce);
        if !(interesting && cooled_down) {
            return None;
        }

        self.last_request = Some(now);
        debug!(
            exercise = profile.id(),
            rep_complete,
            issues = self.history.len(),
            "advisory gate open"
        );
        Some(AdvicePayload {
            exercise_id: profile.id().to_string(),
            exercise_name: profile.name.clone(),
            phase: event.phase,
            form_issues: self.history.snapshot(),
            is_correct: event.is_correct,
        })
    }

    pub fn history(&self) -> &FormIssuesHistory {
        &self.history
    }

    pub fn last_request(&self) -> Option<Instant> {
        self.last_request
    }

    /// Forget debounce and issue history (new session).
    pub fn reset(&mut self) {
        self.last_request = None;
        self.history.clear();
    }
}

impl Default for FeedbackArbiter {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}
