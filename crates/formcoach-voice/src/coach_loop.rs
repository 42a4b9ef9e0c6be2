//! **Coach loop**: frames in, narration out.
//!
//! Consumes pose frames in arrival order, feeds each one through the session, offers
//! the resulting feedback to the speech queue, and speaks advisory text as it lands.
//! Neither advisory requests nor narration ever hold up the next frame.
//!
//! The loop ends when the frame channel closes (pending speech is let finish) or
//! when `shutdown` resolves (speech is cut off). Either way the session is ended
//! before returning, so late advisory results are discarded.

use crate::error::VoiceResult;
use crate::narrator::Narrator;
use crate::speech_queue::{SpeechDispatcher, SpeechQueue};
use chrono::{DateTime, Utc};
use formcoach_core::{CoachSession, FrameOutcome, PoseFrame};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};

/// Optional callback per processed frame (UI/CLI display).
pub type OnOutcome = Option<Arc<dyn Fn(&FrameOutcome) + Send + Sync>>;

/// What a finished loop reports.
#[derive(Debug, Clone, Serialize)]
pub struct CoachSummary {
    pub session_id: String,
    pub exercise: String,
    pub reps: u32,
    pub frames: u64,
    pub utterances_spoken: u32,
    pub utterances_failed: u32,
    pub interrupted: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

/// Drive `session` from `frames` until the channel closes or `shutdown` resolves.
/// A `None` frame means "no person detected".
pub async fn run_coach_loop<S>(
    mut session: CoachSession,
    mut frames: mpsc::Receiver<Option<PoseFrame>>,
    narrator: Arc<dyn Narrator>,
    on_outcome: OnOutcome,
    shutdown: S,
) -> VoiceResult<CoachSummary>
where
    S: Future<Output = ()>,
{
    let started_at = Utc::now();
    let mut speech = SpeechDispatcher::new(SpeechQueue::from_config(session.config()), narrator);
    let mut frame_count: u64 = 0;
    let mut interrupted = false;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            frame = frames.recv() => {
                let Some(frame) = frame else { break };
                let now = Instant::now().into_std();
                let outcome = session.process_frame(frame.as_ref(), now)?;
                frame_count += 1;
                if let Some(event) = &outcome.event {
                    speech.offer(&event.message, outcome.rep_complete, event.is_correct, now);
                }
                if let Some(cb) = &on_outcome {
                    cb(&outcome);
                }
            }
            Some(text) = session.next_advice() => {
                info!(session_id = %session.id(), advice = %text, "advisory feedback");
                speech.offer_advice(&text, Instant::now().into_std());
            }
            Some(_) = speech.next_finished() => {}
            _ = &mut shutdown => {
                interrupted = true;
                break;
            }
        }
    }

    // Stream ended on its own: let queued speech play out unless told to stop.
    while !interrupted && !speech.is_idle() {
        tokio::select! {
            done = speech.next_finished() => {
                if done.is_none() {
                    break;
                }
            }
            _ = &mut shutdown => interrupted = true,
        }
    }

    session.end();
    if interrupted {
        warn!(session_id = %session.id(), "coach loop interrupted; narration cancelled");
    }
    speech.cancel();

    let summary = CoachSummary {
        session_id: session.id().to_string(),
        exercise: session.profile().id().to_string(),
        reps: session.rep_state().rep_count,
        frames: frame_count,
        utterances_spoken: speech.spoken(),
        utterances_failed: speech.failed(),
        interrupted,
        started_at,
        ended_at: Utc::now(),
    };
    info!(
        session_id = %summary.session_id,
        reps = summary.reps,
        frames = summary.frames,
        spoken = summary.utterances_spoken,
        "coach loop finished"
    );
    Ok(summary)
}
