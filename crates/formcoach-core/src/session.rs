//! **CoachSession**: one detection session for one exercise.
//!
//! Owns everything whose lifetime is "this workout set": the rep machine and its
//! angle buffer, the locked limb, the advisory debounce and issue history, and the
//! UI-facing state (phase, phase history, rep pulse). Frames are processed
//! synchronously in arrival order; advisory requests run as spawned tasks and are
//! collected with `poll_advice` / `next_advice`. Ending the session discards any
//! advice that arrives afterwards.

use crate::config::CoachConfig;
use crate::error::{CoreError, CoreResult};
use crate::exercise::{
    validate, ExerciseProfile, ExerciseTable, FormCheck, LimbStrategy, Phase, RepState,
};
use crate::feedback::{request_with_fallback, AdvicePayload, AdvisoryService, FeedbackArbiter, FeedbackEvent};
use crate::pose::keypoint::chain_score;
use crate::pose::{angle_at, PoseFrame, Side};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const OUT_OF_VIEW: &str = "Position yourself in camera view";

/// What one frame produced.
#[derive(Debug, Clone)]
pub struct FrameOutcome {
    /// `None` when the frame had no detection.
    pub event: Option<FeedbackEvent>,
    pub phase: Phase,
    pub rep_complete: bool,
    pub rep_count: u32,
    /// Smoothed primary angle, when one was measured.
    pub angle: Option<f32>,
    /// Measured angles behind a form fault, for display.
    pub form_detail: Option<String>,
    pub advice_requested: bool,
}

/// UI-facing view of the session.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub rep_count: u32,
    pub last_event: Option<FeedbackEvent>,
    /// Most recent phase changes, oldest first.
    pub phase_history: Vec<Phase>,
    /// True for a short window after each completed rep.
    pub rep_pulse: bool,
}

struct Advice {
    generation: u64,
    text: String,
}

pub struct CoachSession {
    id: Uuid,
    config: CoachConfig,
    profile: ExerciseProfile,
    rep: RepState,
    arbiter: FeedbackArbiter,
    advisor: Arc<dyn AdvisoryService>,
    advice_tx: mpsc::UnboundedSender<Advice>,
    advice_rx: mpsc::UnboundedReceiver<Advice>,
    in_flight: Option<JoinHandle<()>>,
    generation: u64,
    phase: Phase,
    phase_history: VecDeque<Phase>,
    last_event: Option<FeedbackEvent>,
    rep_pulse_until: Option<Instant>,
    active: bool,
}

impl CoachSession {
    /// Start a session for `exercise_id`. Unknown exercises are rejected.
    pub fn start(
        table: &ExerciseTable,
        exercise_id: &str,
        config: CoachConfig,
        advisor: Arc<dyn AdvisoryService>,
    ) -> CoreResult<Self> {
        let profile = table.lookup(exercise_id)?.clone();
        Ok(Self::with_profile(profile, config, advisor))
    }

    pub fn with_profile(
        profile: ExerciseProfile,
        config: CoachConfig,
        advisor: Arc<dyn AdvisoryService>,
    ) -> Self {
        let (advice_tx, advice_rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        info!(session_id = %id, exercise = profile.id(), "coach session started");
        Self {
            id,
            rep: RepState::new(profile.kind, config.smoothing_window),
            arbiter: FeedbackArbiter::new(config.advisory_debounce()),
            phase_history: VecDeque::with_capacity(config.phase_history_len),
            config,
            profile,
            advisor,
            advice_tx,
            advice_rx,
            in_flight: None,
            generation: 0,
            phase: Phase::Neutral,
            last_event: None,
            rep_pulse_until: None,
            active: true,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn profile(&self) -> &ExerciseProfile {
        &self.profile
    }

    pub fn config(&self) -> &CoachConfig {
        &self.config
    }

    pub fn rep_state(&self) -> &RepState {
        &self.rep
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Recent distinct form issues, oldest first.
    pub fn form_issues(&self) -> Vec<String> {
        self.arbiter.history().snapshot()
    }

    /// Process one frame. `None` (or an empty frame) means no detection: validation
    /// is skipped and rep state is left untouched.
    pub fn process_frame(&mut self, frame: Option<&PoseFrame>, now: Instant) -> CoreResult<FrameOutcome> {
        if !self.active {
            return Err(CoreError::SessionEnded(self.id.to_string()));
        }

        let Some(frame) = frame.filter(|f| !f.is_empty()) else {
            return Ok(FrameOutcome {
                event: None,
                phase: self.phase,
                rep_complete: false,
                rep_count: self.rep.rep_count,
                angle: None,
                form_detail: None,
                advice_requested: false,
            });
        };

        let (phase, rep_complete, angle, check) = match self.measure_primary(frame) {
            Some((raw, confidence)) => {
                let t = self
                    .rep
                    .advance(raw, confidence, &self.profile, self.config.confidence_threshold);
                let smoothed = self.rep.last_angle.unwrap_or(raw);
                let check = if t.phase == Phase::Neutral {
                    FormCheck::pass()
                } else {
                    let secondary = self.measure_secondary(frame);
                    validate(smoothed, secondary, Some(&self.profile), t.phase)
                };
                (t.phase, t.rep_complete, Some(smoothed), check)
            }
            None => (Phase::Neutral, false, None, FormCheck::pass()),
        };

        let message = self.compose_message(phase, rep_complete, angle, &check);
        let event = FeedbackEvent::new(message, check.is_correct, phase);

        if phase != self.phase {
            self.phase_history.push_back(phase);
            while self.phase_history.len() > self.config.phase_history_len {
                self.phase_history.pop_front();
            }
            self.phase = phase;
        }

        if rep_complete {
            self.rep_pulse_until = Some(now + self.config.rep_pulse());
            info!(
                session_id = %self.id,
                exercise = self.profile.id(),
                reps = self.rep.rep_count,
                "rep completed"
            );
        }

        if rep_complete && !check.is_correct {
            self.arbiter.record_issue(&check.message);
        }
        let advice_requested = match self.arbiter.observe(&event, rep_complete, &self.profile, now) {
            Some(payload) => self.dispatch_advice(payload),
            None => false,
        };

        debug!(
            session_id = %self.id,
            phase = %phase,
            angle = ?angle.map(|a| a.round()),
            correct = check.is_correct,
            "frame processed"
        );

        self.last_event = Some(event.clone());
        Ok(FrameOutcome {
            event: Some(event),
            phase,
            rep_complete,
            rep_count: self.rep.rep_count,
            angle,
            form_detail: check.detail,
            advice_requested,
        })
    }

    /// Primary joint angle and the confidence of the landmarks it came from.
    fn measure_primary(&mut self, frame: &PoseFrame) -> Option<(f32, f32)> {
        let parts = self.profile.primary.landmarks();
        let min_score = self.config.keypoint_min_score;
        let reading = |side: Side| {
            let chain = frame.chain(side, &parts, min_score)?;
            let angle = angle_at(chain[0].point(), chain[1].point(), chain[2].point());
            (angle > 0.0).then(|| (angle, chain_score(&chain)))
        };

        match self.profile.limb {
            LimbStrategy::Average => {
                let readings: Vec<(f32, f32)> = Side::BOTH.iter().filter_map(|s| reading(*s)).collect();
                if readings.is_empty() {
                    return None;
                }
                let n = readings.len() as f32;
                let angle = readings.iter().map(|r| r.0).sum::<f32>() / n;
                let score = readings.iter().map(|r| r.1).sum::<f32>() / n;
                Some((angle, score))
            }
            LimbStrategy::Lock => {
                if let Some(side) = self.rep.locked_limb {
                    return reading(side);
                }
                let (side, best) = Side::BOTH
                    .iter()
                    .filter_map(|s| reading(*s).map(|r| (*s, r)))
                    .max_by(|a, b| a.1 .1.total_cmp(&b.1 .1))?;
                let locked = self.rep.lock_limb(side);
                info!(session_id = %self.id, side = locked.as_str(), "limb locked");
                Some(best)
            }
        }
    }

    fn measure_secondary(&self, frame: &PoseFrame) -> Option<f32> {
        let constraint = self.profile.secondary.as_ref()?;
        let parts = constraint.joint.landmarks();
        let min_score = self.config.keypoint_min_score;
        let chain = self
            .rep
            .locked_limb
            .and_then(|side| frame.chain(side, &parts, min_score))
            .or_else(|| frame.chain_any_side(&parts, min_score))?;
        let angle = angle_at(chain[0].point(), chain[1].point(), chain[2].point());
        (angle > 0.0).then_some(angle)
    }

    fn compose_message(&self, phase: Phase, rep_complete: bool, angle: Option<f32>, check: &FormCheck) -> String {
        if rep_complete {
            return format!("Great job! Rep {} completed!", self.rep.rep_count);
        }
        if !check.is_correct {
            return check.message.clone();
        }
        let joint = self.profile.primary.label();
        match (phase, angle) {
            (Phase::GoingDown, Some(a)) => format!("Lowering ({joint}: {:.0}°)", a),
            (Phase::GoingUp, Some(a)) => format!("Rising ({joint}: {:.0}°)", a),
            (Phase::Neutral, _) | (_, None) => OUT_OF_VIEW.to_string(),
            _ => check.message.clone(),
        }
    }

    /// Spawn the advisory request. At most one is in flight; returns whether one started.
    fn dispatch_advice(&mut self, payload: AdvicePayload) -> bool {
        if self.in_flight.as_ref().is_some_and(|h| !h.is_finished()) {
            debug!(session_id = %self.id, "advisory request already in flight");
            return false;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(session_id = %self.id, "no async runtime; advisory request skipped");
            return false;
        };

        let advisor = Arc::clone(&self.advisor);
        let tx = self.advice_tx.clone();
        let generation = self.generation;
        let timeout = self.config.advisory_timeout();
        self.in_flight = Some(runtime.spawn(async move {
            let text = request_with_fallback(advisor.as_ref(), &payload, timeout).await;
            let _ = tx.send(Advice { generation, text });
        }));
        true
    }

    /// Next advisory text that has already arrived, without waiting.
    pub fn poll_advice(&mut self) -> Option<String> {
        while let Ok(advice) = self.advice_rx.try_recv() {
            if self.active && advice.generation == self.generation {
                return Some(advice.text);
            }
            debug!(session_id = %self.id, "discarding stale advisory text");
        }
        None
    }

    /// Wait for the next advisory text. Pends forever once the session has ended.
    pub async fn next_advice(&mut self) -> Option<String> {
        loop {
            let advice = self.advice_rx.recv().await?;
            if self.active && advice.generation == self.generation {
                return Some(advice.text);
            }
        }
    }

    /// Whether the rep-complete pulse is still lit at `now`.
    pub fn rep_pulse(&self, now: Instant) -> bool {
        self.rep_pulse_until.is_some_and(|until| now < until)
    }

    pub fn snapshot(&self, now: Instant) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            rep_count: self.rep.rep_count,
            last_event: self.last_event.clone(),
            phase_history: self.phase_history.iter().copied().collect(),
            rep_pulse: self.rep_pulse(now),
        }
    }

    /// Tear down: stop accepting frames and drop any in-flight advisory result.
    pub fn end(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.generation += 1;
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
        self.arbiter.reset();
        info!(
            session_id = %self.id,
            exercise = self.profile.id(),
            reps = self.rep.rep_count,
            "coach session ended"
        );
    }
}

impl Drop for CoachSession {
    fn drop(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::StaticAdvisor;
    use crate::pose::Keypoint;
    use std::time::Duration;

    /// Left leg with the knee bent to `deg`, hip directly above the knee.
    fn squat_frame(deg: f32, score: f32) -> PoseFrame {
        let rad = deg.to_radians();
        PoseFrame::new(vec![
            Keypoint::new("left_shoulder", 0.0, -2.0, score),
            Keypoint::new("left_hip", 0.0, -1.0, score),
            Keypoint::new("left_knee", 0.0, 0.0, score),
            Keypoint::new("left_ankle", rad.sin(), -rad.cos(), score),
        ])
    }

    fn session() -> CoachSession {
        let config = CoachConfig {
            smoothing_window: 1,
            ..CoachConfig::default()
        };
        CoachSession::start(
            &ExerciseTable::builtin(),
            "squat1",
            config,
            Arc::new(StaticAdvisor::new("tip")),
        )
        .unwrap()
    }

    #[test]
    fn unknown_exercise_is_rejected() {
        let result = CoachSession::start(
            &ExerciseTable::builtin(),
            "jumping_jack",
            CoachConfig::default(),
            Arc::new(StaticAdvisor::mock()),
        );
        assert!(matches!(result, Err(CoreError::UnknownExercise(_))));
    }

    #[test]
    fn missing_detection_keeps_state() {
        let mut s = session();
        let t0 = Instant::now();
        s.process_frame(Some(&squat_frame(80.0, 0.9)), t0).unwrap();
        let stage = s.rep_state().stage;
        let out = s.process_frame(None, t0).unwrap();
        assert!(out.event.is_none());
        assert_eq!(s.rep_state().stage, stage);
        let out = s.process_frame(Some(&PoseFrame::default()), t0).unwrap();
        assert!(out.event.is_none());
    }

    #[test]
    fn low_confidence_frame_is_neutral() {
        let mut s = session();
        let out = s.process_frame(Some(&squat_frame(80.0, 0.5)), Instant::now()).unwrap();
        assert_eq!(out.phase, Phase::Neutral);
        assert_eq!(out.event.unwrap().message, OUT_OF_VIEW);
    }

    #[test]
    fn rep_pulse_clears_after_window() {
        let mut s = session();
        let t0 = Instant::now();
        for (i, deg) in [170.0, 80.0, 120.0, 170.0].iter().enumerate() {
            s.process_frame(Some(&squat_frame(*deg, 0.9)), t0 + Duration::from_millis(i as u64 * 33))
                .unwrap();
        }
        let t_rep = t0 + Duration::from_millis(99);
        assert_eq!(s.snapshot(t_rep).rep_count, 1);
        assert!(s.rep_pulse(t_rep + Duration::from_millis(1999)));
        assert!(!s.rep_pulse(t_rep + Duration::from_secs(2)));
    }

    /// Knee at `knee_deg` with the torso leaning so the hip angle is `hip_deg`.
    fn leaning_frame(knee_deg: f32, hip_deg: f32) -> PoseFrame {
        let knee = knee_deg.to_radians();
        let lean = (180.0 - hip_deg).to_radians();
        PoseFrame::new(vec![
            Keypoint::new("left_shoulder", lean.sin(), -1.0 - lean.cos(), 0.9),
            Keypoint::new("left_hip", 0.0, -1.0, 0.9),
            Keypoint::new("left_knee", 0.0, 0.0, 0.9),
            Keypoint::new("left_ankle", knee.sin(), -knee.cos(), 0.9),
        ])
    }

    #[test]
    fn rep_completion_wins_over_posture_fault() {
        let mut s = session();
        let t0 = Instant::now();
        for (i, knee) in [170.0, 80.0, 120.0].iter().enumerate() {
            s.process_frame(Some(&squat_frame(*knee, 0.9)), t0 + Duration::from_millis(i as u64 * 33))
                .unwrap();
        }
        let out = s
            .process_frame(Some(&leaning_frame(170.0, 155.0)), t0 + Duration::from_millis(99))
            .unwrap();
        assert!(out.rep_complete);
        let event = out.event.unwrap();
        assert_eq!(event.message, "Great job! Rep 1 completed!");
        assert!(!event.is_correct);
        assert!(out.form_detail.is_some());
        assert!(s.form_issues().contains(&"Stand up straighter".to_string()));
        assert!(!s.form_issues().iter().any(|m| m.starts_with("Great job")));
    }

    #[test]
    fn jittering_fault_is_one_issue() {
        let mut s = session();
        let t0 = Instant::now();
        for i in 0..400u64 {
            let hip = 157.0 + (i % 3) as f32;
            let out = s
                .process_frame(Some(&leaning_frame(80.0, hip)), t0 + Duration::from_millis(i * 33))
                .unwrap();
            assert_eq!(out.event.unwrap().message, "Adjust your hip position");
        }
        assert_eq!(s.form_issues(), vec!["Adjust your hip position"]);
    }

    #[test]
    fn frames_after_end_are_rejected() {
        let mut s = session();
        s.end();
        assert!(!s.is_active());
        let err = s.process_frame(Some(&squat_frame(80.0, 0.9)), Instant::now()).unwrap_err();
        assert!(matches!(err, CoreError::SessionEnded(_)));
    }
}
