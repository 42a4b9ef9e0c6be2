//! Rep-counting state machine.
//!
//! One generic machine serves every exercise; the profile supplies the angle band.
//! Phase labels are derived purely from the angle, while the state tracks where in
//! a repetition the performer is. A rep is counted only on GOING_UP → UP.

use super::profiles::{AngleBand, ExerciseKind, ExerciseProfile};
use crate::pose::{AngleBuffer, Side};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Below this pose confidence the machine freezes.
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.6;

/// Where in the motion the performer is, as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Neutral,
    Down,
    GoingDown,
    Up,
    GoingUp,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Neutral => "neutral",
            Phase::Down => "down",
            Phase::GoingDown => "going_down",
            Phase::Up => "up",
            Phase::GoingUp => "going_up",
        }
    }

    /// Whether the validator judges form in this phase.
    pub fn is_resting(&self) -> bool {
        matches!(self, Phase::Up | Phase::Down)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Internal state of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepStage {
    #[default]
    Start,
    Down,
    GoingUp,
    Up,
    GoingDown,
    /// Transient; never returned as a next state.
    Counted,
}

/// Result of one machine tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub next: RepStage,
    pub phase: Phase,
    pub rep_complete: bool,
}

/// Where `angle` sits relative to a band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Zone {
    Below,
    Band,
    Above,
}

fn zone(angle: f32, band: &AngleBand) -> Zone {
    if angle < band.down {
        Zone::Below
    } else if angle > band.up {
        Zone::Above
    } else {
        Zone::Band
    }
}

/// Phase label for `angle`, independent of machine state.
pub fn label_phase(angle: f32, band: &AngleBand, split: f32) -> Phase {
    match zone(angle, band) {
        Zone::Below => Phase::Down,
        Zone::Above => Phase::Up,
        Zone::Band if angle > split => Phase::GoingUp,
        Zone::Band => Phase::GoingDown,
    }
}

/// Pure transition function.
///
/// Jumps across the whole band in one tick (e.g. dropped frames) pass through the
/// intermediate state, so the rep is still only counted on GOING_UP → UP.
pub fn step(
    current: RepStage,
    angle: f32,
    confidence: f32,
    profile: &ExerciseProfile,
    min_confidence: f32,
) -> Transition {
    let current = match current {
        RepStage::Counted => RepStage::Start,
        s => s,
    };

    if confidence < min_confidence {
        return Transition {
            next: current,
            phase: Phase::Neutral,
            rep_complete: false,
        };
    }

    let band = &profile.band;
    let phase = label_phase(angle, band, profile.split_point());
    let z = zone(angle, band);

    let (next, rep_complete) = match (current, z) {
        (RepStage::Start, Zone::Below) => (RepStage::Down, false),
        (RepStage::Start, _) => (RepStage::Start, false),

        (RepStage::Down, Zone::Below) => (RepStage::Down, false),
        (RepStage::Down, _) => (RepStage::GoingUp, false),

        (RepStage::GoingUp, Zone::Above) => (RepStage::Up, true),
        (RepStage::GoingUp, Zone::Below) => (RepStage::Down, false),
        (RepStage::GoingUp, Zone::Band) => (RepStage::GoingUp, false),

        (RepStage::Up, Zone::Above) => (RepStage::Up, false),
        (RepStage::Up, _) => (RepStage::GoingDown, false),

        (RepStage::GoingDown, Zone::Below) => (RepStage::Down, false),
        (RepStage::GoingDown, Zone::Above) => (RepStage::Up, false),
        (RepStage::GoingDown, Zone::Band) => (RepStage::GoingDown, false),

        (RepStage::Counted, _) => (RepStage::Start, false),
    };

    Transition {
        next,
        phase,
        rep_complete,
    }
}

/// Session-scoped machine state.
#[derive(Debug, Clone)]
pub struct RepState {
    pub stage: RepStage,
    pub buffer: AngleBuffer,
    /// Last smoothed primary angle fed to the machine.
    pub last_angle: Option<f32>,
    pub exercise: ExerciseKind,
    /// Side chosen once per session for `LimbStrategy::Lock` profiles.
    pub locked_limb: Option<Side>,
    pub rep_count: u32,
}

impl RepState {
    pub fn new(exercise: ExerciseKind, window: usize) -> Self {
        Self {
            stage: RepStage::Start,
            buffer: AngleBuffer::new(window),
            last_angle: None,
            exercise,
            locked_limb: None,
            rep_count: 0,
        }
    }

    /// Smooth `raw_angle`, run one tick, and update the rep count.
    pub fn advance(
        &mut self,
        raw_angle: f32,
        confidence: f32,
        profile: &ExerciseProfile,
        min_confidence: f32,
    ) -> Transition {
        let angle = if confidence < min_confidence {
            // Low-confidence readings stay out of the average.
            self.buffer.mean().unwrap_or(raw_angle)
        } else {
            self.buffer.push(raw_angle)
        };
        self.last_angle = Some(angle);

        let t = step(self.stage, angle, confidence, profile, min_confidence);
        if t.next != self.stage {
            debug!(
                exercise = %self.exercise,
                from = ?self.stage,
                to = ?t.next,
                angle = angle.round(),
                "rep stage transition"
            );
        }
        self.stage = t.next;
        if t.rep_complete {
            self.rep_count += 1;
        }
        t
    }

    /// Lock `side` unless a side is already locked; returns the locked side.
    pub fn lock_limb(&mut self, side: Side) -> Side {
        *self.locked_limb.get_or_insert(side)
    }

    pub fn reset(&mut self) {
        self.stage = RepStage::Start;
        self.buffer.clear();
        self.last_angle = None;
        self.locked_limb = None;
        self.rep_count = 0;
    }
}
