//! Exercise threshold table.
//!
//! Static per-exercise data: which joint drives phase detection, the angle bands
//! that define "up" and "down", and an optional secondary posture constraint.
//! Any kind missing from the table fails closed.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Built-in exercise kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseKind {
    Squat,
    PushUp,
    Lunge,
}

impl ExerciseKind {
    pub const ALL: [ExerciseKind; 3] = [ExerciseKind::Squat, ExerciseKind::PushUp, ExerciseKind::Lunge];

    pub fn id(&self) -> &'static str {
        match self {
            ExerciseKind::Squat => "squat",
            ExerciseKind::PushUp => "pushup",
            ExerciseKind::Lunge => "lunge",
        }
    }
}

impl fmt::Display for ExerciseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ExerciseKind {
    type Err = CoreError;

    /// Accepts plain ids and the catalogue ids used by the exercise list ("squat1").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace(['-', '_', ' '], "");
        let key = key.trim_end_matches(|c: char| c.is_ascii_digit());
        match key {
            "squat" | "squats" => Ok(ExerciseKind::Squat),
            "pushup" | "pushups" => Ok(ExerciseKind::PushUp),
            "lunge" | "lunges" => Ok(ExerciseKind::Lunge),
            _ => Err(CoreError::UnknownExercise(s.to_string())),
        }
    }
}

/// A joint angle, defined by the three landmarks around its vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointKind {
    /// hip → knee → ankle
    Knee,
    /// shoulder → elbow → wrist
    Elbow,
    /// shoulder → hip → knee
    Hip,
    /// shoulder → hip → ankle; 180° is a straight plank.
    BodyLine,
}

impl JointKind {
    /// Landmark parts (side prefix omitted); the middle one is the vertex.
    pub fn landmarks(&self) -> [&'static str; 3] {
        match self {
            JointKind::Knee => ["hip", "knee", "ankle"],
            JointKind::Elbow => ["shoulder", "elbow", "wrist"],
            JointKind::Hip => ["shoulder", "hip", "knee"],
            JointKind::BodyLine => ["shoulder", "hip", "ankle"],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            JointKind::Knee => "knee",
            JointKind::Elbow => "elbow",
            JointKind::Hip => "hip",
            JointKind::BodyLine => "body line",
        }
    }
}

/// How to reduce the left/right primary angle to one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimbStrategy {
    /// Average both sides when both are visible, else use whichever is.
    Average,
    /// Pick one side once per session and track only that side.
    Lock,
}

/// Angle band in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleBand {
    /// Above this the limb is "up" (extended).
    pub up: f32,
    /// Below this the limb is "down" (flexed).
    pub down: f32,
    pub tolerance: f32,
}

impl AngleBand {
    pub const fn new(down: f32, up: f32, tolerance: f32) -> Self {
        Self { up, down, tolerance }
    }

    pub fn midpoint(&self) -> f32 {
        (self.up + self.down) / 2.0
    }
}

/// Auxiliary joint checked only for correctness, never for phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryConstraint {
    pub joint: JointKind,
    /// `up`/`down` here are the expected angles in each phase.
    pub band: AngleBand,
    /// Cue spoken when the constraint fails in the "up" phase.
    pub up_cue: String,
    /// Cue spoken when the constraint fails in the "down" phase.
    pub down_cue: String,
}

/// Immutable thresholds for one exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseProfile {
    pub kind: ExerciseKind,
    pub name: String,
    pub primary: JointKind,
    pub band: AngleBand,
    pub limb: LimbStrategy,
    /// Split between "going_down" and "going_up" labels; midpoint when `None`.
    #[serde(default)]
    pub transition_split: Option<f32>,
    #[serde(default)]
    pub secondary: Option<SecondaryConstraint>,
}

impl ExerciseProfile {
    pub fn id(&self) -> &'static str {
        self.kind.id()
    }

    pub fn split_point(&self) -> f32 {
        self.transition_split.unwrap_or_else(|| self.band.midpoint())
    }

    pub fn squat() -> Self {
        Self {
            kind: ExerciseKind::Squat,
            name: "Squat".to_string(),
            primary: JointKind::Knee,
            band: AngleBand::new(90.0, 160.0, 15.0),
            limb: LimbStrategy::Average,
            transition_split: None,
            secondary: Some(SecondaryConstraint {
                joint: JointKind::Hip,
                band: AngleBand::new(80.0, 170.0, 10.0),
                up_cue: "Stand up straighter".to_string(),
                down_cue: "Adjust your hip position".to_string(),
            }),
        }
    }

    pub fn push_up() -> Self {
        Self {
            kind: ExerciseKind::PushUp,
            name: "Push-up".to_string(),
            primary: JointKind::Elbow,
            band: AngleBand::new(90.0, 160.0, 10.0),
            limb: LimbStrategy::Lock,
            transition_split: None,
            secondary: Some(SecondaryConstraint {
                joint: JointKind::BodyLine,
                band: AngleBand::new(170.0, 170.0, 15.0),
                up_cue: "Keep your body in a straight line".to_string(),
                down_cue: "Don't let your hips sag".to_string(),
            }),
        }
    }

    pub fn lunge() -> Self {
        Self {
            kind: ExerciseKind::Lunge,
            name: "Lunge".to_string(),
            primary: JointKind::Knee,
            band: AngleBand::new(90.0, 160.0, 15.0),
            limb: LimbStrategy::Average,
            transition_split: None,
            secondary: Some(SecondaryConstraint {
                joint: JointKind::Hip,
                band: AngleBand::new(90.0, 170.0, 15.0),
                up_cue: "Stand up straighter".to_string(),
                down_cue: "Keep your torso upright".to_string(),
            }),
        }
    }

    pub fn builtin(kind: ExerciseKind) -> Self {
        match kind {
            ExerciseKind::Squat => Self::squat(),
            ExerciseKind::PushUp => Self::push_up(),
            ExerciseKind::Lunge => Self::lunge(),
        }
    }
}

/// Lookup table from exercise id to profile.
#[derive(Debug, Clone)]
pub struct ExerciseTable {
    profiles: HashMap<ExerciseKind, ExerciseProfile>,
}

impl ExerciseTable {
    pub fn empty() -> Self {
        Self {
            profiles: HashMap::new(),
        }
    }

    /// Table with the built-in squat, push-up, and lunge profiles.
    pub fn builtin() -> Self {
        let profiles = ExerciseKind::ALL
            .iter()
            .map(|k| (*k, ExerciseProfile::builtin(*k)))
            .collect();
        Self { profiles }
    }

    /// Replace the profile for its kind.
    pub fn insert(&mut self, profile: ExerciseProfile) {
        self.profiles.insert(profile.kind, profile);
    }

    pub fn get(&self, kind: ExerciseKind) -> Option<&ExerciseProfile> {
        self.profiles.get(&kind)
    }

    /// Resolve an exercise identifier. Unknown or unconfigured kinds are an error.
    pub fn lookup(&self, id: &str) -> CoreResult<&ExerciseProfile> {
        let kind: ExerciseKind = id.parse()?;
        self.get(kind)
            .ok_or_else(|| CoreError::UnknownExercise(id.to_string()))
    }

    pub fn kinds(&self) -> impl Iterator<Item = ExerciseKind> + '_ {
        self.profiles.keys().copied()
    }
}

impl Default for ExerciseTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_catalogue_ids() {
        assert_eq!("squat1".parse::<ExerciseKind>().unwrap(), ExerciseKind::Squat);
        assert_eq!("Push-up".parse::<ExerciseKind>().unwrap(), ExerciseKind::PushUp);
        assert_eq!("lunge1".parse::<ExerciseKind>().unwrap(), ExerciseKind::Lunge);
        assert!("deadlift".parse::<ExerciseKind>().is_err());
    }

    #[test]
    fn unknown_exercise_fails_closed() {
        let table = ExerciseTable::builtin();
        let err = table.lookup("burpee").unwrap_err();
        assert!(matches!(err, CoreError::UnknownExercise(ref id) if id == "burpee"));
    }

    #[test]
    fn missing_profile_in_table_fails_closed() {
        let table = ExerciseTable::empty();
        assert!(table.lookup("squat").is_err());
    }

    #[test]
    fn primary_joints_match_exercise() {
        let table = ExerciseTable::builtin();
        assert_eq!(table.lookup("squat").unwrap().primary, JointKind::Knee);
        assert_eq!(table.lookup("lunge").unwrap().primary, JointKind::Knee);
        assert_eq!(table.lookup("pushup").unwrap().primary, JointKind::Elbow);
    }

    #[test]
    fn split_defaults_to_midpoint() {
        let mut squat = ExerciseProfile::squat();
        assert_eq!(squat.split_point(), 125.0);
        squat.transition_split = Some(110.0);
        assert_eq!(squat.split_point(), 110.0);
    }
}
