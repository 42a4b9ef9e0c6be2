//! Form validator.
//!
//! Judges form only in the resting phases ("up" and "down"); transition phases are
//! never judged. A failing secondary constraint replaces the primary message.

use super::profiles::ExerciseProfile;
use super::rep_counter::Phase;
use serde::{Deserialize, Serialize};

pub const GOOD_FORM: &str = "Good form!";
pub const NO_CRITERIA: &str = "No form criteria available for this exercise";

/// Verdict for one frame.
///
/// Posture messages are fixed cues so one continuing fault reads the same on every
/// frame; the measured angles live in `detail`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormCheck {
    pub is_correct: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl FormCheck {
    pub fn pass() -> Self {
        Self {
            is_correct: true,
            message: GOOD_FORM.to_string(),
            detail: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            is_correct: false,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Validate angles against `profile` for `phase`.
///
/// `secondary` is ignored when absent or 0° (no usable angle). Without a profile
/// the check fails closed.
pub fn validate(
    primary: f32,
    secondary: Option<f32>,
    profile: Option<&ExerciseProfile>,
    phase: Phase,
) -> FormCheck {
    let Some(profile) = profile else {
        return FormCheck::fail(NO_CRITERIA);
    };
    if !phase.is_resting() {
        return FormCheck::pass();
    }

    let band = &profile.band;
    let joint = profile.primary.label();
    let mut check = FormCheck::pass();

    match phase {
        Phase::Up => {
            let floor = band.up - band.tolerance;
            if primary < floor {
                check = FormCheck::fail(format!(
                    "Extend your {joint} more: {:.0}° short of the {:.0}° target",
                    band.up - primary,
                    band.up
                ))
                .with_detail(format!("{joint} {:.0}°", primary));
            }
        }
        Phase::Down => {
            let ceiling = band.down + band.tolerance;
            if primary > ceiling {
                check = FormCheck::fail(format!(
                    "Go lower: bend your {joint} {:.0}° more to reach {:.0}°",
                    primary - band.down,
                    band.down
                ))
                .with_detail(format!("{joint} {:.0}°", primary));
            }
        }
        _ => {}
    }

    if let (Some(constraint), Some(angle)) = (&profile.secondary, secondary.filter(|a| *a > 0.0)) {
        let (expected, cue) = match phase {
            Phase::Up => (constraint.band.up, &constraint.up_cue),
            _ => (constraint.band.down, &constraint.down_cue),
        };
        if (angle - expected).abs() > constraint.band.tolerance {
            check = FormCheck::fail(cue.as_str()).with_detail(format!(
                "{} {:.0}°, target {:.0}°",
                constraint.joint.label(),
                angle,
                expected
            ));
        }
    }

    check
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn up_phase_boundary_is_inclusive() {
        let squat = ExerciseProfile::squat();
        let floor = squat.band.up - squat.band.tolerance;

        let at = validate(floor, None, Some(&squat), Phase::Up);
        assert!(at.is_correct);
        assert_eq!(at.message, GOOD_FORM);

        let below = validate(floor - 1.0, None, Some(&squat), Phase::Up);
        assert!(!below.is_correct);
        assert!(below.message.contains("16°"), "{}", below.message);
        assert!(below.message.contains("160°"), "{}", below.message);
        assert_eq!(below.detail.as_deref(), Some("knee 144°"));
    }

    #[test]
    fn down_phase_boundary_is_inclusive() {
        let squat = ExerciseProfile::squat();
        let ceiling = squat.band.down + squat.band.tolerance;
        assert!(validate(ceiling, None, Some(&squat), Phase::Down).is_correct);
        let high = validate(ceiling + 1.0, None, Some(&squat), Phase::Down);
        assert!(!high.is_correct);
        assert!(high.message.starts_with("Go lower"));
    }

    #[test]
    fn transition_phases_are_not_judged() {
        let squat = ExerciseProfile::squat();
        for phase in [Phase::GoingUp, Phase::GoingDown, Phase::Neutral] {
            assert!(validate(10.0, Some(10.0), Some(&squat), phase).is_correct);
        }
    }

    #[test]
    fn secondary_failure_overrides_primary_message() {
        let squat = ExerciseProfile::squat();
        // Primary fails (too shallow) and hip is far from 80°.
        let check = validate(120.0, Some(130.0), Some(&squat), Phase::Down);
        assert!(!check.is_correct);
        assert_eq!(check.message, "Adjust your hip position");
        assert_eq!(check.detail.as_deref(), Some("hip 130°, target 80°"));
    }

    #[test]
    fn fault_message_is_stable_as_angle_jitters() {
        let squat = ExerciseProfile::squat();
        let messages: std::collections::HashSet<String> = (0..10)
            .map(|i| validate(80.0, Some(150.0 + i as f32 * 0.7), Some(&squat), Phase::Down).message)
            .collect();
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn secondary_alone_fails_check() {
        let squat = ExerciseProfile::squat();
        let check = validate(170.0, Some(140.0), Some(&squat), Phase::Up);
        assert!(!check.is_correct);
        assert_eq!(check.message, "Stand up straighter");
        assert!(validate(170.0, Some(168.0), Some(&squat), Phase::Up).is_correct);
    }

    #[test]
    fn missing_secondary_angle_is_skipped() {
        let pushup = ExerciseProfile::push_up();
        assert!(validate(170.0, Some(0.0), Some(&pushup), Phase::Up).is_correct);
        assert!(validate(170.0, None, Some(&pushup), Phase::Up).is_correct);
    }

    #[test]
    fn no_profile_fails_closed() {
        let check = validate(170.0, None, None, Phase::Up);
        assert!(!check.is_correct);
        assert_eq!(check.message, NO_CRITERIA);
    }
}
