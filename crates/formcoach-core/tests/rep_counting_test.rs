//! Integration test: rep counting and form validation through the public API.
//!
//! ## Scenarios
//! 1. The reference squat sequence counts exactly one rep, on the 165° tick.
//! 2. Low confidence never moves the machine.
//! 3. Aborted excursions never count; full traversals count once each.
//! 4. Validator boundaries are inclusive.
//! 5. Smoothing keeps at most W readings and returns their mean.

use formcoach_core::{
    angle_at, smooth, step, validate, ExerciseProfile, ExerciseTable, Phase, Point, RepStage,
};
use std::collections::VecDeque;

const MIN_CONFIDENCE: f32 = 0.6;

fn count_reps(profile: &ExerciseProfile, angles: &[f32]) -> (u32, RepStage) {
    let mut stage = RepStage::Start;
    let mut reps = 0;
    for a in angles {
        let t = step(stage, *a, 0.9, profile, MIN_CONFIDENCE);
        assert_ne!(t.next, RepStage::Counted);
        stage = t.next;
        reps += t.rep_complete as u32;
    }
    (reps, stage)
}

#[test]
fn reference_squat_sequence() {
    let table = ExerciseTable::builtin();
    let squat = table.lookup("squat").unwrap();
    assert_eq!((squat.band.down, squat.band.up, squat.band.tolerance), (90.0, 160.0, 15.0));

    let angles = [170.0, 150.0, 120.0, 95.0, 85.0, 90.0, 120.0, 150.0, 165.0];
    let mut stage = RepStage::Start;
    let mut completions = Vec::new();
    for (i, a) in angles.iter().enumerate() {
        let t = step(stage, *a, 0.9, squat, MIN_CONFIDENCE);
        if i == 4 {
            assert_eq!(t.next, RepStage::Down);
        }
        if t.rep_complete {
            completions.push(i);
        }
        stage = t.next;
    }
    assert_eq!(completions, vec![8]);
    assert_eq!(stage, RepStage::Up);
}

#[test]
fn low_confidence_never_transitions() {
    let squat = ExerciseProfile::squat();
    let mut stage = RepStage::Down;
    for (i, a) in [85.0, 120.0, 170.0, 60.0].iter().enumerate() {
        let confidence = 0.59 - i as f32 * 0.1;
        let t = step(stage, *a, confidence, &squat, MIN_CONFIDENCE);
        assert_eq!(t.next, RepStage::Down);
        assert_eq!(t.phase, Phase::Neutral);
        assert!(!t.rep_complete);
        stage = t.next;
    }
}

#[test]
fn excursions_and_full_cycles() {
    for profile in [ExerciseProfile::squat(), ExerciseProfile::push_up(), ExerciseProfile::lunge()] {
        let (reps, stage) = count_reps(&profile, &[170.0, 80.0, 110.0, 130.0, 85.0]);
        assert_eq!(reps, 0, "{}", profile.name);
        assert_eq!(stage, RepStage::Down);

        let cycle = [80.0, 100.0, 140.0, 170.0, 140.0, 100.0];
        let angles: Vec<f32> = cycle.iter().cycle().take(cycle.len() * 3).copied().collect();
        let (reps, _) = count_reps(&profile, &angles);
        assert_eq!(reps, 3, "{}", profile.name);
    }
}

#[test]
fn validator_up_boundary() {
    let squat = ExerciseProfile::squat();
    let edge = squat.band.up - squat.band.tolerance;
    assert!(!validate(edge - 1.0, None, Some(&squat), Phase::Up).is_correct);
    assert!(validate(edge, None, Some(&squat), Phase::Up).is_correct);
}

#[test]
fn smoothing_window_property() {
    let window = 3;
    let mut buf = VecDeque::new();
    let fed: Vec<f32> = (0..10).map(|i| 90.0 + i as f32 * 7.5).collect();
    for (i, v) in fed.iter().enumerate() {
        let out = smooth(*v, &mut buf, window);
        assert!(buf.len() <= window);
        let n = (i + 1).min(window);
        let expected = fed[i + 1 - n..=i].iter().sum::<f32>() / n as f32;
        assert!((out - expected).abs() < 1e-3);
    }
}

#[test]
fn angle_symmetry_and_degenerate_input() {
    let a = Point::new(3.0, 9.0);
    let v = Point::new(5.0, 5.0);
    let c = Point::new(11.0, 2.0);
    assert!((angle_at(a, v, c) - angle_at(c, v, a)).abs() < 1e-4);
    assert_eq!(angle_at(v, v, c), 0.0);
}
