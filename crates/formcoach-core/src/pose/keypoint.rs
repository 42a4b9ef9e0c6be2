//! Keypoints as produced by the external pose model (MoveNet/COCO naming).

use super::geometry::Point;
use serde::{Deserialize, Serialize};

/// Keypoints at or below this score are ignored when looking joints up.
pub const DEFAULT_KEYPOINT_MIN_SCORE: f32 = 0.3;

/// A named anatomical landmark with image-space position and detection score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    /// Landmark name, e.g. "left_knee".
    pub name: String,
    pub x: f32,
    pub y: f32,
    /// Detection confidence in [0, 1].
    pub score: f32,
}

impl Keypoint {
    pub fn new(name: impl Into<String>, x: f32, y: f32, score: f32) -> Self {
        Self {
            name: name.into(),
            x,
            y,
            score,
        }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Body side, used to build side-qualified landmark names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }

    /// "left" + "knee" → "left_knee".
    pub fn landmark(&self, part: &str) -> String {
        format!("{}_{}", self.as_str(), part)
    }
}

/// One frame's worth of keypoints for a single person.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseFrame {
    pub keypoints: Vec<Keypoint>,
}

impl PoseFrame {
    pub fn new(keypoints: Vec<Keypoint>) -> Self {
        Self { keypoints }
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    /// Keypoint by name, only if its score is above `min_score`.
    pub fn get(&self, name: &str, min_score: f32) -> Option<&Keypoint> {
        self.keypoints
            .iter()
            .find(|k| k.name == name && k.score > min_score)
    }

    /// Resolve `parts` on `side`; `None` unless every landmark clears `min_score`.
    pub fn chain(&self, side: Side, parts: &[&str; 3], min_score: f32) -> Option<[&Keypoint; 3]> {
        let a = self.get(&side.landmark(parts[0]), min_score)?;
        let b = self.get(&side.landmark(parts[1]), min_score)?;
        let c = self.get(&side.landmark(parts[2]), min_score)?;
        Some([a, b, c])
    }

    /// Resolve `parts`, taking each landmark from whichever side is visible (left first).
    pub fn chain_any_side(&self, parts: &[&str; 3], min_score: f32) -> Option<[&Keypoint; 3]> {
        let pick = |part: &str| {
            Side::BOTH
                .iter()
                .find_map(|side| self.get(&side.landmark(part), min_score))
        };
        Some([pick(parts[0])?, pick(parts[1])?, pick(parts[2])?])
    }
}

/// Mean score of a resolved landmark chain.
pub fn chain_score(chain: &[&Keypoint; 3]) -> f32 {
    chain.iter().map(|k| k.score).sum::<f32>() / 3.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> PoseFrame {
        PoseFrame::new(vec![
            Keypoint::new("left_hip", 0.0, 0.0, 0.9),
            Keypoint::new("left_knee", 0.0, 1.0, 0.8),
            Keypoint::new("left_ankle", 0.0, 2.0, 0.2),
            Keypoint::new("right_ankle", 0.1, 2.0, 0.7),
        ])
    }

    #[test]
    fn get_respects_min_score() {
        let f = frame();
        assert!(f.get("left_ankle", DEFAULT_KEYPOINT_MIN_SCORE).is_none());
        assert!(f.get("left_knee", DEFAULT_KEYPOINT_MIN_SCORE).is_some());
    }

    #[test]
    fn side_chain_requires_all_three() {
        let f = frame();
        assert!(f
            .chain(Side::Left, &["hip", "knee", "ankle"], DEFAULT_KEYPOINT_MIN_SCORE)
            .is_none());
    }

    #[test]
    fn any_side_chain_mixes_sides() {
        let f = frame();
        let chain = f
            .chain_any_side(&["hip", "knee", "ankle"], DEFAULT_KEYPOINT_MIN_SCORE)
            .expect("chain");
        assert_eq!(chain[2].name, "right_ankle");
        assert!((chain_score(&chain) - 0.8).abs() < 1e-4);
    }
}
