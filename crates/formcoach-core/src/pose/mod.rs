//! Pose primitives: keypoints, joint angles, and angle smoothing.

pub mod geometry;
pub mod keypoint;
pub mod smoothing;

pub use geometry::{angle_at, Point};
pub use keypoint::{Keypoint, PoseFrame, Side};
pub use smoothing::{smooth, AngleBuffer};
