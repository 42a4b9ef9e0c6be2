//! Joint angle calculation using the dot product.
//!
//! The angle at `vertex` is measured between the vectors vertex→a and vertex→c.

use serde::{Deserialize, Serialize};

/// Magnitudes below this are treated as a missing or coincident point.
const MIN_MAGNITUDE: f32 = 1e-4;

/// A 2D image-space point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<(f32, f32)> for Point {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

/// Angle ∠a-vertex-c in degrees, in [0, 180].
///
/// Uses cos(θ) = (v1 · v2) / (|v1| × |v2|), clamped to [-1, 1] before `acos`.
/// Returns 0.0 when either vector has (near) zero length. Real joints never sit at
/// 0°, so callers read a 0.0 result as "no usable angle".
pub fn angle_at(a: Point, vertex: Point, c: Point) -> f32 {
    let v1 = (a.x - vertex.x, a.y - vertex.y);
    let v2 = (c.x - vertex.x, c.y - vertex.y);

    let mag1 = v1.0.hypot(v1.1);
    let mag2 = v2.0.hypot(v2.1);
    if mag1 < MIN_MAGNITUDE || mag2 < MIN_MAGNITUDE {
        return 0.0;
    }

    let dot = v1.0 * v2.0 + v1.1 * v2.1;
    let cos_angle = (dot / (mag1 * mag2)).clamp(-1.0, 1.0);
    cos_angle.acos().to_degrees()
}
