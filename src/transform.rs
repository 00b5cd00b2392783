//! Display-space transform shared by every entity.
//!
//! Position and scale are in display units (pixels); rotation is stored in
//! radians because that is what both the canvas layer and rapier consume.
//! Degree accessors exist for game code that prefers to think in degrees.

use rapier2d::math::{Real, Vector};
use rapier2d::prelude::vector;

/// Position, rotation, and non-uniform scale of one entity.
///
/// For a physics-bound entity the transform is overwritten from the body once
/// per update and must never be treated as the source of truth between steps.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Position in display units (pixels).
    pub position: Vector<Real>,
    /// Non-uniform scale, 1.0 = unscaled.
    pub scale: Vector<Real>,
    /// Rotation in radians.
    pub rotation: Real,
}

impl Transform {
    /// Identity transform at the origin.
    pub fn new() -> Self {
        Self {
            position: vector![0.0, 0.0],
            scale: vector![1.0, 1.0],
            rotation: 0.0,
        }
    }

    /// Identity transform at the given display-space position.
    pub fn at(x: Real, y: Real) -> Self {
        Self {
            position: vector![x, y],
            ..Self::new()
        }
    }

    /// Rotation in degrees.
    pub fn rotation_degrees(&self) -> Real {
        self.rotation.to_degrees()
    }

    /// Set the rotation from degrees.
    pub fn set_rotation_degrees(&mut self, degrees: Real) {
        self.rotation = degrees.to_radians();
    }

    /// Copy all values from another transform.
    pub fn copy_from(&mut self, other: &Transform) {
        self.position = other.position;
        self.scale = other.scale;
        self.rotation = other.rotation;
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_identity() {
        let t = Transform::new();
        assert_eq!(t.position, vector![0.0, 0.0]);
        assert_eq!(t.scale, vector![1.0, 1.0]);
        assert_eq!(t.rotation, 0.0);
    }

    #[test]
    fn degree_accessors_round_trip() {
        let mut t = Transform::new();
        t.set_rotation_degrees(-23.0);
        assert!((t.rotation_degrees() + 23.0).abs() < 1e-4);
        assert!((t.rotation - (-23.0f32).to_radians()).abs() < 1e-6);
    }

    #[test]
    fn copy_from_copies_all_fields() {
        let mut a = Transform::new();
        let mut b = Transform::at(10.0, 20.0);
        b.scale = vector![2.0, 0.5];
        b.rotation = 1.25;
        a.copy_from(&b);
        assert_eq!(a, b);
    }
}
