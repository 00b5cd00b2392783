//! Unit conversion between display space and simulation space.
//!
//! The game layer talks in pixels and degrees; rapier talks in meters and
//! radians. The spatial mapping is a single fixed scale factor
//! ([`PIXELS_PER_METER`]) applied uniformly to both axes. Angles use the
//! standard degrees/radians pair and are independent of the spatial scale.
//!
//! Every function here is a pure scalar multiplication; the round trip
//! `to_display(to_sim(x)) == x` holds up to floating-point rounding.

use rapier2d::math::{Point, Real, Vector};

/// How many display pixels correspond to one simulation meter.
///
/// 30 px/m keeps typical sprite-sized bodies (tens of pixels) around a meter
/// in simulation space, where rapier's solver behaves best.
pub const PIXELS_PER_METER: Real = 30.0;

/// Reciprocal of [`PIXELS_PER_METER`].
pub const METERS_PER_PIXEL: Real = 1.0 / PIXELS_PER_METER;

/// Convert a display-unit scalar (pixels) to simulation units (meters).
#[inline]
pub fn to_sim(pixels: Real) -> Real {
    pixels * METERS_PER_PIXEL
}

/// Convert a simulation-unit scalar (meters) to display units (pixels).
#[inline]
pub fn to_display(meters: Real) -> Real {
    meters * PIXELS_PER_METER
}

/// Convert a display-space vector to simulation space.
#[inline]
pub fn to_sim_vec(pixels: Vector<Real>) -> Vector<Real> {
    pixels * METERS_PER_PIXEL
}

/// Convert a simulation-space vector to display space.
#[inline]
pub fn to_display_vec(meters: Vector<Real>) -> Vector<Real> {
    meters * PIXELS_PER_METER
}

/// Convert a display-space point to simulation space.
#[inline]
pub fn to_sim_point(pixels: Point<Real>) -> Point<Real> {
    Point::from(pixels.coords * METERS_PER_PIXEL)
}

/// Convert a simulation-space point to display space.
#[inline]
pub fn to_display_point(meters: Point<Real>) -> Point<Real> {
    Point::from(meters.coords * PIXELS_PER_METER)
}

/// Degrees to radians.
#[inline]
pub fn to_radians(degrees: Real) -> Real {
    degrees.to_radians()
}

/// Radians to degrees.
#[inline]
pub fn to_degrees(radians: Real) -> Real {
    radians.to_degrees()
}

/// Linear interpolation between `a` and `b` by factor `f`.
#[inline]
pub fn lerp(a: Real, b: Real, f: Real) -> Real {
    a + f * (b - a)
}

/// Rescale `v` so its length lies within `[min, max]`, preserving direction.
///
/// A vector shorter than `min` is stretched to `min`, longer than `max` is
/// shrunk to `max`, in between it is returned unchanged. A (near-)zero vector
/// has no direction to preserve and is returned as-is rather than normalized.
pub fn clamp_speed(v: Vector<Real>, min: Real, max: Real) -> Vector<Real> {
    let speed = v.norm();
    if speed <= Real::EPSILON {
        return v;
    }
    if speed < min {
        v * (min / speed)
    } else if speed > max {
        v * (max / speed)
    } else {
        v
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
