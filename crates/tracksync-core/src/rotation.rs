//! Geodesic distance between rotations.

use std::f64::consts::PI;

use crate::{Mat3, Real};

/// Angle in radians of the relative rotation between `a` and `b`.
///
/// Computed as `acos((tr(a·bᵀ) − 1) / 2)` and folded into `[0, π]` via
/// `min(angle, 2π − angle)`. Round-off can push the cosine slightly outside
/// `[-1, 1]`; it is clamped so the result is never `NaN` for valid rotations.
///
/// Symmetric in its arguments and zero for identical inputs.
pub fn rotation_distance(a: &Mat3, b: &Mat3) -> Real {
    let trace = (a * b.transpose()).trace();
    let cos = ((trace - 1.0) * 0.5).clamp(-1.0, 1.0);
    let angle = cos.acos();
    angle.min(2.0 * PI - angle)
}

/// [`rotation_distance`] expressed in degrees.
#[inline]
pub fn rotation_distance_deg(a: &Mat3, b: &Mat3) -> Real {
    rotation_distance(a, b).to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Rotation3, Vector3};

    #[test]
    fn distance_matches_axis_angle() {
        let axis = Vector3::new(0.2, -0.5, 0.8).normalize();
        for angle in [0.0, 0.1, 1.0, 2.5, PI] {
            let r = *Rotation3::from_axis_angle(&nalgebra::Unit::new_normalize(axis), angle).matrix();
            let d = rotation_distance(&Mat3::identity(), &r);
            assert!((d - angle).abs() < 1e-7, "angle {angle}: got {d}");
        }
    }

    #[test]
    fn half_turn_is_clamped_not_nan() {
        let r = *Rotation3::from_euler_angles(PI, 0.0, 0.0).matrix();
        // Perturb so the trace dips just below -1.
        let perturbed = r * (1.0 + 1e-12);
        let d = rotation_distance(&Mat3::identity(), &perturbed);
        assert!(d.is_finite());
        assert!((d - PI).abs() < 1e-5);
    }

    #[test]
    fn degrees_variant() {
        let r = *Rotation3::from_euler_angles(0.0, 0.0, 0.5).matrix();
        let d = rotation_distance_deg(&r, &Mat3::identity());
        assert!((d - 0.5_f64.to_degrees()).abs() < 1e-6);
    }
}
