//! Linear algebra type aliases and small SO(3) helpers.
//!
//! This module provides the fundamental types used throughout the workspace
//! and a few checks that keep rotation inputs honest.

use nalgebra::{Isometry3, Matrix3, Matrix4, Point2, Point3, Vector2, Vector3};

/// Scalar type used throughout the library (currently `f64`).
pub type Real = f64;

/// 2D vector with [`Real`] components.
pub type Vec2 = Vector2<Real>;
/// 3D vector with [`Real`] components.
pub type Vec3 = Vector3<Real>;
/// 2D point with [`Real`] coordinates.
pub type Pt2 = Point2<Real>;
/// 3D point with [`Real`] coordinates.
pub type Pt3 = Point3<Real>;
/// 3×3 matrix with [`Real`] entries.
pub type Mat3 = Matrix3<Real>;
/// 4×4 matrix with [`Real`] entries.
pub type Mat4 = Matrix4<Real>;
/// 3D rigid transform (SE(3)) using [`Real`].
pub type Iso3 = Isometry3<Real>;

/// Default tolerance used when checking that a matrix is a rotation.
pub const ROTATION_TOLERANCE: Real = 1e-6;

/// Convert a 2D point in Euclidean coordinates into homogeneous coordinates.
pub fn to_homogeneous(p: &Pt2) -> Vec3 {
    Vec3::new(p.x, p.y, 1.0)
}

/// Convert a 3D homogeneous vector back to a 2D point.
///
/// The caller is responsible for ensuring that `w != 0`.
pub fn from_homogeneous(v: &Vec3) -> Pt2 {
    Pt2::new(v.x / v.z, v.y / v.z)
}

/// Largest deviation of `m` from a proper rotation.
///
/// Returns `max(‖mᵀm − I‖∞, |det m − 1|)`; zero for an exact rotation and
/// `NaN` when `m` has non-finite entries.
pub fn rotation_deviation(m: &Mat3) -> Real {
    if m.iter().any(|v| !v.is_finite()) {
        return Real::NAN;
    }
    let ortho = (m.transpose() * m - Mat3::identity()).amax();
    let det = (m.determinant() - 1.0).abs();
    ortho.max(det)
}

/// Whether `m` is orthonormal with determinant +1 within `tol`.
pub fn is_rotation(m: &Mat3, tol: Real) -> bool {
    let dev = rotation_deviation(m);
    dev.is_finite() && dev <= tol
}

/// Project an arbitrary 3×3 matrix onto SO(3) (polar decomposition via SVD).
///
/// Returns `None` if the SVD does not produce both factors.
pub fn project_to_so3(m: &Mat3) -> Option<Mat3> {
    let svd = m.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let r = u * v_t;
    if r.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        Some(u_flipped * v_t)
    } else {
        Some(r)
    }
}
