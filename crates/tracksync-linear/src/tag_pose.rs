//! Pose of a square fiducial tag from its four image corners.
//!
//! The tag lies on `Z = 0` in its own frame, centered at the origin, with
//! corners in the fixed order bottom-left, bottom-right, top-right, top-left.
//! [`HomographyTagPose`] fits a homography from the tag plane to the image
//! and decomposes it into a rotation (projected onto SO(3)) and translation.

use nalgebra::{Rotation3, Translation3, UnitQuaternion};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracksync_core::{Iso3, Mat3, Pt2, Real, Vec3, project_to_so3};

use crate::homography::{HomographyError, dlt_homography};

/// Default printed tag side length (meters).
pub const DEFAULT_TAG_SIDE: Real = 0.025;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum TagPoseError {
    #[error("focal lengths must be positive and finite, got fx={fx}, fy={fy}")]
    InvalidFocalLength { fx: Real, fy: Real },
    #[error("tag side length must be positive and finite, got {0}")]
    InvalidTagSize(Real),
    #[error("corner coordinates must be finite")]
    NonFiniteCorner,
    #[error("corners {0}, {1} and {2} are collinear")]
    CollinearCorners(usize, usize, usize),
    #[error(transparent)]
    Homography(#[from] HomographyError),
    #[error("degenerate homography for pose extraction")]
    DegenerateHomography,
}

/// Pinhole intrinsics without skew or distortion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub fx: Real,
    pub fy: Real,
    pub cx: Real,
    pub cy: Real,
}

impl CameraIntrinsics {
    /// Upper-triangular camera matrix `K`.
    pub fn k_matrix(&self) -> Mat3 {
        Mat3::new(self.fx, 0.0, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0)
    }

    /// Project a point given in camera coordinates to pixels.
    pub fn project(&self, p: &Vec3) -> Pt2 {
        Pt2::new(
            self.fx * p.x / p.z + self.cx,
            self.fy * p.y / p.z + self.cy,
        )
    }

    fn validate(&self) -> Result<(), TagPoseError> {
        let ok = |f: Real| f.is_finite() && f > 0.0;
        if ok(self.fx) && ok(self.fy) && self.cx.is_finite() && self.cy.is_finite() {
            Ok(())
        } else {
            Err(TagPoseError::InvalidFocalLength {
                fx: self.fx,
                fy: self.fy,
            })
        }
    }
}

/// Square planar tag of a given side length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SquareTag {
    pub side_length: Real,
}

impl Default for SquareTag {
    fn default() -> Self {
        Self {
            side_length: DEFAULT_TAG_SIDE,
        }
    }
}

impl SquareTag {
    /// Corner coordinates on the tag plane: bottom-left, bottom-right,
    /// top-right, top-left.
    pub fn corners(&self) -> [Pt2; 4] {
        let h = self.side_length * 0.5;
        [
            Pt2::new(-h, -h),
            Pt2::new(h, -h),
            Pt2::new(h, h),
            Pt2::new(-h, h),
        ]
    }
}

/// Estimates the tag-to-camera transform from detected corners.
pub trait TagPoseEstimator {
    /// Returns the isometry mapping tag coordinates into camera coordinates.
    fn estimate(
        &self,
        corners: &[Pt2; 4],
        tag: &SquareTag,
        intrinsics: &CameraIntrinsics,
    ) -> Result<Iso3, TagPoseError>;
}

/// Homography decomposition for a single square tag.
#[derive(Debug, Clone, Copy, Default)]
pub struct HomographyTagPose;

impl TagPoseEstimator for HomographyTagPose {
    fn estimate(
        &self,
        corners: &[Pt2; 4],
        tag: &SquareTag,
        intrinsics: &CameraIntrinsics,
    ) -> Result<Iso3, TagPoseError> {
        intrinsics.validate()?;
        if !tag.side_length.is_finite() || tag.side_length <= 0.0 {
            return Err(TagPoseError::InvalidTagSize(tag.side_length));
        }
        if corners.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
            return Err(TagPoseError::NonFiniteCorner);
        }
        check_not_collinear(corners)?;

        let h = dlt_homography(&tag.corners(), corners)?;
        pose_from_homography(&intrinsics.k_matrix(), &h)
    }
}

fn check_not_collinear(corners: &[Pt2; 4]) -> Result<(), TagPoseError> {
    const TRIPLES: [(usize, usize, usize); 4] = [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)];
    for (a, b, c) in TRIPLES {
        let (p0, p1, p2) = (corners[a], corners[b], corners[c]);
        let area = (p1.x - p0.x) * (p2.y - p0.y) - (p1.y - p0.y) * (p2.x - p0.x);
        if area.abs() < 1e-9 {
            return Err(TagPoseError::CollinearCorners(a, b, c));
        }
    }
    Ok(())
}

/// Decompose a plane-to-image homography into the plane pose `T_C_T`.
///
/// With `K⁻¹H = λ[r1 r2 t]`, `λ` is taken from the average norm of the first
/// two columns and the sign is chosen so the tag lies in front of the camera.
pub fn pose_from_homography(kmtx: &Mat3, hmtx: &Mat3) -> Result<Iso3, TagPoseError> {
    let k_inv = kmtx
        .try_inverse()
        .ok_or(TagPoseError::DegenerateHomography)?;
    let m = k_inv * hmtx;
    let (c1, c2, c3) = (m.column(0), m.column(1), m.column(2));

    let denom = 0.5 * (c1.norm() + c2.norm());
    if denom.is_nan() || denom <= 1e-12 {
        return Err(TagPoseError::DegenerateHomography);
    }
    let sign = if c3[2] < 0.0 { -1.0 } else { 1.0 };
    let lambda = sign / denom;

    let r1 = c1 * lambda;
    let r2 = c2 * lambda;
    let t = c3 * lambda;
    let r3 = r1.cross(&r2);
    if r3.norm() <= 1e-12 {
        return Err(TagPoseError::DegenerateHomography);
    }

    let approx = Mat3::from_columns(&[r1, r2, r3]);
    let rot = project_to_so3(&approx).ok_or(TagPoseError::DegenerateHomography)?;
    let q = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(rot));
    Ok(Iso3::from_parts(Translation3::from(t), q))
}
