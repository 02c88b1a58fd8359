//! Homography estimation (plane-induced projective transform).
//!
//! Normalized Direct Linear Transform mapping points on a plane to image
//! points in pixels: `x' ~ H x`. Normalization is applied internally for
//! numerical stability and the output is de-normalized.

use nalgebra::DMatrix;
use thiserror::Error;
use tracksync_core::{Mat3, Pt2, Real};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum HomographyError {
    #[error("need at least 4 point correspondences, got {0}")]
    NotEnoughPoints(usize),
    #[error("point lists differ in length: {plane} plane vs {image} image")]
    LengthMismatch { plane: usize, image: usize },
    #[error("degenerate point configuration for normalization")]
    DegeneratePoints,
    #[error("svd failed")]
    SvdFailed,
}

/// Hartley normalization: center at the origin, mean distance `√2`.
///
/// Returns the normalized points and `T` with `p_norm = T · p_h`, or `None`
/// if `points` is empty or all points coincide.
pub fn normalize_points_2d(points: &[Pt2]) -> Option<(Vec<Pt2>, Mat3)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as Real;
    let cx = points.iter().map(|p| p.x).sum::<Real>() / n;
    let cy = points.iter().map(|p| p.y).sum::<Real>() / n;
    let mean_dist = points
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<Real>()
        / n;
    if mean_dist <= Real::EPSILON {
        return None;
    }

    let s = std::f64::consts::SQRT_2 / mean_dist;
    #[rustfmt::skip]
    let t = Mat3::new(
        s,   0.0, -s * cx,
        0.0, s,   -s * cy,
        0.0, 0.0, 1.0,
    );
    let normalized = points
        .iter()
        .map(|p| Pt2::new((p.x - cx) * s, (p.y - cy) * s))
        .collect();
    Some((normalized, t))
}

/// Estimate `H` such that `image ~ H · plane` with the normalized DLT.
///
/// The result is scaled so that `H[2,2] == 1` when possible.
pub fn dlt_homography(plane: &[Pt2], image: &[Pt2]) -> Result<Mat3, HomographyError> {
    let n = plane.len();
    if image.len() != n {
        return Err(HomographyError::LengthMismatch {
            plane: n,
            image: image.len(),
        });
    }
    if n < 4 {
        return Err(HomographyError::NotEnoughPoints(n));
    }

    let (plane_n, t_plane) = normalize_points_2d(plane).ok_or(HomographyError::DegeneratePoints)?;
    let (image_n, t_image) = normalize_points_2d(image).ok_or(HomographyError::DegeneratePoints)?;

    // Pad to at least 9 rows so the SVD yields a full V.
    let rows = (2 * n).max(9);
    let mut a = DMatrix::<Real>::zeros(rows, 9);
    for (i, (pw, pi)) in plane_n.iter().zip(&image_n).enumerate() {
        let (x, y, u, v) = (pw.x, pw.y, pi.x, pi.y);
        let r0 = 2 * i;
        let r1 = r0 + 1;

        a[(r0, 0)] = -x;
        a[(r0, 1)] = -y;
        a[(r0, 2)] = -1.0;
        a[(r0, 6)] = u * x;
        a[(r0, 7)] = u * y;
        a[(r0, 8)] = u;

        a[(r1, 3)] = -x;
        a[(r1, 4)] = -y;
        a[(r1, 5)] = -1.0;
        a[(r1, 6)] = v * x;
        a[(r1, 7)] = v * y;
        a[(r1, 8)] = v;
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t.ok_or(HomographyError::SvdFailed)?;
    // Right singular vector of the smallest singular value.
    let smallest = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .ok_or(HomographyError::SvdFailed)?;
    let h = v_t.row(smallest);

    let h_norm = Mat3::from_fn(|r, c| h[3 * r + c]);
    let t_image_inv = t_image.try_inverse().ok_or(HomographyError::SvdFailed)?;
    let mut h_mat = t_image_inv * h_norm * t_plane;

    let scale = h_mat[(2, 2)];
    if scale.abs() > Real::EPSILON {
        h_mat /= scale;
    }
    Ok(h_mat)
}
