//! Lever-arm estimation between the VIO pose frame and the tracked body.
//!
//! Once the time offset is known, each VIO sample is paired with a tracker
//! sample. The model is
//!
//! `p_tracker(i) = F·p_vio(i) + (F·R_vio(i))·x + c`
//!
//! where `F` is the fixed rotation from the VIO frame to the tracker frame,
//! `x` the lever arm and `c` the tracker-frame origin offset. Differencing two
//! samples `a`, `b` eliminates `c`:
//!
//! `(R_w(b) − R_w(a))·x = Δp_tracker − F·Δp_vio`, with `R_w = F·R_vio`.
//!
//! The difference of two rotations is rank-deficient: the relative rotation
//! axis lies in its null space. A single pair therefore only pins down `x`
//! up to that axis; [`LeverArmProblem::pair_estimate`] uses the
//! pseudo-inverse, while [`LeverArmProblem::solve_least_squares`] stacks many
//! pairs with different axes.

use log::debug;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracksync_core::{
    Mat3, ROTATION_TOLERANCE, Real, Trajectory, Vec3, is_rotation, map_query_to_reference,
};

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum TranslationError {
    #[error("frame rotation is not a proper rotation matrix")]
    InvalidFrameRotation,
    #[error("pair stride must be positive")]
    InvalidStride,
    #[error("pair index ({first}, {second}) out of range for {len} matched samples")]
    PairOutOfRange {
        first: usize,
        second: usize,
        len: usize,
    },
    #[error("no sample pair with stride {stride} among {len} matched samples")]
    NotEnoughPairs { stride: usize, len: usize },
    #[error(
        "motion does not constrain the lever arm: smallest singular value {smallest:.3e} below {tolerance:.3e}"
    )]
    DegenerateMotion { smallest: Real, tolerance: Real },
    #[error("svd failed: {0}")]
    Svd(&'static str),
}

/// Options for the stacked least-squares solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationOptions {
    /// Index distance between the two samples of a pair.
    pub stride: usize,
    /// Smallest admissible singular value of the stacked system.
    pub min_singular_value: Real,
    /// Singular values below this are treated as zero in pseudo-inverses.
    pub pinv_eps: Real,
}

impl Default for TranslationOptions {
    fn default() -> Self {
        Self {
            stride: 10,
            min_singular_value: 1e-9,
            pinv_eps: 1e-9,
        }
    }
}

/// Lever arm recovered from one sample pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairEstimate {
    pub first: usize,
    pub second: usize,
    pub translation: Vec3,
    pub norm: Real,
    /// Singular values of `R_w(second) − R_w(first)`, descending. The last is
    /// always close to zero.
    pub singular_values: [Real; 3],
}

/// Lever arm recovered from all stride pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeverArmEstimate {
    pub lever_arm: Vec3,
    /// Tracker-frame origin offset `c`.
    pub origin_offset: Vec3,
    /// RMS of `p_tracker − F·p_vio − R_w·x − c` over all samples (meters).
    pub rms_residual: Real,
    pub pair_count: usize,
    /// Singular values of the stacked system, descending.
    pub singular_values: Vec<Real>,
}

/// VIO samples paired with tracker positions at a fixed time offset.
#[derive(Debug, Clone)]
pub struct LeverArmProblem {
    /// `F·R_vio(i)`.
    world_rotations: Vec<Mat3>,
    /// `F·p_vio(i)`.
    vio_positions: Vec<Vec3>,
    /// Tracker position matched to VIO sample `i`.
    tracker_positions: Vec<Vec3>,
}

impl LeverArmProblem {
    /// Pair every VIO sample with the first tracker sample at or after
    /// `t_vio + offset` (both clocks zero-based) and rotate the VIO poses by
    /// `frame_rotation`.
    pub fn from_tracks(
        vio: &Trajectory,
        tracker: &Trajectory,
        offset: Real,
        frame_rotation: &Mat3,
    ) -> Result<Self, TranslationError> {
        if !is_rotation(frame_rotation, ROTATION_TOLERANCE) {
            return Err(TranslationError::InvalidFrameRotation);
        }
        let map = map_query_to_reference(
            &vio.zero_based_timestamps(),
            &tracker.zero_based_timestamps(),
            offset,
        );
        let tracker_samples = tracker.samples();

        let mut world_rotations = Vec::with_capacity(vio.len());
        let mut vio_positions = Vec::with_capacity(vio.len());
        let mut tracker_positions = Vec::with_capacity(vio.len());
        for (s, j) in vio.samples().iter().zip(map) {
            world_rotations.push(frame_rotation * s.rotation);
            vio_positions.push(frame_rotation * s.position);
            tracker_positions.push(tracker_samples[j].position);
        }

        Ok(Self {
            world_rotations,
            vio_positions,
            tracker_positions,
        })
    }

    /// Number of matched samples.
    pub fn len(&self) -> usize {
        self.world_rotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.world_rotations.is_empty()
    }

    fn pair_system(&self, a: usize, b: usize) -> (Mat3, Vec3) {
        let d_rot = self.world_rotations[b] - self.world_rotations[a];
        let d_tracker = self.tracker_positions[b] - self.tracker_positions[a];
        let d_vio = self.vio_positions[b] - self.vio_positions[a];
        (d_rot, d_tracker - d_vio)
    }

    /// Lever arm from a single pair via the pseudo-inverse of the rotation
    /// difference.
    pub fn pair_estimate(
        &self,
        first: usize,
        second: usize,
        pinv_eps: Real,
    ) -> Result<PairEstimate, TranslationError> {
        let len = self.len();
        if first >= len || second >= len {
            return Err(TranslationError::PairOutOfRange { first, second, len });
        }
        let (d_rot, rhs) = self.pair_system(first, second);

        let svd = d_rot.svd(true, true);
        let mut singular_values = [
            svd.singular_values[0],
            svd.singular_values[1],
            svd.singular_values[2],
        ];
        singular_values.sort_by(|a, b| b.total_cmp(a));
        let pinv = svd.pseudo_inverse(pinv_eps).map_err(TranslationError::Svd)?;
        let translation = pinv * rhs;

        Ok(PairEstimate {
            first,
            second,
            translation,
            norm: translation.norm(),
            singular_values,
        })
    }

    /// The three single-pair estimates `(first, last)`, `(first, mid)` and
    /// `(mid, last)` with `mid = len / 2`.
    pub fn diagnostic(&self, pinv_eps: Real) -> Result<Vec<PairEstimate>, TranslationError> {
        let len = self.len();
        if len < 2 {
            return Err(TranslationError::NotEnoughPairs { stride: 1, len });
        }
        let last = len - 1;
        let mid = len / 2;
        [(0, last), (0, mid), (mid, last)]
            .into_iter()
            .map(|(a, b)| self.pair_estimate(a, b, pinv_eps))
            .collect()
    }

    /// Pairs `(k·stride, (k+1)·stride)` for every `k` that stays in range.
    pub fn stride_pairs(&self, stride: usize) -> Vec<(usize, usize)> {
        if stride == 0 {
            return Vec::new();
        }
        (0..)
            .map(|k| (k * stride, (k + 1) * stride))
            .take_while(|&(_, b)| b < self.len())
            .collect()
    }

    /// Stack all stride pairs and solve for the lever arm by SVD.
    pub fn solve_least_squares(
        &self,
        opts: &TranslationOptions,
    ) -> Result<LeverArmEstimate, TranslationError> {
        if opts.stride == 0 {
            return Err(TranslationError::InvalidStride);
        }
        let pairs = self.stride_pairs(opts.stride);
        if pairs.is_empty() {
            return Err(TranslationError::NotEnoughPairs {
                stride: opts.stride,
                len: self.len(),
            });
        }

        let rows = 3 * pairs.len();
        let mut mat_a = DMatrix::<Real>::zeros(rows, 3);
        let mut vec_b = DVector::<Real>::zeros(rows);
        for (idx, &(a, b)) in pairs.iter().enumerate() {
            let (d_rot, rhs) = self.pair_system(a, b);
            mat_a.view_mut((3 * idx, 0), (3, 3)).copy_from(&d_rot);
            vec_b.rows_mut(3 * idx, 3).copy_from(&rhs);
        }

        let svd = mat_a.svd(true, true);
        let mut singular_values: Vec<Real> = svd.singular_values.iter().copied().collect();
        singular_values.sort_by(|a, b| b.total_cmp(a));
        let smallest = singular_values[singular_values.len() - 1];
        if smallest.is_nan() || smallest < opts.min_singular_value {
            debug!(
                "lever-arm system rank deficient over {} pairs: singular values {:?}",
                pairs.len(),
                singular_values
            );
            return Err(TranslationError::DegenerateMotion {
                smallest,
                tolerance: opts.min_singular_value,
            });
        }
        let x = svd
            .solve(&vec_b, opts.pinv_eps)
            .map_err(TranslationError::Svd)?;
        let lever_arm = Vec3::new(x[0], x[1], x[2]);

        let offsets: Vec<Vec3> = (0..self.len())
            .map(|i| {
                self.tracker_positions[i]
                    - self.vio_positions[i]
                    - self.world_rotations[i] * lever_arm
            })
            .collect();
        let origin_offset = offsets.iter().sum::<Vec3>() / offsets.len() as Real;
        let sq_sum: Real = offsets
            .iter()
            .map(|o| (o - origin_offset).norm_squared())
            .sum();
        let rms_residual = (sq_sum / offsets.len() as Real).sqrt();

        debug!(
            "lever arm {:?} from {} pairs, rms residual {:.6}",
            lever_arm.as_slice(),
            pairs.len(),
            rms_residual
        );

        Ok(LeverArmEstimate {
            lever_arm,
            origin_offset,
            rms_residual,
            pair_count: pairs.len(),
            singular_values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracksync_core::synthetic::{SyncScenario, WobbleProfile};

    fn aligned_scenario(profile: WobbleProfile) -> SyncScenario {
        SyncScenario {
            profile,
            tracker_start: 0.0,
            tracker_duration: 10.0,
            tracker_samples: 1001,
            vio_shift: 2.0,
            vio_duration: 4.0,
            vio_samples: 401,
            vio_clock_start: 0.0,
            lever_arm: Vec3::new(0.04, -0.03, 0.12),
            origin_offset: Vec3::new(0.5, -1.0, 2.0),
            ..SyncScenario::default()
        }
    }

    // Slightly below the true shift so float rounding cannot push the match
    // one tracker sample forward.
    const ALIGNED_OFFSET: Real = 2.0 - 1e-6;

    #[test]
    fn least_squares_recovers_lever_arm_and_origin() {
        let sc = aligned_scenario(WobbleProfile::default());
        let pair = sc.build().unwrap();
        let problem =
            LeverArmProblem::from_tracks(&pair.vio, &pair.tracker, ALIGNED_OFFSET, &sc.frame_rotation)
                .unwrap();
        assert_eq!(problem.len(), 401);

        let est = problem
            .solve_least_squares(&TranslationOptions::default())
            .unwrap();
        assert_eq!(est.pair_count, 40);
        assert!((est.lever_arm - sc.lever_arm).norm() < 1e-6);
        assert!((est.origin_offset - sc.origin_offset).norm() < 1e-6);
        assert!(est.rms_residual < 1e-6);
    }

    #[test]
    fn single_pair_has_null_direction() {
        let sc = aligned_scenario(WobbleProfile::default());
        let pair = sc.build().unwrap();
        let problem =
            LeverArmProblem::from_tracks(&pair.vio, &pair.tracker, ALIGNED_OFFSET, &sc.frame_rotation)
                .unwrap();
        let diag = problem.diagnostic(1e-9).unwrap();
        assert_eq!(diag.len(), 3);
        assert_eq!((diag[0].first, diag[0].second), (0, 400));
        assert_eq!((diag[1].first, diag[1].second), (0, 200));
        assert_eq!((diag[2].first, diag[2].second), (200, 400));
        for d in &diag {
            assert!(d.singular_values[2] < 1e-9);
            assert!(d.singular_values[0] > 1e-3);
            assert!((d.norm - d.translation.norm()).abs() < 1e-12);
        }
    }

    #[test]
    fn planar_spin_is_degenerate() {
        let sc = aligned_scenario(WobbleProfile::planar());
        let pair = sc.build().unwrap();
        let problem =
            LeverArmProblem::from_tracks(&pair.vio, &pair.tracker, ALIGNED_OFFSET, &sc.frame_rotation)
                .unwrap();
        assert!(matches!(
            problem.solve_least_squares(&TranslationOptions::default()),
            Err(TranslationError::DegenerateMotion { .. })
        ));
    }

    #[test]
    fn stride_pairs_and_errors() {
        let sc = SyncScenario {
            vio_samples: 25,
            ..aligned_scenario(WobbleProfile::default())
        };
        let pair = sc.build().unwrap();
        let problem =
            LeverArmProblem::from_tracks(&pair.vio, &pair.tracker, 2.0, &sc.frame_rotation)
                .unwrap();
        assert_eq!(problem.stride_pairs(10), vec![(0, 10), (10, 20)]);

        let opts = TranslationOptions {
            stride: 30,
            ..TranslationOptions::default()
        };
        assert!(matches!(
            problem.solve_least_squares(&opts),
            Err(TranslationError::NotEnoughPairs { stride: 30, len: 25 })
        ));
        assert_eq!(
            problem.solve_least_squares(&TranslationOptions {
                stride: 0,
                ..opts
            }),
            Err(TranslationError::InvalidStride)
        );
        assert!(matches!(
            problem.pair_estimate(0, 25, 1e-9),
            Err(TranslationError::PairOutOfRange { .. })
        ));
    }

    #[test]
    fn rejects_non_rotation_frame() {
        let sc = aligned_scenario(WobbleProfile::default());
        let pair = sc.build().unwrap();
        let bad = Mat3::identity() * 2.0;
        assert!(matches!(
            LeverArmProblem::from_tracks(&pair.vio, &pair.tracker, 2.0, &bad),
            Err(TranslationError::InvalidFrameRotation)
        ));
    }
}
