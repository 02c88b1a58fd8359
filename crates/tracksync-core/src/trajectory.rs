//! Timestamped pose tracks.
//!
//! A [`Trajectory`] is validated once on construction and immutable after
//! that; every consumer can rely on finite non-decreasing timestamps and
//! proper rotations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Mat3, ROTATION_TOLERANCE, Real, Vec3, rotation_deviation};

/// Errors raised for malformed or degenerate tracks.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum TrackError {
    #[error("trajectory needs at least {required} samples, got {got}")]
    TooFewSamples { required: usize, got: usize },
    #[error("timestamp at index {index} is not finite")]
    NonFiniteTimestamp { index: usize },
    #[error("timestamp at index {index} ({value}) precedes the previous one ({previous})")]
    NonMonotonicTimestamp {
        index: usize,
        previous: Real,
        value: Real,
    },
    #[error("rotation at index {index} is not orthonormal (deviation {deviation:.3e})")]
    NotARotation { index: usize, deviation: Real },
    #[error("position at index {index} is not finite")]
    NonFinitePosition { index: usize },
    #[error("length mismatch: {left} timestamps vs {right} values")]
    LengthMismatch { left: usize, right: usize },
    #[error("time step after sample {index} is not positive")]
    ZeroTimeStep { index: usize },
}

/// One timestamped pose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseSample {
    /// Seconds on the source clock.
    pub timestamp: Real,
    /// Orientation of the body in the source frame.
    pub rotation: Mat3,
    /// Position of the body in the source frame.
    pub position: Vec3,
}

impl PoseSample {
    pub fn new(timestamp: Real, rotation: Mat3, position: Vec3) -> Self {
        Self {
            timestamp,
            rotation,
            position,
        }
    }
}

/// Ordered, validated sequence of pose samples from one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PoseSample>", into = "Vec<PoseSample>")]
pub struct Trajectory {
    samples: Vec<PoseSample>,
}

impl Trajectory {
    /// Minimum number of samples a trajectory must hold.
    pub const MIN_SAMPLES: usize = 2;

    /// Validate and wrap a list of samples.
    pub fn new(samples: Vec<PoseSample>) -> Result<Self, TrackError> {
        if samples.len() < Self::MIN_SAMPLES {
            return Err(TrackError::TooFewSamples {
                required: Self::MIN_SAMPLES,
                got: samples.len(),
            });
        }

        let mut previous = Real::NEG_INFINITY;
        for (index, s) in samples.iter().enumerate() {
            if !s.timestamp.is_finite() {
                return Err(TrackError::NonFiniteTimestamp { index });
            }
            if s.timestamp < previous {
                return Err(TrackError::NonMonotonicTimestamp {
                    index,
                    previous,
                    value: s.timestamp,
                });
            }
            previous = s.timestamp;

            let deviation = rotation_deviation(&s.rotation);
            if !deviation.is_finite() || deviation > ROTATION_TOLERANCE {
                return Err(TrackError::NotARotation { index, deviation });
            }
            if s.position.iter().any(|v| !v.is_finite()) {
                return Err(TrackError::NonFinitePosition { index });
            }
        }

        Ok(Self { samples })
    }

    /// Build a trajectory from parallel timestamp, rotation and position lists.
    pub fn from_parts(
        timestamps: &[Real],
        rotations: &[Mat3],
        positions: &[Vec3],
    ) -> Result<Self, TrackError> {
        if timestamps.len() != rotations.len() {
            return Err(TrackError::LengthMismatch {
                left: timestamps.len(),
                right: rotations.len(),
            });
        }
        if timestamps.len() != positions.len() {
            return Err(TrackError::LengthMismatch {
                left: timestamps.len(),
                right: positions.len(),
            });
        }
        let samples = timestamps
            .iter()
            .zip(rotations)
            .zip(positions)
            .map(|((&t, r), p)| PoseSample::new(t, *r, *p))
            .collect();
        Self::new(samples)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always `false` for a validated trajectory; provided for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[PoseSample] {
        &self.samples
    }

    pub fn first(&self) -> &PoseSample {
        &self.samples[0]
    }

    pub fn last(&self) -> &PoseSample {
        &self.samples[self.samples.len() - 1]
    }

    /// Time span between the first and last sample.
    pub fn duration(&self) -> Real {
        self.last().timestamp - self.first().timestamp
    }

    pub fn timestamps(&self) -> Vec<Real> {
        self.samples.iter().map(|s| s.timestamp).collect()
    }

    pub fn rotations(&self) -> Vec<Mat3> {
        self.samples.iter().map(|s| s.rotation).collect()
    }

    pub fn positions(&self) -> Vec<Vec3> {
        self.samples.iter().map(|s| s.position).collect()
    }

    /// Timestamps shifted so the first one is zero. The trajectory itself is
    /// left untouched.
    pub fn zero_based_timestamps(&self) -> Vec<Real> {
        let t0 = self.first().timestamp;
        self.samples.iter().map(|s| s.timestamp - t0).collect()
    }

    pub fn into_samples(self) -> Vec<PoseSample> {
        self.samples
    }
}

impl TryFrom<Vec<PoseSample>> for Trajectory {
    type Error = TrackError;

    fn try_from(samples: Vec<PoseSample>) -> Result<Self, Self::Error> {
        Self::new(samples)
    }
}

impl From<Trajectory> for Vec<PoseSample> {
    fn from(t: Trajectory) -> Self {
        t.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Rotation3;

    fn sample(t: Real) -> PoseSample {
        PoseSample::new(
            t,
            *Rotation3::from_euler_angles(0.1 * t, 0.0, 0.2).matrix(),
            Vec3::new(t, 0.0, 1.0),
        )
    }

    #[test]
    fn accepts_valid_track_and_reports_duration() {
        let traj = Trajectory::new((0..5).map(|k| sample(10.0 + k as Real * 0.5)).collect()).unwrap();
        assert_eq!(traj.len(), 5);
        assert!((traj.duration() - 2.0).abs() < 1e-12);

        let zero = traj.zero_based_timestamps();
        assert_eq!(zero[0], 0.0);
        assert!((zero[4] - 2.0).abs() < 1e-12);
        // Originals untouched.
        assert_eq!(traj.first().timestamp, 10.0);
    }

    #[test]
    fn rejects_short_and_disordered_tracks() {
        assert!(matches!(
            Trajectory::new(vec![sample(0.0)]),
            Err(TrackError::TooFewSamples { got: 1, .. })
        ));
        assert!(matches!(
            Trajectory::new(vec![sample(1.0), sample(0.5)]),
            Err(TrackError::NonMonotonicTimestamp { index: 1, .. })
        ));
        assert!(matches!(
            Trajectory::new(vec![sample(0.0), sample(Real::NAN)]),
            Err(TrackError::NonFiniteTimestamp { index: 1 })
        ));
    }

    #[test]
    fn equal_timestamps_are_allowed() {
        assert!(Trajectory::new(vec![sample(1.0), sample(1.0), sample(2.0)]).is_ok());
    }

    #[test]
    fn rejects_non_rotation_and_bad_position() {
        let mut bad = sample(1.0);
        bad.rotation *= 2.0;
        assert!(matches!(
            Trajectory::new(vec![sample(0.0), bad]),
            Err(TrackError::NotARotation { index: 1, .. })
        ));

        let mut far = sample(1.0);
        far.position.y = Real::INFINITY;
        assert!(matches!(
            Trajectory::new(vec![sample(0.0), far]),
            Err(TrackError::NonFinitePosition { index: 1 })
        ));
    }

    #[test]
    fn from_parts_checks_lengths() {
        let err = Trajectory::from_parts(&[0.0, 1.0], &[Mat3::identity()], &[Vec3::zeros(); 2])
            .unwrap_err();
        assert_eq!(err, TrackError::LengthMismatch { left: 2, right: 1 });
    }

    #[test]
    fn serde_revalidates() {
        let traj = Trajectory::new(vec![sample(0.0), sample(1.0)]).unwrap();
        let json = serde_json::to_string(&traj).unwrap();
        let back: Trajectory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, traj);

        let single = serde_json::to_string(&vec![sample(0.0)]).unwrap();
        assert!(serde_json::from_str::<Trajectory>(&single).is_err());
    }
}
