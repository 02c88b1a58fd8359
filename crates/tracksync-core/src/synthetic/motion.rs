//! Smooth synthetic body motion and paired tracker/VIO tracks.
//!
//! The orientation profile uses a rotation rate that changes over time. A
//! constant rate would make every time-offset objective flat.

use nalgebra::Rotation3;
use serde::{Deserialize, Serialize};

use super::noise::{PositionNoise, RotationNoise};
use crate::{Mat3, PoseSample, Real, TrackError, Trajectory, Vec3};

/// Sum-of-sines orientation and position profile.
///
/// Orientation is `Rz(yaw(t)) · Rx(pitch(t))` with
/// `yaw(t) = Σ aᵢ sin(ωᵢ t + φᵢ)` and a single-term pitch wobble, which
/// rotates about a moving axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WobbleProfile {
    /// `(amplitude, angular frequency, phase)` terms of the yaw angle.
    pub yaw_terms: Vec<(Real, Real, Real)>,
    /// `(amplitude, angular frequency, phase)` of the pitch angle.
    pub pitch_term: (Real, Real, Real),
    /// Per-axis `(amplitude, angular frequency)` of the position path (meters).
    pub path_terms: [(Real, Real); 3],
}

impl Default for WobbleProfile {
    fn default() -> Self {
        Self {
            yaw_terms: vec![(0.6, 1.3, 0.0), (0.4, 2.9, 0.4), (0.2, 0.7, 0.0)],
            pitch_term: (0.3, 0.9, 1.0),
            path_terms: [(0.3, 0.5), (0.2, 0.4), (0.1, 0.8)],
        }
    }
}

impl WobbleProfile {
    /// Profile that only spins about the z axis. Useful to provoke
    /// degenerate lever-arm problems.
    pub fn planar() -> Self {
        Self {
            pitch_term: (0.0, 0.0, 0.0),
            ..Self::default()
        }
    }

    pub fn yaw(&self, t: Real) -> Real {
        self.yaw_terms
            .iter()
            .map(|&(a, w, p)| a * (w * t + p).sin())
            .sum()
    }

    pub fn pitch(&self, t: Real) -> Real {
        let (a, w, p) = self.pitch_term;
        a * (w * t + p).sin()
    }

    /// Body orientation at profile time `t`.
    pub fn rotation_at(&self, t: Real) -> Mat3 {
        let rz = Rotation3::from_euler_angles(0.0, 0.0, self.yaw(t));
        let rx = Rotation3::from_euler_angles(self.pitch(t), 0.0, 0.0);
        *(rz * rx).matrix()
    }

    /// Body position at profile time `t`.
    pub fn position_at(&self, t: Real) -> Vec3 {
        let [(ax, wx), (ay, wy), (az, wz)] = self.path_terms;
        Vec3::new(
            ax * (wx * t).sin(),
            ay * (wy * t).cos(),
            az * (wz * t).sin(),
        )
    }
}

/// `count` evenly spaced timestamps covering `[start, start + duration]`.
///
/// Sample `k` is `start + duration · k / (count − 1)`; a single sample sits
/// at `start`.
pub fn uniform_timestamps(start: Real, duration: Real, count: usize) -> Vec<Real> {
    if count <= 1 {
        return vec![start; count];
    }
    let denom = (count - 1) as Real;
    (0..count)
        .map(|k| start + duration * k as Real / denom)
        .collect()
}

/// A tracker track and a VIO track of the same body.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPair {
    pub tracker: Trajectory,
    pub vio: Trajectory,
}

/// Recipe for a tracker/VIO pair with a known time offset and lever arm.
///
/// Ground truth follows `p_tracker = F·p_vio + (F·R_vio)·x + c` with
/// `F = frame_rotation`, `x = lever_arm` and `c = origin_offset`, and
/// `R_tracker = F·R_vio`.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncScenario {
    pub profile: WobbleProfile,
    /// First tracker timestamp on the tracker clock.
    pub tracker_start: Real,
    pub tracker_duration: Real,
    pub tracker_samples: usize,
    /// Time after the first tracker sample at which the VIO track begins.
    /// This is the offset a sync search should recover.
    pub vio_shift: Real,
    pub vio_duration: Real,
    pub vio_samples: usize,
    /// First VIO timestamp on the VIO clock (unrelated to the tracker clock).
    pub vio_clock_start: Real,
    pub frame_rotation: Mat3,
    pub lever_arm: Vec3,
    pub origin_offset: Vec3,
    pub rotation_noise: RotationNoise,
    pub position_noise: PositionNoise,
}

impl Default for SyncScenario {
    fn default() -> Self {
        Self {
            profile: WobbleProfile::default(),
            tracker_start: 0.0,
            tracker_duration: 10.0,
            tracker_samples: 1001,
            vio_shift: 2.37,
            vio_duration: 4.0,
            vio_samples: 121,
            vio_clock_start: 50.0,
            frame_rotation: *Rotation3::from_euler_angles(-0.5, 0.0, 0.0).matrix(),
            lever_arm: Vec3::zeros(),
            origin_offset: Vec3::zeros(),
            rotation_noise: RotationNoise::default(),
            position_noise: PositionNoise::default(),
        }
    }
}

impl SyncScenario {
    /// Largest offset a sync search may return for this pair.
    pub fn max_offset(&self) -> Real {
        self.tracker_duration - self.vio_duration
    }

    /// Sample both tracks.
    pub fn build(&self) -> Result<TrackPair, TrackError> {
        let tracker_times = uniform_timestamps(
            self.tracker_start,
            self.tracker_duration,
            self.tracker_samples,
        );
        let tracker = tracker_times
            .iter()
            .enumerate()
            .map(|(k, &t)| {
                let local = t - self.tracker_start;
                let rotation = self.rotation_noise.apply(0, k, &self.profile.rotation_at(local));
                let position =
                    self.profile.position_at(local) + self.position_noise.sample(0, k);
                PoseSample::new(t, rotation, position)
            })
            .collect();

        let frame_inv = self.frame_rotation.transpose();
        let vio_local = uniform_timestamps(0.0, self.vio_duration, self.vio_samples);
        let vio = vio_local
            .iter()
            .enumerate()
            .map(|(k, &dt)| {
                let local = self.vio_shift + dt;
                let body = self.profile.rotation_at(local);
                let p_tracker = self.profile.position_at(local);
                let rotation = self.rotation_noise.apply(1, k, &(frame_inv * body));
                let position = frame_inv * (p_tracker - body * self.lever_arm - self.origin_offset)
                    + self.position_noise.sample(1, k);
                PoseSample::new(self.vio_clock_start + dt, rotation, position)
            })
            .collect();

        Ok(TrackPair {
            tracker: Trajectory::new(tracker)?,
            vio: Trajectory::new(vio)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{is_rotation, rotation_distance};

    #[test]
    fn timestamps_hit_both_ends() {
        let ts = uniform_timestamps(2.0, 4.0, 5);
        assert_eq!(ts, vec![2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(uniform_timestamps(1.0, 3.0, 1), vec![1.0]);
        assert!(uniform_timestamps(1.0, 3.0, 0).is_empty());
    }

    #[test]
    fn profile_rate_is_not_constant() {
        let p = WobbleProfile::default();
        let step = |t: Real| rotation_distance(&p.rotation_at(t), &p.rotation_at(t + 0.01));
        assert!(is_rotation(&p.rotation_at(0.7), 1e-9));
        assert!((step(0.0) - step(1.0)).abs() > 1e-4);
    }

    #[test]
    fn default_scenario_is_consistent() {
        let sc = SyncScenario::default();
        let pair = sc.build().unwrap();
        assert_eq!(pair.tracker.len(), 1001);
        assert_eq!(pair.vio.len(), 121);
        assert!((pair.vio.first().timestamp - 50.0).abs() < 1e-12);
        assert!((sc.max_offset() - 6.0).abs() < 1e-12);

        // VIO rotation composed with the frame rotation reproduces the body.
        let body = sc.profile.rotation_at(sc.vio_shift);
        let recomposed = sc.frame_rotation * pair.vio.first().rotation;
        assert!(rotation_distance(&body, &recomposed) < 1e-9);
    }

    #[test]
    fn vio_positions_follow_lever_arm_model() {
        let sc = SyncScenario {
            lever_arm: Vec3::new(0.05, -0.02, 0.1),
            origin_offset: Vec3::new(1.0, 2.0, 0.5),
            ..SyncScenario::default()
        };
        let pair = sc.build().unwrap();
        let s = &pair.vio.samples()[10];
        let local = sc.vio_shift + (s.timestamp - sc.vio_clock_start);
        let world_rot = sc.frame_rotation * s.rotation;
        let predicted =
            sc.frame_rotation * s.position + world_rot * sc.lever_arm + sc.origin_offset;
        assert!((predicted - sc.profile.position_at(local)).norm() < 1e-9);
    }
}
