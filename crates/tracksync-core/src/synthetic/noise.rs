//! Deterministic noise helpers for synthetic tracks.
//!
//! The functions here avoid `thread_rng` and do not depend on the internal
//! algorithm of `rand` RNGs. This keeps synthetic datasets stable across
//! versions and platforms.

use nalgebra::{Rotation3, Unit};

use crate::{Mat3, Real, Vec3};

/// Deterministic small-angle rotation noise.
///
/// Each `(track_idx, sample_idx)` key yields a fixed rotation about a
/// pseudo-random axis with angle in `[-max_angle_rad, +max_angle_rad]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RotationNoise {
    /// Base seed controlling the pseudo-random sequence.
    pub seed: u64,
    /// Maximum absolute perturbation angle (radians).
    pub max_angle_rad: Real,
}

impl RotationNoise {
    /// Sample the perturbation rotation for a key.
    pub fn sample(&self, track_idx: usize, sample_idx: usize) -> Mat3 {
        let max_abs = self.max_angle_rad.abs();
        if max_abs == 0.0 {
            return Mat3::identity();
        }

        let key = mix_key(self.seed, track_idx, sample_idx);
        let axis = Vec3::new(
            unit_at(key, 0) - 0.5,
            unit_at(key, 1) - 0.5,
            unit_at(key, 2) - 0.5,
        );
        let Some(axis) = Unit::try_new(axis, 1e-12) else {
            return Mat3::identity();
        };
        let angle = (unit_at(key, 3) - 0.5) * 2.0 * max_abs;
        *Rotation3::from_axis_angle(&axis, angle).matrix()
    }

    /// Left-multiply `rotation` by the perturbation for a key.
    pub fn apply(&self, track_idx: usize, sample_idx: usize, rotation: &Mat3) -> Mat3 {
        self.sample(track_idx, sample_idx) * rotation
    }
}

/// Deterministic uniform position noise in `[-max_abs, +max_abs]` per axis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PositionNoise {
    pub seed: u64,
    pub max_abs: Real,
}

impl PositionNoise {
    pub fn sample(&self, track_idx: usize, sample_idx: usize) -> Vec3 {
        let max_abs = self.max_abs.abs();
        if max_abs == 0.0 {
            return Vec3::zeros();
        }
        let key = mix_key(self.seed, track_idx, sample_idx) ^ 0xD6E8_FEB8_6659_FD93;
        Vec3::new(
            (unit_at(key, 0) - 0.5) * 2.0 * max_abs,
            (unit_at(key, 1) - 0.5) * 2.0 * max_abs,
            (unit_at(key, 2) - 0.5) * 2.0 * max_abs,
        )
    }
}

#[inline]
fn unit_at(key: u64, lane: u64) -> Real {
    u64_to_unit_f64(splitmix64(key ^ lane.wrapping_mul(0x94D0_49BB_1331_11EB)))
}

#[inline]
fn mix_key(seed: u64, track_idx: usize, sample_idx: usize) -> u64 {
    seed ^ (track_idx as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (sample_idx as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9)
}

#[inline]
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[inline]
fn u64_to_unit_f64(x: u64) -> Real {
    // Top 53 bits -> [0, 1).
    let mantissa = x >> 11;
    (mantissa as Real) * (1.0 / ((1u64 << 53) as Real))
}
