//! Sync by minimum variance of the angular difference.
//!
//! At the true offset the VIO and tracker orientations differ by a constant
//! frame rotation, so the rotation distance between matched samples is
//! constant and its variance vanishes.

use tracksync_core::{Mat3, Real, Trajectory, map_query_to_reference, rotation_distance_deg};

use super::{
    SyncError, SyncEstimate, SyncObjective, SyncSearchOptions, SyncVariant, grid_search,
    zero_based_pair,
};

/// Population variance (divides by `N`). Empty input yields `NaN`.
pub fn population_variance(values: &[Real]) -> Real {
    let n = values.len() as Real;
    let mean = values.iter().sum::<Real>() / n;
    values.iter().map(|v| (v - mean) * (v - mean)).sum::<Real>() / n
}

/// Variance of matched rotation distances (deg²) as a function of offset.
#[derive(Debug, Clone)]
pub struct VarianceObjective {
    vio_t: Vec<Real>,
    vio_r: Vec<Mat3>,
    tracker_t: Vec<Real>,
    tracker_r: Vec<Mat3>,
    max_offset: Real,
}

impl VarianceObjective {
    /// Fails with [`SyncError::InvalidTrackLengths`] unless the VIO track is
    /// strictly shorter than the tracker track.
    pub fn new(vio: &Trajectory, tracker: &Trajectory) -> Result<Self, SyncError> {
        let (vio_t, tracker_t, max_offset) = zero_based_pair(vio, tracker)?;
        Ok(Self {
            vio_t,
            vio_r: vio.rotations(),
            tracker_t,
            tracker_r: tracker.rotations(),
            max_offset,
        })
    }

    /// Per-sample rotation distance (degrees) after matching at `offset`.
    pub fn angular_differences(&self, offset: Real) -> Vec<Real> {
        let map = map_query_to_reference(&self.vio_t, &self.tracker_t, offset);
        self.vio_r
            .iter()
            .zip(map)
            .map(|(r, j)| rotation_distance_deg(r, &self.tracker_r[j]))
            .collect()
    }
}

impl SyncObjective for VarianceObjective {
    const VARIANT: SyncVariant = SyncVariant::MinVariance;

    fn max_offset(&self) -> Real {
        self.max_offset
    }

    fn evaluate(&self, offset: Real) -> Result<Real, SyncError> {
        Ok(population_variance(&self.angular_differences(offset)))
    }

    fn improves(candidate: Real, best: Real) -> bool {
        candidate < best
    }
}

/// Offset minimizing the variance of the angular difference between
/// matched orientations.
pub fn find_sync_min_variance(
    vio: &Trajectory,
    tracker: &Trajectory,
    opts: &SyncSearchOptions,
) -> Result<SyncEstimate, SyncError> {
    let objective = VarianceObjective::new(vio, tracker)?;
    grid_search(&objective, opts)
}
