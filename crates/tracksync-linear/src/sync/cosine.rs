//! Sync by maximum cosine similarity of angular speed profiles.
//!
//! Angular speed does not depend on the frame the orientations are expressed
//! in, so the VIO and tracker speed profiles line up at the true offset
//! regardless of the constant rotation between their frames.

use log::debug;
use tracksync_core::{Real, Trajectory, angular_speeds, map_query_to_reference};

use super::{
    SyncError, SyncEstimate, SyncObjective, SyncSearchOptions, SyncVariant, grid_search,
    zero_based_pair,
};

/// Scale `v` to unit L2 norm, dividing by the largest magnitude first so the
/// squared sum cannot overflow or underflow.
///
/// Returns `None` when `v` is identically zero (or empty).
pub fn stable_normalize(v: &[Real]) -> Option<Vec<Real>> {
    let scale = v.iter().fold(0.0_f64, |m, x| m.max(x.abs()));
    if scale == 0.0 || !scale.is_finite() {
        return None;
    }
    let scaled: Vec<Real> = v.iter().map(|x| x / scale).collect();
    let norm = scaled.iter().map(|x| x * x).sum::<Real>().sqrt();
    Some(scaled.into_iter().map(|x| x / norm).collect())
}

/// Cosine similarity of two equally long vectors; 0 when either is zero.
pub fn cosine_similarity(a: &[Real], b: &[Real]) -> Real {
    match (stable_normalize(a), stable_normalize(b)) {
        (Some(a), Some(b)) => a.iter().zip(&b).map(|(x, y)| x * y).sum(),
        _ => 0.0,
    }
}

/// Cosine similarity between VIO speeds and matched tracker speeds.
#[derive(Debug, Clone)]
pub struct CosineObjective {
    vio_t: Vec<Real>,
    tracker_t: Vec<Real>,
    /// Unit-norm VIO speed profile.
    vio_speeds: Vec<Real>,
    tracker_speeds: Vec<Real>,
    max_offset: Real,
}

impl CosineObjective {
    /// Fails when the tracks have the wrong relative length, contain a
    /// non-positive time step, or the VIO track never rotates.
    pub fn new(vio: &Trajectory, tracker: &Trajectory) -> Result<Self, SyncError> {
        let (vio_t, tracker_t, max_offset) = zero_based_pair(vio, tracker)?;
        let vio_speeds = angular_speeds(&vio.timestamps(), &vio.rotations())?;
        let tracker_speeds = angular_speeds(&tracker.timestamps(), &tracker.rotations())?;
        let vio_speeds = stable_normalize(&vio_speeds).ok_or(SyncError::FlatSpeedProfile)?;
        Ok(Self {
            vio_t,
            tracker_t,
            vio_speeds,
            tracker_speeds,
            max_offset,
        })
    }

    /// Tracker speeds matched to each VIO speed sample at `offset`.
    ///
    /// The index map may point at the final tracker pose, which has no
    /// outgoing speed; such indices are clamped to the last speed sample.
    pub fn matched_tracker_speeds(&self, offset: Real) -> Vec<Real> {
        let map = map_query_to_reference(&self.vio_t, &self.tracker_t, offset);
        let last = self.tracker_speeds.len() - 1;
        map.iter()
            .take(self.vio_speeds.len())
            .map(|&j| self.tracker_speeds[j.min(last)])
            .collect()
    }
}

impl SyncObjective for CosineObjective {
    const VARIANT: SyncVariant = SyncVariant::MaxCosine;

    fn max_offset(&self) -> Real {
        self.max_offset
    }

    fn evaluate(&self, offset: Real) -> Result<Real, SyncError> {
        let matched = self.matched_tracker_speeds(offset);
        match stable_normalize(&matched) {
            Some(m) => Ok(self.vio_speeds.iter().zip(&m).map(|(a, b)| a * b).sum()),
            None => {
                debug!("tracker speed profile is flat at offset {offset:.3}");
                Ok(0.0)
            }
        }
    }

    fn improves(candidate: Real, best: Real) -> bool {
        candidate > best
    }
}

/// Offset maximizing the cosine similarity between angular speed profiles.
pub fn find_sync_max_cosine(
    vio: &Trajectory,
    tracker: &Trajectory,
    opts: &SyncSearchOptions,
) -> Result<SyncEstimate, SyncError> {
    let objective = CosineObjective::new(vio, tracker)?;
    grid_search(&objective, opts)
}
