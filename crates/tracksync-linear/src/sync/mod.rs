//! Time-offset search between a VIO track and a tracker track.
//!
//! Both tracks are zero-based on their own clocks; the search scans a grid of
//! candidate offsets in `[0, duration(tracker) − duration(vio)]` and keeps the
//! best objective value. Two objectives are provided:
//!
//! - [`variance`]: minimum population variance of the per-sample rotation
//!   distance between matched orientations,
//! - [`cosine`]: maximum cosine similarity between angular speed profiles.
//!
//! Both are deterministic; ties keep the earliest candidate.

pub mod cosine;
pub mod variance;

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracksync_core::{Real, TrackError, Trajectory};

pub use cosine::{CosineObjective, cosine_similarity, find_sync_max_cosine, stable_normalize};
pub use variance::{VarianceObjective, find_sync_min_variance, population_variance};

/// Default spacing between candidate offsets (seconds).
pub const DEFAULT_OFFSET_STEP: Real = 0.1;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SyncError {
    #[error(
        "VIO track ({vio:.3}s) must be strictly shorter than the tracker track ({tracker:.3}s)"
    )]
    InvalidTrackLengths { vio: Real, tracker: Real },
    #[error("degenerate track: {0}")]
    Degenerate(#[from] TrackError),
    #[error("offset step must be positive and finite, got {0}")]
    InvalidStep(Real),
    #[error("VIO angular speed profile is identically zero")]
    FlatSpeedProfile,
    #[error("objective is not finite at offset {offset}")]
    NonFiniteObjective { offset: Real },
}

/// Which of the two sync objectives produced an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncVariant {
    /// Minimum variance of the angular difference between matched orientations.
    MinVariance,
    /// Maximum cosine similarity of angular speed profiles.
    MaxCosine,
}

impl SyncVariant {
    pub fn name(self) -> &'static str {
        match self {
            SyncVariant::MinVariance => "min_variance",
            SyncVariant::MaxCosine => "max_cosine",
        }
    }

    /// Grid rounding used by this variant unless overridden.
    pub fn default_grid_rule(self) -> GridRule {
        match self {
            SyncVariant::MinVariance => GridRule::Ceil,
            SyncVariant::MaxCosine => GridRule::Floor,
        }
    }
}

impl std::fmt::Display for SyncVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Rounding applied to `max_offset / step` when sizing the offset grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridRule {
    Ceil,
    Floor,
}

/// Options for a single grid search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncSearchOptions {
    /// Nominal spacing between candidates (seconds).
    pub step: Real,
    pub grid_rule: GridRule,
}

impl SyncSearchOptions {
    /// Default options for `variant`: 0.1 s step and the variant's grid rule.
    pub fn for_variant(variant: SyncVariant) -> Self {
        Self {
            step: DEFAULT_OFFSET_STEP,
            grid_rule: variant.default_grid_rule(),
        }
    }
}

/// Objective value at one candidate offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncCandidate {
    pub offset: Real,
    pub objective: Real,
}

/// Result of one sync search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEstimate {
    pub variant: SyncVariant,
    /// Best offset (seconds) to add to zero-based VIO timestamps to land on
    /// the zero-based tracker clock.
    pub offset: Real,
    /// Objective value at `offset` (variance in deg² or cosine similarity).
    pub objective: Real,
    /// Every evaluated candidate in grid order.
    pub candidates: Vec<SyncCandidate>,
}

/// An objective scanned by [`grid_search`].
pub trait SyncObjective {
    const VARIANT: SyncVariant;

    /// Largest admissible offset for the tracks behind this objective.
    fn max_offset(&self) -> Real;

    /// Objective value at one offset.
    fn evaluate(&self, offset: Real) -> Result<Real, SyncError>;

    /// Whether `candidate` strictly beats `best`.
    fn improves(candidate: Real, best: Real) -> bool;
}

/// Candidate offsets `i · max / (n − 1)` for `i in 0..n`.
///
/// `n = round(max / step) + 1` with the rounding chosen by `rule`. The last
/// point is exactly `max_offset`; a one-point grid is `[max_offset]`.
pub fn offset_grid(max_offset: Real, step: Real, rule: GridRule) -> Result<Vec<Real>, SyncError> {
    if !step.is_finite() || step <= 0.0 {
        return Err(SyncError::InvalidStep(step));
    }
    let ratio = (max_offset / step).max(0.0);
    let intervals = match rule {
        GridRule::Ceil => ratio.ceil(),
        GridRule::Floor => ratio.floor(),
    } as usize;

    if intervals == 0 {
        return Ok(vec![max_offset]);
    }
    let denom = intervals as Real;
    let mut grid: Vec<Real> = (0..=intervals)
        .map(|i| max_offset * i as Real / denom)
        .collect();
    grid[intervals] = max_offset;
    Ok(grid)
}

/// Zero-based timestamps of both tracks plus the admissible offset range.
pub(crate) fn zero_based_pair(
    vio: &Trajectory,
    tracker: &Trajectory,
) -> Result<(Vec<Real>, Vec<Real>, Real), SyncError> {
    let vio_duration = vio.duration();
    let tracker_duration = tracker.duration();
    if vio_duration >= tracker_duration {
        return Err(SyncError::InvalidTrackLengths {
            vio: vio_duration,
            tracker: tracker_duration,
        });
    }
    let vio_t = vio.zero_based_timestamps();
    let tracker_t = tracker.zero_based_timestamps();
    let max_offset = tracker_t[tracker_t.len() - 1] - vio_t[vio_t.len() - 1];
    Ok((vio_t, tracker_t, max_offset))
}

/// Scan the grid built from `opts` and keep the first best candidate.
pub fn grid_search<O: SyncObjective>(
    objective: &O,
    opts: &SyncSearchOptions,
) -> Result<SyncEstimate, SyncError> {
    let grid = offset_grid(objective.max_offset(), opts.step, opts.grid_rule)?;

    let mut candidates = Vec::with_capacity(grid.len());
    let mut best: Option<SyncCandidate> = None;
    for offset in grid {
        let value = objective.evaluate(offset)?;
        if !value.is_finite() {
            return Err(SyncError::NonFiniteObjective { offset });
        }
        let candidate = SyncCandidate {
            offset,
            objective: value,
        };
        candidates.push(candidate);
        if best.is_none_or(|b| O::improves(value, b.objective)) {
            best = Some(candidate);
        }
    }

    // The grid always has at least one point.
    let best = best.unwrap_or(SyncCandidate {
        offset: 0.0,
        objective: Real::NAN,
    });
    debug!(
        "{} sync: offset {:.3}s, objective {:.6} over {} candidates",
        O::VARIANT,
        best.offset,
        best.objective,
        candidates.len()
    );

    Ok(SyncEstimate {
        variant: O::VARIANT,
        offset: best.offset,
        objective: best.objective,
        candidates,
    })
}

/// Run the requested sync search with its default options.
pub fn find_sync(
    variant: SyncVariant,
    vio: &Trajectory,
    tracker: &Trajectory,
) -> Result<SyncEstimate, SyncError> {
    let opts = SyncSearchOptions::for_variant(variant);
    match variant {
        SyncVariant::MinVariance => find_sync_min_variance(vio, tracker, &opts),
        SyncVariant::MaxCosine => find_sync_max_cosine(vio, tracker, &opts),
    }
}
