//! [`ProblemType`] implementation for VIO/tracker calibration.

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};
use tracksync_core::{Mat3, ROTATION_TOLERANCE, Real, Trajectory, is_rotation};
use tracksync_linear::{
    DEFAULT_OFFSET_STEP, DEFAULT_TAG_SIDE, GridRule, LeverArmEstimate, PairEstimate, SquareTag,
    SyncEstimate, SyncSearchOptions, SyncVariant, TranslationOptions,
};

use crate::session::{InvalidationPolicy, ProblemType};

use super::state::VioTrackerState;

/// Time offset and lever arm between a VIO track and a tracker track.
#[derive(Debug)]
pub struct VioTrackerProblem;

/// The two tracks to align.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VioTrackerInput {
    pub vio: Trajectory,
    pub tracker: Trajectory,
}

/// Offset-grid settings for both sync searches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Candidate spacing in seconds.
    pub step: Real,
    pub variance_grid: GridRule,
    pub cosine_grid: GridRule,
    /// Estimate used downstream when both searches succeed.
    pub preferred: SyncVariant,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            step: DEFAULT_OFFSET_STEP,
            variance_grid: SyncVariant::MinVariance.default_grid_rule(),
            cosine_grid: SyncVariant::MaxCosine.default_grid_rule(),
            preferred: SyncVariant::MinVariance,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagConfig {
    /// Printed side length in meters.
    pub side_length: Real,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            side_length: DEFAULT_TAG_SIDE,
        }
    }
}

/// Configuration for VIO/tracker calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VioTrackerConfig {
    pub sync: SyncConfig,
    /// Rotation from the VIO frame into the tracker frame, row-major.
    pub frame_rotation: [[Real; 3]; 3],
    pub translation: TranslationOptions,
    pub tag: TagConfig,
}

impl Default for VioTrackerConfig {
    fn default() -> Self {
        // Tag mounted on the base station: columns (-1,0,0), (0,0,1), (0,1,0).
        Self {
            sync: SyncConfig::default(),
            frame_rotation: [[-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]],
            translation: TranslationOptions::default(),
            tag: TagConfig::default(),
        }
    }
}

impl VioTrackerConfig {
    pub fn frame_rotation_matrix(&self) -> Mat3 {
        Mat3::from_fn(|r, c| self.frame_rotation[r][c])
    }

    /// Set the frame rotation from a matrix.
    pub fn with_frame_rotation(mut self, rotation: &Mat3) -> Self {
        self.frame_rotation = std::array::from_fn(|r| std::array::from_fn(|c| rotation[(r, c)]));
        self
    }

    /// Grid options for one sync variant.
    pub fn search_options(&self, variant: SyncVariant) -> SyncSearchOptions {
        let grid_rule = match variant {
            SyncVariant::MinVariance => self.sync.variance_grid,
            SyncVariant::MaxCosine => self.sync.cosine_grid,
        };
        SyncSearchOptions {
            step: self.sync.step,
            grid_rule,
        }
    }

    pub fn square_tag(&self) -> SquareTag {
        SquareTag {
            side_length: self.tag.side_length,
        }
    }
}

/// Sync result without the candidate scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub variant: SyncVariant,
    /// Offset between the zero-based clocks (seconds).
    pub offset: Real,
    pub objective: Real,
    /// `tracker_time = vio_time + clock_offset` on the raw clocks.
    pub clock_offset: Real,
}

impl SyncReport {
    pub fn from_estimate(estimate: &SyncEstimate, input: &VioTrackerInput) -> Self {
        Self {
            variant: estimate.variant,
            offset: estimate.offset,
            objective: estimate.objective,
            clock_offset: estimate.offset + input.tracker.first().timestamp
                - input.vio.first().timestamp,
        }
    }
}

/// Calibration result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VioTrackerOutput {
    /// One report per sync search that succeeded.
    pub syncs: Vec<SyncReport>,
    /// The report used for the translation step.
    pub chosen: SyncReport,
    /// Single-pair lever-arm estimates (first, last), (first, mid), (mid, last).
    pub diagnostic: Vec<PairEstimate>,
    /// Stacked least-squares lever arm, when the motion constrains it.
    pub lever_arm: Option<LeverArmEstimate>,
}

/// Exported calibration: the output plus the frame rotation it assumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VioTrackerExport {
    #[serde(flatten)]
    pub output: VioTrackerOutput,
    pub frame_rotation: [[Real; 3]; 3],
}

impl ProblemType for VioTrackerProblem {
    type Config = VioTrackerConfig;
    type Input = VioTrackerInput;
    type State = VioTrackerState;
    type Output = VioTrackerOutput;
    type Export = VioTrackerExport;

    fn name() -> &'static str {
        "vio_tracker_v1"
    }

    fn validate_input(input: &Self::Input) -> Result<()> {
        let (vio, tracker) = (input.vio.duration(), input.tracker.duration());
        ensure!(
            vio < tracker,
            "VIO track ({vio:.3}s) must be strictly shorter than the tracker track ({tracker:.3}s)"
        );
        Ok(())
    }

    fn validate_config(config: &Self::Config) -> Result<()> {
        let step = config.sync.step;
        ensure!(
            step.is_finite() && step > 0.0,
            "sync step must be positive, got {step}"
        );
        ensure!(config.translation.stride > 0, "translation stride must be positive");
        ensure!(
            config.translation.pinv_eps >= 0.0 && config.translation.min_singular_value >= 0.0,
            "translation tolerances must be non-negative"
        );
        ensure!(
            is_rotation(&config.frame_rotation_matrix(), ROTATION_TOLERANCE),
            "frame_rotation is not a proper rotation matrix"
        );
        let side = config.tag.side_length;
        ensure!(
            side.is_finite() && side > 0.0,
            "tag side length must be positive, got {side}"
        );
        Ok(())
    }

    fn on_input_change() -> InvalidationPolicy {
        InvalidationPolicy::CLEAR_COMPUTED
    }

    fn on_config_change() -> InvalidationPolicy {
        InvalidationPolicy::CLEAR_COMPUTED
    }

    fn export(output: &Self::Output, config: &Self::Config) -> Result<Self::Export> {
        Ok(VioTrackerExport {
            output: output.clone(),
            frame_rotation: config.frame_rotation,
        })
    }
}
