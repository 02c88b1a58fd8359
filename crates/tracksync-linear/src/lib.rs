//! Closed-form and grid-search solvers for VIO/tracker calibration.
//!
//! - [`sync`]: time-offset search (minimum angular-difference variance and
//!   maximum angular-speed cosine similarity).
//! - [`translation`]: lever arm between the VIO pose frame and the tracked
//!   body, from pair differences and stacked least squares.
//! - [`homography`] / [`tag_pose`]: pose of a square tag from its four image
//!   corners, used to turn tag detections into a VIO track.
//!
//! Every solver is deterministic and single-threaded and returns a typed
//! error; none of them installs a logger.

pub mod homography;
pub mod sync;
pub mod tag_pose;
pub mod translation;

pub use homography::{HomographyError, dlt_homography, normalize_points_2d};
pub use sync::{
    CosineObjective, DEFAULT_OFFSET_STEP, GridRule, SyncCandidate, SyncError, SyncEstimate,
    SyncObjective, SyncSearchOptions, SyncVariant, VarianceObjective, cosine_similarity, find_sync,
    find_sync_max_cosine, find_sync_min_variance, grid_search, offset_grid, population_variance,
    stable_normalize,
};
pub use tag_pose::{
    CameraIntrinsics, DEFAULT_TAG_SIDE, HomographyTagPose, SquareTag, TagPoseError,
    TagPoseEstimator, pose_from_homography,
};
pub use translation::{
    LeverArmEstimate, LeverArmProblem, PairEstimate, TranslationError, TranslationOptions,
};
