//! VIO/tracker calibration pipeline.
//!
//! Finds the time offset between a VIO track and a tracker track with both
//! sync objectives, then estimates the lever arm between the VIO pose frame
//! and the tracked body at the chosen offset.

mod problem;
mod state;
mod steps;

pub use problem::{
    SyncConfig, SyncReport, TagConfig, VioTrackerConfig, VioTrackerExport, VioTrackerInput,
    VioTrackerOutput, VioTrackerProblem,
};
pub use state::VioTrackerState;
pub use steps::{
    SyncOptions, TranslationStepOptions, run_calibration, step_sync, step_translation,
};
