//! Session-based VIO/tracker calibration.
//!
//! ```no_run
//! use std::path::Path;
//! use tracksync_linear::HomographyTagPose;
//! use tracksync_pipeline::session::CalibrationSession;
//! use tracksync_pipeline::vio_tracker::{VioTrackerInput, VioTrackerProblem, run_calibration};
//! use tracksync_pipeline::io;
//! # fn main() -> anyhow::Result<()> {
//! let mut session = CalibrationSession::<VioTrackerProblem>::new();
//! let tag = session.config.square_tag();
//! session.set_input(VioTrackerInput {
//!     vio: io::load_vio_detections(Path::new("frames.jsonl"), &tag, &HomographyTagPose)?,
//!     tracker: io::load_tracker(Path::new("tracker.jsonl"))?,
//! })?;
//!
//! run_calibration(&mut session, None)?;
//! let export = session.export()?;
//! println!("offset {:.3}s", export.output.chosen.offset);
//! # Ok(())
//! # }
//! ```

pub mod io;
pub mod session;
pub mod vio_tracker;

pub use crate::session::{
    CalibrationSession, ExportRecord, InvalidationPolicy, LogEntry, ProblemType, SessionMetadata,
};

pub use crate::vio_tracker::{
    SyncOptions, TranslationStepOptions, VioTrackerConfig, VioTrackerExport, VioTrackerInput,
    VioTrackerOutput, VioTrackerProblem, VioTrackerState, run_calibration, step_sync,
    step_translation,
};
