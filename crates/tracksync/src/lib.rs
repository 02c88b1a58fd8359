//! Temporal and spatial calibration of a VIO track against an external
//! tracker.
//!
//! Given two independently clocked 6-DoF trajectories of the same rigid
//! body, this crate finds the constant time offset between the clocks and
//! the lever arm between the VIO pose frame and the tracked body.
//!
//! # Quick Start
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! # let pair = tracksync::synthetic::SyncScenario::default().build()?;
//! # let (vio, tracker) = (pair.vio, pair.tracker);
//! use tracksync::prelude::*;
//! use tracksync::vio_tracker::{step_sync, step_translation};
//!
//! let mut session = CalibrationSession::<VioTrackerProblem>::new();
//! session.set_input(VioTrackerInput { vio, tracker })?;
//!
//! step_sync(&mut session, None)?;
//! step_translation(&mut session, None)?;
//!
//! let result = session.export()?;
//! println!("offset {:.3}s", result.output.chosen.offset);
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`session`] - Session framework (`CalibrationSession`, `ProblemType`)
//! - [`vio_tracker`] - Sync and lever-arm steps
//! - [`io`] - Line-delimited JSON record readers and writers
//! - [`core`] - Trajectories, rotation distance, resampling, angular speed
//! - [`linear`] - Sync searches, lever-arm solver, square-tag pose
//! - [`synthetic`] - Deterministic synthetic track pairs

// ═══════════════════════════════════════════════════════════════════════════════
// Session Framework
// ═══════════════════════════════════════════════════════════════════════════════

/// Session framework with JSON checkpointing.
pub mod session {
    pub use tracksync_pipeline::session::{
        CalibrationSession, ExportRecord, InvalidationPolicy, LogEntry, ProblemType,
        SessionMetadata,
    };
}

/// VIO/tracker calibration.
///
/// # Steps
/// 1. `step_sync` - time offset by minimum variance and maximum cosine
///    similarity; the preferred estimate is chosen
/// 2. `step_translation` - single-pair diagnostic estimates and the stacked
///    least-squares lever arm
pub mod vio_tracker {
    pub use tracksync_pipeline::vio_tracker::{
        // Problem type and config
        SyncConfig,
        // Step options
        SyncOptions,
        SyncReport,
        TagConfig,
        TranslationStepOptions,
        VioTrackerConfig,
        VioTrackerExport,
        VioTrackerInput,
        VioTrackerOutput,
        VioTrackerProblem,
        VioTrackerState,
        // Step functions
        run_calibration,
        step_sync,
        step_translation,
    };
}

pub mod io {
    pub use tracksync_pipeline::io::*;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Foundation Crates
// ═══════════════════════════════════════════════════════════════════════════════

pub mod core {
    pub use tracksync_core::*;
}

pub mod linear {
    pub use tracksync_linear::*;
}

pub mod synthetic {
    pub use tracksync_core::synthetic::*;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Convenience Re-exports (Top-Level)
// ═══════════════════════════════════════════════════════════════════════════════

pub use tracksync_core::{Mat3, PoseSample, Real, TrackError, Trajectory, Vec3};
pub use tracksync_linear::{
    LeverArmEstimate, PairEstimate, SyncEstimate, SyncVariant, find_sync_max_cosine,
    find_sync_min_variance,
};
pub use tracksync_pipeline::{CalibrationSession, ProblemType};
pub use tracksync_pipeline::{VioTrackerInput, VioTrackerProblem, run_calibration};

/// Common imports.
///
/// ```no_run
/// use tracksync::prelude::*;
/// ```
pub mod prelude {
    pub use crate::session::{CalibrationSession, ProblemType};

    pub use crate::vio_tracker::{VioTrackerConfig, VioTrackerInput, VioTrackerProblem};

    pub use crate::run_calibration;

    pub use crate::{Mat3, PoseSample, Real, SyncVariant, Trajectory, Vec3};
}
