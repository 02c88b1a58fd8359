//! Calibration sessions.
//!
//! A session is a mutable container for one calibration run. Step functions
//! take `&mut CalibrationSession<P>`, read the input and config, store
//! intermediate results in the problem's state and finally set the output.
//!
//! ```no_run
//! use tracksync_pipeline::session::CalibrationSession;
//! use tracksync_pipeline::vio_tracker::{VioTrackerProblem, step_sync, step_translation};
//! # fn main() -> anyhow::Result<()> {
//! # let input = unimplemented!();
//! let mut session = CalibrationSession::<VioTrackerProblem>::new();
//! session.set_input(input)?;
//!
//! step_sync(&mut session, None)?;
//! step_translation(&mut session, None)?;
//!
//! let export = session.export()?;
//! # Ok(())
//! # }
//! ```

pub mod calibsession;
pub mod problem_type;
pub mod types;

pub use calibsession::CalibrationSession;
pub use problem_type::{InvalidationPolicy, ProblemType};
pub use types::{ExportRecord, LogEntry, SessionMetadata, current_timestamp};
