//! Deterministic synthetic data helpers.
//!
//! Building blocks for constructing tracker/VIO pairs with a known time
//! offset and lever arm. Used in workspace tests and examples.

pub mod motion;
pub mod noise;

pub use motion::{SyncScenario, TrackPair, WobbleProfile, uniform_timestamps};
pub use noise::{PositionNoise, RotationNoise};
