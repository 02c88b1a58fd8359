//! Core types and primitives for `tracksync`.
//!
//! This crate provides the building blocks shared by the search and pipeline
//! crates:
//!
//! - linear algebra type aliases (`Real`, `Vec3`, `Mat3`, and friends),
//! - validated pose tracks ([`Trajectory`]),
//! - the geodesic rotation distance,
//! - angular speed profiles,
//! - nearest-forward timestamp matching between two tracks.
//!
//! # Modules
//!
//! - \[`math`\]: type aliases and SO(3) checks.
//! - \[`rotation`\]: rotation distance.
//! - \[`trajectory`\]: pose samples and tracks.
//! - \[`speed`\]: angular speed derivation.
//! - \[`resample`\]: index maps between timestamp series.
//! - \[`synthetic`\]: deterministic synthetic tracks (tests/examples).
//!
//! # Example
//!
//! ```
//! use tracksync_core::{Mat3, map_query_to_reference, rotation_distance};
//!
//! let map = map_query_to_reference(&[0.0, 1.0, 2.0], &[0.0, 1.0, 2.0, 3.0, 4.0], 1.0);
//! assert_eq!(map, vec![1, 2, 3]);
//! assert_eq!(rotation_distance(&Mat3::identity(), &Mat3::identity()), 0.0);
//! ```

/// Linear algebra type aliases and helpers.
mod math;
/// Index maps between timestamp series.
mod resample;
/// Geodesic rotation distance.
mod rotation;
/// Angular speed profiles.
mod speed;
/// Deterministic synthetic data generation helpers.
///
/// Public so integration tests and examples across the workspace can build
/// tracks with a known ground truth.
pub mod synthetic;
/// Timestamped pose tracks.
mod trajectory;

pub use math::*;
pub use resample::*;
pub use rotation::*;
pub use speed::*;
pub use trajectory::*;
