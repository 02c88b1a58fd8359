//! Angular speed profiles from orientation tracks.

use crate::{Mat3, Real, TrackError, rotation_distance_deg};

/// Angular speed between consecutive orientations, in degrees per second.
///
/// Element `i` is `rotation_distance_deg(R[i], R[i+1]) / (t[i+1] − t[i])`, so
/// the output has one element fewer than the input. A time step that is not
/// strictly positive and finite fails with [`TrackError::ZeroTimeStep`].
pub fn angular_speeds(timestamps: &[Real], rotations: &[Mat3]) -> Result<Vec<Real>, TrackError> {
    if timestamps.len() != rotations.len() {
        return Err(TrackError::LengthMismatch {
            left: timestamps.len(),
            right: rotations.len(),
        });
    }

    let mut speeds = Vec::with_capacity(timestamps.len().saturating_sub(1));
    for (index, (t, r)) in timestamps.windows(2).zip(rotations.windows(2)).enumerate() {
        let dt = t[1] - t[0];
        if dt <= 0.0 || !dt.is_finite() {
            return Err(TrackError::ZeroTimeStep { index });
        }
        speeds.push(rotation_distance_deg(&r[0], &r[1]) / dt);
    }
    Ok(speeds)
}
