//! Line-delimited JSON readers for tracker, VIO pose and tag detection logs.
//!
//! Every reader skips blank lines and reports failures with the 1-based line
//! number of the offending record.

use anyhow::{Context, Result, bail};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracksync_core::{Mat3, PoseSample, Pt2, Real, Trajectory, Vec3};
use tracksync_linear::{CameraIntrinsics, SquareTag, TagPoseEstimator};

/// Key holding the 3×4 pose in pose records unless configured otherwise.
pub const DEFAULT_POSE_NAME: &str = "tag_space_pose";

#[derive(Debug, Deserialize)]
struct Xyz {
    x: Real,
    y: Real,
    z: Real,
}

#[derive(Debug, Deserialize)]
struct Columns {
    col0: [Real; 3],
    col1: [Real; 3],
    col2: [Real; 3],
}

#[derive(Debug, Deserialize)]
struct TrackerRecord {
    time: Real,
    position: Xyz,
    rotation: Columns,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntrinsicsRecord {
    focal_length_x: Real,
    focal_length_y: Real,
    principal_point_x: Real,
    principal_point_y: Real,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MarkerRecord {
    Bare(Vec<[Real; 2]>),
    Tagged {
        #[serde(default)]
        id: Option<i64>,
        corners: Vec<[Real; 2]>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectionRecord {
    time: Real,
    camera_intrinsics: IntrinsicsRecord,
    #[serde(default)]
    markers: Vec<MarkerRecord>,
}

/// A video frame with exactly one detected tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionFrame {
    pub time: Real,
    pub intrinsics: CameraIntrinsics,
    /// Bottom-left, bottom-right, top-right, top-left.
    pub corners: [Pt2; 4],
    pub marker_id: Option<i64>,
}

/// Parse every non-blank line of `reader` as a `T`, keeping line numbers.
fn parse_lines<R: BufRead, T: DeserializeOwned>(reader: R, kind: &str) -> Result<Vec<(usize, T)>> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.with_context(|| format!("failed to read {kind} line {line_no}"))?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line)
            .with_context(|| format!("invalid {kind} record on line {line_no}"))?;
        records.push((line_no, record));
    }
    Ok(records)
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    Ok(BufReader::new(file))
}

/// Read tracker samples: `{"time", "position": {x,y,z}, "rotation": {col0,col1,col2}}`.
pub fn read_tracker_records<R: BufRead>(reader: R) -> Result<Trajectory> {
    let samples = parse_lines::<_, TrackerRecord>(reader, "tracker")?
        .into_iter()
        .map(|(_, rec)| {
            let rotation = Mat3::from_columns(&[
                Vec3::from(rec.rotation.col0),
                Vec3::from(rec.rotation.col1),
                Vec3::from(rec.rotation.col2),
            ]);
            let position = Vec3::new(rec.position.x, rec.position.y, rec.position.z);
            PoseSample::new(rec.time, rotation, position)
        })
        .collect();
    Trajectory::new(samples).context("invalid tracker trajectory")
}

/// Read `{"time", "<pose_name>": [[r00,r01,r02,t0], [..], [..]]}` records.
pub fn read_pose_records<R: BufRead>(reader: R, pose_name: &str) -> Result<Trajectory> {
    let mut samples = Vec::new();
    for (line_no, value) in parse_lines::<_, serde_json::Value>(reader, "pose")? {
        let time = value
            .get("time")
            .and_then(serde_json::Value::as_f64)
            .with_context(|| format!("missing numeric \"time\" on line {line_no}"))?;
        let pose = value
            .get(pose_name)
            .with_context(|| format!("missing \"{pose_name}\" on line {line_no}"))?;
        let rows: [[Real; 4]; 3] = serde_json::from_value(pose.clone())
            .with_context(|| format!("\"{pose_name}\" on line {line_no} is not a 3x4 matrix"))?;
        let rotation = Mat3::from_fn(|r, c| rows[r][c]);
        let position = Vec3::new(rows[0][3], rows[1][3], rows[2][3]);
        samples.push(PoseSample::new(time, rotation, position));
    }
    Trajectory::new(samples).context("invalid VIO pose trajectory")
}

/// Turn a detection record into a frame; `None` unless it holds exactly one marker.
fn single_marker_frame(line_no: usize, rec: DetectionRecord) -> Result<Option<DetectionFrame>> {
    if rec.markers.len() != 1 {
        debug!(
            "line {line_no}: skipping frame with {} markers",
            rec.markers.len()
        );
        return Ok(None);
    }
    let (marker_id, raw) = match rec.markers.into_iter().next() {
        Some(MarkerRecord::Bare(corners)) => (None, corners),
        Some(MarkerRecord::Tagged { id, corners }) => (id, corners),
        None => return Ok(None),
    };
    let corners: [[Real; 2]; 4] = match raw.try_into() {
        Ok(c) => c,
        Err(raw) => bail!(
            "marker on line {line_no} has {} corners, expected 4",
            raw.len()
        ),
    };
    let intr = rec.camera_intrinsics;
    Ok(Some(DetectionFrame {
        time: rec.time,
        intrinsics: CameraIntrinsics {
            fx: intr.focal_length_x,
            fy: intr.focal_length_y,
            cx: intr.principal_point_x,
            cy: intr.principal_point_y,
        },
        corners: corners.map(|[x, y]| Pt2::new(x, y)),
        marker_id,
    }))
}

/// Read detection frames, keeping only frames with exactly one marker.
pub fn read_detection_frames<R: BufRead>(reader: R) -> Result<Vec<DetectionFrame>> {
    let records = parse_lines::<_, DetectionRecord>(reader, "detection")?;
    let total = records.len();
    let mut frames = Vec::with_capacity(total);
    for (line_no, rec) in records {
        if let Some(frame) = single_marker_frame(line_no, rec)? {
            frames.push(frame);
        }
    }
    debug!(
        "kept {} detection frames, skipped {}",
        frames.len(),
        total - frames.len()
    );
    Ok(frames)
}

/// Copy single-tag detection records from `reader` to `writer`, adding the
/// tag-to-camera pose under `pose_name` as a 3×4 row-major matrix.
///
/// Every other field of a record is kept. Records without exactly one marker,
/// or whose pose cannot be estimated, are not written. Returns the number of
/// records written.
pub fn annotate_tag_poses<R: BufRead, W: Write, E: TagPoseEstimator>(
    reader: R,
    mut writer: W,
    tag: &SquareTag,
    estimator: &E,
    pose_name: &str,
) -> Result<usize> {
    let mut written = 0usize;
    for (line_no, mut value) in parse_lines::<_, serde_json::Value>(reader, "detection")? {
        let rec: DetectionRecord = serde_json::from_value(value.clone())
            .with_context(|| format!("invalid detection record on line {line_no}"))?;
        let Some(frame) = single_marker_frame(line_no, rec)? else {
            continue;
        };
        let pose = match estimator.estimate(&frame.corners, tag, &frame.intrinsics) {
            Ok(pose) => pose,
            Err(err) => {
                warn!("line {line_no}: no tag pose: {err}");
                continue;
            }
        };
        let rotation = pose.rotation.to_rotation_matrix().into_inner();
        let Some(record) = value.as_object_mut() else {
            bail!("detection record on line {line_no} is not an object");
        };
        record.insert(
            pose_name.to_string(),
            serde_json::json!(pose_rows(&rotation, &pose.translation.vector)),
        );
        writeln!(writer, "{value}").context("failed to write tag pose record")?;
        written += 1;
    }
    debug!("wrote {written} tag pose records");
    Ok(written)
}

/// Convert single-tag frames into a VIO trajectory of tag-to-camera poses.
///
/// Frames whose pose cannot be estimated are dropped with a warning.
pub fn detections_to_trajectory<E: TagPoseEstimator>(
    frames: &[DetectionFrame],
    tag: &SquareTag,
    estimator: &E,
) -> Result<Trajectory> {
    let mut samples = Vec::with_capacity(frames.len());
    for frame in frames {
        match estimator.estimate(&frame.corners, tag, &frame.intrinsics) {
            Ok(pose) => samples.push(PoseSample::new(
                frame.time,
                pose.rotation.to_rotation_matrix().into_inner(),
                pose.translation.vector,
            )),
            Err(err) => warn!("frame at t={:.3}s dropped: {err}", frame.time),
        }
    }
    Trajectory::new(samples).context("invalid VIO trajectory from tag detections")
}

pub fn load_tracker(path: &Path) -> Result<Trajectory> {
    read_tracker_records(open(path)?).with_context(|| format!("in {}", path.display()))
}

pub fn load_vio_poses(path: &Path, pose_name: &str) -> Result<Trajectory> {
    read_pose_records(open(path)?, pose_name).with_context(|| format!("in {}", path.display()))
}

/// File variant of [`annotate_tag_poses`].
pub fn convert_tag_poses<E: TagPoseEstimator>(
    input: &Path,
    output: &Path,
    tag: &SquareTag,
    estimator: &E,
    pose_name: &str,
) -> Result<usize> {
    let file =
        File::create(output).with_context(|| format!("failed to create {}", output.display()))?;
    let mut writer = BufWriter::new(file);
    let written = annotate_tag_poses(open(input)?, &mut writer, tag, estimator, pose_name)
        .with_context(|| format!("in {}", input.display()))?;
    writer
        .flush()
        .with_context(|| format!("failed to write {}", output.display()))?;
    Ok(written)
}

pub fn load_vio_detections<E: TagPoseEstimator>(
    path: &Path,
    tag: &SquareTag,
    estimator: &E,
) -> Result<Trajectory> {
    let frames = read_detection_frames(open(path)?)
        .with_context(|| format!("in {}", path.display()))?;
    detections_to_trajectory(&frames, tag, estimator)
        .with_context(|| format!("in {}", path.display()))
}

/// Write tracker records in the format read by [`read_tracker_records`].
pub fn write_tracker_records<W: Write>(mut writer: W, track: &Trajectory) -> Result<()> {
    for s in track.samples() {
        let col = |c: usize| [s.rotation[(0, c)], s.rotation[(1, c)], s.rotation[(2, c)]];
        let record = serde_json::json!({
            "time": s.timestamp,
            "position": { "x": s.position.x, "y": s.position.y, "z": s.position.z },
            "rotation": { "col0": col(0), "col1": col(1), "col2": col(2) },
        });
        writeln!(writer, "{record}").context("failed to write tracker record")?;
    }
    Ok(())
}

/// Rows of the 3×4 matrix `[R | t]`.
fn pose_rows(rotation: &Mat3, position: &Vec3) -> [[Real; 4]; 3] {
    std::array::from_fn(|r| {
        [
            rotation[(r, 0)],
            rotation[(r, 1)],
            rotation[(r, 2)],
            position[r],
        ]
    })
}

/// Write pose records in the format read by [`read_pose_records`].
pub fn write_pose_records<W: Write>(mut writer: W, track: &Trajectory, pose_name: &str) -> Result<()> {
    for s in track.samples() {
        let rows = pose_rows(&s.rotation, &s.position);
        let mut record = serde_json::Map::new();
        record.insert("time".to_string(), serde_json::json!(s.timestamp));
        record.insert(pose_name.to_string(), serde_json::json!(rows));
        writeln!(writer, "{}", serde_json::Value::Object(record))
            .context("failed to write pose record")?;
    }
    Ok(())
}
