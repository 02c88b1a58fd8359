use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use tracksync_linear::{DEFAULT_TAG_SIDE, HomographyTagPose, SquareTag};
use tracksync_pipeline::io::{self, DEFAULT_POSE_NAME};
use tracksync_pipeline::{
    CalibrationSession, VioTrackerConfig, VioTrackerExport, VioTrackerInput, VioTrackerProblem,
    run_calibration,
};

/// How the VIO log encodes poses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum VioFormat {
    /// Per-frame tag corners and camera intrinsics.
    Detections,
    /// Per-frame 3x4 pose matrices.
    Poses,
}

/// Time offset and lever arm between a VIO track and a tracker track.
#[derive(Debug, Parser)]
#[command(author, version, about)]
#[command(subcommand_negates_reqs = true, args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    calibrate: CalibrateArgs,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Add the tag pose to every single-tag frame of a detection log
    TagPoses {
        /// Detection records, one JSON record per line.
        #[arg(short, long)]
        input: PathBuf,

        /// Output file; input records plus a 3x4 pose matrix.
        #[arg(short, long)]
        output: PathBuf,

        /// Key the pose is written under.
        #[arg(long, default_value = DEFAULT_POSE_NAME)]
        pose_name: String,

        /// Side length of the tag in meters.
        #[arg(short = 's', long, default_value_t = DEFAULT_TAG_SIDE)]
        tag_side: f64,
    },
}

#[derive(Debug, clap::Args)]
struct CalibrateArgs {
    /// Tracker samples, one JSON record per line.
    #[arg(long, required = true)]
    tracker: Option<PathBuf>,

    /// VIO records, one JSON record per line.
    #[arg(long, required = true)]
    vio: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = VioFormat::Detections)]
    vio_format: VioFormat,

    /// Key of the 3x4 pose in `poses` records.
    #[arg(long, default_value = DEFAULT_POSE_NAME)]
    pose_name: String,

    /// Optional JSON VioTrackerConfig. Defaults are used if omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the full session (state, log, export) to this file.
    #[arg(long)]
    session_out: Option<PathBuf>,
}

fn load_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("failed to parse {}", path.display()))
}

fn load_input(args: &CalibrateArgs, config: &VioTrackerConfig) -> Result<VioTrackerInput> {
    let tracker_path = args.tracker.as_deref().context("--tracker is required")?;
    let vio_path = args.vio.as_deref().context("--vio is required")?;
    let tracker = io::load_tracker(tracker_path)?;
    let vio = match args.vio_format {
        VioFormat::Detections => {
            io::load_vio_detections(vio_path, &config.square_tag(), &HomographyTagPose)?
        }
        VioFormat::Poses => io::load_vio_poses(vio_path, &args.pose_name)?,
    };
    info!(
        "loaded {} VIO samples ({:.2}s) and {} tracker samples ({:.2}s)",
        vio.len(),
        vio.duration(),
        tracker.len(),
        tracker.duration()
    );
    Ok(VioTrackerInput { vio, tracker })
}

fn log_summary(export: &VioTrackerExport) {
    for sync in &export.output.syncs {
        info!(
            "best sync ({}): {:.3}s, objective {:.6}",
            sync.variant, sync.offset, sync.objective
        );
    }
    for est in &export.output.diagnostic {
        info!(
            "translation ({}, {}): [{:.4}, {:.4}, {:.4}] |t| = {:.4}",
            est.first, est.second, est.translation.x, est.translation.y, est.translation.z, est.norm
        );
    }
}

fn run_from_files(args: &CalibrateArgs) -> Result<String> {
    let config = match &args.config {
        Some(path) => load_json_file::<VioTrackerConfig>(path)?,
        None => VioTrackerConfig::default(),
    };

    let mut session = CalibrationSession::<VioTrackerProblem>::new();
    session.set_config(config)?;
    let input = load_input(args, &session.config)?;
    session.set_input(input)?;

    let result = run_calibration(&mut session, None);
    if let Some(path) = &args.session_out {
        session.save(path)?;
        info!("session written to {}", path.display());
    }
    result?;

    let export = session.export()?;
    log_summary(&export);
    serde_json::to_string_pretty(&export).context("failed to serialize export")
}

fn run_tag_poses(input: &Path, output: &Path, pose_name: &str, tag_side: f64) -> Result<usize> {
    ensure!(
        tag_side.is_finite() && tag_side > 0.0,
        "tag side must be positive, got {tag_side}"
    );
    let tag = SquareTag {
        side_length: tag_side,
    };
    let written = io::convert_tag_poses(input, output, &tag, &HomographyTagPose, pose_name)?;
    info!("wrote {written} tag poses to {}", output.display());
    Ok(written)
}

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();
}

fn main() {
    init_logging();
    if let Err(err) = try_main() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Some(Command::TagPoses {
            input,
            output,
            pose_name,
            tag_side,
        }) => {
            run_tag_poses(&input, &output, &pose_name, tag_side)?;
        }
        None => {
            let json = run_from_files(&cli.calibrate)?;
            println!("{json}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Translation3, UnitQuaternion};
    use std::fs::File;
    use tempfile::{NamedTempFile, tempdir};
    use tracksync_core::Iso3;
    use tracksync_core::synthetic::{SyncScenario, uniform_timestamps};
    use tracksync_linear::{CameraIntrinsics, SyncVariant};

    fn args(tracker: &Path, vio: &Path) -> CalibrateArgs {
        CalibrateArgs {
            tracker: Some(tracker.to_path_buf()),
            vio: Some(vio.to_path_buf()),
            vio_format: VioFormat::Poses,
            pose_name: DEFAULT_POSE_NAME.to_string(),
            config: None,
            session_out: None,
        }
    }

    fn write_tracks(dir: &Path, scenario: &SyncScenario) -> (PathBuf, PathBuf) {
        let pair = scenario.build().unwrap();
        let tracker = dir.join("tracker.jsonl");
        let vio = dir.join("vio.jsonl");
        io::write_tracker_records(File::create(&tracker).unwrap(), &pair.tracker).unwrap();
        io::write_pose_records(File::create(&vio).unwrap(), &pair.vio, DEFAULT_POSE_NAME).unwrap();
        (tracker, vio)
    }

    /// A 4 s detection log of a gently swaying tag; every tenth frame has no marker.
    fn write_detections(path: &Path) {
        let k = CameraIntrinsics {
            fx: 800.0,
            fy: 800.0,
            cx: 320.0,
            cy: 240.0,
        };
        let tag = SquareTag::default();
        let mut text = String::new();
        for (i, t) in uniform_timestamps(0.0, 4.0, 121).into_iter().enumerate() {
            let pose = Iso3::from_parts(
                Translation3::new(0.01, -0.02, 0.3),
                UnitQuaternion::from_euler_angles(
                    0.3 * (1.3 * t).sin(),
                    0.25 * (0.9 * t + 0.4).sin(),
                    0.2 * (2.1 * t).sin(),
                ),
            );
            let corners: Vec<[f64; 2]> = tag
                .corners()
                .iter()
                .map(|c| {
                    let p = k.project(&(pose * Point3::new(c.x, c.y, 0.0)).coords);
                    [p.x, p.y]
                })
                .collect();
            let markers = if i % 10 == 5 {
                serde_json::json!([])
            } else {
                serde_json::json!([corners])
            };
            let record = serde_json::json!({
                "time": t,
                "framePath": format!("frames/{i}.png"),
                "cameraIntrinsics": {
                    "focalLengthX": k.fx,
                    "focalLengthY": k.fy,
                    "principalPointX": k.cx,
                    "principalPointY": k.cy,
                },
                "markers": markers,
            });
            text.push_str(&format!("{record}\n"));
        }
        std::fs::write(path, text).unwrap();
    }

    #[test]
    fn parses_flags() {
        let cli = Cli::try_parse_from([
            "tracksync",
            "--tracker",
            "t.jsonl",
            "--vio",
            "v.jsonl",
            "--vio-format",
            "poses",
            "--pose-name",
            "cameraPose",
        ])
        .unwrap();
        assert!(cli.command.is_none());
        let args = cli.calibrate;
        assert_eq!(args.vio_format, VioFormat::Poses);
        assert_eq!(args.pose_name, "cameraPose");
        assert!(args.config.is_none());

        let defaults = Cli::try_parse_from(["tracksync", "--tracker", "t", "--vio", "v"])
            .unwrap()
            .calibrate;
        assert_eq!(defaults.vio_format, VioFormat::Detections);
        assert_eq!(defaults.pose_name, DEFAULT_POSE_NAME);
        assert!(Cli::try_parse_from(["tracksync", "--vio", "v"]).is_err());
    }

    #[test]
    fn parses_tag_poses_command() {
        let cli = Cli::try_parse_from([
            "tracksync",
            "tag-poses",
            "--input",
            "frames.jsonl",
            "-o",
            "poses.jsonl",
            "-s",
            "0.05",
        ])
        .unwrap();
        match cli.command {
            Some(Command::TagPoses {
                input,
                output,
                pose_name,
                tag_side,
            }) => {
                assert_eq!(input, PathBuf::from("frames.jsonl"));
                assert_eq!(output, PathBuf::from("poses.jsonl"));
                assert_eq!(pose_name, "tag_space_pose");
                assert_eq!(tag_side, 0.05);
            }
            None => panic!("expected tag-poses"),
        }
        assert!(Cli::try_parse_from(["tracksync", "tag-poses", "--input", "f"]).is_err());
    }

    #[test]
    fn pose_files_to_export_json() {
        let dir = tempdir().unwrap();
        let scenario = SyncScenario::default();
        let (tracker, vio) = write_tracks(dir.path(), &scenario);

        let config_file = NamedTempFile::new().unwrap();
        let config = VioTrackerConfig::default().with_frame_rotation(&scenario.frame_rotation);
        serde_json::to_writer_pretty(File::create(config_file.path()).unwrap(), &config).unwrap();

        let session_path = dir.path().join("session.json");
        let mut args = args(&tracker, &vio);
        args.config = Some(config_file.path().to_path_buf());
        args.session_out = Some(session_path.clone());

        let json = run_from_files(&args).unwrap();
        let export: VioTrackerExport = serde_json::from_str(&json).unwrap();
        assert_eq!(export.output.chosen.variant, SyncVariant::MinVariance);
        assert!((export.output.chosen.offset - scenario.vio_shift).abs() <= 0.1 + 1e-9);
        assert_eq!(export.output.diagnostic.len(), 3);

        let session = CalibrationSession::<VioTrackerProblem>::load(&session_path).unwrap();
        assert!(session.has_output());
    }

    #[test]
    fn tag_pose_file_calibrates_like_detections() {
        let dir = tempdir().unwrap();
        let (tracker, _) = write_tracks(dir.path(), &SyncScenario::default());
        let frames = dir.path().join("frames.jsonl");
        write_detections(&frames);

        let poses = dir.path().join("poses.jsonl");
        let written = run_tag_poses(&frames, &poses, DEFAULT_POSE_NAME, DEFAULT_TAG_SIDE).unwrap();
        assert_eq!(written, 109);

        let mut from_detections = args(&tracker, &frames);
        from_detections.vio_format = VioFormat::Detections;
        let from_poses = args(&tracker, &poses);

        let a: VioTrackerExport =
            serde_json::from_str(&run_from_files(&from_detections).unwrap()).unwrap();
        let b: VioTrackerExport =
            serde_json::from_str(&run_from_files(&from_poses).unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn tag_poses_rejects_bad_side() {
        let dir = tempdir().unwrap();
        let frames = dir.path().join("frames.jsonl");
        write_detections(&frames);
        let err = run_tag_poses(&frames, &dir.path().join("out.jsonl"), DEFAULT_POSE_NAME, 0.0)
            .unwrap_err();
        assert!(err.to_string().contains("tag side"));
    }

    #[test]
    fn detection_log_without_single_tags_fails() {
        let dir = tempdir().unwrap();
        let (tracker, _) = write_tracks(dir.path(), &SyncScenario::default());
        let frames = dir.path().join("frames.jsonl");
        std::fs::write(
            &frames,
            "{\"time\": 0.0, \"cameraIntrinsics\": {\"focalLengthX\": 800, \"focalLengthY\": 800, \
             \"principalPointX\": 320, \"principalPointY\": 240}, \"markers\": []}\n",
        )
        .unwrap();

        let mut args = args(&tracker, &frames);
        args.vio_format = VioFormat::Detections;
        let err = run_from_files(&args).unwrap_err();
        assert!(format!("{err:#}").contains("VIO trajectory"), "{err:#}");
    }

    #[test]
    fn bad_config_is_reported() {
        let dir = tempdir().unwrap();
        let (tracker, vio) = write_tracks(dir.path(), &SyncScenario::default());
        let config = dir.path().join("config.json");
        std::fs::write(&config, r#"{"sync": {"step": -1.0}}"#).unwrap();

        let mut args = args(&tracker, &vio);
        args.config = Some(config);
        let err = run_from_files(&args).unwrap_err();
        assert!(err.to_string().contains("sync step"));
    }
}
