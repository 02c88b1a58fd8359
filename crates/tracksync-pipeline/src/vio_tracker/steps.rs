//! Step functions for VIO/tracker calibration.

use anyhow::{Context, Result, bail};
use log::{info, warn};
use tracksync_core::Real;
use tracksync_linear::{
    LeverArmProblem, SyncError, SyncEstimate, SyncVariant, find_sync_max_cosine,
    find_sync_min_variance,
};

use crate::session::CalibrationSession;

use super::problem::{SyncReport, VioTrackerConfig, VioTrackerOutput, VioTrackerProblem};

// ─────────────────────────────────────────────────────────────────────────────
// Step Options
// ─────────────────────────────────────────────────────────────────────────────

/// Options for the sync step.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Override the candidate spacing.
    pub step: Option<Real>,
    /// Override which estimate feeds the translation step.
    pub preferred: Option<SyncVariant>,
}

/// Options for the translation step.
#[derive(Debug, Clone, Default)]
pub struct TranslationStepOptions {
    /// Override the least-squares pair stride.
    pub stride: Option<usize>,
    /// Override the pseudo-inverse cutoff.
    pub pinv_eps: Option<Real>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Helper Functions
// ─────────────────────────────────────────────────────────────────────────────

const VARIANTS: [SyncVariant; 2] = [SyncVariant::MinVariance, SyncVariant::MaxCosine];

fn other_variant(variant: SyncVariant) -> SyncVariant {
    match variant {
        SyncVariant::MinVariance => SyncVariant::MaxCosine,
        SyncVariant::MaxCosine => SyncVariant::MinVariance,
    }
}

fn run_searches(
    session: &CalibrationSession<VioTrackerProblem>,
    step: Option<Real>,
) -> Result<Vec<(SyncVariant, Result<SyncEstimate, SyncError>)>> {
    let input = session.require_input()?;
    Ok(VARIANTS
        .into_iter()
        .map(|variant| {
            let mut search = session.config.search_options(variant);
            if let Some(step) = step {
                search.step = step;
            }
            let result = match variant {
                SyncVariant::MinVariance => {
                    find_sync_min_variance(&input.vio, &input.tracker, &search)
                }
                SyncVariant::MaxCosine => find_sync_max_cosine(&input.vio, &input.tracker, &search),
            };
            (variant, result)
        })
        .collect())
}

/// Rebuild the output from the current state.
fn refresh_output(session: &mut CalibrationSession<VioTrackerProblem>) -> Result<()> {
    let input = session.require_input()?;
    let state = &session.state;
    let chosen = state
        .chosen_sync()
        .context("sync not computed; run step_sync first")?;

    let output = VioTrackerOutput {
        syncs: VARIANTS
            .iter()
            .filter_map(|&v| state.sync(v))
            .map(|e| SyncReport::from_estimate(e, input))
            .collect(),
        chosen: SyncReport::from_estimate(chosen, input),
        diagnostic: state.diagnostic.clone().unwrap_or_default(),
        lever_arm: state.lever_arm.clone(),
    };
    session.set_output(output);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Step Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Search the time offset with both objectives.
///
/// A failing search is logged and skipped; the step fails only when neither
/// search produced an estimate. The preferred variant is chosen when
/// available, otherwise the one that succeeded.
pub fn step_sync(
    session: &mut CalibrationSession<VioTrackerProblem>,
    opts: Option<SyncOptions>,
) -> Result<()> {
    session.validate()?;
    let opts = opts.unwrap_or_default();
    let preferred = opts.preferred.unwrap_or(session.config.sync.preferred);

    let results = run_searches(session, opts.step)?;

    session.state.clear_sync();
    session.reset_output();

    let mut failures = Vec::new();
    for (variant, result) in results {
        let operation = format!("sync_{variant}");
        match result {
            Ok(estimate) => {
                info!(
                    "{variant}: best sync {:.3}s, objective {:.6} ({} candidates)",
                    estimate.offset,
                    estimate.objective,
                    estimate.candidates.len()
                );
                session.log_success_with_notes(
                    operation,
                    format!(
                        "offset={:.3}s, objective={:.6}",
                        estimate.offset, estimate.objective
                    ),
                );
                match variant {
                    SyncVariant::MinVariance => session.state.variance_sync = Some(estimate),
                    SyncVariant::MaxCosine => session.state.cosine_sync = Some(estimate),
                }
            }
            Err(err) => {
                warn!("{variant} sync failed: {err}");
                session.log_failure(operation, err.to_string());
                failures.push(format!("{variant}: {err}"));
            }
        }
    }

    let chosen = if session.state.sync(preferred).is_some() {
        preferred
    } else {
        other_variant(preferred)
    };
    if session.state.sync(chosen).is_none() {
        bail!("both sync searches failed ({})", failures.join("; "));
    }
    if chosen != preferred {
        warn!("preferred {preferred} sync unavailable, using {chosen}");
    }
    session.state.chosen_variant = Some(chosen);

    refresh_output(session)
}

/// Estimate the lever arm at the chosen offset.
///
/// Always records the three single-pair diagnostic estimates. The stacked
/// least-squares estimate is recorded when the motion constrains it; a
/// degenerate system is logged and leaves it empty.
pub fn step_translation(
    session: &mut CalibrationSession<VioTrackerProblem>,
    opts: Option<TranslationStepOptions>,
) -> Result<()> {
    session.validate()?;
    let opts = opts.unwrap_or_default();
    let mut translation = session.config.translation;
    if let Some(stride) = opts.stride {
        translation.stride = stride;
    }
    if let Some(eps) = opts.pinv_eps {
        translation.pinv_eps = eps;
    }
    let frame = session.config.frame_rotation_matrix();
    let offset = session
        .state
        .chosen_sync()
        .map(|e| e.offset)
        .context("sync required before translation; run step_sync first")?;

    let input = session.require_input()?;
    let problem = LeverArmProblem::from_tracks(&input.vio, &input.tracker, offset, &frame)
        .context("failed to pair VIO and tracker samples")?;
    let diagnostic = problem
        .diagnostic(translation.pinv_eps)
        .context("single-pair lever-arm estimate failed")?;
    let least_squares = problem.solve_least_squares(&translation);

    for est in &diagnostic {
        info!(
            "lever arm from samples ({}, {}): [{:.4}, {:.4}, {:.4}] norm {:.4}",
            est.first,
            est.second,
            est.translation.x,
            est.translation.y,
            est.translation.z,
            est.norm
        );
    }
    session.state.diagnostic = Some(diagnostic);

    match least_squares {
        Ok(est) => {
            info!(
                "least-squares lever arm: [{:.4}, {:.4}, {:.4}] from {} pairs, rms {:.4}",
                est.lever_arm.x, est.lever_arm.y, est.lever_arm.z, est.pair_count, est.rms_residual
            );
            session.log_success_with_notes(
                "translation",
                format!(
                    "|x|={:.4}, pairs={}, rms={:.4}",
                    est.lever_arm.norm(),
                    est.pair_count,
                    est.rms_residual
                ),
            );
            session.state.lever_arm = Some(est);
        }
        Err(err) => {
            warn!("least-squares lever arm unavailable: {err}");
            session.state.lever_arm = None;
            session.log_failure("translation", err.to_string());
        }
    }

    refresh_output(session)
}

/// Run the full pipeline: sync → translation.
pub fn run_calibration(
    session: &mut CalibrationSession<VioTrackerProblem>,
    config: Option<VioTrackerConfig>,
) -> Result<()> {
    if let Some(cfg) = config {
        session.set_config(cfg)?;
    }
    step_sync(session, None)?;
    step_translation(session, None)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vio_tracker::VioTrackerInput;
    use nalgebra::Rotation3;
    use tracksync_core::{Mat3, Vec3};
    use tracksync_core::synthetic::{SyncScenario, WobbleProfile};

    fn session_for(scenario: &SyncScenario) -> CalibrationSession<VioTrackerProblem> {
        let pair = scenario.build().unwrap();
        let mut session = CalibrationSession::<VioTrackerProblem>::with_input(VioTrackerInput {
            vio: pair.vio,
            tracker: pair.tracker,
        })
        .unwrap();
        session
            .set_config(VioTrackerConfig::default().with_frame_rotation(&scenario.frame_rotation))
            .unwrap();
        session
    }

    #[test]
    fn translation_requires_sync() {
        let mut session = session_for(&SyncScenario::default());
        let err = step_translation(&mut session, None).unwrap_err();
        assert!(err.to_string().contains("step_sync"));
    }

    #[test]
    fn sync_step_records_both_variants() {
        let sc = SyncScenario::default();
        let mut session = session_for(&sc);
        step_sync(&mut session, None).unwrap();

        assert!(session.state.variance_sync.is_some());
        assert!(session.state.cosine_sync.is_some());
        assert_eq!(session.state.chosen_variant, Some(SyncVariant::MinVariance));

        let output = session.require_output().unwrap();
        assert_eq!(output.syncs.len(), 2);
        assert!(output.diagnostic.is_empty());
        assert!((output.chosen.offset - sc.vio_shift).abs() <= 0.1 + 1e-9);
        // Tracker clock starts at 0 and the VIO clock at 50 s.
        let expected_clock = sc.vio_shift + sc.tracker_start - sc.vio_clock_start;
        assert!((output.chosen.clock_offset - expected_clock).abs() <= 0.1 + 1e-9);
        assert_eq!(session.log.len(), 2);
    }

    #[test]
    fn preferred_variant_override() {
        let mut session = session_for(&SyncScenario::default());
        step_sync(
            &mut session,
            Some(SyncOptions {
                preferred: Some(SyncVariant::MaxCosine),
                ..SyncOptions::default()
            }),
        )
        .unwrap();
        let output = session.require_output().unwrap();
        assert_eq!(output.chosen.variant, SyncVariant::MaxCosine);
    }

    #[test]
    fn cosine_failure_falls_back_to_variance() {
        // A VIO track that never rotates has a flat speed profile.
        let profile = WobbleProfile {
            yaw_terms: Vec::new(),
            pitch_term: (0.0, 1.0, 0.0),
            ..WobbleProfile::default()
        };
        let sc = SyncScenario {
            profile,
            frame_rotation: Mat3::identity(),
            ..SyncScenario::default()
        };
        let mut session = session_for(&sc);
        step_sync(
            &mut session,
            Some(SyncOptions {
                preferred: Some(SyncVariant::MaxCosine),
                ..SyncOptions::default()
            }),
        )
        .unwrap();

        assert!(session.state.cosine_sync.is_none());
        assert_eq!(session.state.chosen_variant, Some(SyncVariant::MinVariance));
        assert!(session.log.iter().any(|e| !e.success && e.operation == "sync_max_cosine"));
    }

    #[test]
    fn full_run_recovers_lever_arm() {
        let sc = SyncScenario {
            frame_rotation: *Rotation3::from_euler_angles(0.2, -0.1, 0.4).matrix(),
            lever_arm: Vec3::new(0.03, 0.01, -0.08),
            origin_offset: Vec3::new(1.0, 0.0, -0.5),
            vio_shift: 2.0,
            vio_samples: 401,
            vio_clock_start: 0.0,
            ..SyncScenario::default()
        };
        let mut session = session_for(&sc);
        run_calibration(&mut session, None).unwrap();

        let export = session.export().unwrap();
        assert_eq!(export.output.diagnostic.len(), 3);
        let lsq = export.output.lever_arm.expect("least-squares estimate");
        assert!((lsq.lever_arm - sc.lever_arm).norm() < 0.02);
        assert_eq!(session.exports.len(), 1);
    }

    #[test]
    fn planar_motion_keeps_diagnostic_only() {
        let sc = SyncScenario {
            profile: WobbleProfile::planar(),
            vio_shift: 2.0,
            vio_samples: 401,
            vio_clock_start: 0.0,
            ..SyncScenario::default()
        };
        let mut session = session_for(&sc);
        step_sync(&mut session, None).unwrap();
        step_translation(&mut session, None).unwrap();

        let output = session.require_output().unwrap();
        assert_eq!(output.diagnostic.len(), 3);
        assert!(output.lever_arm.is_none());
        assert!(session.log.iter().any(|e| !e.success && e.operation == "translation"));
    }
}
