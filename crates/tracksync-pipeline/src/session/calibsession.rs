//! Mutable calibration session.

use anyhow::{Context, Result, bail, ensure};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::problem_type::{InvalidationPolicy, ProblemType};
use super::types::{ExportRecord, LogEntry, SessionMetadata};

/// State container driven by the step functions of a [`ProblemType`].
///
/// Holds the config, the input, intermediate state, the latest output, all
/// exports taken so far and an operation log. Changing the input or config
/// invalidates derived data according to the problem's
/// [`InvalidationPolicy`]. The whole session serializes to JSON so a run can
/// be checkpointed and inspected later.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "P: ProblemType")]
pub struct CalibrationSession<P: ProblemType> {
    pub metadata: SessionMetadata,
    pub config: P::Config,
    input: Option<P::Input>,
    pub state: P::State,
    output: Option<P::Output>,
    pub exports: Vec<ExportRecord<P::Export>>,
    pub log: Vec<LogEntry>,
}

impl<P: ProblemType> CalibrationSession<P> {
    pub fn new() -> Self {
        Self::from_metadata(SessionMetadata::new(P::name(), P::schema_version()))
    }

    pub fn with_description(description: impl Into<String>) -> Self {
        Self::from_metadata(SessionMetadata::with_description(
            P::name(),
            P::schema_version(),
            description,
        ))
    }

    /// New session with validated input.
    pub fn with_input(input: P::Input) -> Result<Self> {
        let mut session = Self::new();
        session.set_input(input)?;
        Ok(session)
    }

    fn from_metadata(metadata: SessionMetadata) -> Self {
        Self {
            metadata,
            config: P::Config::default(),
            input: None,
            state: P::State::default(),
            output: None,
            exports: Vec::new(),
            log: Vec::new(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Input
    // ─────────────────────────────────────────────────────────────────────────

    /// Validate and store the input, then invalidate per
    /// [`ProblemType::on_input_change`].
    pub fn set_input(&mut self, input: P::Input) -> Result<()> {
        P::validate_input(&input)?;
        self.input = Some(input);
        self.invalidate(P::on_input_change());
        self.metadata.touch();
        Ok(())
    }

    pub fn input(&self) -> Option<&P::Input> {
        self.input.as_ref()
    }

    pub fn require_input(&self) -> Result<&P::Input> {
        self.input.as_ref().context("input not set")
    }

    pub fn has_input(&self) -> bool {
        self.input.is_some()
    }

    /// Drop the input together with everything computed from it.
    pub fn clear_input(&mut self) {
        self.input = None;
        self.invalidate(InvalidationPolicy::CLEAR_COMPUTED);
        self.metadata.touch();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Config
    // ─────────────────────────────────────────────────────────────────────────

    pub fn set_config(&mut self, config: P::Config) -> Result<()> {
        P::validate_config(&config)?;
        self.config = config;
        self.invalidate(P::on_config_change());
        self.metadata.touch();
        Ok(())
    }

    /// Modify the config in place; the result is validated before it is kept.
    pub fn update_config<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut P::Config),
    {
        let mut config = self.config.clone();
        f(&mut config);
        self.set_config(config)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Output
    // ─────────────────────────────────────────────────────────────────────────

    pub fn output(&self) -> Option<&P::Output> {
        self.output.as_ref()
    }

    pub fn require_output(&self) -> Result<&P::Output> {
        self.output
            .as_ref()
            .context("output not computed; run the calibration steps first")
    }

    pub fn set_output(&mut self, output: P::Output) {
        self.output = Some(output);
        self.metadata.touch();
    }

    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Export
    // ─────────────────────────────────────────────────────────────────────────

    /// Export the current output and record it.
    pub fn export(&mut self) -> Result<P::Export> {
        let export = self.export_peek()?;
        self.exports.push(ExportRecord::new(export.clone()));
        self.metadata.touch();
        Ok(export)
    }

    pub fn export_with_notes(&mut self, notes: impl Into<String>) -> Result<P::Export> {
        let export = self.export_peek()?;
        self.exports
            .push(ExportRecord::with_notes(export.clone(), notes));
        self.metadata.touch();
        Ok(export)
    }

    /// Export without recording it in the session.
    pub fn export_peek(&self) -> Result<P::Export> {
        P::export(self.require_output()?, &self.config)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Validation and log
    // ─────────────────────────────────────────────────────────────────────────

    /// Run the input, config and cross validation hooks.
    pub fn validate(&self) -> Result<()> {
        let input = self.require_input()?;
        P::validate_input(input)?;
        P::validate_config(&self.config)?;
        P::validate_input_config(input, &self.config)
    }

    pub fn log_success(&mut self, operation: impl Into<String>) {
        self.log.push(LogEntry::success(operation));
        self.metadata.touch();
    }

    pub fn log_success_with_notes(
        &mut self,
        operation: impl Into<String>,
        notes: impl Into<String>,
    ) {
        self.log.push(LogEntry::success_with_notes(operation, notes));
        self.metadata.touch();
    }

    pub fn log_failure(&mut self, operation: impl Into<String>, error: impl Into<String>) {
        self.log.push(LogEntry::failure(operation, error));
        self.metadata.touch();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reset
    // ─────────────────────────────────────────────────────────────────────────

    pub fn reset_state(&mut self) {
        self.state = P::State::default();
        self.metadata.touch();
    }

    pub fn reset_output(&mut self) {
        self.output = None;
        self.metadata.touch();
    }

    /// Drop state, output and exports; keep input, config and the log.
    pub fn reset(&mut self) {
        self.invalidate(InvalidationPolicy::CLEAR_ALL);
        self.metadata.touch();
    }

    fn invalidate(&mut self, policy: InvalidationPolicy) {
        if policy.clear_state {
            self.state = P::State::default();
        }
        if policy.clear_output {
            self.output = None;
        }
        if policy.clear_exports {
            self.exports.clear();
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Persistence
    // ─────────────────────────────────────────────────────────────────────────

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize session")
    }

    /// Restore a session, refusing other problem types and newer schemas.
    pub fn from_json(json: &str) -> Result<Self> {
        let session: Self = serde_json::from_str(json).context("failed to parse session")?;
        ensure!(
            session.metadata.problem_type == P::name(),
            "session belongs to problem '{}', expected '{}'",
            session.metadata.problem_type,
            P::name()
        );
        if session.metadata.schema_version > P::schema_version() {
            bail!(
                "session schema version {} is newer than supported version {}",
                session.metadata.schema_version,
                P::schema_version()
            );
        }
        Ok(session)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("failed to write session {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read session {}", path.display()))?;
        Self::from_json(&json)
    }
}

impl<P: ProblemType> Default for CalibrationSession<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Averages a list of readings and scales the mean.
    #[derive(Debug)]
    struct MeanProblem;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct MeanConfig {
        scale: f64,
    }

    impl Default for MeanConfig {
        fn default() -> Self {
            Self { scale: 1.0 }
        }
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct MeanState {
        partial_sum: Option<f64>,
    }

    impl ProblemType for MeanProblem {
        type Config = MeanConfig;
        type Input = Vec<f64>;
        type State = MeanState;
        type Output = f64;
        type Export = String;

        fn name() -> &'static str {
            "mean_v1"
        }

        fn schema_version() -> u32 {
            2
        }

        fn validate_input(input: &Self::Input) -> Result<()> {
            ensure!(!input.is_empty(), "need at least one reading");
            Ok(())
        }

        fn validate_config(config: &Self::Config) -> Result<()> {
            ensure!(config.scale > 0.0, "scale must be positive");
            Ok(())
        }

        fn export(output: &Self::Output, config: &Self::Config) -> Result<Self::Export> {
            Ok(format!("{:.2}", output * config.scale))
        }
    }

    fn run(session: &mut CalibrationSession<MeanProblem>) -> Result<()> {
        let input = session.require_input()?.clone();
        let sum: f64 = input.iter().sum();
        session.state.partial_sum = Some(sum);
        session.set_output(sum / input.len() as f64);
        session.log_success("mean");
        Ok(())
    }

    #[test]
    fn fresh_session_is_empty() {
        let session = CalibrationSession::<MeanProblem>::with_description("bench");
        assert_eq!(session.metadata.problem_type, "mean_v1");
        assert_eq!(session.metadata.schema_version, 2);
        assert_eq!(session.metadata.description.as_deref(), Some("bench"));
        assert!(!session.has_input());
        assert!(!session.has_output());
        assert!(session.require_input().is_err());
        assert!(session.export_peek().is_err());
    }

    #[test]
    fn input_is_validated_and_invalidates_output() {
        let mut session = CalibrationSession::<MeanProblem>::new();
        assert!(session.set_input(Vec::new()).is_err());
        assert!(!session.has_input());

        session.set_input(vec![1.0, 2.0, 3.0]).unwrap();
        run(&mut session).unwrap();
        assert_eq!(session.output(), Some(&2.0));

        session.set_input(vec![4.0]).unwrap();
        assert!(!session.has_output());
        assert!(session.state.partial_sum.is_none());
        assert_eq!(session.log.len(), 1);
    }

    #[test]
    fn config_change_keeps_output_and_affects_export() {
        let mut session = CalibrationSession::<MeanProblem>::with_input(vec![2.0, 4.0]).unwrap();
        run(&mut session).unwrap();
        assert_eq!(session.export_peek().unwrap(), "3.00");

        session.update_config(|c| c.scale = 2.0).unwrap();
        assert!(session.has_output());
        assert_eq!(session.export().unwrap(), "6.00");
        assert_eq!(session.exports.len(), 1);

        assert!(session.update_config(|c| c.scale = -1.0).is_err());
        assert_eq!(session.config.scale, 2.0);
    }

    #[test]
    fn reset_and_clear() {
        let mut session = CalibrationSession::<MeanProblem>::with_input(vec![1.0]).unwrap();
        run(&mut session).unwrap();
        session.export_with_notes("first").unwrap();
        assert_eq!(session.exports[0].notes.as_deref(), Some("first"));

        session.reset();
        assert!(session.has_input());
        assert!(!session.has_output());
        assert!(session.exports.is_empty());

        run(&mut session).unwrap();
        session.clear_input();
        assert!(!session.has_input());
        assert!(!session.has_output());
    }

    #[test]
    fn json_checkpoint_roundtrip() {
        let mut session = CalibrationSession::<MeanProblem>::with_input(vec![1.0, 5.0]).unwrap();
        run(&mut session).unwrap();
        session.log_failure("extra", "not implemented");

        let restored = CalibrationSession::<MeanProblem>::from_json(&session.to_json().unwrap())
            .unwrap();
        assert_eq!(restored.input(), Some(&vec![1.0, 5.0]));
        assert_eq!(restored.output(), Some(&3.0));
        assert_eq!(restored.state.partial_sum, Some(6.0));
        assert_eq!(restored.log.len(), 2);
        assert!(!restored.log[1].success);
    }

    #[test]
    fn from_json_rejects_newer_schema_and_other_problems() {
        let mut session = CalibrationSession::<MeanProblem>::new();
        session.metadata.schema_version = 3;
        let err = CalibrationSession::<MeanProblem>::from_json(&session.to_json().unwrap())
            .unwrap_err();
        assert!(err.to_string().contains("newer than supported"));

        session.metadata.schema_version = 2;
        session.metadata.problem_type = "other".to_string();
        assert!(CalibrationSession::<MeanProblem>::from_json(&session.to_json().unwrap()).is_err());
    }

    #[test]
    fn save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let mut session = CalibrationSession::<MeanProblem>::with_input(vec![3.0]).unwrap();
        run(&mut session).unwrap();
        session.save(&path).unwrap();

        let loaded = CalibrationSession::<MeanProblem>::load(&path).unwrap();
        assert_eq!(loaded.output(), Some(&3.0));
        assert!(CalibrationSession::<MeanProblem>::load(&dir.path().join("missing.json")).is_err());
    }
}
