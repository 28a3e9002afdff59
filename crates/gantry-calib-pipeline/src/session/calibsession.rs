//! Generic session container.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};

use super::problem_type::{InvalidationPolicy, ProblemType};
use super::types::{ExportRecord, LogEntry, SessionMetadata};

/// Config, input, intermediate state and output of one calibration run.
///
/// Step functions take `&mut CalibrationSession<P>` and advance it in
/// place. The whole session serializes to JSON so a run can be stopped,
/// inspected and resumed.
///
/// ```no_run
/// use gantry_calib_pipeline::cache::MemoryCache;
/// use gantry_calib_pipeline::gantry_calibration::{GantryCalibrationProblem, run_calibration};
/// use gantry_calib_pipeline::session::CalibrationSession;
/// # fn main() -> anyhow::Result<()> {
/// # let input: gantry_calib_pipeline::GantryCalibrationInput = unimplemented!();
/// let mut session = CalibrationSession::<GantryCalibrationProblem>::with_input(input)?;
/// run_calibration(&mut session, &mut MemoryCache::new())?;
/// let export = session.export()?;
/// # Ok(())
/// # }
/// ```
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

impl<P: ProblemType> Default for CalibrationSession<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ProblemType> CalibrationSession<P> {
    // ─────────────────────────────────────────────────────────────────────────
    // Construction
    // ─────────────────────────────────────────────────────────────────────────

    pub fn new() -> Self {
        Self {
            metadata: SessionMetadata::new(P::name(), P::schema_version()),
            config: P::Config::default(),
            input: None,
            state: P::State::default(),
            output: None,
            exports: Vec::new(),
            log: Vec::new(),
        }
    }

    pub fn with_input(input: P::Input) -> Result<Self> {
        let mut session = Self::new();
        session.set_input(input)?;
        Ok(session)
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
    // Input and config
    // ─────────────────────────────────────────────────────────────────────────

    pub fn set_input(&mut self, input: P::Input) -> Result<()> {
        P::validate_input(&input)?;
        self.invalidate(P::on_input_change());
        self.input = Some(input);
        self.metadata.touch();
        Ok(())
    }

    pub fn input(&self) -> Option<&P::Input> {
        self.input.as_ref()
    }

    pub fn require_input(&self) -> Result<&P::Input> {
        self.input.as_ref().ok_or_else(|| anyhow!("input not set"))
    }

    pub fn has_input(&self) -> bool {
        self.input.is_some()
    }

    pub fn set_config(&mut self, config: P::Config) -> Result<()> {
        P::validate_config(&config)?;
        self.invalidate(P::on_config_change());
        self.config = config;
        self.metadata.touch();
        Ok(())
    }

    /// Edit a copy of the config, then apply it through [`set_config`](Self::set_config).
    pub fn update_config(&mut self, f: impl FnOnce(&mut P::Config)) -> Result<()> {
        let mut config = self.config.clone();
        f(&mut config);
        self.set_config(config)
    }

    /// Input present and consistent with the config.
    pub fn validate(&self) -> Result<()> {
        let input = self.require_input()?;
        P::validate_input(input)?;
        P::validate_config(&self.config)?;
        P::validate_input_config(input, &self.config)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Output and export
    // ─────────────────────────────────────────────────────────────────────────

    pub fn output(&self) -> Option<&P::Output> {
        self.output.as_ref()
    }

    pub fn require_output(&self) -> Result<&P::Output> {
        self.output
            .as_ref()
            .ok_or_else(|| anyhow!("output not computed"))
    }

    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    pub fn set_output(&mut self, output: P::Output) {
        self.output = Some(output);
        self.metadata.touch();
    }

    /// Convert the output and record the export in the session.
    pub fn export(&mut self) -> Result<P::Export> {
        self.export_with_notes(None)
    }

    pub fn export_with_notes(&mut self, notes: Option<String>) -> Result<P::Export> {
        let export = self.export_peek()?;
        self.exports.push(ExportRecord::new(export.clone(), notes));
        self.metadata.touch();
        Ok(export)
    }

    /// Convert the output without recording it.
    pub fn export_peek(&self) -> Result<P::Export> {
        P::export(self.require_output()?, &self.config)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // History
    // ─────────────────────────────────────────────────────────────────────────

    pub fn log_success(&mut self, operation: impl Into<String>) {
        self.log.push(LogEntry::success(operation, None));
        self.metadata.touch();
    }

    pub fn log_success_with_notes(
        &mut self,
        operation: impl Into<String>,
        notes: impl Into<String>,
    ) {
        self.log
            .push(LogEntry::success(operation, Some(notes.into())));
        self.metadata.touch();
    }

    pub fn log_failure(&mut self, operation: impl Into<String>, error: impl Into<String>) {
        self.log.push(LogEntry::failure(operation, error));
        self.metadata.touch();
    }

    /// Drop intermediate state and output, keep input and config.
    pub fn reset_computed(&mut self) {
        self.invalidate(InvalidationPolicy::CLEAR_COMPUTED);
        self.metadata.touch();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Persistence
    // ─────────────────────────────────────────────────────────────────────────

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a session, rejecting other problem types and newer schemas.
    pub fn from_json(json: &str) -> Result<Self> {
        let session: Self = serde_json::from_str(json)?;
        if session.metadata.problem_type != P::name() {
            bail!(
                "session holds a '{}' problem, expected '{}'",
                session.metadata.problem_type,
                P::name()
            );
        }
        if session.metadata.schema_version > P::schema_version() {
            bail!(
                "session schema version {} is newer than supported version {}",
                session.metadata.schema_version,
                P::schema_version()
            );
        }
        Ok(session)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?)
            .with_context(|| format!("failed to write session {}", path.display()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read session {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("invalid session {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    // ─────────────────────────────────────────────────────────────────────────
    // Constant-offset fit used as a stand-in problem
    // ─────────────────────────────────────────────────────────────────────────

    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    struct OffsetConfig {
        max_offset: f64,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    struct OffsetInput {
        errors: Vec<f64>,
    }

    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    struct OffsetState {
        mean: Option<f64>,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    struct OffsetOutput {
        offset: f64,
    }

    #[derive(Debug)]
    struct OffsetProblem;

    impl ProblemType for OffsetProblem {
        type Config = OffsetConfig;
        type Input = OffsetInput;
        type State = OffsetState;
        type Output = OffsetOutput;
        type Export = f64;

        fn name() -> &'static str {
            "offset_fit"
        }

        fn validate_input(input: &Self::Input) -> Result<()> {
            if input.errors.is_empty() {
                bail!("no error samples");
            }
            Ok(())
        }

        fn validate_config(config: &Self::Config) -> Result<()> {
            if config.max_offset < 0.0 {
                bail!("max_offset must be non-negative");
            }
            Ok(())
        }

        fn validate_input_config(input: &Self::Input, config: &Self::Config) -> Result<()> {
            if config.max_offset > 0.0 && input.errors.iter().any(|e| e.abs() > config.max_offset)
            {
                bail!("error sample exceeds max_offset");
            }
            Ok(())
        }

        fn export(output: &Self::Output, _config: &Self::Config) -> Result<Self::Export> {
            Ok(-output.offset)
        }
    }

    fn fitted() -> CalibrationSession<OffsetProblem> {
        let mut session = CalibrationSession::<OffsetProblem>::with_input(OffsetInput {
            errors: vec![0.5, 1.5],
        })
        .unwrap();
        session.state.mean = Some(1.0);
        session.set_output(OffsetOutput { offset: 1.0 });
        session
    }

    #[test]
    fn new_session_is_empty() {
        let session = CalibrationSession::<OffsetProblem>::new();
        assert_eq!(session.metadata.problem_type, "offset_fit");
        assert!(!session.has_input());
        assert!(!session.has_output());
        assert!(session.require_input().is_err());
        assert!(session.require_output().is_err());
        assert!(session.validate().is_err());
    }

    #[test]
    fn input_is_validated() {
        let err = CalibrationSession::<OffsetProblem>::with_input(OffsetInput { errors: vec![] })
            .unwrap_err();
        assert!(err.to_string().contains("no error samples"));
    }

    #[test]
    fn new_input_clears_computed_data() {
        let mut session = fitted();
        session.export().unwrap();
        session
            .set_input(OffsetInput { errors: vec![2.0] })
            .unwrap();
        assert!(session.state.mean.is_none());
        assert!(!session.has_output());
        assert_eq!(session.exports.len(), 1);
    }

    #[test]
    fn config_change_keeps_output() {
        let mut session = fitted();
        session.update_config(|c| c.max_offset = 2.0).unwrap();
        assert!(session.has_output());
        assert!(session.set_config(OffsetConfig { max_offset: -1.0 }).is_err());
        assert_eq!(session.config.max_offset, 2.0);
    }

    #[test]
    fn cross_validation() {
        let mut session = fitted();
        assert!(session.validate().is_ok());
        session.config.max_offset = 1.0;
        assert!(session.validate().is_err());
    }

    #[test]
    fn exports_and_history() {
        let mut session = fitted();
        assert_eq!(session.export_peek().unwrap(), -1.0);
        assert!(session.exports.is_empty());
        session.export().unwrap();
        session.export_with_notes(Some("final".into())).unwrap();
        assert_eq!(session.exports.len(), 2);
        assert_eq!(session.exports[1].notes.as_deref(), Some("final"));

        session.log_success("fit");
        session.log_failure("check", "too large");
        assert!(session.log[0].success);
        assert!(!session.log[1].success);

        session.reset_computed();
        assert!(session.has_input());
        assert!(!session.has_output());
        assert_eq!(session.exports.len(), 2);
    }

    #[test]
    fn json_roundtrip() {
        let mut session = fitted();
        session.export().unwrap();
        let restored = CalibrationSession::<OffsetProblem>::from_json(&session.to_json().unwrap())
            .unwrap();
        assert_eq!(restored.input().unwrap().errors, vec![0.5, 1.5]);
        assert_eq!(restored.output().unwrap().offset, 1.0);
        assert_eq!(restored.exports.len(), 1);
    }

    #[test]
    fn rejects_newer_schema_and_other_problems() {
        let json = CalibrationSession::<OffsetProblem>::new().to_json().unwrap();
        let newer = json.replace("\"schema_version\": 1", "\"schema_version\": 7");
        let err = CalibrationSession::<OffsetProblem>::from_json(&newer).unwrap_err();
        assert!(err.to_string().contains("schema version"));

        let other = json.replace("offset_fit", "something_else");
        assert!(CalibrationSession::<OffsetProblem>::from_json(&other).is_err());
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fitted().save(&path).unwrap();
        let loaded = CalibrationSession::<OffsetProblem>::load(&path).unwrap();
        assert_eq!(loaded.state.mean, Some(1.0));
    }
}
