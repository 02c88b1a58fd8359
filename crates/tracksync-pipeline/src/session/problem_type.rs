//! The [`ProblemType`] trait tying a calibration problem to a session.

use anyhow::Result;
use serde::{Serialize, de::DeserializeOwned};

/// What a session discards when its input or config changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidationPolicy {
    pub clear_state: bool,
    pub clear_output: bool,
    pub clear_exports: bool,
}

impl InvalidationPolicy {
    /// Keep everything.
    pub const KEEP_ALL: Self = Self {
        clear_state: false,
        clear_output: false,
        clear_exports: false,
    };

    /// Drop intermediate state and output; keep past exports.
    pub const CLEAR_COMPUTED: Self = Self {
        clear_state: true,
        clear_output: true,
        clear_exports: false,
    };

    /// Drop everything derived from the previous input.
    pub const CLEAR_ALL: Self = Self {
        clear_state: true,
        clear_output: true,
        clear_exports: true,
    };
}

/// A calibration problem that can be driven through a
/// [`CalibrationSession`](super::CalibrationSession).
///
/// Implementors name their config, input, intermediate state, output and
/// export types and provide validation. Step functions live next to the
/// implementation and mutate the session in place.
pub trait ProblemType: Sized {
    type Config: Clone + Default + Serialize + DeserializeOwned + std::fmt::Debug;
    type Input: Clone + Serialize + DeserializeOwned + std::fmt::Debug;
    type State: Clone + Default + Serialize + DeserializeOwned + std::fmt::Debug;
    type Output: Clone + Serialize + DeserializeOwned + std::fmt::Debug;
    type Export: Clone + Serialize + DeserializeOwned + std::fmt::Debug;

    /// Stable identifier stored in session metadata.
    fn name() -> &'static str;

    /// Version of the serialized session layout.
    fn schema_version() -> u32 {
        1
    }

    fn validate_input(input: &Self::Input) -> Result<()> {
        let _ = input;
        Ok(())
    }

    fn validate_config(config: &Self::Config) -> Result<()> {
        let _ = config;
        Ok(())
    }

    /// Checks that need both input and config.
    fn validate_input_config(input: &Self::Input, config: &Self::Config) -> Result<()> {
        let _ = (input, config);
        Ok(())
    }

    fn on_input_change() -> InvalidationPolicy {
        InvalidationPolicy::CLEAR_COMPUTED
    }

    fn on_config_change() -> InvalidationPolicy {
        InvalidationPolicy::KEEP_ALL
    }

    /// Convert the output into its exported form.
    fn export(output: &Self::Output, config: &Self::Config) -> Result<Self::Export>;
}
