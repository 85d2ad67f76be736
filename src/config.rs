//! Execution configuration.
//!
//! A [`PipelineConfig`] names a pipeline (the name shows up in log spans) and
//! picks an [`ExecMode`] for the two places the core runs work concurrently:
//! the fan-out sink and the after-effect batch.
//!
//! ```
//! use ironflow::config::{ExecMode, PipelineConfig};
//!
//! let cfg = PipelineConfig::from_json_str(
//!     r#"{ "name": "orders", "mode": { "parallel": { "threads": 4 } } }"#,
//! ).unwrap();
//! assert_eq!(cfg.mode, ExecMode::Parallel { threads: Some(4) });
//! ```

use crate::error::EtlError;
use serde::{Deserialize, Serialize};

/// How a group of independent tasks is run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecMode {
    /// One after the other on the calling thread, in registration order.
    Sequential,
    /// Concurrently on rayon. `threads: None` uses the global pool, otherwise a
    /// dedicated pool with that many workers is built once per pipeline and
    /// reused by every run.
    Parallel { threads: Option<usize> },
}

impl Default for ExecMode {
    fn default() -> Self {
        Self::Parallel { threads: None }
    }
}

impl ExecMode {
    /// Number of workers this mode will use. Recorded on the pipeline's log span.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        match self {
            Self::Sequential => 1,
            Self::Parallel { threads: Some(t) } => *t,
            Self::Parallel { threads: None } => num_cpus::get().max(1),
        }
    }
}

/// Settings shared by [`Pipeline`](crate::Pipeline) and
/// [`IncrementalPipeline`](crate::IncrementalPipeline).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Name used in log spans.
    pub name: String,
    /// Execution mode for fan-out sinks and after-effects.
    pub mode: ExecMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: "pipeline".to_string(),
            mode: ExecMode::default(),
        }
    }
}

impl PipelineConfig {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: ExecMode) -> Self {
        self.mode = mode;
        self
    }

    /// Parse and validate a JSON document. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`EtlError::Config`] if the JSON is malformed or the config is invalid.
    pub fn from_json_str(s: &str) -> Result<Self, EtlError> {
        let cfg: Self =
            serde_json::from_str(s).map_err(|e| EtlError::Config(format!("parse config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// # Errors
    ///
    /// Returns [`EtlError::Config`] for an empty name or a zero thread count.
    pub fn validate(&self) -> Result<(), EtlError> {
        if self.name.trim().is_empty() {
            return Err(EtlError::Config("pipeline name must not be empty".into()));
        }
        if let ExecMode::Parallel { threads: Some(0) } = self.mode {
            return Err(EtlError::Config("thread count must be at least 1".into()));
        }
        Ok(())
    }
}
