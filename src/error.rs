//! Error types for pipeline execution.
//!
//! Components (sources, stages, sinks, collectors, encoders, emitters) return
//! [`anyhow::Result`] so they can attach context freely. The drivers convert
//! those into [`EtlError`] at their boundary, tagging each failure with the step
//! that produced it so callers can decide what a retry means.
//!
//! The cursor is only written after every preceding step succeeded, so every
//! variant except [`EtlError::CursorWrite`] leaves the stored cursor untouched.
//! `CursorWrite` is the at-least-once hazard: the batch has already been emitted
//! but the cursor did not advance, so the next run re-emits it.

use std::fmt;

/// Failure of a single pipeline run, tagged with the step that failed.
#[derive(Debug, thiserror::Error)]
pub enum EtlError {
    /// The cursor could not be read; nothing was collected.
    #[error("error reading cursor for run `{run_id}`: {source}")]
    CursorRead {
        run_id: String,
        #[source]
        source: StateStoreError,
    },

    /// The source or collector failed.
    #[error("error collecting data: {0:#}")]
    Collect(#[source] anyhow::Error),

    /// A stage or translator failed; nothing was emitted.
    #[error("error transforming data: {0:#}")]
    Transform(#[source] anyhow::Error),

    /// The encoder failed; nothing was emitted.
    #[error("error serializing records: {0:#}")]
    Serialize(#[source] anyhow::Error),

    /// The emitter failed.
    #[error("error emitting data: {0:#}")]
    Emit(#[source] anyhow::Error),

    /// The sink failed.
    #[error("error sinking batch: {0:#}")]
    Sink(#[source] anyhow::Error),

    /// The data was emitted but the new cursor could not be stored.
    #[error("data emitted but cursor `{cursor}` for run `{run_id}` was not stored: {source}")]
    CursorWrite {
        run_id: String,
        cursor: String,
        #[source]
        source: StateStoreError,
    },

    /// One or more after-effects failed after a successful sink.
    #[error("after-effects failed: {0}")]
    AfterEffects(#[source] MultiError),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl EtlError {
    /// Short name of the step that failed, used as a structured log field.
    #[must_use]
    pub fn step(&self) -> &'static str {
        match self {
            Self::CursorRead { .. } => "cursor_read",
            Self::Collect(_) => "collect",
            Self::Transform(_) => "transform",
            Self::Serialize(_) => "serialize",
            Self::Emit(_) => "emit",
            Self::Sink(_) => "sink",
            Self::CursorWrite { .. } => "cursor_write",
            Self::AfterEffects(_) => "after_effects",
            Self::Config(_) => "config",
        }
    }

    /// True when the failure happened after data was delivered downstream.
    ///
    /// A retry of such a run emits the same batch again.
    #[must_use]
    pub fn data_was_emitted(&self) -> bool {
        matches!(self, Self::CursorWrite { .. } | Self::AfterEffects(_))
    }
}

/// Errors produced by a [`StateStore`](crate::incremental::StateStore).
#[derive(Debug, thiserror::Error)]
pub enum StateStoreError {
    /// No value is stored under the key.
    #[error("key `{0}` not found")]
    NotFound(String),

    /// Any other storage failure.
    #[error("state store failure: {0:#}")]
    Backend(#[source] anyhow::Error),
}

impl StateStoreError {
    /// Wrap an arbitrary backend failure.
    pub fn backend(err: impl Into<anyhow::Error>) -> Self {
        Self::Backend(err.into())
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Several independent failures from one concurrent group (fan-out sinks or
/// after-effects), kept in task order.
#[derive(Debug)]
pub struct MultiError {
    errors: Vec<anyhow::Error>,
}

impl MultiError {
    /// Build from a non-empty list of failures. Returns `None` when `errors` is empty.
    #[must_use]
    pub fn from_errors(errors: Vec<anyhow::Error>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self { errors })
        }
    }

    /// The first failure in task order.
    #[must_use]
    pub fn first(&self) -> &anyhow::Error {
        &self.errors[0]
    }

    #[must_use]
    pub fn errors(&self) -> &[anyhow::Error] {
        &self.errors
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_errors(self) -> Vec<anyhow::Error> {
        self.errors
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.len() == 1 {
            return write!(f, "{:#}", self.errors[0]);
        }
        write!(f, "{} failures: ", self.errors.len())?;
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "[{i}] {e:#}")?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        let first: &(dyn std::error::Error + 'static) = self.errors[0].as_ref();
        Some(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn multi_error_requires_failures() {
        assert!(MultiError::from_errors(vec![]).is_none());
    }

    #[test]
    fn multi_error_lists_every_failure() {
        let m = MultiError::from_errors(vec![anyhow!("sink a"), anyhow!("sink b")]).unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m.first().to_string(), "sink a");
        let msg = m.to_string();
        assert!(msg.contains("2 failures"), "got: {msg}");
        assert!(msg.contains("[0] sink a"), "got: {msg}");
        assert!(msg.contains("[1] sink b"), "got: {msg}");
    }

    #[test]
    fn single_failure_displays_plainly() {
        let m = MultiError::from_errors(vec![anyhow!("boom")]).unwrap();
        assert_eq!(m.to_string(), "boom");
    }

    #[test]
    fn not_found_is_distinguishable() {
        assert!(StateStoreError::NotFound("k".into()).is_not_found());
        assert!(!StateStoreError::backend(anyhow!("disk")).is_not_found());
    }

    #[test]
    fn step_names_and_emission_flag() {
        let e = EtlError::Emit(anyhow!("queue down"));
        assert_eq!(e.step(), "emit");
        assert!(!e.data_was_emitted());

        let e = EtlError::CursorWrite {
            run_id: "idx".into(),
            cursor: "10".into(),
            source: StateStoreError::backend(anyhow!("disk full")),
        };
        assert_eq!(e.step(), "cursor_write");
        assert!(e.data_was_emitted());
        assert!(e.to_string().contains("cursor `10`"));
    }
}
