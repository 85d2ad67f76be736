//! Per-run state and deferred after-effects.
//!
//! Every call to [`Pipeline::execute`](crate::Pipeline::execute) creates a fresh
//! [`PipelineState`] and passes it by reference to the source, each stage and the
//! sink. Any of them may register an [`AfterEffect`]: a deferred action such as
//! "record that value X was produced" that must only happen once the batch has
//! been delivered.
//!
//! After the sink succeeds the driver calls [`PipelineState::run_after_effects`],
//! which runs every registered effect concurrently, waits for all of them, and
//! reports any failures together. When a run fails earlier the state is dropped
//! with the driver's early return and its effects never run.
//!
//! Registration takes `&self` so that concurrently running fan-out sinks can
//! register through the same shared reference.
//!
//! The state also carries the run's [`ExecMode`]. The driver sets it from
//! [`PipelineConfig::mode`](crate::PipelineConfig::mode), and both the
//! after-effect batch and any [`Spread`](crate::Spread) without its own mode
//! schedule their work with it.

use crate::config::ExecMode;
use crate::error::MultiError;
use crate::exec::{Executor, Task};
use anyhow::Result;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A deferred action run after a successful sink.
pub type AfterEffect = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

/// Mutable, run-scoped context threaded through one execution.
#[derive(Default)]
pub struct PipelineState {
    after_effects: Mutex<Vec<AfterEffect>>,
    executor: Executor,
}

impl PipelineState {
    /// A state that runs concurrent work under [`ExecMode::default`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_mode(mode: ExecMode) -> Self {
        Self::with_executor(Executor::new(mode))
    }

    pub(crate) fn with_executor(executor: Executor) -> Self {
        Self {
            after_effects: Mutex::default(),
            executor,
        }
    }

    /// The mode fan-out sinks and after-effects inherit for this run.
    #[must_use]
    pub fn exec_mode(&self) -> ExecMode {
        self.executor.mode()
    }

    pub(crate) fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Register an effect to run once the sink has succeeded.
    pub fn register_after_effect<F>(&self, effect: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.effects().push(Box::new(effect));
    }

    /// Number of effects waiting to run.
    #[must_use]
    pub fn pending_after_effects(&self) -> usize {
        self.effects().len()
    }

    /// Drop every pending effect without running it.
    pub fn discard_after_effects(&self) {
        self.effects().clear();
    }

    /// Run all pending effects under the run's mode and wait for them.
    ///
    /// The pending list is taken before running, so it is empty afterwards
    /// whatever the outcome, and effects registered while running are kept for
    /// a later call.
    ///
    /// # Errors
    ///
    /// Returns every failed effect's error, in registration order.
    pub fn run_after_effects(&self) -> Result<(), MultiError> {
        let effects = std::mem::take(&mut *self.effects());
        if effects.is_empty() {
            return Ok(());
        }
        tracing::debug!(count = effects.len(), "running after-effects");
        let tasks: Vec<Task<'static>> = effects;
        self.executor.join_all(tasks)
    }

    fn effects(&self) -> MutexGuard<'_, Vec<AfterEffect>> {
        // A panicking effect cannot leave the list half-written, so recover.
        self.after_effects.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineState")
            .field("mode", &self.exec_mode())
            .field("pending_after_effects", &self.pending_after_effects())
            .finish()
    }
}
