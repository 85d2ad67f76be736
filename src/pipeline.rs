use crate::config::PipelineConfig;
use crate::error::EtlError;
use crate::exec::Executor;
use crate::sink::Sink;
use crate::source::Source;
use crate::stage::Stage;
use crate::state::PipelineState;
use std::fmt;
use std::marker::PhantomData;
use std::time::{Duration, Instant};

/// Where a run currently is. Runs only move forward; there is no internal retry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Collecting,
    Transforming,
    Emitting,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Collecting => "collecting",
            Self::Transforming => "transforming",
            Self::Emitting => "emitting",
            Self::Done => "done",
            Self::Failed => "failed",
        })
    }
}

/// What a successful run did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    /// Elements produced by the source.
    pub collected: usize,
    /// Elements handed to the sink.
    pub emitted: usize,
    /// After-effects run once the sink succeeded.
    pub after_effects: usize,
    pub elapsed: Duration,
}

/// One source, one stage, one sink, wired together.
///
/// Each [`execute`](Self::execute) call creates a fresh [`PipelineState`], so the
/// same pipeline can be executed any number of times, but two concurrent calls
/// never share after-effects.
pub struct Pipeline<T, V, Src, Stg, Snk> {
    source: Src,
    stage: Stg,
    sink: Snk,
    config: PipelineConfig,
    executor: Executor,
    _t: PhantomData<fn(T) -> V>,
}

impl<T, V, Src, Stg, Snk> Pipeline<T, V, Src, Stg, Snk>
where
    Src: Source<T>,
    Stg: Stage<T, V>,
    Snk: Sink<V>,
{
    pub fn new(source: Src, stage: Stg, sink: Snk) -> Self {
        Self {
            source,
            stage,
            sink,
            config: PipelineConfig::default(),
            executor: Executor::default(),
            _t: PhantomData,
        }
    }

    /// Replace the config. A dedicated worker pool, if the mode asks for one,
    /// is built here and reused by every run.
    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.executor = Executor::new(config.mode);
        self.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Collect, transform, sink, then run the after-effects registered along the way.
    ///
    /// After-effects only run when the sink succeeded. If any step fails the run
    /// stops there and its pending after-effects are dropped.
    ///
    /// # Errors
    ///
    /// - [`EtlError::Collect`] if the source fails
    /// - [`EtlError::Transform`] if the stage fails
    /// - [`EtlError::Sink`] if the sink fails
    /// - [`EtlError::AfterEffects`] if one or more after-effects fail
    pub fn execute(&self) -> Result<RunSummary, EtlError> {
        let span = tracing::info_span!(
            "pipeline",
            name = %self.config.name,
            workers = self.config.mode.worker_count()
        );
        let _guard = span.enter();
        let started = Instant::now();
        let state = PipelineState::with_executor(self.executor.clone());

        let mut phase = Phase::Collecting;
        tracing::debug!(%phase);
        let batch = self.source.collect(&state).map_err(|e| fail(phase, EtlError::Collect(e)))?;
        let collected = batch.len();

        phase = Phase::Transforming;
        tracing::debug!(%phase, records = collected);
        let out = self
            .stage
            .apply(&state, batch)
            .map_err(|e| fail(phase, EtlError::Transform(e)))?;
        let emitted = out.len();

        phase = Phase::Emitting;
        tracing::debug!(%phase, records = emitted);
        self.sink
            .consume(&state, out)
            .map_err(|e| fail(phase, EtlError::Sink(e)))?;

        let after_effects = state.pending_after_effects();
        state
            .run_after_effects()
            .map_err(|e| fail(phase, EtlError::AfterEffects(e)))?;

        let elapsed = started.elapsed();
        tracing::info!(phase = %Phase::Done, collected, emitted, after_effects, elapsed_ms = elapsed.as_millis() as u64, "pipeline run complete");
        Ok(RunSummary {
            collected,
            emitted,
            after_effects,
            elapsed,
        })
    }
}

fn fail(phase: Phase, err: EtlError) -> EtlError {
    tracing::error!(%phase, step = err.step(), error = %err, "pipeline run {}", Phase::Failed);
    err
}
