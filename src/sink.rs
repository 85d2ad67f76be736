//! Sinks: where a run's batch ends up.
//!
//! A [`Sink<T>`] consumes a whole batch and succeeds or fails as a unit. Two
//! combinators deliver one batch to several sinks:
//!
//! - [`SequenceSink`] replays the batch into each sink in order and stops at the
//!   first failure; later sinks do not run.
//! - [`Spread`] gives every sink its own copy, runs them all concurrently, lets
//!   every one finish, and fails if any of them failed. The error is a
//!   [`MultiError`](crate::error::MultiError) listing each failure. There is no
//!   all-or-nothing commit across sinks: the ones that succeeded stay delivered.
//!   Unless given a mode of its own, a `Spread` schedules its sinks with the
//!   run's [`ExecMode`] taken from the [`PipelineState`].
//!
//! ```
//! use ironflow::sink::{sink_fn, Spread, Sink};
//! use ironflow::PipelineState;
//!
//! let fan_out = Spread::new()
//!     .with(sink_fn(|_, batch: Vec<u32>| { assert_eq!(batch.len(), 2); Ok(()) }))
//!     .with(sink_fn(|_, batch: Vec<u32>| { assert_eq!(batch.iter().sum::<u32>(), 3); Ok(()) }));
//!
//! fan_out.consume(&PipelineState::new(), vec![1, 2]).unwrap();
//! ```

use crate::batch::{Batch, replicate};
use crate::config::ExecMode;
use crate::exec::{Executor, Task};
use crate::state::PipelineState;
use anyhow::{Context, Result};
use std::marker::PhantomData;

/// Consumes a batch of `T`.
pub trait Sink<T>: Send + Sync {
    /// Durably dispose of `batch`. May register after-effects on `state`.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch was not fully delivered.
    fn consume(&self, state: &PipelineState, batch: Batch<T>) -> Result<()>;
}

/// A type-erased sink.
pub type BoxedSink<T> = Box<dyn Sink<T>>;

impl<T> Sink<T> for Box<dyn Sink<T>> {
    fn consume(&self, state: &PipelineState, batch: Batch<T>) -> Result<()> {
        (**self).consume(state, batch)
    }
}

/// Closure-backed sink. See [`sink_fn`].
pub struct FnSink<F, T> {
    f: F,
    _t: PhantomData<fn(T)>,
}

impl<T, F> Sink<T> for FnSink<F, T>
where
    F: Fn(&PipelineState, Batch<T>) -> Result<()> + Send + Sync,
{
    fn consume(&self, state: &PipelineState, batch: Batch<T>) -> Result<()> {
        (self.f)(state, batch)
    }
}

/// Build a sink from a closure.
pub fn sink_fn<T, F>(f: F) -> FnSink<F, T>
where
    F: Fn(&PipelineState, Batch<T>) -> Result<()> + Send + Sync,
{
    FnSink { f, _t: PhantomData }
}

/// Accepts and drops every batch.
pub struct Discard<T>(PhantomData<fn(T)>);

impl<T> Sink<T> for Discard<T> {
    fn consume(&self, _state: &PipelineState, _batch: Batch<T>) -> Result<()> {
        Ok(())
    }
}

#[must_use]
pub fn discard<T>() -> Discard<T> {
    Discard(PhantomData)
}

/// Sinks run one after another on the same batch.
pub struct SequenceSink<T> {
    sinks: Vec<BoxedSink<T>>,
}

impl<T> SequenceSink<T> {
    #[must_use]
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Append a sink; it runs after every sink already added.
    #[must_use]
    pub fn with<S: Sink<T> + 'static>(mut self, sink: S) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl<T> Default for SequenceSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<BoxedSink<T>> for SequenceSink<T> {
    fn from_iter<I: IntoIterator<Item = BoxedSink<T>>>(iter: I) -> Self {
        Self {
            sinks: iter.into_iter().collect(),
        }
    }
}

impl<T: Clone + Send> Sink<T> for SequenceSink<T> {
    fn consume(&self, state: &PipelineState, batch: Batch<T>) -> Result<()> {
        let copies = replicate(batch, self.sinks.len());
        for (i, (sink, copy)) in self.sinks.iter().zip(copies).enumerate() {
            sink.consume(state, copy)
                .with_context(|| format!("sequenced sink {i} failed"))?;
        }
        Ok(())
    }
}

/// Fan-out: every sink gets its own copy of the batch and they run concurrently.
pub struct Spread<T> {
    sinks: Vec<BoxedSink<T>>,
    executor: Option<Executor>,
}

impl<T> Spread<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sinks: Vec::new(),
            executor: None,
        }
    }

    #[must_use]
    pub fn with<S: Sink<T> + 'static>(mut self, sink: S) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Schedule the sinks with `mode` instead of the run's mode.
    #[must_use]
    pub fn with_mode(mut self, mode: ExecMode) -> Self {
        self.executor = Some(Executor::new(mode));
        self
    }

    /// The mode set by [`with_mode`](Self::with_mode), if any.
    #[must_use]
    pub fn mode(&self) -> Option<ExecMode> {
        self.executor.as_ref().map(Executor::mode)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl<T> Default for Spread<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<BoxedSink<T>> for Spread<T> {
    fn from_iter<I: IntoIterator<Item = BoxedSink<T>>>(iter: I) -> Self {
        Self {
            sinks: iter.into_iter().collect(),
            executor: None,
        }
    }
}

impl<T: Clone + Send> Sink<T> for Spread<T> {
    fn consume(&self, state: &PipelineState, batch: Batch<T>) -> Result<()> {
        let copies = replicate(batch, self.sinks.len());
        let tasks: Vec<Task<'_>> = self
            .sinks
            .iter()
            .zip(copies)
            .enumerate()
            .map(|(i, (sink, copy))| {
                Box::new(move || {
                    sink.consume(state, copy)
                        .with_context(|| format!("spread sink {i} failed"))
                }) as Task<'_>
            })
            .collect();

        let executor = self.executor.as_ref().unwrap_or_else(|| state.executor());
        executor.join_all(tasks).map_err(|errors| {
            tracing::error!(failed = errors.len(), total = self.sinks.len(), "fan-out delivery incomplete");
            anyhow::Error::new(errors)
        })
    }
}
