//! Sources: where a run's batch comes from.
//!
//! A [`Source<T>`] produces one `Batch<T>` per run. Cursor-driven collection
//! lives in [`crate::incremental`]; a source here is the non-incremental shape the
//! plain [`Pipeline`](crate::Pipeline) drives.
//!
//! ### Overview
//! - [`from_vec`] / [`from_iter`] -- replay an in-memory vector on every run
//! - [`source_fn`] -- any closure returning a batch
//! - [`sequence_source`] -- build the second source from the first source's output
//! - [`join_sources`](crate::join::join_sources) -- positional join of two sources
//!
//! ### Example
//! ```
//! use ironflow::source::{from_vec, sequence_source, Source};
//! use ironflow::PipelineState;
//!
//! let ids = from_vec(vec![1u32, 2, 3]);
//! let names = sequence_source(ids, |ids: Vec<u32>| {
//!     from_vec(ids.into_iter().map(|i| format!("user-{i}")).collect())
//! });
//!
//! let out = names.collect(&PipelineState::new()).unwrap();
//! assert_eq!(out, vec!["user-1", "user-2", "user-3"]);
//! ```

use crate::batch::Batch;
use crate::state::PipelineState;
use anyhow::{Context, Result};
use std::marker::PhantomData;

/// Produces a batch of `T`.
pub trait Source<T>: Send + Sync {
    /// Produce this run's batch. May register after-effects on `state`.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch cannot be produced.
    fn collect(&self, state: &PipelineState) -> Result<Batch<T>>;
}

/// A type-erased source.
pub type BoxedSource<T> = Box<dyn Source<T>>;

impl<T> Source<T> for Box<dyn Source<T>> {
    fn collect(&self, state: &PipelineState) -> Result<Batch<T>> {
        (**self).collect(state)
    }
}

/// Replays a fixed vector. See [`from_vec`].
#[derive(Clone, Debug)]
pub struct VecSource<T> {
    data: Vec<T>,
}

impl<T> Source<T> for VecSource<T>
where
    T: Clone + Send + Sync,
{
    fn collect(&self, _state: &PipelineState) -> Result<Batch<T>> {
        Ok(self.data.clone())
    }
}

/// Source that yields a clone of `data` on every run.
#[must_use]
pub fn from_vec<T: Clone + Send + Sync>(data: Vec<T>) -> VecSource<T> {
    VecSource { data }
}

/// Source that yields the collected items of `iter` on every run.
pub fn from_iter<T, I>(iter: I) -> VecSource<T>
where
    T: Clone + Send + Sync,
    I: IntoIterator<Item = T>,
{
    from_vec(iter.into_iter().collect())
}

/// Closure-backed source. See [`source_fn`].
pub struct FnSource<F, T> {
    f: F,
    _t: PhantomData<fn() -> T>,
}

impl<T, F> Source<T> for FnSource<F, T>
where
    F: Fn(&PipelineState) -> Result<Batch<T>> + Send + Sync,
{
    fn collect(&self, state: &PipelineState) -> Result<Batch<T>> {
        (self.f)(state)
    }
}

/// Build a source from a closure.
pub fn source_fn<T, F>(f: F) -> FnSource<F, T>
where
    F: Fn(&PipelineState) -> Result<Batch<T>> + Send + Sync,
{
    FnSource { f, _t: PhantomData }
}

/// A source whose output chooses the next source. See [`sequence_source`].
pub struct SequenceSource<S1, F, T> {
    first: S1,
    chain: F,
    _t: PhantomData<fn() -> T>,
}

impl<T, V, S1, S2, F> Source<V> for SequenceSource<S1, F, T>
where
    S1: Source<T>,
    S2: Source<V>,
    F: Fn(Batch<T>) -> S2 + Send + Sync,
{
    fn collect(&self, state: &PipelineState) -> Result<Batch<V>> {
        let first = self.first.collect(state)?;
        let next = (self.chain)(first);
        next.collect(state).context("chained source failed")
    }
}

/// Collect `first`, hand its batch to `chain` to build a second source, then
/// collect that. The first error stops the sequence.
pub fn sequence_source<T, V, S1, S2, F>(first: S1, chain: F) -> SequenceSource<S1, F, T>
where
    S1: Source<T>,
    S2: Source<V>,
    F: Fn(Batch<T>) -> S2 + Send + Sync,
{
    SequenceSource {
        first,
        chain,
        _t: PhantomData,
    }
}
