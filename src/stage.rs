//! Stages: batch-to-batch transforms.
//!
//! A [`Stage<T, V>`] turns a `Batch<T>` into a `Batch<V>` or fails. Primitive
//! stages are built with the constructor functions in this module; larger ones are
//! composed with [`sequence_stage`] (or [`StageExt::then`]), [`SequenceStages`] and
//! the join stage in [`crate::join`].
//!
//! ### Overview
//! - [`map`] / [`map_with_state`] -- one output per input, order preserved
//! - [`try_map`] -- fallible map; stops at the first failing element
//! - [`flat_map`] -- zero or more outputs per input
//! - [`filter`] -- keep elements matching a predicate
//! - [`shuffle`] / [`shuffle_seeded`] -- random permutation
//! - [`count`] -- collapse a batch into one `HashMap<T, usize>`
//! - [`after_delivery`] -- pass through, deferring a callback until the sink succeeds
//!
//! ### Example
//! ```
//! use ironflow::stage::{count, filter, map, Stage, StageExt};
//! use ironflow::PipelineState;
//!
//! let words = map(|s: &str| s.to_lowercase())
//!     .then(filter(|w: &String| w.len() > 1))
//!     .then(count());
//!
//! let state = PipelineState::new();
//! let out = words.apply(&state, vec!["A", "be", "BE", "see"]).unwrap();
//! assert_eq!(out.len(), 1);
//! assert_eq!(out[0]["be"], 2);
//! ```

use crate::batch::Batch;
use crate::state::PipelineState;
use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::hash::Hash;
use std::marker::PhantomData;

/// Maps a batch of `T` to a batch of `V`.
pub trait Stage<T, V>: Send + Sync {
    /// Transform `input`. May register after-effects on `state`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transform fails; no partial output is produced.
    fn apply(&self, state: &PipelineState, input: Batch<T>) -> Result<Batch<V>>;
}

/// A type-erased stage.
pub type BoxedStage<T, V> = Box<dyn Stage<T, V>>;

impl<T, V> Stage<T, V> for Box<dyn Stage<T, V>> {
    fn apply(&self, state: &PipelineState, input: Batch<T>) -> Result<Batch<V>> {
        (**self).apply(state, input)
    }
}

/// Combinators available on every stage.
pub trait StageExt<T, V>: Stage<T, V> + Sized {
    /// Feed this stage's output into `next`.
    fn then<K, S>(self, next: S) -> SequenceStage<Self, S, V>
    where
        S: Stage<V, K>,
    {
        sequence_stage(self, next)
    }

    /// Erase the concrete type.
    fn boxed(self) -> BoxedStage<T, V>
    where
        Self: 'static,
    {
        Box::new(self)
    }
}

impl<T, V, S: Stage<T, V>> StageExt<T, V> for S {}

/// Stage backed by a closure over the whole batch. See [`stage_fn`].
pub struct FnStage<F, T, V> {
    f: F,
    _t: PhantomData<fn(T) -> V>,
}

impl<T, V, F> Stage<T, V> for FnStage<F, T, V>
where
    F: Fn(&PipelineState, Batch<T>) -> Result<Batch<V>> + Send + Sync,
{
    fn apply(&self, state: &PipelineState, input: Batch<T>) -> Result<Batch<V>> {
        (self.f)(state, input)
    }
}

/// Build a stage from a closure that receives the whole batch.
pub fn stage_fn<T, V, F>(f: F) -> FnStage<F, T, V>
where
    F: Fn(&PipelineState, Batch<T>) -> Result<Batch<V>> + Send + Sync,
{
    FnStage { f, _t: PhantomData }
}

/// Passes the batch through unchanged.
pub struct Identity<T>(PhantomData<fn(T) -> T>);

impl<T> Stage<T, T> for Identity<T> {
    fn apply(&self, _state: &PipelineState, input: Batch<T>) -> Result<Batch<T>> {
        Ok(input)
    }
}

#[must_use]
pub fn identity<T>() -> Identity<T> {
    Identity(PhantomData)
}

// ---- Map ----

/// Element-wise map with access to the run state. See [`map`] and [`map_with_state`].
pub struct Map<F, T, V> {
    f: F,
    _t: PhantomData<fn(T) -> V>,
}

impl<T, V, F> Stage<T, V> for Map<F, T, V>
where
    F: Fn(&PipelineState, T) -> V + Send + Sync,
{
    fn apply(&self, state: &PipelineState, input: Batch<T>) -> Result<Batch<V>> {
        let mut out = Vec::with_capacity(input.len());
        for t in input {
            out.push((self.f)(state, t));
        }
        Ok(out)
    }
}

/// Map every element. Output has the same length and order as the input.
pub fn map<T, V, F>(f: F) -> Map<impl Fn(&PipelineState, T) -> V + Send + Sync, T, V>
where
    F: Fn(T) -> V + Send + Sync,
{
    map_with_state(move |_: &PipelineState, t: T| f(t))
}

/// Like [`map`], but the closure also receives the run state so it can register
/// after-effects.
pub fn map_with_state<T, V, F>(f: F) -> Map<F, T, V>
where
    F: Fn(&PipelineState, T) -> V + Send + Sync,
{
    Map { f, _t: PhantomData }
}

/// Fallible element-wise map. See [`try_map`].
pub struct TryMap<F, T, V> {
    f: F,
    _t: PhantomData<fn(T) -> V>,
}

impl<T, V, F> Stage<T, V> for TryMap<F, T, V>
where
    F: Fn(&PipelineState, T) -> Result<V> + Send + Sync,
{
    fn apply(&self, state: &PipelineState, input: Batch<T>) -> Result<Batch<V>> {
        let mut out = Vec::with_capacity(input.len());
        for (i, t) in input.into_iter().enumerate() {
            let v = (self.f)(state, t).with_context(|| format!("map failed at element {i}"))?;
            out.push(v);
        }
        Ok(out)
    }
}

/// Map every element with a fallible closure. The first error aborts the stage
/// and the remaining elements are discarded.
pub fn try_map<T, V, F>(f: F) -> TryMap<impl Fn(&PipelineState, T) -> Result<V> + Send + Sync, T, V>
where
    F: Fn(T) -> Result<V> + Send + Sync,
{
    try_map_with_state(move |_: &PipelineState, t: T| f(t))
}

/// Like [`try_map`], with access to the run state.
pub fn try_map_with_state<T, V, F>(f: F) -> TryMap<F, T, V>
where
    F: Fn(&PipelineState, T) -> Result<V> + Send + Sync,
{
    TryMap { f, _t: PhantomData }
}

/// Zero or more outputs per input. See [`flat_map`].
pub struct FlatMap<F, T, V> {
    f: F,
    _t: PhantomData<fn(T) -> V>,
}

impl<T, V, F> Stage<T, V> for FlatMap<F, T, V>
where
    F: Fn(T) -> Vec<V> + Send + Sync,
{
    fn apply(&self, _state: &PipelineState, input: Batch<T>) -> Result<Batch<V>> {
        let mut out = Vec::new();
        for t in input {
            out.extend((self.f)(t));
        }
        Ok(out)
    }
}

/// Expand every element into a vector and concatenate the results in order.
pub fn flat_map<T, V, F>(f: F) -> FlatMap<F, T, V>
where
    F: Fn(T) -> Vec<V> + Send + Sync,
{
    FlatMap { f, _t: PhantomData }
}

// ---- Filter ----

/// Keeps elements matching a predicate. See [`filter`].
pub struct Filter<P, T> {
    pred: P,
    _t: PhantomData<fn(T) -> T>,
}

impl<T, P> Stage<T, T> for Filter<P, T>
where
    P: Fn(&PipelineState, &T) -> bool + Send + Sync,
{
    fn apply(&self, state: &PipelineState, input: Batch<T>) -> Result<Batch<T>> {
        Ok(input.into_iter().filter(|t| (self.pred)(state, t)).collect())
    }
}

/// Keep elements for which `pred` returns true, preserving their relative order.
pub fn filter<T, P>(pred: P) -> Filter<impl Fn(&PipelineState, &T) -> bool + Send + Sync, T>
where
    P: Fn(&T) -> bool + Send + Sync,
{
    filter_with_state(move |_: &PipelineState, t: &T| pred(t))
}

/// Like [`filter`], with access to the run state.
pub fn filter_with_state<T, P>(pred: P) -> Filter<P, T>
where
    P: Fn(&PipelineState, &T) -> bool + Send + Sync,
{
    Filter {
        pred,
        _t: PhantomData,
    }
}

// ---- Shuffle ----

/// Random permutation of the batch. See [`shuffle`].
pub struct Shuffle<T> {
    seed: Option<u64>,
    _t: PhantomData<fn(T) -> T>,
}

impl<T> Stage<T, T> for Shuffle<T> {
    fn apply(&self, _state: &PipelineState, mut input: Batch<T>) -> Result<Batch<T>> {
        match self.seed {
            Some(seed) => input.shuffle(&mut StdRng::seed_from_u64(seed)),
            None => input.shuffle(&mut rand::rng()),
        }
        Ok(input)
    }
}

/// Uniformly random permutation from the OS-seeded thread-local generator.
///
/// Not reproducible across runs and not suitable for cryptographic use.
#[must_use]
pub fn shuffle<T>() -> Shuffle<T> {
    Shuffle {
        seed: None,
        _t: PhantomData,
    }
}

/// Deterministic permutation: the same seed and input give the same output.
#[must_use]
pub fn shuffle_seeded<T>(seed: u64) -> Shuffle<T> {
    Shuffle {
        seed: Some(seed),
        _t: PhantomData,
    }
}

// ---- Count ----

/// Occurrence count of every distinct element. See [`count`].
pub struct Count<T>(PhantomData<fn(T)>);

impl<T> Stage<T, HashMap<T, usize>> for Count<T>
where
    T: Eq + Hash,
{
    fn apply(&self, _state: &PipelineState, input: Batch<T>) -> Result<Batch<HashMap<T, usize>>> {
        let mut counts: HashMap<T, usize> = HashMap::new();
        for t in input {
            *counts.entry(t).or_insert(0) += 1;
        }
        Ok(vec![counts])
    }
}

/// Collapse the batch into exactly one map from distinct value to count.
///
/// An empty input produces one empty map.
#[must_use]
pub fn count<T: Eq + Hash>() -> Count<T> {
    Count(PhantomData)
}

// ---- After delivery ----

/// Pass-through stage that defers a callback. See [`after_delivery`].
pub struct AfterDelivery<F, T> {
    f: F,
    _t: PhantomData<fn(T) -> T>,
}

impl<T, F> Stage<T, T> for AfterDelivery<F, T>
where
    T: Clone + Send + 'static,
    F: Fn(&[T]) -> Result<()> + Clone + Send + Sync + 'static,
{
    fn apply(&self, state: &PipelineState, input: Batch<T>) -> Result<Batch<T>> {
        let seen = input.clone();
        let f = self.f.clone();
        state.register_after_effect(move || f(&seen));
        Ok(input)
    }
}

/// Pass the batch through unchanged and call `f` with it once the sink has
/// succeeded. If the run fails, `f` is never called.
pub fn after_delivery<T, F>(f: F) -> AfterDelivery<F, T>
where
    F: Fn(&[T]) -> Result<()> + Clone + Send + Sync + 'static,
{
    AfterDelivery { f, _t: PhantomData }
}

// ---- Sequencing ----

/// Two stages run back to back. See [`sequence_stage`].
pub struct SequenceStage<S1, S2, V> {
    first: S1,
    second: S2,
    _v: PhantomData<fn() -> V>,
}

impl<T, V, K, S1, S2> Stage<T, K> for SequenceStage<S1, S2, V>
where
    S1: Stage<T, V>,
    S2: Stage<V, K>,
{
    fn apply(&self, state: &PipelineState, input: Batch<T>) -> Result<Batch<K>> {
        let mid = self.first.apply(state, input)?;
        self.second.apply(state, mid)
    }
}

/// Feed the output of `first` into `second`. Fails with the first error.
pub fn sequence_stage<T, V, K, S1, S2>(first: S1, second: S2) -> SequenceStage<S1, S2, V>
where
    S1: Stage<T, V>,
    S2: Stage<V, K>,
{
    SequenceStage {
        first,
        second,
        _v: PhantomData,
    }
}

/// Three stages in order, composed pairwise.
pub fn sequence_stage3<T, V, K, M, S1, S2, S3>(
    s1: S1,
    s2: S2,
    s3: S3,
) -> SequenceStage<SequenceStage<S1, S2, V>, S3, K>
where
    S1: Stage<T, V>,
    S2: Stage<V, K>,
    S3: Stage<K, M>,
{
    sequence_stage(sequence_stage(s1, s2), s3)
}

/// Four stages in order, composed pairwise.
#[allow(clippy::type_complexity)]
pub fn sequence_stage4<T, V, K, M, L, S1, S2, S3, S4>(
    s1: S1,
    s2: S2,
    s3: S3,
    s4: S4,
) -> SequenceStage<SequenceStage<SequenceStage<S1, S2, V>, S3, K>, S4, M>
where
    S1: Stage<T, V>,
    S2: Stage<V, K>,
    S3: Stage<K, M>,
    S4: Stage<M, L>,
{
    sequence_stage(sequence_stage3(s1, s2, s3), s4)
}

/// An ordered list of same-typed stages, applied left to right.
pub struct SequenceStages<T> {
    stages: Vec<BoxedStage<T, T>>,
}

impl<T> SequenceStages<T> {
    #[must_use]
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Append a stage to the end of the list.
    #[must_use]
    pub fn push<S>(mut self, stage: S) -> Self
    where
        S: Stage<T, T> + 'static,
    {
        self.stages.push(Box::new(stage));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl<T> Default for SequenceStages<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<BoxedStage<T, T>> for SequenceStages<T> {
    fn from_iter<I: IntoIterator<Item = BoxedStage<T, T>>>(iter: I) -> Self {
        Self {
            stages: iter.into_iter().collect(),
        }
    }
}

impl<T> Stage<T, T> for SequenceStages<T> {
    fn apply(&self, state: &PipelineState, input: Batch<T>) -> Result<Batch<T>> {
        self.stages
            .iter()
            .try_fold(input, |batch, stage| stage.apply(state, batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_of_empty_batch_is_one_empty_map() {
        let out = count::<u8>().apply(&PipelineState::new(), vec![]).unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0].is_empty());
    }

    #[test]
    fn seeded_shuffle_is_reproducible() {
        let state = PipelineState::new();
        let input: Vec<u32> = (0..64).collect();
        let a = shuffle_seeded(7).apply(&state, input.clone()).unwrap();
        let b = shuffle_seeded(7).apply(&state, input.clone()).unwrap();
        assert_eq!(a, b);
        let mut sorted = a.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, input);
    }

    #[test]
    fn empty_sequence_is_identity() {
        let out = SequenceStages::<i32>::new()
            .apply(&PipelineState::new(), vec![3, 1, 2])
            .unwrap();
        assert_eq!(out, vec![3, 1, 2]);
    }
}
