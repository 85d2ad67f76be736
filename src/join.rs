//! Positional joins driven by batch cardinality.
//!
//! A join combines two independently produced batches, `left: Vec<T>` and
//! `right: Vec<V>`, into `Vec<K>` with a combining function `(T, V) -> K`. The
//! pairing policy is picked once per join from the two lengths alone
//! ([`JoinKind::classify`]):
//!
//! | condition                        | kind                        | output length |
//! |----------------------------------|-----------------------------|---------------|
//! | `left.len() == 1`                | [`JoinKind::LeftSingle`]    | `right.len()` |
//! | else `right.len() == 1`          | [`JoinKind::RightSingle`]   | `left.len()`  |
//! | else `left.len() > right.len()`  | [`JoinKind::Left`]          | `right.len()` |
//! | otherwise                        | [`JoinKind::Right`]         | `left.len()`  |
//!
//! This is not a relational join: there are no keys and no cross product.
//! `Left` and `Right` pair elements by index and silently drop the excess of the
//! longer side. That truncation is long-standing behaviour that callers rely on;
//! it is kept as is and logged at `debug` when elements are dropped.
//!
//! Three entry points share the same core:
//! - [`join_batches`] -- the pure function over two vectors
//! - [`JoinSource`] -- two sources joined into one source
//! - [`JoinStage`] -- the incoming batch is the left side, a source supplies the right

use crate::batch::Batch;
use crate::source::Source;
use crate::stage::Stage;
use crate::state::PipelineState;
use anyhow::{Context, Result};
use std::marker::PhantomData;

/// Pairing policy chosen from the input lengths.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JoinKind {
    /// Index-paired, driven by the right side's length.
    Left,
    /// Index-paired, driven by the left side's length.
    Right,
    /// The single left element is paired with every right element.
    LeftSingle,
    /// The single right element is paired with every left element.
    RightSingle,
}

impl JoinKind {
    /// Pick the policy for inputs of the given lengths.
    #[must_use]
    pub fn classify(left_len: usize, right_len: usize) -> Self {
        if left_len == 1 {
            Self::LeftSingle
        } else if right_len == 1 {
            Self::RightSingle
        } else if left_len > right_len {
            Self::Left
        } else {
            Self::Right
        }
    }

    /// Number of rows a join of these lengths produces.
    #[must_use]
    pub fn output_len(self, left_len: usize, right_len: usize) -> usize {
        match self {
            Self::LeftSingle | Self::Left => right_len,
            Self::RightSingle | Self::Right => left_len,
        }
    }
}

/// Join two batches under the policy chosen by [`JoinKind::classify`].
///
/// Output order follows the driving side.
pub fn join_batches<T, V, K, F>(left: Batch<T>, right: Batch<V>, f: F) -> Batch<K>
where
    T: Clone,
    V: Clone,
    F: Fn(T, V) -> K,
{
    let kind = JoinKind::classify(left.len(), right.len());
    let dropped = left.len().abs_diff(right.len());
    if dropped > 0 && matches!(kind, JoinKind::Left | JoinKind::Right) {
        tracing::debug!(?kind, left = left.len(), right = right.len(), dropped, "positional join truncated the longer side");
    }

    match kind {
        JoinKind::LeftSingle => {
            let Some(l) = left.into_iter().next() else {
                return Vec::new();
            };
            right.into_iter().map(|r| f(l.clone(), r)).collect()
        }
        JoinKind::RightSingle => {
            let Some(r) = right.into_iter().next() else {
                return Vec::new();
            };
            left.into_iter().map(|l| f(l, r.clone())).collect()
        }
        // zip stops at the shorter side, which is the driving side for both kinds.
        JoinKind::Left | JoinKind::Right => left.into_iter().zip(right).map(|(l, r)| f(l, r)).collect(),
    }
}

/// Two sources joined into one. See [`join_sources`].
pub struct JoinSource<L, R, F, T, V> {
    left: L,
    right: R,
    f: F,
    _t: PhantomData<fn() -> (T, V)>,
}

impl<T, V, K, L, R, F> Source<K> for JoinSource<L, R, F, T, V>
where
    T: Clone,
    V: Clone,
    L: Source<T>,
    R: Source<V>,
    F: Fn(T, V) -> K + Send + Sync,
{
    fn collect(&self, state: &PipelineState) -> Result<Batch<K>> {
        let left = self.left.collect(state).context("join: left source failed")?;
        let right = self.right.collect(state).context("join: right source failed")?;
        Ok(join_batches(left, right, &self.f))
    }
}

/// Collect `left`, then `right`, and join them with `f`.
///
/// Fails only if either source fails.
pub fn join_sources<T, V, K, L, R, F>(left: L, right: R, f: F) -> JoinSource<L, R, F, T, V>
where
    L: Source<T>,
    R: Source<V>,
    F: Fn(T, V) -> K + Send + Sync,
{
    JoinSource {
        left,
        right,
        f,
        _t: PhantomData,
    }
}

/// The incoming batch joined with a side source. See [`join_with`].
pub struct JoinStage<R, F, V> {
    right: R,
    f: F,
    _v: PhantomData<fn() -> V>,
}

impl<T, V, K, R, F> Stage<T, K> for JoinStage<R, F, V>
where
    T: Clone,
    V: Clone,
    R: Source<V>,
    F: Fn(T, V) -> K + Send + Sync,
{
    fn apply(&self, state: &PipelineState, input: Batch<T>) -> Result<Batch<K>> {
        let right = self.right.collect(state).context("join: right source failed")?;
        Ok(join_batches(input, right, &self.f))
    }
}

/// Stage that treats its input as the left side and collects `right` for the
/// right side each time it is applied.
pub fn join_with<T, V, K, R, F>(right: R, f: F) -> JoinStage<R, F, V>
where
    R: Source<V>,
    F: Fn(T, V) -> K + Send + Sync,
{
    JoinStage {
        right,
        f,
        _v: PhantomData,
    }
}
