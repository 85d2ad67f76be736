//! Batches: the unit of data moving between components.
//!
//! Stages run one after another, so a batch is simply an owned, ordered `Vec<T>`
//! handed from producer to consumer once it is complete. Consumers can drain it
//! fully without ever waiting on a producer.

/// One finite, ordered set of elements moving through a run.
pub type Batch<T> = Vec<T>;

/// Make `n` independent copies of `batch` for concurrent consumers.
///
/// The input batch is moved into the last slot, so only `n - 1` clones are made.
/// Returns an empty vector when `n == 0`.
#[must_use]
pub fn replicate<T: Clone>(batch: Batch<T>, n: usize) -> Vec<Batch<T>> {
    if n == 0 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(n);
    for _ in 1..n {
        out.push(batch.clone());
    }
    out.push(batch);
    out
}
