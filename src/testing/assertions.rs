//! Assertion functions for batches produced by stages and pipelines.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Assert that two batches are equal in order and content.
///
/// # Panics
///
/// Panics if the batches differ in length or content.
///
/// # Example
///
/// ```
/// use ironflow::testing::assert_collections_equal;
///
/// assert_collections_equal(&[1, 2, 3], &[1, 2, 3]);
/// ```
pub fn assert_collections_equal<T: Debug + PartialEq>(actual: &[T], expected: &[T]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Batch length mismatch:\n  Expected length: {}\n  Actual length: {}\n  Expected: {expected:?}\n  Actual: {actual:?}",
        expected.len(),
        actual.len()
    );

    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert_eq!(
            a, e,
            "Batch mismatch at index {i}:\n  Expected: {e:?}\n  Actual: {a:?}\n  Full expected: {expected:?}\n  Full actual: {actual:?}"
        );
    }
}

/// Assert that two batches hold the same elements with the same multiplicities,
/// ignoring order. Useful after [`shuffle`](crate::stage::shuffle).
///
/// # Panics
///
/// Panics if any element occurs a different number of times in each batch.
///
/// # Example
///
/// ```
/// use ironflow::testing::assert_collections_unordered_equal;
///
/// assert_collections_unordered_equal(&[3, 1, 1, 2], &[1, 2, 3, 1]);
/// ```
pub fn assert_collections_unordered_equal<T: Debug + Eq + Hash>(actual: &[T], expected: &[T]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Batch length mismatch:\n  Expected length: {}\n  Actual length: {}\n  Expected: {expected:?}\n  Actual: {actual:?}",
        expected.len(),
        actual.len()
    );

    let mut counts: HashMap<&T, isize> = HashMap::new();
    for a in actual {
        *counts.entry(a).or_default() += 1;
    }
    for e in expected {
        *counts.entry(e).or_default() -= 1;
    }
    let extra: Vec<_> = counts.iter().filter(|(_, n)| **n > 0).map(|(v, _)| v).collect();
    let missing: Vec<_> = counts.iter().filter(|(_, n)| **n < 0).map(|(v, _)| v).collect();

    assert!(
        extra.is_empty() && missing.is_empty(),
        "Batch content mismatch:\n  Missing elements: {missing:?}\n  Extra elements: {extra:?}\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );
}

/// Assert that `sub` is an order-preserving subsequence of `full`, e.g. the output
/// of a filter.
///
/// # Panics
///
/// Panics if some element of `sub` cannot be matched, in order, against `full`.
///
/// # Example
///
/// ```
/// use ironflow::testing::assert_subsequence;
///
/// assert_subsequence(&[2, 4], &[1, 2, 3, 4]);
/// ```
pub fn assert_subsequence<T: Debug + PartialEq>(sub: &[T], full: &[T]) {
    let mut rest = full.iter();
    for (i, s) in sub.iter().enumerate() {
        assert!(
            rest.any(|f| f == s),
            "Element {i} ({s:?}) is not in order in the full batch:\n  Subsequence: {sub:?}\n  Full: {full:?}"
        );
    }
}

/// Assert that every element satisfies a predicate.
///
/// # Panics
///
/// Panics at the first element that does not satisfy the predicate.
pub fn assert_all<T: Debug>(batch: &[T], predicate: impl Fn(&T) -> bool) {
    for (i, item) in batch.iter().enumerate() {
        assert!(
            predicate(item),
            "Predicate failed for element at index {i}:\n  Element: {item:?}\n  Batch: {batch:?}"
        );
    }
}
