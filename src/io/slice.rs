//! A paging collector over an in-memory vector.

use crate::batch::Batch;
use crate::incremental::Collector;
use anyhow::{Context, Result, ensure};

/// Serves `data` in pages of `batch_size`, using the decimal index of the next
/// unread element as the cursor.
///
/// The empty cursor means "from the start". Once the data is exhausted every
/// call returns an empty batch and hands back the same cursor.
#[derive(Clone, Debug)]
pub struct SliceCollector<T> {
    data: Vec<T>,
    batch_size: usize,
}

impl<T: Clone + Send + Sync> SliceCollector<T> {
    /// # Panics
    ///
    /// Panics if `batch_size` is zero, since such a collector could never advance.
    #[must_use]
    pub fn new(data: Vec<T>, batch_size: usize) -> Self {
        assert!(batch_size > 0, "SliceCollector batch_size must be positive");
        Self { data, batch_size }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<T: Clone + Send + Sync> Collector<T> for SliceCollector<T> {
    fn collect(&self, cursor: &str) -> Result<(Batch<T>, String)> {
        let start: usize = if cursor.is_empty() {
            0
        } else {
            cursor
                .parse()
                .with_context(|| format!("cursor `{cursor}` is not an element index"))?
        };
        ensure!(
            start <= self.data.len(),
            "cursor {start} is past the end of the data ({} elements)",
            self.data.len()
        );
        let end = start.saturating_add(self.batch_size).min(self.data.len());
        Ok((self.data[start..end].to_vec(), end.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_through_the_data() -> Result<()> {
        let c = SliceCollector::new((0..5).collect::<Vec<u32>>(), 2);
        let (b, next) = c.collect("")?;
        assert_eq!((b, next.as_str()), (vec![0, 1], "2"));
        let (b, next) = c.collect(&next)?;
        assert_eq!((b, next.as_str()), (vec![2, 3], "4"));
        let (b, next) = c.collect(&next)?;
        assert_eq!((b, next.as_str()), (vec![4], "5"));
        let (b, next) = c.collect(&next)?;
        assert!(b.is_empty());
        assert_eq!(next, "5");
        Ok(())
    }

    #[test]
    fn rejects_bad_cursors() {
        let c = SliceCollector::new(vec![1, 2, 3], 2);
        assert!(c.collect("abc").is_err());
        assert!(c.collect("4").is_err());
    }
}
