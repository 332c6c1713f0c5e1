//! Sequence partitioning helpers

use crate::error::{Error, Result};

/// Split `items` into contiguous batches of `size` elements.
///
/// Every batch has exactly `size` elements except possibly the last,
/// which holds the remainder. Batches borrow from the input.
pub fn batchify<T>(items: &[T], size: usize) -> Result<Vec<&[T]>> {
    if size == 0 {
        return Err(Error::invalid_input("batch size must be greater than 0"));
    }

    Ok(items.chunks(size).collect())
}

/// Number of batches `batchify` produces for `len` items
pub fn batch_count(len: usize, size: usize) -> usize {
    if size == 0 {
        0
    } else {
        len.div_ceil(size)
    }
}

/// Flatten a sequence of sequences by one level
pub fn flatten<I>(nested: I) -> Vec<<I::Item as IntoIterator>::Item>
where
    I: IntoIterator,
    I::Item: IntoIterator,
{
    nested.into_iter().flatten().collect()
}
