use std::{num::NonZeroUsize, ops::Range};

/// The contiguous slice of the training set a rank trains on.
///
/// Every rank gets `total / world_size` records, the remainder is dropped so that all the ranks run
/// the same amount of batches per epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardSpec {
    pub rank: usize,
    pub world_size: NonZeroUsize,
}

impl ShardSpec {
    /// # Panics
    /// If `rank` is not a member of the world.
    pub fn new(rank: usize, world_size: NonZeroUsize) -> Self {
        assert!(rank < world_size.get(), "rank out of range");
        Self { rank, world_size }
    }

    /// The amount of records every rank gets.
    #[inline]
    pub fn size(self, total: usize) -> usize {
        total / self.world_size.get()
    }

    /// The records of this rank.
    #[inline]
    pub fn range(self, total: usize) -> Range<usize> {
        let size = self.size(total);
        let start = self.rank * size;
        start..start + size
    }
}
