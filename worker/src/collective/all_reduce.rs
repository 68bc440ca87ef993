use crate::Result;

/// A sum reduction across every rank of a training job.
///
/// Calling `reduce_sum` is the only point where ranks wait for each other. Every rank must call it
/// the same amount of times with buffers of the same length, a rank that diverges leaves the
/// others blocked.
#[allow(unused)]
#[trait_variant::make(AllReduce: Send)]
pub trait AllReduceTemplate {
    /// The index of this rank, in `0..world_size`.
    fn rank(&self) -> usize;

    /// The amount of ranks taking part in the reduction.
    fn world_size(&self) -> usize;

    /// Should replace `buf` with the elementwise sum of the buffers of every rank.
    ///
    /// # Arguments
    /// * `buf` - This rank's contribution, overwritten with the global sum.
    ///
    /// # Returns
    /// A `Collective` error if the ranks disagree on the buffer's length, or an `Io` error if the
    /// transport fails.
    async fn reduce_sum(&mut self, buf: &mut [f32]) -> Result<()>;
}
