use rayon::prelude::*;

use crate::{
    MlErr, NetworkLayout, NetworkState, Result, arch::sample_gradient, dataset::Batch,
};

/// Trailing slots reduced together with the gradient: the amount of samples and their summed loss.
const STATS: usize = 2;

/// A zeroed gradient buffer with the same layout as the network, plus per batch statistics.
///
/// The statistics live right after the gradient in the same buffer so that a single sum
/// reduction across workers yields both the global gradient and the effective batch size.
#[derive(Clone, Debug)]
pub struct GradientAccumulator {
    size: usize,
    buf: Vec<f32>,
}

impl GradientAccumulator {
    /// Creates a new `GradientAccumulator`.
    ///
    /// # Arguments
    /// * `layout` - The layout of the network whose gradient is going to be accumulated.
    ///
    /// # Returns
    /// A new zeroed `GradientAccumulator` instance.
    pub fn new(layout: &NetworkLayout) -> Self {
        Self {
            size: layout.size(),
            buf: vec![0.; layout.size() + STATS],
        }
    }

    /// Zeroes out the gradient and the statistics.
    pub fn zero(&mut self) {
        self.buf.par_iter_mut().for_each(|g| *g = 0.);
    }

    /// Adds an externally computed gradient elementwise.
    ///
    /// # Arguments
    /// * `grad` - A gradient with the same layout as the network.
    ///
    /// # Returns
    /// A `ShapeMismatch` if `grad` has a different size.
    pub fn accumulate(&mut self, grad: &[f32]) -> Result<()> {
        if grad.len() != self.size {
            return Err(MlErr::ShapeMismatch {
                what: "gradient",
                got: grad.len(),
                expected: self.size,
            });
        }

        self.buf[..self.size]
            .par_iter_mut()
            .zip(grad)
            .for_each(|(acc, g)| *acc += g);

        Ok(())
    }

    /// Runs forward and backward for a sample, adding its gradient onto the buffer.
    ///
    /// # Arguments
    /// * `state` - The network's parameters.
    /// * `sample` - The network's input.
    /// * `label` - The expected output.
    ///
    /// # Returns
    /// The loss of the sample.
    pub fn accumulate_sample(
        &mut self,
        state: &NetworkState,
        sample: &[f32],
        label: &[f32],
    ) -> Result<f32> {
        let loss = sample_gradient(state, sample, label, &mut self.buf[..self.size])?;
        self.buf[self.size] += 1.;
        self.buf[self.size + 1] += loss;
        Ok(loss)
    }

    /// Accumulates every sample of a batch.
    ///
    /// # Returns
    /// The summed loss of the batch.
    pub fn accumulate_batch(&mut self, state: &NetworkState, batch: Batch<'_>) -> Result<f32> {
        batch
            .iter()
            .map(|(x, y)| self.accumulate_sample(state, x, y))
            .sum()
    }

    /// The accumulated gradient.
    pub fn as_slice(&self) -> &[f32] {
        &self.buf[..self.size]
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.buf[..self.size]
    }

    /// The gradient followed by the statistics, this is what gets sum reduced across workers.
    pub fn reducible_mut(&mut self) -> &mut [f32] {
        &mut self.buf
    }

    /// The amount of samples accumulated since the last `zero`.
    pub fn samples(&self) -> usize {
        self.buf[self.size] as usize
    }

    /// The summed loss of the samples accumulated since the last `zero`.
    pub fn loss(&self) -> f32 {
        self.buf[self.size + 1]
    }
}
