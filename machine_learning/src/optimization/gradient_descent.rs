use std::num::NonZeroUsize;

use rayon::prelude::*;

use super::Optimizer;
use crate::{NetworkState, Result};

/// Gradient descent over the batch averaged gradient, with optional weight decay.
///
/// Weights follow `θ ← θ·(1 − lr·λ/n) − lr·g/n` and biases `θ ← θ − lr·g/n`, where `n` is the
/// amount of samples the gradient was summed over. Without weight decay both rules coincide.
#[derive(Clone, Copy, Debug)]
pub struct GradientDescent {
    learning_rate: f32,
    weight_decay: Option<f32>,
}

impl GradientDescent {
    /// Returns a new `GradientDescent`.
    ///
    /// # Arguments
    /// * `learning_rate` - The *length* of the steps taken on `update_params`.
    /// * `weight_decay` - The decay factor applied to the weights, never to the biases.
    pub fn new(learning_rate: f32, weight_decay: Option<f32>) -> Self {
        Self {
            learning_rate,
            weight_decay,
        }
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    pub fn weight_decay(&self) -> Option<f32> {
        self.weight_decay
    }
}

impl Optimizer for GradientDescent {
    fn update_params(
        &mut self,
        state: &mut NetworkState,
        grad: &[f32],
        batch_size: NonZeroUsize,
    ) -> Result<()> {
        state.layout().check_size("gradient", grad.len())?;

        let n = batch_size.get() as f32;
        let step = self.learning_rate / n;
        let decay = 1. - step * self.weight_decay.unwrap_or_default();

        let (dw, db) = grad.split_at(state.layout().n_weights());
        let (weights, biases) = state.split_mut();

        weights
            .par_iter_mut()
            .zip(dw)
            .for_each(|(w, g)| *w = *w * decay - step * g);

        biases
            .par_iter_mut()
            .zip(db)
            .for_each(|(b, g)| *b -= step * g);

        Ok(())
    }
}
