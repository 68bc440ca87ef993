use ndarray::{Array1, ArrayView1};

use super::LossFn;

/// Keeps `ln` finite when an output saturates.
const MIN_PROB: f32 = 1e-7;

/// Binary cross entropy summed over the outputs, `−Σ[y ln a + (1 − y) ln(1 − a)]`.
///
/// Composed with the sigmoid, its derivative with respect to the pre-activation sums is the plain
/// difference `a − y`.
#[derive(Default, Clone, Copy)]
pub struct CrossEntropy;

impl CrossEntropy {
    /// Returns a new `CrossEntropy`.
    pub fn new() -> Self {
        Self
    }
}

impl LossFn for CrossEntropy {
    fn loss(&self, y_pred: ArrayView1<f32>, y: ArrayView1<f32>) -> f32 {
        -y_pred
            .iter()
            .zip(y)
            .map(|(&a, &t)| {
                let a = a.clamp(MIN_PROB, 1. - MIN_PROB);
                t * a.ln() + (1. - t) * (1. - a).ln()
            })
            .sum::<f32>()
    }

    fn loss_prime(&self, y_pred: ArrayView1<f32>, y: ArrayView1<f32>) -> Array1<f32> {
        &y_pred - &y
    }
}
