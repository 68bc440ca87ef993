use ndarray::{Array1, ArrayView1};

/// A loss measured on the output of a sigmoid layer.
pub trait LossFn {
    fn loss(&self, y_pred: ArrayView1<f32>, y: ArrayView1<f32>) -> f32;

    /// The derivative of the loss with respect to the output layer's pre-activation sums, the
    /// error signal backpropagation starts from.
    fn loss_prime(&self, y_pred: ArrayView1<f32>, y: ArrayView1<f32>) -> Array1<f32>;
}
