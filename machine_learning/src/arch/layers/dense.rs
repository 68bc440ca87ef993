use std::ops::Range;

use ndarray::{Axis, linalg, prelude::*};

use crate::arch::activations::Sigmoid;

/// A fully connected layer with a sigmoid activation.
///
/// The layer holds no parameters, only where its weights and biases live inside the network's flat
/// parameter buffer. The weight matrix is stored row-major with one row per output neuron.
#[derive(Clone, Debug, PartialEq)]
pub struct Dense {
    dim: (usize, usize),
    weights: Range<usize>,
    biases: Range<usize>,
    act_fn: Sigmoid,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `dim` - The `(outputs, inputs)` dimensions of the weight matrix.
    /// * `weights_offset` - Where the weights start in the flat parameter buffer.
    /// * `biases_offset` - Where the biases start in the flat parameter buffer.
    ///
    /// # Returns
    /// A new `Dense` instance.
    pub(crate) fn new(dim: (usize, usize), weights_offset: usize, biases_offset: usize) -> Self {
        let (outputs, inputs) = dim;

        Self {
            dim,
            weights: weights_offset..weights_offset + outputs * inputs,
            biases: biases_offset..biases_offset + outputs,
            act_fn: Sigmoid::new(),
        }
    }

    /// The `(outputs, inputs)` dimensions of this layer.
    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    /// The range of this layer's weights in the flat parameter buffer.
    pub fn weights_range(&self) -> Range<usize> {
        self.weights.clone()
    }

    /// The range of this layer's biases in the flat parameter buffer.
    pub fn biases_range(&self) -> Range<usize> {
        self.biases.clone()
    }

    /// Computes `σ(W · x + b)`.
    ///
    /// # Arguments
    /// * `params` - The network's flat parameter buffer.
    /// * `x` - The previous layer's activation.
    ///
    /// # Returns
    /// This layer's activation.
    pub fn forward(&self, params: &[f32], x: ArrayView1<f32>) -> Array1<f32> {
        let (w, b) = self.view_params(params);

        let mut a = b.to_owned();
        linalg::general_mat_vec_mul(1.0, &w, &x, 1.0, &mut a);
        a.mapv_inplace(|z| self.act_fn.f(z));
        a
    }

    /// Adds this layer's contribution to the gradient, `δ` onto the biases and `δ ⊗ x` onto the
    /// weights.
    ///
    /// # Arguments
    /// * `grad` - The network's flat gradient buffer.
    /// * `delta` - This layer's error term.
    /// * `x` - The input this layer received on the forward pass.
    pub fn accumulate_grad(&self, grad: &mut [f32], delta: ArrayView1<f32>, x: ArrayView1<f32>) {
        let (mut dw, mut db) = self.view_grad(grad);

        let d = delta.insert_axis(Axis(1));
        let x = x.insert_axis(Axis(0));
        linalg::general_mat_mul(1.0, &d, &x, 1.0, &mut dw);
        db += &delta;
    }

    /// Propagates the error term to the previous layer, `(Wᵀ · δ) ⊙ σ'(a_prev)`.
    ///
    /// # Arguments
    /// * `params` - The network's flat parameter buffer.
    /// * `delta` - This layer's error term.
    /// * `a_prev` - The previous layer's activation.
    ///
    /// # Returns
    /// The previous layer's error term.
    pub fn backward(
        &self,
        params: &[f32],
        delta: ArrayView1<f32>,
        a_prev: ArrayView1<f32>,
    ) -> Array1<f32> {
        let (w, _) = self.view_params(params);

        let mut d = Array1::zeros(self.dim.1);
        linalg::general_mat_vec_mul(1.0, &w.t(), &delta, 0.0, &mut d);
        d.zip_mut_with(&a_prev, |d, &a| *d *= self.act_fn.df(a));
        d
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    ///
    /// # Arguments
    /// * `params` - The network's flat parameter buffer.
    ///
    /// # Returns
    /// A tuple containing the weights and biases.
    pub fn view_params<'a>(&self, params: &'a [f32]) -> (ArrayView2<'a, f32>, ArrayView1<'a, f32>) {
        // SAFETY: The ranges were built from `dim`, so the shapes always match.
        let w = ArrayView2::from_shape(self.dim, &params[self.weights.clone()]).unwrap();
        let b = ArrayView1::from_shape(self.dim.0, &params[self.biases.clone()]).unwrap();
        (w, b)
    }

    /// Gives a view of the raw gradient slice as the delta weights and delta biases of this layer.
    ///
    /// # Arguments
    /// * `grad` - The network's flat gradient buffer.
    ///
    /// # Returns
    /// A tuple containing the delta weights and delta biases.
    pub fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> (ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>) {
        // Weights always come before biases in the buffer.
        let (w_part, b_part) = grad.split_at_mut(self.biases.start);
        let dw_raw = &mut w_part[self.weights.clone()];
        let db_raw = &mut b_part[..self.dim.0];

        // SAFETY: Same as in `view_params`.
        let dw = ArrayViewMut2::from_shape(self.dim, dw_raw).unwrap();
        let db = ArrayViewMut1::from_shape(self.dim.0, db_raw).unwrap();
        (dw, db)
    }
}
