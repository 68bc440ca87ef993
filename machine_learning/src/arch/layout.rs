use ndarray::{ArrayView1, ArrayView2};

use super::layers::Dense;
use crate::{MlErr, Result};

/// The shape of a fully connected network and the offset table into its flat parameter buffer.
///
/// The buffer holds every weight first and every bias after them:
/// `[W_0 | W_1 | ... | W_{L-2} | b_0 | b_1 | ... | b_{L-2}]`, where `W_i` is stored neuron-major
/// (one row per neuron of layer `i + 1`, one column per neuron of layer `i`).
#[derive(Clone, Debug, PartialEq)]
pub struct NetworkLayout {
    sizes: Vec<usize>,
    layers: Vec<Dense>,
    n_weights: usize,
    n_biases: usize,
}

impl NetworkLayout {
    /// Creates a new `NetworkLayout`.
    ///
    /// # Arguments
    /// * `sizes` - The amount of neurons in each layer, input first and output last.
    ///
    /// # Returns
    /// A new `NetworkLayout` or an error if there are less than two layers or any of them is empty.
    pub fn new(sizes: &[usize]) -> Result<Self> {
        if sizes.len() < 2 {
            return Err(MlErr::InvalidLayerSizes(format!(
                "expected at least 2 layers, got {}",
                sizes.len()
            )));
        }

        if let Some(i) = sizes.iter().position(|&size| size == 0) {
            return Err(MlErr::InvalidLayerSizes(format!("layer {i} has no neurons")));
        }

        let n_weights: usize = sizes.windows(2).map(|w| w[0] * w[1]).sum();
        let n_biases: usize = sizes[1..].iter().sum();

        let mut w_offset = 0;
        let mut b_offset = n_weights;

        let layers = sizes
            .windows(2)
            .map(|w| {
                let (inputs, outputs) = (w[0], w[1]);
                let layer = Dense::new((outputs, inputs), w_offset, b_offset);
                w_offset += inputs * outputs;
                b_offset += outputs;
                layer
            })
            .collect();

        Ok(Self {
            sizes: sizes.to_vec(),
            layers,
            n_weights,
            n_biases,
        })
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn layers(&self) -> &[Dense] {
        &self.layers
    }

    /// The amount of weighted layers, one less than the amount of layer sizes.
    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn input_size(&self) -> usize {
        self.sizes[0]
    }

    pub fn output_size(&self) -> usize {
        self.sizes[self.sizes.len() - 1]
    }

    pub fn n_weights(&self) -> usize {
        self.n_weights
    }

    pub fn n_biases(&self) -> usize {
        self.n_biases
    }

    /// The total amount of parameters of the network.
    pub fn size(&self) -> usize {
        self.n_weights + self.n_biases
    }

    /// Views the weights and biases of the `i`-th layer inside `params`.
    ///
    /// # Panics
    /// If `i` is not a valid layer index or `params` is shorter than `self.size()`.
    pub fn view<'a>(&self, i: usize, params: &'a [f32]) -> (ArrayView2<'a, f32>, ArrayView1<'a, f32>) {
        self.layers[i].view_params(params)
    }

    /// Checks that a buffer has exactly the size of this layout.
    ///
    /// # Arguments
    /// * `what` - The name of the buffer, for the error message.
    /// * `len` - The buffer's length.
    pub(crate) fn check_size(&self, what: &'static str, len: usize) -> Result<()> {
        if len != self.size() {
            return Err(MlErr::ShapeMismatch {
                what,
                got: len,
                expected: self.size(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_degenerate_sizes() {
        assert!(matches!(
            NetworkLayout::new(&[3]),
            Err(MlErr::InvalidLayerSizes(_))
        ));
        assert!(matches!(
            NetworkLayout::new(&[3, 0, 2]),
            Err(MlErr::InvalidLayerSizes(_))
        ));
    }

    #[test]
    fn offsets_are_layer_major() {
        let layout = NetworkLayout::new(&[3, 4, 2]).unwrap();

        assert_eq!(layout.n_layers(), 2);
        assert_eq!(layout.n_weights(), 3 * 4 + 4 * 2);
        assert_eq!(layout.n_biases(), 4 + 2);
        assert_eq!(layout.size(), 26);

        let [first, second] = layout.layers() else {
            panic!("expected two layers");
        };

        assert_eq!(first.dim(), (4, 3));
        assert_eq!(first.weights_range(), 0..12);
        assert_eq!(first.biases_range(), 20..24);

        assert_eq!(second.dim(), (2, 4));
        assert_eq!(second.weights_range(), 12..20);
        assert_eq!(second.biases_range(), 24..26);
    }

    #[test]
    fn view_reads_rows_per_neuron() {
        let layout = NetworkLayout::new(&[2, 1]).unwrap();
        let params = [0.25, 0.75, -1.];

        let (w, b) = layout.view(0, &params);
        assert_eq!(w.shape(), &[1, 2]);
        assert_eq!(w[[0, 1]], 0.75);
        assert_eq!(b[0], -1.);
    }
}
