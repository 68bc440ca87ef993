use ndarray::{ArrayView1, ArrayView2};
use rand::{Rng, SeedableRng, rngs::StdRng};

use super::NetworkLayout;
use crate::{
    MlErr, Result,
    initialization::{ParamGen, RandParamGen},
};

/// Bound of the uniform distribution fresh networks are sampled from.
pub const INIT_RANGE: f32 = 0.25;

/// The parameters of a fully connected sigmoid network.
///
/// Every weight and bias lives in a single contiguous buffer described by a `NetworkLayout`. The
/// layout never changes once the network is built, only the values in the buffer do.
#[derive(Clone, Debug, PartialEq)]
pub struct NetworkState {
    layout: NetworkLayout,
    params: Vec<f32>,
}

impl NetworkState {
    /// Creates a new `NetworkState` with every parameter sampled uniformly in
    /// `[-INIT_RANGE, INIT_RANGE]` from an OS seeded generator.
    ///
    /// # Arguments
    /// * `sizes` - The amount of neurons in each layer, input first and output last.
    ///
    /// # Returns
    /// A new `NetworkState` or an error if `sizes` is invalid.
    pub fn new(sizes: &[usize]) -> Result<Self> {
        Self::with_rng(sizes, rand::rng())
    }

    /// Same as `NetworkState::new` but reproducible.
    ///
    /// # Arguments
    /// * `sizes` - The amount of neurons in each layer, input first and output last.
    /// * `seed` - The seed of the random number generator.
    pub fn seeded(sizes: &[usize], seed: u64) -> Result<Self> {
        Self::with_rng(sizes, StdRng::seed_from_u64(seed))
    }

    fn with_rng<R: Rng>(sizes: &[usize], rng: R) -> Result<Self> {
        let layout = NetworkLayout::new(sizes)?;
        let param_gen = RandParamGen::uniform(rng, layout.size(), -INIT_RANGE, INIT_RANGE)?;
        Self::from_param_gen(layout, param_gen)
    }

    /// Creates a new `NetworkState` filling the parameter buffer in order from a generator.
    ///
    /// # Arguments
    /// * `layout` - The shape of the network.
    /// * `param_gen` - The parameter generator, must yield at least `layout.size()` values.
    ///
    /// # Returns
    /// A new `NetworkState` or a `ShapeMismatch` if the generator got exhausted too early.
    pub fn from_param_gen<G: ParamGen>(layout: NetworkLayout, mut param_gen: G) -> Result<Self> {
        let size = layout.size();
        let mut params = Vec::with_capacity(size);

        while params.len() < size {
            let Some(chunk) = param_gen.sample(size - params.len()) else {
                break;
            };

            params.extend(chunk);
        }

        layout.check_size("generated parameters", params.len())?;
        Ok(Self { layout, params })
    }

    /// Creates a new `NetworkState` from already known weights and biases.
    ///
    /// # Arguments
    /// * `sizes` - The amount of neurons in each layer, input first and output last.
    /// * `weights` - Every weight in export order.
    /// * `biases` - Every bias in export order.
    pub fn from_parts(sizes: &[usize], weights: &[f32], biases: &[f32]) -> Result<Self> {
        let layout = NetworkLayout::new(sizes)?;
        let mut state = Self {
            params: vec![0.; layout.size()],
            layout,
        };

        state.set(weights, biases)?;
        Ok(state)
    }

    /// Overwrites every parameter of the network.
    ///
    /// # Arguments
    /// * `weights` - Layer-major, neuron-major, source-neuron-minor weights.
    /// * `biases` - Layer-major, neuron-major biases.
    ///
    /// # Returns
    /// A `ShapeMismatch` error if any of the lengths differ from the network's, in which case
    /// nothing is written.
    pub fn set(&mut self, weights: &[f32], biases: &[f32]) -> Result<()> {
        let n_weights = self.layout.n_weights();
        let n_biases = self.layout.n_biases();

        if weights.len() != n_weights {
            return Err(MlErr::ShapeMismatch {
                what: "weights",
                got: weights.len(),
                expected: n_weights,
            });
        }

        if biases.len() != n_biases {
            return Err(MlErr::ShapeMismatch {
                what: "biases",
                got: biases.len(),
                expected: n_biases,
            });
        }

        let (w, b) = self.split_mut();
        w.copy_from_slice(weights);
        b.copy_from_slice(biases);
        Ok(())
    }

    /// Flattens the network's parameters, inverse of `NetworkState::set`.
    ///
    /// # Returns
    /// The weights and biases of the network.
    pub fn export(&self) -> (Vec<f32>, Vec<f32>) {
        (self.weights().to_vec(), self.biases().to_vec())
    }

    pub fn layout(&self) -> &NetworkLayout {
        &self.layout
    }

    pub fn sizes(&self) -> &[usize] {
        self.layout.sizes()
    }

    pub fn weights(&self) -> &[f32] {
        &self.params[..self.layout.n_weights()]
    }

    pub fn biases(&self) -> &[f32] {
        &self.params[self.layout.n_weights()..]
    }

    /// The whole flat parameter buffer, weights first.
    pub fn params(&self) -> &[f32] {
        &self.params
    }

    /// Views the weight matrix and bias vector of the `i`-th layer.
    pub fn layer(&self, i: usize) -> (ArrayView2<'_, f32>, ArrayView1<'_, f32>) {
        self.layout.view(i, &self.params)
    }

    /// Splits the parameter buffer into its weights and biases.
    pub(crate) fn split_mut(&mut self) -> (&mut [f32], &mut [f32]) {
        self.params.split_at_mut(self.layout.n_weights())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::initialization::ConstParamGen;

    const SIZES: [usize; 3] = [3, 2, 2];

    #[test]
    fn fresh_parameters_are_small() {
        let state = NetworkState::new(&SIZES).unwrap();

        assert_eq!(state.params().len(), 3 * 2 + 2 * 2 + 2 + 2);
        assert!(
            state
                .params()
                .iter()
                .all(|p| (-INIT_RANGE..=INIT_RANGE).contains(p))
        );
    }

    #[test]
    fn seeded_is_reproducible() {
        let a = NetworkState::seeded(&SIZES, 3).unwrap();
        let b = NetworkState::seeded(&SIZES, 3).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn set_then_export() {
        let mut state = NetworkState::seeded(&SIZES, 3).unwrap();
        let weights: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let biases = vec![-1., -2., -3., -4.];

        state.set(&weights, &biases).unwrap();
        assert_eq!(state.export(), (weights, biases));

        // Second layer, neuron 1, source neuron 0.
        let (w, b) = state.layer(1);
        assert_eq!(w[[1, 0]], 8.);
        assert_eq!(b[1], -4.);
    }

    #[test]
    fn set_with_wrong_lengths_fails() {
        let mut state = NetworkState::seeded(&SIZES, 3).unwrap();
        let before = state.clone();

        let err = state.set(&[0.; 9], &[0.; 4]).unwrap_err();
        assert!(matches!(
            err,
            MlErr::ShapeMismatch {
                what: "weights",
                got: 9,
                expected: 10
            }
        ));

        assert!(state.set(&[0.; 10], &[0.; 5]).is_err());
        assert_eq!(state, before);
    }

    #[test]
    fn exhausted_param_gen_fails() {
        let layout = NetworkLayout::new(&SIZES).unwrap();
        let param_gen = ConstParamGen::new(0.1, 3);

        assert!(NetworkState::from_param_gen(layout, param_gen).is_err());
    }
}
