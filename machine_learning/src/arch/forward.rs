use ndarray::{Array1, ArrayView1};

use super::NetworkState;
use crate::{MlErr, Result};

/// The activations of every layer of the network after the sigmoid, as computed by `forward`.
///
/// It is only meaningful together with the sample and the exact parameters that produced it.
#[derive(Clone, Debug)]
pub struct ActivationCache {
    activations: Vec<Array1<f32>>,
}

impl ActivationCache {
    /// The amount of cached layers.
    pub fn len(&self) -> usize {
        self.activations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activations.is_empty()
    }

    /// The activation of the `i`-th weighted layer.
    pub fn layer(&self, i: usize) -> ArrayView1<'_, f32> {
        self.activations[i].view()
    }

    /// The activation of the last layer.
    pub fn output(&self) -> ArrayView1<'_, f32> {
        // SAFETY: A cache is only built by `forward`, which always pushes one entry per layer
        //         and a layout has at least one layer.
        self.activations.last().unwrap().view()
    }
}

/// Propagates a sample through the network.
///
/// # Arguments
/// * `state` - The network's parameters.
/// * `sample` - An input of the same width as the network's first layer.
///
/// # Returns
/// The output of the network together with the activation cache needed by `backward`, or a
/// `ShapeMismatch` if the sample has the wrong width.
pub fn forward(state: &NetworkState, sample: &[f32]) -> Result<(Array1<f32>, ActivationCache)> {
    let layout = state.layout();
    check_sample(layout.input_size(), sample.len())?;

    let params = state.params();
    let mut activations: Vec<Array1<f32>> = Vec::with_capacity(layout.n_layers());

    for layer in layout.layers() {
        let x = match activations.last() {
            Some(a) => a.view(),
            None => ArrayView1::from(sample),
        };

        let a = layer.forward(params, x);
        activations.push(a);
    }

    let cache = ActivationCache { activations };
    Ok((cache.output().to_owned(), cache))
}

/// Propagates a sample through the network without keeping the intermediate activations.
///
/// # Arguments
/// * `state` - The network's parameters.
/// * `sample` - An input of the same width as the network's first layer.
///
/// # Returns
/// The output of the network.
pub fn predict(state: &NetworkState, sample: &[f32]) -> Result<Array1<f32>> {
    let layout = state.layout();
    check_sample(layout.input_size(), sample.len())?;

    let params = state.params();
    let mut layers = layout.layers().iter();

    // SAFETY: A layout always has at least one layer.
    let mut a = layers.next().unwrap().forward(params, ArrayView1::from(sample));

    for layer in layers {
        a = layer.forward(params, a.view());
    }

    Ok(a)
}

fn check_sample(expected: usize, got: usize) -> Result<()> {
    if got != expected {
        return Err(MlErr::ShapeMismatch {
            what: "sample",
            got,
            expected,
        });
    }

    Ok(())
}
