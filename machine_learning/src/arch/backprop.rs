use ndarray::ArrayView1;

use super::{
    ActivationCache, NetworkState, forward,
    loss::{CrossEntropy, LossFn},
};
use crate::{MlErr, Result};

/// Accumulates the gradient of the cross entropy between output and label for a single sample.
///
/// The gradient is added on top of whatever `grad` already holds, it is never overwritten. `grad`
/// follows the same layout as the network's parameter buffer.
///
/// # Arguments
/// * `state` - The parameters that produced `cache`.
/// * `sample` - The input given to `forward`.
/// * `label` - The expected output of the network.
/// * `cache` - The activations returned by `forward` for this `state` and `sample`.
/// * `grad` - The gradient accumulator.
///
/// # Returns
/// A `ShapeMismatch` if `sample`, `label` or `grad` don't match the network's shape.
///
/// # Panics
/// If `cache` was not produced by a network with this layout.
pub fn backward(
    state: &NetworkState,
    sample: &[f32],
    label: &[f32],
    cache: &ActivationCache,
    grad: &mut [f32],
) -> Result<()> {
    let layout = state.layout();
    check_len("sample", sample.len(), layout.input_size())?;
    check_len("label", label.len(), layout.output_size())?;
    layout.check_size("gradient", grad.len())?;

    let layers = layout.layers();
    assert_eq!(
        cache.len(),
        layers.len(),
        "the activation cache doesn't belong to this network"
    );

    let params = state.params();
    let mut delta = CrossEntropy.loss_prime(cache.output(), ArrayView1::from(label));

    for (i, layer) in layers.iter().enumerate().rev() {
        let x = match i {
            0 => ArrayView1::from(sample),
            _ => cache.layer(i - 1),
        };

        layer.accumulate_grad(grad, delta.view(), x);

        if i > 0 {
            delta = layer.backward(params, delta.view(), x);
        }
    }

    Ok(())
}

/// Runs `forward` and `backward` for a single sample.
///
/// # Arguments
/// * `state` - The network's parameters.
/// * `sample` - The network's input.
/// * `label` - The expected output of the network.
/// * `grad` - The gradient accumulator.
///
/// # Returns
/// The cross entropy loss of the sample.
pub fn sample_gradient(
    state: &NetworkState,
    sample: &[f32],
    label: &[f32],
    grad: &mut [f32],
) -> Result<f32> {
    let (output, cache) = forward(state, sample)?;
    backward(state, sample, label, &cache, grad)?;
    Ok(CrossEntropy.loss(output.view(), ArrayView1::from(label)))
}

fn check_len(what: &'static str, got: usize, expected: usize) -> Result<()> {
    if got != expected {
        return Err(MlErr::ShapeMismatch {
            what,
            got,
            expected,
        });
    }

    Ok(())
}
