use std::num::NonZeroUsize;

use crate::{NetworkState, Result};

/// The rule that turns an accumulated gradient into a parameter update.
pub trait Optimizer {
    /// Should apply one update step onto the network.
    ///
    /// # Arguments
    /// * `state` - The network to update.
    /// * `grad` - The gradient summed over `batch_size` samples, with the network's layout.
    /// * `batch_size` - The amount of samples `grad` was accumulated over.
    ///
    /// # Returns
    /// A `ShapeMismatch` if `grad` doesn't match the network's size.
    fn update_params(
        &mut self,
        state: &mut NetworkState,
        grad: &[f32],
        batch_size: NonZeroUsize,
    ) -> Result<()>;
}
