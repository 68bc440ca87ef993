use super::Distorter;
use crate::dataset::Dataset;

/// A training shard that can be distorted and brought back to its pristine state.
///
/// The labels are never touched, only the samples. The shard is never distorted twice in a row,
/// a second `distort` restores the pristine samples first.
#[derive(Clone, Debug)]
pub struct AugmentedShard {
    pristine: Vec<f32>,
    working: Dataset,
    distorted: bool,
}

impl AugmentedShard {
    /// Creates a new `AugmentedShard`, keeping a copy of the given samples.
    pub fn new(dataset: Dataset) -> Self {
        Self {
            pristine: dataset.xs().to_vec(),
            working: dataset,
            distorted: false,
        }
    }

    /// The data training should currently use.
    pub fn dataset(&self) -> &Dataset {
        &self.working
    }

    pub fn is_distorted(&self) -> bool {
        self.distorted
    }

    /// Brings the samples back to their pristine values.
    pub fn restore(&mut self) {
        if self.distorted {
            self.working.xs_mut().copy_from_slice(&self.pristine);
            self.distorted = false;
        }
    }

    /// Distorts every sample of the shard, restoring it first if it already was distorted.
    ///
    /// # Arguments
    /// * `distorter` - The transformation to apply onto each sample.
    pub fn distort<D: Distorter + ?Sized>(&mut self, distorter: &mut D) {
        self.restore();

        let x_size = self.working.x_size();

        for sample in self.working.xs_mut().chunks_exact_mut(x_size) {
            distorter.distort(sample);
        }

        self.distorted = true;
    }
}
