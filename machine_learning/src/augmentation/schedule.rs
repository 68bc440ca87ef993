use std::num::NonZeroUsize;

/// Decides on which epochs the training shard gets distorted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AugmentationSchedule {
    frequency: Option<NonZeroUsize>,
}

impl AugmentationSchedule {
    /// Creates a new `AugmentationSchedule`.
    ///
    /// # Arguments
    /// * `frequency` - Distort every `frequency` epochs, `None` disables augmentation.
    pub fn new(frequency: Option<NonZeroUsize>) -> Self {
        Self { frequency }
    }

    /// An schedule that never distorts.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn frequency(&self) -> Option<NonZeroUsize> {
        self.frequency
    }

    /// Whether the shard should be distorted right before training `epoch`.
    ///
    /// The first epoch always trains on the pristine data.
    pub fn should_distort(&self, epoch: usize) -> bool {
        match self.frequency {
            Some(freq) => epoch > 0 && epoch % freq.get() == 0,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_third_epoch() {
        let schedule = AugmentationSchedule::new(NonZeroUsize::new(3));
        let epochs: Vec<_> = (0..10).filter(|&e| schedule.should_distort(e)).collect();
        assert_eq!(epochs, vec![3, 6, 9]);
    }

    #[test]
    fn disabled_never_distorts() {
        let schedule = AugmentationSchedule::disabled();
        assert!((0..10).all(|e| !schedule.should_distort(e)));
    }
}
