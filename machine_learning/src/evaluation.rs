use crate::{NetworkState, Result, arch::predict, dataset::Dataset};

/// Index of the greatest value, the first one wins on ties.
///
/// # Arguments
/// * `xs` - A non empty slice of values.
///
/// # Returns
/// The index of the first maximum, `0` for an empty slice.
pub fn argmax(xs: &[f32]) -> usize {
    let mut best = 0;

    for (i, &x) in xs.iter().enumerate().skip(1) {
        if x > xs[best] {
            best = i;
        }
    }

    best
}

/// Counts how many samples of `dataset` the network classifies correctly.
///
/// # Arguments
/// * `state` - The network to evaluate, it is only read.
/// * `dataset` - A labeled dataset with the network's input and output widths.
///
/// # Returns
/// The amount of correctly classified samples.
pub fn evaluate(state: &NetworkState, dataset: &Dataset) -> Result<usize> {
    let mut correct = 0;

    for i in 0..dataset.len() {
        let (x, _) = dataset.sample(i);
        let output = predict(state, x)?;

        // SAFETY: `predict` returns a contiguous owned array.
        let output = output.as_slice().unwrap();

        if argmax(output) == dataset.class(i) {
            correct += 1;
        }
    }

    Ok(correct)
}

/// Tracks the best evaluation seen during training.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BestScore {
    correct: usize,
    epoch: usize,
}

impl BestScore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new evaluation, later epochs win ties.
    ///
    /// # Arguments
    /// * `correct` - The amount of correctly classified samples.
    /// * `epoch` - The epoch the evaluation was made at.
    ///
    /// # Returns
    /// Whether this evaluation is the new best.
    pub fn record(&mut self, correct: usize, epoch: usize) -> bool {
        if correct >= self.correct {
            self.correct = correct;
            self.epoch = epoch;
            return true;
        }

        false
    }

    pub fn correct(&self) -> usize {
        self.correct
    }

    pub fn epoch(&self) -> usize {
        self.epoch
    }
}
