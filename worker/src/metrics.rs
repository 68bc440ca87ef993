use machine_learning::evaluation::BestScore;

/// What happened during a single epoch, as seen by one rank.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochMetrics {
    pub epoch: usize,
    /// Samples seen by every rank together.
    pub samples: usize,
    /// Mean loss over every rank's samples.
    pub mean_loss: f32,
    pub distorted: bool,
    /// Correctly classified held-out samples, only on the evaluating rank.
    pub correct: Option<usize>,
}

/// The outcome of a whole training run.
#[derive(Debug, Default, Clone)]
pub struct TrainingReport {
    pub epochs: Vec<EpochMetrics>,
    pub best: Option<BestScore>,
}

impl TrainingReport {
    #[inline]
    pub fn push(&mut self, metrics: EpochMetrics) {
        self.epochs.push(metrics);
    }

    /// The metrics of the last trained epoch.
    #[inline]
    pub fn last(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }
}
