use std::num::NonZeroUsize;

use log::{debug, info};
use machine_learning::{
    NetworkState,
    augmentation::{AugmentationSchedule, AugmentedShard, Distorter, ImageDistorter},
    checkpoint::CheckpointStore,
    dataset::Dataset,
    evaluation::{self, BestScore},
    optimization::{GradientDescent, Optimizer},
    training::GradientAccumulator,
};
use rand::{SeedableRng, rngs::StdRng};
use tokio::task;

use crate::{
    Result, WorkerErr,
    collective::AllReduce,
    config::TrainingConfig,
    data::{ShardSpec, read_dataset, read_shard},
    metrics::{EpochMetrics, TrainingReport},
};

/// The training loop of a single rank.
///
/// Every rank holds a private copy of the network and trains on its own shard. Each batch ends in
/// a sum reduction of the gradients, after which every rank applies the very same update, so the
/// copies never drift apart.
pub struct Trainer {
    rank: usize,
    config: TrainingConfig,
    state: NetworkState,
    shard: AugmentedShard,
    test: Option<Dataset>,
    optimizer: GradientDescent,
    acc: GradientAccumulator,
    schedule: AugmentationSchedule,
    distorter: Option<Box<dyn Distorter + Send>>,
    checkpoints: CheckpointStore,
    best: BestScore,
}

impl Trainer {
    /// Builds the trainer of a rank, reading its shard and its initial network from disk.
    ///
    /// # Arguments
    /// * `config` - The job's configuration.
    /// * `rank` - The rank this trainer belongs to.
    /// * `world_size` - The amount of ranks of the job.
    ///
    /// # Returns
    /// A new `Trainer` or an error if the rank or the configuration are invalid, or the files can't
    /// be read.
    pub fn from_config(config: TrainingConfig, rank: usize, world_size: NonZeroUsize) -> Result<Self> {
        if rank >= world_size.get() {
            return Err(WorkerErr::InvalidConfig(format!(
                "rank {rank} is out of a world of {world_size}"
            )));
        }

        config.validate(world_size)?;

        let (x_size, y_size) = (config.input_size(), config.output_size());
        let spec = ShardSpec::new(rank, world_size);
        let shard = read_shard(&config.train, x_size, y_size, spec)?;
        info!(rank = rank; "loaded {} training samples", shard.len());

        let test = match &config.test {
            Some(files) if rank == config.eval_rank => {
                let test = read_dataset(files, x_size, y_size)?;
                info!(rank = rank; "loaded {} evaluation samples", test.len());
                Some(test)
            }
            _ => None,
        };

        let state = if config.resume {
            let store = CheckpointStore::new(&config.checkpoint_dir);
            info!(rank = rank; "resuming from {}", store.dir().display());
            store.load(&config.layer_sizes)?
        } else {
            match config.seed {
                Some(seed) => NetworkState::seeded(&config.layer_sizes, seed)?,
                None => NetworkState::new(&config.layer_sizes)?,
            }
        };

        Self::new(rank, config, state, shard, test)
    }

    /// Builds the trainer of a rank from data already in memory.
    ///
    /// # Arguments
    /// * `rank` - The rank this trainer belongs to.
    /// * `config` - The job's configuration, its files are not read.
    /// * `state` - The initial network, rank 0's one is broadcast when training starts.
    /// * `shard` - This rank's training data.
    /// * `test` - The held-out data, only used by the evaluating rank.
    ///
    /// # Returns
    /// A new `Trainer` or an `InvalidConfig` if the network or the data don't match the config.
    pub fn new(
        rank: usize,
        config: TrainingConfig,
        state: NetworkState,
        shard: Dataset,
        test: Option<Dataset>,
    ) -> Result<Self> {
        if state.sizes() != config.layer_sizes.as_slice() {
            return Err(WorkerErr::InvalidConfig(format!(
                "the network has layers {:?} but {:?} were configured",
                state.sizes(),
                config.layer_sizes
            )));
        }

        for data in std::iter::once(&shard).chain(&test) {
            if data.x_size() != config.input_size() || data.y_size() != config.output_size() {
                return Err(WorkerErr::InvalidConfig(format!(
                    "records of {}x{} don't fit a network of {}x{}",
                    data.x_size(),
                    data.y_size(),
                    config.input_size(),
                    config.output_size()
                )));
            }
        }

        let schedule = AugmentationSchedule::new(config.augmentation_frequency);
        let distorter = match (schedule.frequency(), config.image_side) {
            (Some(_), Some(side)) => Some(image_distorter(side, config.seed, rank)),
            _ => None,
        };

        Ok(Self {
            rank,
            optimizer: GradientDescent::new(config.learning_rate, config.weight_decay),
            acc: GradientAccumulator::new(state.layout()),
            checkpoints: CheckpointStore::new(&config.checkpoint_dir),
            shard: AugmentedShard::new(shard),
            best: BestScore::new(),
            schedule,
            distorter,
            config,
            state,
            test,
        })
    }

    /// Replaces the distorter used on augmentation epochs.
    pub fn with_distorter(mut self, distorter: Box<dyn Distorter + Send>) -> Self {
        self.distorter = Some(distorter);
        self
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn state(&self) -> &NetworkState {
        &self.state
    }

    pub fn into_state(self) -> NetworkState {
        self.state
    }

    /// Whether this rank evaluates and checkpoints.
    pub fn is_evaluator(&self) -> bool {
        self.rank == self.config.eval_rank
    }

    /// Trains for the configured amount of epochs.
    ///
    /// Every rank of the job must run this with a shard of the same size, or the reductions won't
    /// line up. Compute runs through `block_in_place`, so a multi-threaded runtime is needed.
    ///
    /// # Arguments
    /// * `collective` - This rank's handle of the job's sum reduction.
    ///
    /// # Returns
    /// The metrics of every epoch, or the first error any step hit.
    pub async fn run<C: AllReduce>(&mut self, collective: &mut C) -> Result<TrainingReport> {
        self.broadcast_state(collective).await?;

        let mut report = TrainingReport::default();

        for epoch in 0..self.config.epochs {
            let distorted = self.augment(epoch);
            let (samples, loss) = self.train_epoch(collective, epoch).await?;
            let mean_loss = loss / samples.max(1) as f32;
            info!(rank = self.rank, epoch = epoch; "mean loss {mean_loss:.6} over {samples} samples");

            let correct = self.evaluate(epoch)?;
            self.checkpoint(epoch)?;

            report.push(EpochMetrics {
                epoch,
                samples,
                mean_loss,
                distorted,
                correct,
            });
        }

        if self.is_evaluator() && self.test.is_some() {
            report.best = Some(self.best);
        }

        Ok(report)
    }

    /// Makes every rank start from rank 0's parameters, only rank 0 contributes to the sum.
    async fn broadcast_state<C: AllReduce>(&mut self, collective: &mut C) -> Result<()> {
        let mut params = match collective.rank() {
            0 => self.state.params().to_vec(),
            _ => vec![0.; self.state.layout().size()],
        };

        collective.reduce_sum(&mut params).await?;

        let (weights, biases) = params.split_at(self.state.layout().n_weights());
        self.state.set(weights, biases)?;
        Ok(())
    }

    fn augment(&mut self, epoch: usize) -> bool {
        if !self.schedule.should_distort(epoch) {
            return self.shard.is_distorted();
        }

        let Some(distorter) = self.distorter.as_mut() else {
            return self.shard.is_distorted();
        };

        let shard = &mut self.shard;
        task::block_in_place(|| shard.distort(&mut **distorter));
        info!(rank = self.rank, epoch = epoch; "distorted the training shard");
        true
    }

    /// Runs every batch of the shard, returning the global amount of samples and summed loss.
    async fn train_epoch<C: AllReduce>(
        &mut self,
        collective: &mut C,
        epoch: usize,
    ) -> Result<(usize, f32)> {
        let Self {
            rank,
            config,
            state,
            shard,
            optimizer,
            acc,
            ..
        } = self;

        let mut samples = 0;
        let mut loss = 0.;

        for (i, batch) in shard.dataset().batches(config.batch_size).enumerate() {
            task::block_in_place(|| {
                acc.zero();
                acc.accumulate_batch(state, batch)
            })?;

            collective.reduce_sum(acc.reducible_mut()).await?;

            let n = acc.samples();
            if let Some(n) = NonZeroUsize::new(n) {
                task::block_in_place(|| optimizer.update_params(state, acc.as_slice(), n))?;
            }

            debug!(rank = *rank, epoch = epoch, batch = i; "applied the gradient of {n} samples");
            samples += n;
            loss += acc.loss();
        }

        Ok((samples, loss))
    }

    fn evaluate(&mut self, epoch: usize) -> Result<Option<usize>> {
        if !self.is_evaluator() {
            return Ok(None);
        }

        let Some(test) = &self.test else {
            return Ok(None);
        };

        let freq = self.config.eval_frequency.map_or(1, NonZeroUsize::get);
        if epoch % freq != 0 {
            return Ok(None);
        }

        let correct = task::block_in_place(|| evaluation::evaluate(&self.state, test))?;

        if self.best.record(correct, epoch) {
            info!(rank = self.rank, epoch = epoch; "new best: {correct}/{} correct", test.len());
        } else {
            info!(
                rank = self.rank, epoch = epoch;
                "{correct}/{} correct, best {} at epoch {}",
                test.len(),
                self.best.correct(),
                self.best.epoch()
            );
        }

        Ok(Some(correct))
    }

    fn checkpoint(&self, epoch: usize) -> Result<()> {
        let Some(freq) = self.config.checkpoint_frequency else {
            return Ok(());
        };

        let last = epoch + 1 == self.config.epochs;
        let due = epoch > 0 && epoch % freq.get() == 0;

        if !self.is_evaluator() || !(due || last) {
            return Ok(());
        }

        self.checkpoints.save(&self.state)?;
        info!(rank = self.rank, epoch = epoch; "checkpoint saved at {}", self.checkpoints.dir().display());
        Ok(())
    }
}

fn image_distorter(side: usize, seed: Option<u64>, rank: usize) -> Box<dyn Distorter + Send> {
    let rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(rank as u64 + 1)),
        None => StdRng::from_os_rng(),
    };

    Box::new(ImageDistorter::new(side, rng))
}
