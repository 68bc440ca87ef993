use std::{
    env, fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    str::FromStr,
};

use machine_learning::NetworkLayout;
use serde::{Deserialize, Serialize};

use crate::{Result, WorkerErr};

const DEFAULT_ROOT_ADDR: &str = "127.0.0.1:7070";

/// The location of an IDX encoded labeled dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetFiles {
    pub images: PathBuf,
    pub labels: PathBuf,
    /// The amount of records to use from the files.
    pub samples: usize,
}

/// The hyperparameters and resources of a training job, identical for every rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub layer_sizes: Vec<usize>,
    pub epochs: usize,
    pub batch_size: NonZeroUsize,
    pub learning_rate: f32,
    #[serde(default)]
    pub weight_decay: Option<f32>,
    /// Evaluate every this many epochs, every epoch if absent.
    #[serde(default)]
    pub eval_frequency: Option<NonZeroUsize>,
    /// Save a checkpoint every this many epochs, never if absent.
    #[serde(default)]
    pub checkpoint_frequency: Option<NonZeroUsize>,
    /// Distort the training shard every this many epochs, never if absent.
    #[serde(default)]
    pub augmentation_frequency: Option<NonZeroUsize>,
    /// The side of the square images, needed by augmentation.
    #[serde(default)]
    pub image_side: Option<usize>,
    /// Whether to start from the checkpoint in `checkpoint_dir` instead of a fresh network.
    #[serde(default)]
    pub resume: bool,
    pub checkpoint_dir: PathBuf,
    pub train: DatasetFiles,
    #[serde(default)]
    pub test: Option<DatasetFiles>,
    #[serde(default)]
    pub seed: Option<u64>,
    /// The rank that evaluates and checkpoints.
    #[serde(default)]
    pub eval_rank: usize,
}

impl TrainingConfig {
    /// Reads a configuration from a json file.
    ///
    /// # Arguments
    /// * `path` - The configuration file.
    ///
    /// # Returns
    /// The parsed configuration, it is not validated yet.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Checks the configuration for a given world.
    ///
    /// # Arguments
    /// * `world_size` - The amount of ranks taking part in the job.
    ///
    /// # Returns
    /// An `InvalidConfig` error describing the first problem found.
    pub fn validate(&self, world_size: NonZeroUsize) -> Result<()> {
        let layout = NetworkLayout::new(&self.layer_sizes)?;

        if !self.learning_rate.is_finite() || self.learning_rate <= 0. {
            return invalid(format!("learning rate must be positive, got {}", self.learning_rate));
        }

        if let Some(decay) = self.weight_decay {
            if !decay.is_finite() || decay < 0. {
                return invalid(format!("weight decay can't be negative, got {decay}"));
            }
        }

        if self.eval_rank >= world_size.get() {
            return invalid(format!(
                "eval rank {} doesn't exist in a world of {world_size}",
                self.eval_rank
            ));
        }

        if self.train.samples < world_size.get() {
            return invalid(format!(
                "{} training samples can't be split among {world_size} ranks",
                self.train.samples
            ));
        }

        if self.augmentation_frequency.is_some() {
            let Some(side) = self.image_side else {
                return invalid("augmentation needs the image side".to_string());
            };

            if side * side != layout.input_size() {
                return invalid(format!(
                    "{side}x{side} images don't fit an input layer of {}",
                    layout.input_size()
                ));
            }
        }

        Ok(())
    }

    /// The width of the network's input layer.
    pub fn input_size(&self) -> usize {
        self.layer_sizes.first().copied().unwrap_or_default()
    }

    /// The amount of classes, the width of the network's output layer.
    pub fn output_size(&self) -> usize {
        self.layer_sizes.last().copied().unwrap_or_default()
    }
}

fn invalid<T>(reason: String) -> Result<T> {
    Err(WorkerErr::InvalidConfig(reason))
}

/// Where a process sits in the training job, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterEnv {
    pub rank: usize,
    pub world_size: NonZeroUsize,
    pub root_addr: String,
}

impl ClusterEnv {
    /// Reads `RANK`, `WORLD_SIZE` and `ROOT_ADDR`, the first two default to a single rank.
    pub fn from_env() -> Result<Self> {
        let rank = parse_var("RANK")?.unwrap_or(0);
        let world_size = parse_var("WORLD_SIZE")?.unwrap_or(NonZeroUsize::MIN);
        let root_addr = env::var("ROOT_ADDR").unwrap_or_else(|_| DEFAULT_ROOT_ADDR.to_string());

        if rank >= world_size.get() {
            return invalid(format!("rank {rank} is out of a world of {world_size}"));
        }

        Ok(Self {
            rank,
            world_size,
            root_addr,
        })
    }
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>> {
    let Ok(raw) = env::var(name) else {
        return Ok(None);
    };

    raw.parse()
        .map(Some)
        .map_err(|_| WorkerErr::InvalidConfig(format!("{name}={raw} is not valid")))
}
