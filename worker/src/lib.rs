pub mod collective;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod trainer;

pub use collective::{AllReduce, LocalAllReduce, TcpAllReduce};
pub use config::{ClusterEnv, TrainingConfig};
pub use error::{Result, WorkerErr};
pub use metrics::{EpochMetrics, TrainingReport};
pub use trainer::Trainer;
