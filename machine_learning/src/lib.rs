pub mod arch;
pub mod augmentation;
pub mod checkpoint;
pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod initialization;
pub mod optimization;
pub mod training;

pub use arch::{ActivationCache, NetworkLayout, NetworkState};
pub use error::{MlErr, Result};
