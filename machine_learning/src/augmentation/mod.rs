mod distorter;
mod image;
mod schedule;
mod shard;

pub use distorter::Distorter;
pub use image::{Distortion, ImageDistorter};
pub use schedule::AugmentationSchedule;
pub use shard::AugmentedShard;
