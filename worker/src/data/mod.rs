pub mod idx;
pub mod shard;

pub use idx::{IMAGES_HEADER, LABELS_HEADER, read_dataset, read_shard};
pub use shard::ShardSpec;
