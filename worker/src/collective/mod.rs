mod all_reduce;
mod local;
mod tcp;

pub use all_reduce::AllReduce;
pub use local::LocalAllReduce;
pub use tcp::TcpAllReduce;
