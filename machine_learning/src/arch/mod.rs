pub mod activations;
mod backprop;
mod forward;
pub mod layers;
mod layout;
pub mod loss;
mod network;

pub use backprop::{backward, sample_gradient};
pub use forward::{ActivationCache, forward, predict};
pub use layout::NetworkLayout;
pub use network::{INIT_RANGE, NetworkState};
