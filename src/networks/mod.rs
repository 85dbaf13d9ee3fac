pub mod mlp;
pub mod qnetwork;

pub use mlp::{Activation, MLP, MlpConfig};
pub use qnetwork::QNetwork;
