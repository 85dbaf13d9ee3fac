// detailed implementation
pub mod algorithms;
pub mod decision_functions;
pub mod distributions;
pub mod networks;
pub mod policies;
pub mod replay_buffer;
pub mod schedulers;
pub mod trajectory;
pub mod utils;
pub mod value_functions;

// Traits
pub mod environment;
pub mod error;
pub mod policy;
pub mod trainer;

pub use environment::{Bound, EnvParams, Environment};
pub use error::{Result, RlError};
pub use policy::{Policy, PolicyRecord, load_policy};
pub use trainer::Trainer;
pub use trajectory::{NextStep, Trajectory};
