pub mod qtable;

pub use qtable::{QTable, QTableArgs};

use tch::Tensor;

use crate::error::Result;

/// Value of every action for a batch of states.
pub trait ActionValueFunction {
    /// `[N, ...]` observations in, `[N, action_dim]` values out.
    fn action_values(&self, observation: &Tensor) -> Result<Tensor>;
}
