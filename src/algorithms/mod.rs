pub mod a2c;
pub mod dqn;
pub mod qlearning;
pub mod sarsa;

pub use a2c::{A2c, A2cConfig};
pub use dqn::{Dqn, DqnConfig};
pub use qlearning::QLearning;
pub use sarsa::Sarsa;

use serde::{Deserialize, Serialize};
use tch::{Kind, Tensor};

use crate::error::{Result, RlError};

/// `r + (1 - done)·γ·next_value`, all `[N, 1]`.
pub fn bootstrapped_target(reward: &Tensor, done: &Tensor, next_value: &Tensor, gamma: f64) -> Tensor {
    let not_done = 1.0 - done.to_kind(Kind::Float);
    reward.to_kind(Kind::Float) + not_done * next_value.to_kind(Kind::Float) * gamma
}

/// `q + α·(target - q)`
pub fn td_update(q: &Tensor, target: &Tensor, alpha: f64) -> Tensor {
    q + (target - q) * alpha
}

/// Step size and discount shared by the tabular learners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabularConfig {
    pub alpha: f64,
    pub gamma: f64,
    pub max_steps_per_episode: Option<usize>,
}

impl Default for TabularConfig {
    fn default() -> Self {
        TabularConfig {
            alpha: 0.1,
            gamma: 0.99,
            max_steps_per_episode: None,
        }
    }
}

impl TabularConfig {
    pub fn new(alpha: f64, gamma: f64) -> Self {
        TabularConfig {
            alpha,
            gamma,
            ..TabularConfig::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(RlError::config(format!("alpha must be in (0, 1], got {}", self.alpha)));
        }
        validate_gamma(self.gamma)
    }
}

pub(crate) fn validate_gamma(gamma: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&gamma) {
        return Err(RlError::config(format!("gamma must be in [0, 1], got {gamma}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn terminal_steps_do_not_bootstrap() {
        let reward = Tensor::from_slice(&[1.0f32, 2.0]).view([2, 1]);
        let done = Tensor::from_slice(&[0.0f32, 1.0]).view([2, 1]);
        let next = Tensor::from_slice(&[10.0f32, 1e6]).view([2, 1]);
        let target = bootstrapped_target(&reward, &done, &next, 0.5);
        assert_relative_eq!(target.double_value(&[0, 0]), 6.0);
        assert_relative_eq!(target.double_value(&[1, 0]), 2.0);
    }

    #[test]
    fn td_step_moves_toward_target() {
        let q = Tensor::from_slice(&[2.0f32]).view([1, 1]);
        let target = Tensor::from_slice(&[4.0f32]).view([1, 1]);
        assert_relative_eq!(td_update(&q, &target, 0.25).double_value(&[0, 0]), 2.5);
    }

    #[test]
    fn out_of_range_hyper_parameters_are_rejected() {
        assert!(TabularConfig::default().validate().is_ok());
        assert!(TabularConfig::new(0.0, 0.9).validate().is_err());
        assert!(TabularConfig::new(0.5, 1.5).validate().is_err());
    }
}
