//! Action distributions parameterised by an actor network.

use serde::{Deserialize, Serialize};
use tch::{Kind, Tensor};

use crate::environment::EnvParams;
use crate::error::{Result, RlError};

const LOG_STD_MIN: f64 = -20.0;
const LOG_STD_MAX: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistributionKind {
    /// Discrete actions; the actor outputs one logit per action.
    Categorical,
    /// Continuous actions; the actor outputs a mean and a log standard deviation per dimension.
    Normal,
}

impl DistributionKind {
    /// Categorical for discrete action spaces, Normal for continuous ones.
    pub fn for_env(env_params: &EnvParams) -> Self {
        if env_params.action_continuous {
            DistributionKind::Normal
        } else {
            DistributionKind::Categorical
        }
    }

    pub fn parameters_per_action(self) -> usize {
        match self {
            DistributionKind::Categorical => 1,
            DistributionKind::Normal => 2,
        }
    }

    /// Number of actor outputs needed for the given spaces.
    pub fn actor_output_dim(self, env_params: &EnvParams) -> Result<usize> {
        match (self, env_params.action_continuous) {
            (DistributionKind::Categorical, false) => env_params.discrete_action_dim(),
            (DistributionKind::Normal, true) => {
                Ok(env_params.action_size() * self.parameters_per_action())
            }
            (kind, continuous) => Err(RlError::config(format!(
                "{kind:?} distribution does not support {} action spaces",
                if continuous { "continuous" } else { "discrete" }
            ))),
        }
    }

    /// Builds the distribution from raw actor outputs of shape `[N, actor_output_dim]`.
    pub fn build(self, params: &Tensor) -> ActionDistribution {
        match self {
            DistributionKind::Categorical => ActionDistribution::Categorical {
                log_probs: params.log_softmax(-1, Kind::Float),
            },
            DistributionKind::Normal => {
                let chunks = params.chunk(2, -1);
                ActionDistribution::Normal {
                    mean: chunks[0].shallow_clone(),
                    log_std: chunks[1].clamp(LOG_STD_MIN, LOG_STD_MAX),
                }
            }
        }
    }
}

pub enum ActionDistribution {
    Categorical { log_probs: Tensor },
    Normal { mean: Tensor, log_std: Tensor },
}

impl ActionDistribution {
    /// `[N, 1]` int64 indices for categorical, `[N, D]` floats for normal.
    pub fn sample(&self) -> Tensor {
        tch::no_grad(|| match self {
            ActionDistribution::Categorical { log_probs } => log_probs.exp().multinomial(1, true),
            ActionDistribution::Normal { mean, log_std } => mean + log_std.exp() * mean.randn_like(),
        })
    }

    /// `[N, 1]` log-probability of `actions` (summed over action dimensions).
    pub fn log_prob(&self, actions: &Tensor) -> Tensor {
        match self {
            ActionDistribution::Categorical { log_probs } => {
                let index = actions.to_kind(Kind::Int64).reshape([-1, 1]);
                log_probs.gather(1, &index, false)
            }
            ActionDistribution::Normal { mean, log_std } => {
                let actions = actions.to_kind(Kind::Float).reshape_as(mean);
                let var = (log_std * 2.0).exp();
                let log_norm = 0.5 * (2.0 * std::f64::consts::PI).ln();
                let per_dim = -(actions - mean).pow_tensor_scalar(2.0) / (var * 2.0) - log_std - log_norm;
                per_dim.sum_dim_intlist([-1i64].as_slice(), true, Kind::Float)
            }
        }
    }

    /// `[N, 1]` entropy of the distribution.
    pub fn entropy(&self) -> Tensor {
        match self {
            ActionDistribution::Categorical { log_probs } => {
                -(log_probs.exp() * log_probs).sum_dim_intlist([-1i64].as_slice(), true, Kind::Float)
            }
            ActionDistribution::Normal { log_std, .. } => {
                let per_dim = log_std + 0.5 + 0.5 * (2.0 * std::f64::consts::PI).ln();
                per_dim.sum_dim_intlist([-1i64].as_slice(), true, Kind::Float)
            }
        }
    }
}
