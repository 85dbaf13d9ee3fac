use tch::{Device, Tensor, nn};

use super::mlp::{MLP, MlpConfig};
use crate::environment::EnvParams;
use crate::error::{Result, RlError};
use crate::value_functions::ActionValueFunction;

/// Neural action-value function: observation in, one value per discrete action out.
pub struct QNetwork {
    mlp: MLP,
}

impl QNetwork {
    pub fn new(config: MlpConfig, device: Device) -> Result<Self> {
        Ok(QNetwork {
            mlp: MLP::new(nn::VarStore::new(device), config)?,
        })
    }

    /// Input size is the flattened observation, output size the number of discrete actions.
    /// `hidden_dims` overrides the default architecture when given.
    pub fn from_env_params(
        env_params: &EnvParams,
        hidden_dims: Option<Vec<usize>>,
        device: Device,
    ) -> Result<Self> {
        if env_params.action_continuous {
            return Err(RlError::config(
                "QNetwork only supports discrete action spaces",
            ));
        }
        let mut config = MlpConfig::new(
            env_params.observation_size(),
            env_params.discrete_action_dim()?,
        );
        if let Some(hidden_dims) = hidden_dims {
            config = config.with_hidden_dims(hidden_dims);
        }
        QNetwork::new(config, device)
    }

    /// Forward pass that records gradients.
    pub fn forward(&self, observation: &Tensor) -> Tensor {
        let n = observation.size().first().copied().unwrap_or(1);
        self.mlp.forward(&observation.reshape([n, -1]))
    }

    /// Independent network holding a copy of the current parameters.
    pub fn try_clone(&self) -> Result<Self> {
        Ok(QNetwork {
            mlp: self.mlp.try_clone()?,
        })
    }

    /// Overwrites every parameter with the one from `online`.
    pub fn hard_update_from(&mut self, online: &QNetwork) -> Result<()> {
        self.mlp.copy_from(&online.mlp)
    }

    pub fn var_store(&self) -> &nn::VarStore {
        self.mlp.var_store()
    }

    pub fn config(&self) -> &MlpConfig {
        self.mlp.config()
    }

    pub fn device(&self) -> Device {
        self.mlp.device()
    }

    pub fn save_weights(&self) -> Result<Vec<u8>> {
        self.mlp.save_weights()
    }

    pub fn load_weights(&mut self, blob: &[u8]) -> Result<()> {
        self.mlp.load_weights(blob)
    }
}

impl ActionValueFunction for QNetwork {
    fn action_values(&self, observation: &Tensor) -> Result<Tensor> {
        Ok(tch::no_grad(|| self.forward(observation)))
    }
}
