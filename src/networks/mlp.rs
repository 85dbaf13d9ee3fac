use std::io::Cursor;

use serde::{Deserialize, Serialize};
use tch::nn::Module;
use tch::{Device, Kind, Tensor, nn};

use crate::error::{Result, RlError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Relu,
    Tanh,
    Sigmoid,
    Softmax,
}

impl Activation {
    fn apply(self, xs: &Tensor) -> Tensor {
        match self {
            Activation::Relu => xs.relu(),
            Activation::Tanh => xs.tanh(),
            Activation::Sigmoid => xs.sigmoid(),
            Activation::Softmax => xs.softmax(-1, Kind::Float),
        }
    }
}

/// Layer sizes and activations; enough to rebuild the network before loading weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpConfig {
    pub input_dim: usize,
    pub output_dim: usize,
    pub hidden_dims: Vec<usize>,
    pub hidden_activation: Activation,
    pub final_activation: Option<Activation>,
}

impl MlpConfig {
    /// Two hidden layers of 64 units with ReLU.
    pub fn new(input_dim: usize, output_dim: usize) -> Self {
        MlpConfig {
            input_dim,
            output_dim,
            hidden_dims: vec![64, 64],
            hidden_activation: Activation::Relu,
            final_activation: None,
        }
    }

    pub fn with_hidden_dims(mut self, hidden_dims: Vec<usize>) -> Self {
        self.hidden_dims = hidden_dims;
        self
    }

    pub fn with_hidden_activation(mut self, activation: Activation) -> Self {
        self.hidden_activation = activation;
        self
    }

    pub fn with_final_activation(mut self, activation: Activation) -> Self {
        self.final_activation = Some(activation);
        self
    }
}

pub struct MLP {
    pub model: nn::Sequential,
    pub var_store: nn::VarStore, // 保存 VarStore 的所有权
    config: MlpConfig,
}

impl MLP {
    pub fn new(vs: nn::VarStore, config: MlpConfig) -> Result<Self> {
        if config.input_dim == 0 || config.output_dim == 0 || config.hidden_dims.contains(&0) {
            return Err(RlError::config(format!(
                "network layers must have positive width, got {config:?}"
            )));
        }
        let mut model = nn::seq();
        let mut in_dim = config.input_dim as i64;
        for (i, &width) in config.hidden_dims.iter().enumerate() {
            let activation = config.hidden_activation;
            model = model
                .add(nn::linear(
                    &vs.root() / format!("layer{}", i + 1),
                    in_dim,
                    width as i64,
                    Default::default(),
                ))
                .add_fn(move |xs| activation.apply(xs));
            in_dim = width as i64;
        }
        model = model.add(nn::linear(
            &vs.root() / "output",
            in_dim,
            config.output_dim as i64,
            Default::default(),
        ));
        if let Some(activation) = config.final_activation {
            model = model.add_fn(move |xs| activation.apply(xs));
        }
        Ok(MLP {
            model,
            var_store: vs,
            config,
        })
    }

    /// Builds a network with the same layout and copies all parameters into it.
    pub fn try_clone(&self) -> Result<Self> {
        let mut copy = MLP::new(nn::VarStore::new(self.device()), self.config.clone())?;
        copy.copy_from(self)?;
        Ok(copy)
    }

    /// Hard copy of every parameter of `other` into this network.
    pub fn copy_from(&mut self, other: &MLP) -> Result<()> {
        self.var_store.copy(&other.var_store)?;
        Ok(())
    }

    /// Float forward pass on the network's device.
    pub fn forward(&self, xs: &Tensor) -> Tensor {
        self.model
            .forward(&xs.to_kind(Kind::Float).to_device(self.device()))
    }

    pub fn config(&self) -> &MlpConfig {
        &self.config
    }

    pub fn var_store(&self) -> &nn::VarStore {
        &self.var_store
    }

    pub fn device(&self) -> Device {
        self.var_store.device()
    }

    pub fn save_weights(&self) -> Result<Vec<u8>> {
        let mut blob = Vec::new();
        self.var_store.save_to_stream(&mut blob)?;
        Ok(blob)
    }

    pub fn load_weights(&mut self, blob: &[u8]) -> Result<()> {
        self.var_store.load_from_stream(Cursor::new(blob))?;
        Ok(())
    }
}
