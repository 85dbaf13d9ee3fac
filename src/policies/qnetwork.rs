use tch::{Device, Tensor};

use super::{default_decision_function, select_from_values};
use crate::decision_functions::DecisionFunction;
use crate::environment::EnvParams;
use crate::error::{Result, RlError};
use crate::networks::QNetwork;
use crate::policy::{Policy, PolicyRecord};
use crate::trajectory::Trajectory;
use crate::value_functions::ActionValueFunction;

/// Neural action values combined with a decision function.
pub struct QNetworkPolicy {
    env_params: EnvParams,
    num_envs: usize,
    decision_function: Box<dyn DecisionFunction>,
    q_network: QNetwork,
}

impl QNetworkPolicy {
    pub fn new(
        env_params: EnvParams,
        num_envs: usize,
        decision_function: Option<Box<dyn DecisionFunction>>,
        q_network: Option<QNetwork>,
        device: Device,
    ) -> Result<Self> {
        let q_network = match q_network {
            Some(network) => {
                let config = network.config();
                if config.input_dim != env_params.observation_size()
                    || config.output_dim != env_params.discrete_action_dim()?
                {
                    return Err(RlError::config(format!(
                        "q-network {}->{} does not match the environment spaces",
                        config.input_dim, config.output_dim
                    )));
                }
                network
            }
            None => QNetwork::from_env_params(&env_params, None, device)?,
        };
        let decision_function = match decision_function {
            Some(df) => df,
            None => default_decision_function()?,
        };
        Ok(QNetworkPolicy {
            env_params,
            num_envs,
            decision_function,
            q_network,
        })
    }

    /// Values without gradient tracking, as used for action selection.
    pub fn get_action_values(&self, observation: &Tensor) -> Result<Tensor> {
        self.q_network.action_values(observation)
    }

    pub fn q_network(&self) -> &QNetwork {
        &self.q_network
    }

    pub fn q_network_mut(&mut self) -> &mut QNetwork {
        &mut self.q_network
    }

    pub fn decision_function(&self) -> &dyn DecisionFunction {
        self.decision_function.as_ref()
    }

    pub fn load_from_dict(record: PolicyRecord) -> Result<Self> {
        match record {
            PolicyRecord::QNetworkPolicy {
                env_params,
                num_envs,
                decision_function,
                q_network_init_args,
                q_network,
                device,
            } => {
                let device = Device::from(device);
                let mut network = QNetwork::new(q_network_init_args, device)?;
                network.load_weights(&q_network)?;
                QNetworkPolicy::new(
                    env_params,
                    num_envs,
                    Some(decision_function.build()?),
                    Some(network),
                    device,
                )
            }
            other => Err(other.mismatch("QNetworkPolicy")),
        }
    }
}

impl Policy for QNetworkPolicy {
    fn name(&self) -> &'static str {
        "QNetworkPolicy"
    }

    fn env_params(&self) -> &EnvParams {
        &self.env_params
    }

    fn get_action(&mut self, state: Trajectory) -> Result<Trajectory> {
        select_from_values(&self.q_network, self.decision_function.as_ref(), state)
    }

    fn set_parameter(&mut self, name: &str, value: f64) -> Result<()> {
        self.decision_function.set_parameter(name, value)
    }

    fn save_to_dict(&self) -> Result<PolicyRecord> {
        Ok(PolicyRecord::QNetworkPolicy {
            env_params: self.env_params.clone(),
            num_envs: self.num_envs,
            decision_function: self.decision_function.to_record(),
            q_network_init_args: self.q_network.config().clone(),
            q_network: self.q_network.save_weights()?,
            device: self.q_network.device().into(),
        })
    }
}
