use tch::{Device, Tensor, nn};

use crate::distributions::{ActionDistribution, DistributionKind};
use crate::environment::EnvParams;
use crate::error::{Result, RlError};
use crate::networks::{MLP, MlpConfig};
use crate::policy::{Policy, PolicyRecord};
use crate::trajectory::Trajectory;

/// Actor network parameterising an action distribution, with a critic
/// estimating state values alongside.
///
/// `get_action` runs both networks with gradient tracking and keeps the
/// distribution, log-probability, entropy and value estimate of the last call
/// for a policy-gradient learner.
pub struct ActorCriticPolicy {
    env_params: EnvParams,
    distribution: DistributionKind,
    actor: MLP,
    critic: MLP,
    current_dist: Option<ActionDistribution>,
    value_estimates: Option<Tensor>,
    action_log_probs: Option<Tensor>,
    entropy: Option<Tensor>,
}

impl ActorCriticPolicy {
    /// `distribution` defaults to Categorical for discrete actions and Normal
    /// for continuous ones.
    pub fn new(
        env_params: EnvParams,
        distribution: Option<DistributionKind>,
        hidden_dims: Option<Vec<usize>>,
        device: Device,
    ) -> Result<Self> {
        let distribution = distribution.unwrap_or_else(|| DistributionKind::for_env(&env_params));
        let state_dim = env_params.observation_size();
        let mut actor_config =
            MlpConfig::new(state_dim, distribution.actor_output_dim(&env_params)?);
        let mut critic_config = MlpConfig::new(state_dim, 1);
        if let Some(hidden_dims) = hidden_dims {
            actor_config = actor_config.with_hidden_dims(hidden_dims.clone());
            critic_config = critic_config.with_hidden_dims(hidden_dims);
        }
        let actor = MLP::new(nn::VarStore::new(device), actor_config)?;
        let critic = MLP::new(nn::VarStore::new(device), critic_config)?;
        Ok(ActorCriticPolicy::from_parts(env_params, distribution, actor, critic))
    }

    fn from_parts(env_params: EnvParams, distribution: DistributionKind, actor: MLP, critic: MLP) -> Self {
        ActorCriticPolicy {
            env_params,
            distribution,
            actor,
            critic,
            current_dist: None,
            value_estimates: None,
            action_log_probs: None,
            entropy: None,
        }
    }

    pub fn actor_network(&self) -> &MLP {
        &self.actor
    }

    pub fn critic_network(&self) -> &MLP {
        &self.critic
    }

    pub fn distribution(&self) -> DistributionKind {
        self.distribution
    }

    /// `[N, 1]` critic output from the last `get_action`.
    pub fn value_estimates(&self) -> Result<&Tensor> {
        self.value_estimates.as_ref().ok_or(RlError::MissingField("value_estimates"))
    }

    /// `[N, 1]` log-probability of the actions sampled by the last `get_action`.
    pub fn action_log_probs(&self) -> Result<&Tensor> {
        self.action_log_probs.as_ref().ok_or(RlError::MissingField("log_probs"))
    }

    pub fn entropy(&self) -> Result<&Tensor> {
        self.entropy.as_ref().ok_or(RlError::MissingField("entropy"))
    }

    /// Log-probability of arbitrary actions under the last computed distribution.
    pub fn log_probs(&self, actions: &Tensor) -> Result<Tensor> {
        let dist = self
            .current_dist
            .as_ref()
            .ok_or(RlError::MissingField("distribution"))?;
        Ok(dist.log_prob(actions))
    }

    /// Critic estimate for arbitrary observations, without gradient tracking.
    pub fn estimate_values(&self, observation: &Tensor) -> Tensor {
        tch::no_grad(|| self.critic.forward(&flatten(observation)))
    }

    pub fn load_from_dict(record: PolicyRecord) -> Result<Self> {
        match record {
            PolicyRecord::ActorCriticPolicy {
                env_params,
                distribution,
                actor_init_args,
                actor,
                critic_init_args,
                critic,
                device,
            } => {
                let device = Device::from(device);
                let expected = distribution.actor_output_dim(&env_params)?;
                if actor_init_args.output_dim != expected {
                    return Err(RlError::config(format!(
                        "actor outputs {} values, {distribution:?} needs {expected}",
                        actor_init_args.output_dim
                    )));
                }
                let mut actor_net = MLP::new(nn::VarStore::new(device), actor_init_args)?;
                actor_net.load_weights(&actor)?;
                let mut critic_net = MLP::new(nn::VarStore::new(device), critic_init_args)?;
                critic_net.load_weights(&critic)?;
                Ok(ActorCriticPolicy::from_parts(env_params, distribution, actor_net, critic_net))
            }
            other => Err(other.mismatch("ActorCriticPolicy")),
        }
    }
}

impl Policy for ActorCriticPolicy {
    fn name(&self) -> &'static str {
        "ActorCriticPolicy"
    }

    fn env_params(&self) -> &EnvParams {
        &self.env_params
    }

    fn get_action(&mut self, state: Trajectory) -> Result<Trajectory> {
        let obs = flatten(&state.observation);
        let dist = self.distribution.build(&self.actor.forward(&obs));
        let action = dist.sample();

        self.action_log_probs = Some(dist.log_prob(&action));
        self.entropy = Some(dist.entropy());
        self.value_estimates = Some(self.critic.forward(&obs));
        self.current_dist = Some(dist);
        Ok(state.with_action(action))
    }

    fn save_to_dict(&self) -> Result<PolicyRecord> {
        Ok(PolicyRecord::ActorCriticPolicy {
            env_params: self.env_params.clone(),
            distribution: self.distribution,
            actor_init_args: self.actor.config().clone(),
            actor: self.actor.save_weights()?,
            critic_init_args: self.critic.config().clone(),
            critic: self.critic.save_weights()?,
            device: self.actor.device().into(),
        })
    }
}

fn flatten(observation: &Tensor) -> Tensor {
    let n = observation.size().first().copied().unwrap_or(1);
    observation.reshape([n, -1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Bound;
    use tch::Kind;

    fn continuous_params() -> EnvParams {
        EnvParams {
            action_shape: vec![2],
            action_continuous: true,
            action_min: Bound::Scalar(-1.0),
            action_max: Bound::Scalar(1.0),
            observation_shape: vec![3],
            observation_continuous: true,
            observation_min: Bound::Scalar(-1.0),
            observation_max: Bound::Scalar(1.0),
        }
    }

    #[test]
    fn discrete_actions_expose_learning_signals() {
        let params = EnvParams::discrete(4, 3);
        let mut policy = ActorCriticPolicy::new(params, None, Some(vec![16]), Device::Cpu).unwrap();
        assert_eq!(policy.distribution(), DistributionKind::Categorical);
        assert!(policy.value_estimates().is_err());

        let obs = Tensor::from_slice(&[0i64, 3]).view([2, 1]);
        let out = policy.get_action(Trajectory::new(obs)).unwrap();
        let action = out.action().unwrap();
        assert_eq!(action.size(), vec![2, 1]);
        assert_eq!(policy.action_log_probs().unwrap().size(), vec![2, 1]);
        assert_eq!(policy.entropy().unwrap().size(), vec![2, 1]);
        assert_eq!(policy.value_estimates().unwrap().size(), vec![2, 1]);
        assert!(policy.action_log_probs().unwrap().requires_grad());
        assert!(policy
            .log_probs(action)
            .unwrap()
            .equal(policy.action_log_probs().unwrap()));
    }

    #[test]
    fn continuous_actions_use_a_gaussian() {
        let mut policy = ActorCriticPolicy::new(continuous_params(), None, None, Device::Cpu).unwrap();
        assert_eq!(policy.distribution(), DistributionKind::Normal);
        assert_eq!(policy.actor_network().config().output_dim, 4);
        let obs = Tensor::zeros([5, 3], (Kind::Float, Device::Cpu));
        let out = policy.get_action(Trajectory::new(obs)).unwrap();
        assert_eq!(out.action().unwrap().size(), vec![5, 2]);
        assert_eq!(policy.action_log_probs().unwrap().size(), vec![5, 1]);
    }

    #[test]
    fn unsupported_combination_fails_at_construction() {
        let result = ActorCriticPolicy::new(
            continuous_params(),
            Some(DistributionKind::Categorical),
            None,
            Device::Cpu,
        );
        assert!(matches!(result, Err(RlError::Configuration(_))));
    }

    #[test]
    fn offset_discrete_actions_are_rejected() {
        let mut params = EnvParams::discrete(4, 4);
        params.action_min = Bound::Scalar(2.0);
        params.action_max = Bound::Scalar(3.0);
        assert!(matches!(
            ActorCriticPolicy::new(params, None, None, Device::Cpu),
            Err(RlError::Configuration(_))
        ));
    }

    #[test]
    fn record_round_trip_keeps_networks() {
        let policy = ActorCriticPolicy::new(EnvParams::discrete(4, 2), None, None, Device::Cpu).unwrap();
        let loaded = ActorCriticPolicy::load_from_dict(policy.save_to_dict().unwrap()).unwrap();
        let obs = Tensor::from_slice(&[2i64]).view([1, 1]);
        assert!(policy.estimate_values(&obs).equal(&loaded.estimate_values(&obs)));
    }
}
