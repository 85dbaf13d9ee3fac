use serde::{Deserialize, Serialize};
use tch::nn::{self, OptimizerConfig};
use tch::{Device, Kind, Tensor};
use tracing::trace;

use super::{bootstrapped_target, validate_gamma};
use crate::distributions::DistributionKind;
use crate::environment::EnvParams;
use crate::error::{Result, RlError};
use crate::policies::ActorCriticPolicy;
use crate::schedulers::ParameterScheduler;
use crate::trainer::Trainer;
use crate::trajectory::Trajectory;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct A2cConfig {
    pub gamma: f64,
    pub actor_learning_rate: f64,
    pub critic_learning_rate: f64,
    /// Weight of the entropy bonus in the actor loss.
    pub entropy_coef: f64,
    pub hidden_dims: Vec<usize>,
    pub max_steps_per_episode: Option<usize>,
}

impl Default for A2cConfig {
    fn default() -> Self {
        A2cConfig {
            gamma: 0.99,
            actor_learning_rate: 1e-4,
            critic_learning_rate: 1e-4,
            entropy_coef: 0.01,
            hidden_dims: vec![64, 64],
            max_steps_per_episode: None,
        }
    }
}

impl A2cConfig {
    pub fn validate(&self) -> Result<()> {
        validate_gamma(self.gamma)?;
        if self.actor_learning_rate <= 0.0 || self.critic_learning_rate <= 0.0 {
            return Err(RlError::config("learning rates must be positive"));
        }
        if self.entropy_coef < 0.0 {
            return Err(RlError::config("entropy_coef must be non-negative"));
        }
        Ok(())
    }
}

/// One-step advantage actor-critic.
pub struct A2c {
    policy: ActorCriticPolicy,
    actor_opt: nn::Optimizer,
    critic_opt: nn::Optimizer,
    config: A2cConfig,
    schedulers: Vec<Box<dyn ParameterScheduler>>,
}

impl A2c {
    pub fn new(
        env_params: EnvParams,
        distribution: Option<DistributionKind>,
        config: A2cConfig,
        device: Device,
    ) -> Result<Self> {
        let policy = ActorCriticPolicy::new(
            env_params,
            distribution,
            Some(config.hidden_dims.clone()),
            device,
        )?;
        A2c::with_policy(policy, config)
    }

    pub fn with_policy(policy: ActorCriticPolicy, config: A2cConfig) -> Result<Self> {
        config.validate()?;
        let actor_opt = nn::Adam::default()
            .build(policy.actor_network().var_store(), config.actor_learning_rate)?;
        let critic_opt = nn::Adam::default()
            .build(policy.critic_network().var_store(), config.critic_learning_rate)?;
        Ok(A2c {
            policy,
            actor_opt,
            critic_opt,
            config,
            schedulers: Vec::new(),
        })
    }

    pub fn with_scheduler(mut self, scheduler: impl ParameterScheduler + 'static) -> Self {
        self.schedulers.push(Box::new(scheduler));
        self
    }

    pub fn config(&self) -> &A2cConfig {
        &self.config
    }

    pub fn into_policy(self) -> ActorCriticPolicy {
        self.policy
    }
}

impl Trainer for A2c {
    type Policy = ActorCriticPolicy;

    fn policy(&self) -> &ActorCriticPolicy {
        &self.policy
    }

    fn policy_mut(&mut self) -> &mut ActorCriticPolicy {
        &mut self.policy
    }

    /// Expects `experience` to carry the action sampled by the latest
    /// `get_action`, whose log-probability and value estimate are reused.
    fn update_policy(&mut self, experience: &Trajectory) -> Result<()> {
        let next = experience.next()?;
        let state_value = self.policy.value_estimates()?;
        let log_prob = self.policy.action_log_probs()?;
        let entropy = self.policy.entropy()?;
        if state_value.size()[0] != experience.batch_size() {
            return Err(RlError::ShapeMismatch {
                field: "value_estimates".to_string(),
                expected: vec![experience.batch_size(), 1],
                actual: state_value.size(),
            });
        }

        // calculate TD target
        let device = state_value.device();
        let next_value = self.policy.estimate_values(&next.observation.to_device(device));
        let reward = next.reward.to_device(device).view([-1, 1]);
        let done = next.done.to_device(device).view([-1, 1]);
        let td_target = bootstrapped_target(&reward, &done, &next_value, self.config.gamma);
        let advantage = (&td_target - state_value).detach();

        let actor_loss: Tensor = -(log_prob * &advantage).mean(Kind::Float)
            - entropy.mean(Kind::Float) * self.config.entropy_coef;
        let critic_loss = (state_value - &td_target)
            .pow_tensor_scalar(2.0)
            .mean(Kind::Float);

        self.actor_opt.backward_step(&actor_loss);
        self.critic_opt.backward_step(&critic_loss);
        trace!(
            actor_loss = actor_loss.double_value(&[]),
            critic_loss = critic_loss.double_value(&[]),
            "a2c update"
        );
        Ok(())
    }

    fn schedulers(&self) -> &[Box<dyn ParameterScheduler>] {
        &self.schedulers
    }

    fn max_steps_per_episode(&self) -> Option<usize> {
        self.config.max_steps_per_episode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Policy;
    use crate::trajectory::NextStep;

    #[test]
    fn update_requires_a_prior_action() {
        let mut a2c = A2c::new(EnvParams::discrete(3, 2), None, A2cConfig::default(), Device::Cpu)
            .unwrap();
        let experience = Trajectory::new(Tensor::from_slice(&[0i64]).view([1, 1]))
            .with_action(Tensor::from_slice(&[0i64]).view([1, 1]))
            .with_next(NextStep::new(
                Tensor::from_slice(&[1i64]).view([1, 1]),
                Tensor::from_slice(&[1.0f32]).view([1, 1]),
                Tensor::from_slice(&[false]).view([1, 1]),
            ));
        assert!(matches!(
            a2c.update_policy(&experience),
            Err(RlError::MissingField(_))
        ));
    }

    #[test]
    fn critic_moves_toward_the_td_target() {
        let config = A2cConfig {
            critic_learning_rate: 1e-2,
            hidden_dims: vec![8],
            ..A2cConfig::default()
        };
        let mut a2c = A2c::new(EnvParams::discrete(3, 2), None, config, Device::Cpu).unwrap();
        let obs = Tensor::from_slice(&[0i64]).view([1, 1]);
        let before = a2c.policy().estimate_values(&obs).double_value(&[0, 0]);

        for _ in 0..50 {
            let state = a2c.policy_mut().get_action(Trajectory::new(obs.copy())).unwrap();
            let experience = state.with_next(NextStep::new(
                Tensor::from_slice(&[1i64]).view([1, 1]),
                Tensor::from_slice(&[5.0f32]).view([1, 1]),
                Tensor::from_slice(&[true]).view([1, 1]),
            ));
            a2c.update_policy(&experience).unwrap();
        }
        let after = a2c.policy().estimate_values(&obs).double_value(&[0, 0]);
        assert!((5.0 - after).abs() < (5.0 - before).abs());
    }
}
