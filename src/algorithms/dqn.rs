use serde::{Deserialize, Serialize};
use tch::nn::{self, OptimizerConfig};
use tch::{Device, Kind, Tensor};
use tracing::{debug, trace};

use super::{bootstrapped_target, validate_gamma};
use crate::decision_functions::DecisionFunction;
use crate::environment::EnvParams;
use crate::error::{Result, RlError};
use crate::networks::QNetwork;
use crate::policies::QNetworkPolicy;
use crate::replay_buffer::ReplayBuffer;
use crate::schedulers::ParameterScheduler;
use crate::trainer::Trainer;
use crate::trajectory::Trajectory;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DqnConfig {
    pub gamma: f64,
    pub learning_rate: f64,
    /// Replay capacity.
    pub buffer_size: usize,
    /// No learning happens until the buffer holds this many transitions.
    pub min_buffer_size: usize,
    pub mini_batch_size: usize,
    /// The target network is overwritten after every this many gradient updates.
    pub target_update_steps: usize,
    pub max_grad_norm: f64,
    pub hidden_dims: Vec<usize>,
    pub max_steps_per_episode: Option<usize>,
}

impl Default for DqnConfig {
    fn default() -> Self {
        DqnConfig {
            gamma: 0.99,
            learning_rate: 1e-3,
            buffer_size: 50_000,
            min_buffer_size: 320,
            mini_batch_size: 64,
            target_update_steps: 15,
            max_grad_norm: 1.0,
            hidden_dims: vec![64, 64],
            max_steps_per_episode: None,
        }
    }
}

impl DqnConfig {
    pub fn validate(&self) -> Result<()> {
        validate_gamma(self.gamma)?;
        if self.learning_rate <= 0.0 {
            return Err(RlError::config("learning_rate must be positive"));
        }
        if self.mini_batch_size == 0 || self.target_update_steps == 0 {
            return Err(RlError::config(
                "mini_batch_size and target_update_steps must be positive",
            ));
        }
        if self.min_buffer_size < self.mini_batch_size || self.buffer_size < self.min_buffer_size {
            return Err(RlError::config(format!(
                "need mini_batch_size ({}) <= min_buffer_size ({}) <= buffer_size ({})",
                self.mini_batch_size, self.min_buffer_size, self.buffer_size
            )));
        }
        if self.max_grad_norm <= 0.0 {
            return Err(RlError::config("max_grad_norm must be positive"));
        }
        Ok(())
    }
}

/// Deep Q-learning with experience replay and a periodically synchronised
/// target network.
pub struct Dqn {
    policy: QNetworkPolicy,
    target_network: QNetwork,
    optimizer: nn::Optimizer,
    replay_buffer: ReplayBuffer<Trajectory>,
    config: DqnConfig,
    update_count: usize,
    schedulers: Vec<Box<dyn ParameterScheduler>>,
}

impl Dqn {
    pub fn new(
        env_params: EnvParams,
        num_envs: usize,
        decision_function: Option<Box<dyn DecisionFunction>>,
        config: DqnConfig,
        device: Device,
    ) -> Result<Self> {
        let network = QNetwork::from_env_params(&env_params, Some(config.hidden_dims.clone()), device)?;
        let policy = QNetworkPolicy::new(env_params, num_envs, decision_function, Some(network), device)?;
        Dqn::with_policy(policy, config)
    }

    pub fn with_policy(policy: QNetworkPolicy, config: DqnConfig) -> Result<Self> {
        config.validate()?;
        let target_network = policy.q_network().try_clone()?;
        let optimizer = nn::Adam::default().build(policy.q_network().var_store(), config.learning_rate)?;
        let replay_buffer = ReplayBuffer::new(config.buffer_size)?;
        Ok(Dqn {
            policy,
            target_network,
            optimizer,
            replay_buffer,
            config,
            update_count: 0,
            schedulers: Vec::new(),
        })
    }

    pub fn with_scheduler(mut self, scheduler: impl ParameterScheduler + 'static) -> Self {
        self.schedulers.push(Box::new(scheduler));
        self
    }

    pub fn config(&self) -> &DqnConfig {
        &self.config
    }

    pub fn target_network(&self) -> &QNetwork {
        &self.target_network
    }

    pub fn replay_buffer(&self) -> &ReplayBuffer<Trajectory> {
        &self.replay_buffer
    }

    /// Number of gradient updates performed so far.
    pub fn update_count(&self) -> usize {
        self.update_count
    }

    pub fn into_policy(self) -> QNetworkPolicy {
        self.policy
    }

    /// `[B, 1]` regression targets `r + (1 - done)·γ·max_a' Q_target(s', a')`.
    pub fn td_targets(&self, batch: &Trajectory) -> Result<Tensor> {
        let next = batch.next()?;
        let device = self.target_network.device();
        let reward = next.reward.to_device(device).to_kind(Kind::Float).view([-1, 1]);
        let done = next.done.to_device(device).to_kind(Kind::Float).view([-1, 1]);
        let next_q = tch::no_grad(|| {
            self.target_network
                .forward(&next.observation.to_device(device))
                .max_dim(1, true)
                .0
        });
        Ok(bootstrapped_target(&reward, &done, &next_q, self.config.gamma))
    }

    /// One gradient step on a sampled mini-batch.
    fn learn(&mut self) -> Result<LearnStats> {
        let samples = self.replay_buffer.sample(self.config.mini_batch_size)?;
        let batch = Trajectory::stack(&samples)?;
        let td_target = self.td_targets(&batch)?;

        let device = self.policy.q_network().device();
        let actions = batch.action()?.to_device(device).to_kind(Kind::Int64).view([-1, 1]);
        let q_values = self
            .policy
            .q_network()
            .forward(&batch.observation.to_device(device))
            .gather(1, &actions, false);

        let loss = q_values.mse_loss(&td_target, tch::Reduction::Mean);
        self.optimizer.zero_grad();
        loss.backward();
        self.optimizer.clip_grad_norm(self.config.max_grad_norm);
        let grad_norm = gradient_norm(self.policy.q_network().var_store());
        self.optimizer.step();

        self.update_count += 1;
        if self.update_count % self.config.target_update_steps == 0 {
            self.target_network.hard_update_from(self.policy.q_network())?;
            trace!(update = self.update_count, "target network synchronised");
        }
        Ok(LearnStats {
            loss: loss.double_value(&[]),
            grad_norm,
        })
    }
}

struct LearnStats {
    loss: f64,
    /// L2 norm of all gradients after clipping.
    grad_norm: f64,
}

fn gradient_norm(vs: &nn::VarStore) -> f64 {
    let squared: f64 = vs
        .trainable_variables()
        .iter()
        .map(|v| v.grad())
        .filter(|g| g.defined())
        .map(|g| g.pow_tensor_scalar(2.0).sum(Kind::Float).double_value(&[]))
        .sum();
    squared.sqrt()
}

impl Trainer for Dqn {
    type Policy = QNetworkPolicy;

    fn policy(&self) -> &QNetworkPolicy {
        &self.policy
    }

    fn policy_mut(&mut self) -> &mut QNetworkPolicy {
        &mut self.policy
    }

    fn update_policy(&mut self, experience: &Trajectory) -> Result<()> {
        for record in experience.split()? {
            self.replay_buffer.add(record);
        }
        if self.replay_buffer.size() < self.config.min_buffer_size {
            debug!(
                size = self.replay_buffer.size(),
                min = self.config.min_buffer_size,
                "replay buffer filling, skipping update"
            );
            return Ok(());
        }
        let stats = self.learn()?;
        trace!(
            loss = stats.loss,
            grad_norm = stats.grad_norm,
            update = self.update_count,
            "dqn update"
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
