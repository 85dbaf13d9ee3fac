use tch::Device;
use tracing::trace;

use super::{TabularConfig, bootstrapped_target, td_update};
use crate::decision_functions::DecisionFunction;
use crate::environment::EnvParams;
use crate::error::Result;
use crate::policies::QTablePolicy;
use crate::schedulers::ParameterScheduler;
use crate::trainer::Trainer;
use crate::trajectory::Trajectory;

/// Off-policy tabular TD control, bootstrapping from the greedy value of `s'`.
pub struct QLearning {
    policy: QTablePolicy,
    config: TabularConfig,
    schedulers: Vec<Box<dyn ParameterScheduler>>,
}

impl QLearning {
    pub fn new(
        env_params: EnvParams,
        num_envs: usize,
        decision_function: Option<Box<dyn DecisionFunction>>,
        config: TabularConfig,
    ) -> Result<Self> {
        let policy = QTablePolicy::new(env_params, num_envs, decision_function, None, Device::Cpu)?;
        QLearning::with_policy(policy, config)
    }

    pub fn with_policy(policy: QTablePolicy, config: TabularConfig) -> Result<Self> {
        config.validate()?;
        Ok(QLearning {
            policy,
            config,
            schedulers: Vec::new(),
        })
    }

    pub fn with_scheduler(mut self, scheduler: impl ParameterScheduler + 'static) -> Self {
        self.schedulers.push(Box::new(scheduler));
        self
    }

    pub fn config(&self) -> &TabularConfig {
        &self.config
    }

    pub fn into_policy(self) -> QTablePolicy {
        self.policy
    }
}

impl Trainer for QLearning {
    type Policy = QTablePolicy;

    fn policy(&self) -> &QTablePolicy {
        &self.policy
    }

    fn policy_mut(&mut self) -> &mut QTablePolicy {
        &mut self.policy
    }

    fn update_policy(&mut self, experience: &Trajectory) -> Result<()> {
        let state = &experience.observation;
        let action = experience.action()?;
        let next = experience.next()?;

        let table = self.policy.q_table();
        let q = table.get_state_action_value(state, action)?;
        let (best_next, _) = table.get_action_values(&next.observation)?.max_dim(1, true);
        let target = bootstrapped_target(&next.reward, &next.done, &best_next, self.config.gamma);
        let updated = td_update(&q, &target, self.config.alpha);
        self.policy.q_table_mut().update_q_value(state, action, &updated)?;
        trace!(alpha = self.config.alpha, gamma = self.config.gamma, "q-learning update");
        Ok(())
    }

    fn schedulers(&self) -> &[Box<dyn ParameterScheduler>] {
        &self.schedulers
    }

    fn max_steps_per_episode(&self) -> Option<usize> {
        self.config.max_steps_per_episode
    }
}
