use tch::{Device, Tensor};
use tracing::trace;

use super::{TabularConfig, bootstrapped_target, td_update};
use crate::decision_functions::DecisionFunction;
use crate::environment::EnvParams;
use crate::error::Result;
use crate::policies::QTablePolicy;
use crate::policy::Policy;
use crate::schedulers::ParameterScheduler;
use crate::trainer::Trainer;
use crate::trajectory::Trajectory;

/// On-policy tabular TD control.
///
/// The action chosen for `s'` during an update is the one executed in `s'` on
/// the next step.
pub struct Sarsa {
    policy: QTablePolicy,
    config: TabularConfig,
    next_action: Option<Tensor>,
    schedulers: Vec<Box<dyn ParameterScheduler>>,
}

impl Sarsa {
    pub fn new(
        env_params: EnvParams,
        num_envs: usize,
        decision_function: Option<Box<dyn DecisionFunction>>,
        config: TabularConfig,
    ) -> Result<Self> {
        let policy = QTablePolicy::new(env_params, num_envs, decision_function, None, Device::Cpu)?;
        Sarsa::with_policy(policy, config)
    }

    pub fn with_policy(policy: QTablePolicy, config: TabularConfig) -> Result<Self> {
        config.validate()?;
        Ok(Sarsa {
            policy,
            config,
            next_action: None,
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

    /// Action committed for the next step, if any.
    pub fn pending_action(&self) -> Option<&Tensor> {
        self.next_action.as_ref()
    }

    pub fn into_policy(self) -> QTablePolicy {
        self.policy
    }
}

impl Trainer for Sarsa {
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

        // a' 按当前策略选择, 并在下一步执行
        let next_state = self
            .policy
            .get_action(Trajectory::new(next.observation.shallow_clone()))?;
        let next_action = next_state.action()?;

        let table = self.policy.q_table();
        let q = table.get_state_action_value(state, action)?;
        let q_next = table.get_state_action_value(&next.observation, next_action)?;
        let target = bootstrapped_target(&next.reward, &next.done, &q_next, self.config.gamma);
        let updated = td_update(&q, &target, self.config.alpha);
        self.policy.q_table_mut().update_q_value(state, action, &updated)?;
        trace!(alpha = self.config.alpha, gamma = self.config.gamma, "sarsa update");

        self.next_action = if experience.is_done()? {
            None
        } else {
            Some(next_action.shallow_clone())
        };
        Ok(())
    }

    fn select_action(&mut self, state: Trajectory) -> Result<Trajectory> {
        match self.next_action.take() {
            Some(action) => Ok(state.with_action(action)),
            None => self.policy.get_action(state),
        }
    }

    fn on_episode_start(&mut self) {
        self.next_action = None;
    }

    fn schedulers(&self) -> &[Box<dyn ParameterScheduler>] {
        &self.schedulers
    }

    fn max_steps_per_episode(&self) -> Option<usize> {
        self.config.max_steps_per_episode
    }
}
