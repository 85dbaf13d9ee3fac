use tch::Kind;
use tracing::{debug, info};

use crate::environment::Environment;
use crate::error::Result;
use crate::policy::Policy;
use crate::schedulers::ParameterScheduler;
use crate::trajectory::Trajectory;

/// Where an episode currently is; each phase owns the record flowing through it.
enum Phase {
    EpisodeStart,
    AwaitingAction(Trajectory),
    AwaitingEnvStep(Trajectory),
    Updated(Trajectory),
}

/// Temporal-difference learner driving the environment interaction loop.
///
/// Implementors supply `update_policy`; the episode loop, schedule handling
/// and reward bookkeeping are shared.
pub trait Trainer {
    type Policy: Policy;

    fn policy(&self) -> &Self::Policy;

    fn policy_mut(&mut self) -> &mut Self::Policy;

    /// Learns from one complete transition.
    fn update_policy(&mut self, experience: &Trajectory) -> Result<()>;

    /// Chooses the action for `state`. On-policy learners override this to
    /// execute the action they already committed to during the last update.
    fn select_action(&mut self, state: Trajectory) -> Result<Trajectory> {
        self.policy_mut().get_action(state)
    }

    fn on_episode_start(&mut self) {}

    fn schedulers(&self) -> &[Box<dyn ParameterScheduler>] {
        &[]
    }

    /// Episodes are cut after this many steps when set.
    fn max_steps_per_episode(&self) -> Option<usize> {
        None
    }

    /// Runs `num_episodes` episodes and returns the total reward of each.
    fn train<E: Environment>(&mut self, env: &mut E, num_episodes: usize) -> Result<Vec<f32>> {
        let mut all_rewards: Vec<f32> = Vec::with_capacity(num_episodes);
        for episode in 0..num_episodes {
            self.apply_schedules(episode)?;
            let reward = self.train_episode(env)?;
            info!(episode, total_reward = reward, "episode finished");
            all_rewards.push(reward);
        }
        Ok(all_rewards)
    }

    /// Sets every scheduled parameter to its value for `episode`.
    fn apply_schedules(&mut self, episode: usize) -> Result<()> {
        let values: Vec<(String, f64)> = self
            .schedulers()
            .iter()
            .map(|s| (s.parameter_name().to_string(), s.value_at(episode)))
            .collect();
        for (name, value) in values {
            debug!(episode, parameter = %name, value, "scheduled parameter update");
            self.policy_mut().set_parameter(&name, value)?;
        }
        Ok(())
    }

    /// Trains for one episode and returns its total reward, averaged over
    /// parallel environments.
    fn train_episode<E: Environment>(&mut self, env: &mut E) -> Result<f32> {
        let mut total_reward = 0.0;
        let mut steps = 0usize;
        let mut phase = Phase::EpisodeStart;

        loop {
            phase = match phase {
                Phase::EpisodeStart => {
                    self.on_episode_start();
                    Phase::AwaitingAction(env.reset()?)
                }
                Phase::AwaitingAction(state) => Phase::AwaitingEnvStep(self.select_action(state)?),
                Phase::AwaitingEnvStep(state) => {
                    let experience = env.step(state)?;
                    experience.validate()?;
                    self.update_policy(&experience)?;
                    Phase::Updated(experience)
                }
                Phase::Updated(experience) => {
                    let reward = experience.next()?.reward.mean(Kind::Float).double_value(&[]);
                    total_reward += reward as f32;
                    steps += 1;
                    let truncated = self.max_steps_per_episode().is_some_and(|max| steps >= max);
                    if experience.is_done()? || truncated {
                        break;
                    }
                    Phase::AwaitingAction(experience.step_mdp()?)
                }
            };
        }

        Ok(total_reward)
    }
}
