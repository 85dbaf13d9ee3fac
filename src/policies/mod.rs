pub mod actor_critic;
pub mod interactive;
pub mod qnetwork;
pub mod qtable;
pub mod random;

pub use actor_critic::ActorCriticPolicy;
pub use interactive::{InputListener, InputSource, InteractivePolicy};
pub use qnetwork::QNetworkPolicy;
pub use qtable::QTablePolicy;
pub use random::RandomPolicy;

use crate::decision_functions::{DecisionFunction, EpsilonGreedy};
use crate::error::Result;
use crate::trajectory::Trajectory;
use crate::value_functions::ActionValueFunction;

const DEFAULT_EPSILON: f64 = 0.1;

fn default_decision_function() -> Result<Box<dyn DecisionFunction>> {
    Ok(Box::new(EpsilonGreedy::new(DEFAULT_EPSILON)?))
}

/// Value estimates for the state, fed through the decision function.
fn select_from_values(
    values: &dyn ActionValueFunction,
    decision_function: &dyn DecisionFunction,
    state: Trajectory,
) -> Result<Trajectory> {
    let action_values = values.action_values(&state.observation)?;
    let action = decision_function.select_actions(&action_values)?;
    Ok(state.with_action(action))
}
