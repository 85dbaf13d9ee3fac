use serde::{Deserialize, Serialize};

use crate::error::{Result, RlError};
use crate::trajectory::Trajectory;

/// Lower or upper limit of a space: one value for every dimension, or one per dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Bound {
    Scalar(f64),
    PerDimension(Vec<f64>),
}

impl Bound {
    pub fn scalar(&self) -> Option<f64> {
        match self {
            Bound::Scalar(v) => Some(*v),
            Bound::PerDimension(_) => None,
        }
    }

    /// Expands the bound to `n` values, broadcasting scalars.
    pub fn expand(&self, n: usize) -> Result<Vec<f64>> {
        match self {
            Bound::Scalar(v) => Ok(vec![*v; n]),
            Bound::PerDimension(values) if values.len() == n => Ok(values.clone()),
            Bound::PerDimension(values) => Err(RlError::ShapeMismatch {
                field: "bound".to_string(),
                expected: vec![n as i64],
                actual: vec![values.len() as i64],
            }),
        }
    }
}

impl From<f64> for Bound {
    fn from(v: f64) -> Self {
        Bound::Scalar(v)
    }
}

impl From<Vec<f64>> for Bound {
    fn from(v: Vec<f64>) -> Self {
        Bound::PerDimension(v)
    }
}

/// Action and observation spaces of an environment.
///
/// Created once by the environment and never changed afterwards. Discrete
/// spaces are zero-indexed, so a discrete space with `max = 3` has 4 values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvParams {
    pub action_shape: Vec<usize>,
    pub action_continuous: bool,
    pub action_min: Bound,
    pub action_max: Bound,
    pub observation_shape: Vec<usize>,
    pub observation_continuous: bool,
    pub observation_min: Bound,
    pub observation_max: Bound,
}

impl EnvParams {
    /// Single discrete action and single discrete observation, both starting at 0.
    pub fn discrete(num_states: usize, num_actions: usize) -> Self {
        EnvParams {
            action_shape: vec![1],
            action_continuous: false,
            action_min: Bound::Scalar(0.0),
            action_max: Bound::Scalar(num_actions.saturating_sub(1) as f64),
            observation_shape: vec![1],
            observation_continuous: false,
            observation_min: Bound::Scalar(0.0),
            observation_max: Bound::Scalar(num_states.saturating_sub(1) as f64),
        }
    }

    pub fn action_size(&self) -> usize {
        self.action_shape.iter().product()
    }

    pub fn observation_size(&self) -> usize {
        self.observation_shape.iter().product()
    }

    /// Number of discrete actions (`action_max + 1`). Action indices start at
    /// 0, so a non-zero `action_min` is rejected.
    pub fn discrete_action_dim(&self) -> Result<usize> {
        if self.action_continuous {
            return Err(RlError::config("action space is continuous"));
        }
        discrete_dim(&self.action_min, &self.action_max, "action")
    }

    /// Number of discrete observations (`observation_max + 1`).
    pub fn discrete_observation_dim(&self) -> Result<usize> {
        if self.observation_continuous {
            return Err(RlError::config("observation space is continuous"));
        }
        discrete_dim(&self.observation_min, &self.observation_max, "observation")
    }

    /// Fails unless both spaces are discrete.
    pub fn require_discrete(&self, component: &str) -> Result<()> {
        if self.action_continuous {
            return Err(RlError::config(format!(
                "{component} only supports discrete action spaces"
            )));
        }
        if self.observation_continuous {
            return Err(RlError::config(format!(
                "{component} only supports discrete observation spaces"
            )));
        }
        Ok(())
    }
}

fn discrete_dim(min: &Bound, max: &Bound, space: &str) -> Result<usize> {
    match min.scalar() {
        Some(v) if v == 0.0 => {}
        Some(v) => {
            return Err(RlError::config(format!(
                "discrete {space} spaces must start at 0, got {space}_min = {v}"
            )));
        }
        None => {
            return Err(RlError::config(format!(
                "{space}_min must be a scalar for a discrete space"
            )));
        }
    }
    match max.scalar() {
        Some(v) if v.is_finite() && v >= 0.0 => (v as usize).checked_add(1).ok_or_else(|| {
            RlError::config(format!("{space}_max = {v} is too large for a discrete space"))
        }),
        Some(v) => Err(RlError::config(format!(
            "{space}_max must be finite and non-negative, got {v}"
        ))),
        None => Err(RlError::config(format!(
            "{space}_max must be a scalar for a discrete space"
        ))),
    }
}

/// Environment contract consumed by policies and trainers.
///
/// `reset` returns a record with only the observation populated; `step` takes a
/// record carrying an action and returns it with `next` filled in.
pub trait Environment {
    fn get_parameters(&self) -> EnvParams;

    fn reset(&mut self) -> Result<Trajectory>;

    fn step(&mut self, trajectory: Trajectory) -> Result<Trajectory>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discrete_dims_are_zero_indexed() {
        let params = EnvParams::discrete(3, 2);
        assert_eq!(params.discrete_observation_dim().unwrap(), 3);
        assert_eq!(params.discrete_action_dim().unwrap(), 2);
        assert!(params.require_discrete("QTable").is_ok());
    }

    #[test]
    fn continuous_spaces_are_rejected() {
        let mut params = EnvParams::discrete(3, 2);
        params.observation_continuous = true;
        let err = params.require_discrete("QTablePolicy").unwrap_err();
        assert!(err.to_string().contains("observation"));
    }

    #[test]
    fn discrete_spaces_must_start_at_zero() {
        let mut params = EnvParams::discrete(3, 4);
        params.action_min = Bound::Scalar(2.0);
        params.action_max = Bound::Scalar(3.0);
        assert!(matches!(params.discrete_action_dim(), Err(RlError::Configuration(_))));

        let mut params = EnvParams::discrete(3, 4);
        params.observation_min = Bound::Scalar(1.0);
        assert!(matches!(params.discrete_observation_dim(), Err(RlError::Configuration(_))));
    }

    #[test]
    fn unbounded_discrete_spaces_are_rejected() {
        let mut params = EnvParams::discrete(3, 2);
        params.action_max = Bound::Scalar(f64::INFINITY);
        assert!(matches!(params.discrete_action_dim(), Err(RlError::Configuration(_))));
        params.action_max = Bound::Scalar(f64::NAN);
        assert!(params.discrete_action_dim().is_err());
        params.action_max = Bound::Scalar(1e300);
        assert!(matches!(params.discrete_action_dim(), Err(RlError::Configuration(_))));
    }

    #[test]
    fn bounds_expand_and_round_trip() {
        assert_eq!(Bound::Scalar(1.5).expand(2).unwrap(), vec![1.5, 1.5]);
        assert!(Bound::PerDimension(vec![0.0]).expand(2).is_err());

        let json = serde_json::to_string(&Bound::PerDimension(vec![0.0, 2.0])).unwrap();
        assert_eq!(json, "[0.0,2.0]");
        let back: Bound = serde_json::from_str("3.0").unwrap();
        assert_eq!(back, Bound::Scalar(3.0));
    }
}
