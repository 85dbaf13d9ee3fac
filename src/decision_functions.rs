//! Decision functions turn per-action value estimates into a chosen action.

use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use rand::seq::IndexedRandom;
use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use tch::Tensor;

use crate::error::{Result, RlError};
use crate::utils::tensor_rows;

pub trait DecisionFunction: Send {
    /// Picks an action index from a vector of per-action scores.
    fn select_action(&self, values: &[f64]) -> Result<usize>;

    fn set_parameter(&mut self, name: &str, value: f64) -> Result<()>;

    /// Type tag plus parameter values, enough to rebuild an equivalent instance.
    fn to_record(&self) -> DecisionFunctionRecord;

    /// Row-wise selection over a `[N, A]` value tensor, returning `[N, 1]` int64 actions.
    fn select_actions(&self, values: &Tensor) -> Result<Tensor> {
        let actions = tensor_rows(values)?
            .iter()
            .map(|row| self.select_action(row).map(|a| a as i64))
            .collect::<Result<Vec<i64>>>()?;
        Ok(Tensor::from_slice(&actions).view([-1, 1]))
    }
}

/// Persisted form of a decision function. The variants are the closed set of
/// decision functions that can be rebuilt from an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DecisionFunctionRecord {
    Greedy,
    EpsilonGreedy { epsilon: f64 },
    Softmax { tau: f64 },
}

impl DecisionFunctionRecord {
    pub fn build(&self) -> Result<Box<dyn DecisionFunction>> {
        Ok(match *self {
            DecisionFunctionRecord::Greedy => Box::new(Greedy),
            DecisionFunctionRecord::EpsilonGreedy { epsilon } => {
                Box::new(EpsilonGreedy::new(epsilon)?)
            }
            DecisionFunctionRecord::Softmax { tau } => Box::new(Softmax::new(tau)?),
        })
    }
}

/// Always exploits; ties are broken uniformly at random.
#[derive(Debug, Clone, Copy, Default)]
pub struct Greedy;

impl DecisionFunction for Greedy {
    fn select_action(&self, values: &[f64]) -> Result<usize> {
        argmax_random_tie(values)
    }

    fn set_parameter(&mut self, name: &str, _value: f64) -> Result<()> {
        Err(RlError::invalid_parameter("Greedy", name))
    }

    fn to_record(&self) -> DecisionFunctionRecord {
        DecisionFunctionRecord::Greedy
    }
}

/// Greedy with probability `1 - epsilon`, otherwise uniform over all actions
/// (the greedy action included).
#[derive(Debug, Clone)]
pub struct EpsilonGreedy {
    epsilon: f64,
}

impl EpsilonGreedy {
    pub fn new(epsilon: f64) -> Result<Self> {
        check_probability(epsilon)?;
        Ok(EpsilonGreedy { epsilon })
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }
}

impl DecisionFunction for EpsilonGreedy {
    fn select_action(&self, values: &[f64]) -> Result<usize> {
        let greedy = argmax_random_tie(values)?;
        let mut rng = rng();
        if rng.random::<f64>() < self.epsilon {
            Ok(rng.random_range(0..values.len()))
        } else {
            Ok(greedy)
        }
    }

    fn set_parameter(&mut self, name: &str, value: f64) -> Result<()> {
        match name {
            "epsilon" => {
                check_probability(value)?;
                self.epsilon = value;
                Ok(())
            }
            _ => Err(RlError::invalid_parameter("EpsilonGreedy", name)),
        }
    }

    fn to_record(&self) -> DecisionFunctionRecord {
        DecisionFunctionRecord::EpsilonGreedy {
            epsilon: self.epsilon,
        }
    }
}

/// Boltzmann exploration: samples actions with probability proportional to `exp(v / tau)`.
#[derive(Debug, Clone)]
pub struct Softmax {
    tau: f64,
}

impl Softmax {
    pub fn new(tau: f64) -> Result<Self> {
        check_temperature(tau)?;
        Ok(Softmax { tau })
    }
}

impl DecisionFunction for Softmax {
    fn select_action(&self, values: &[f64]) -> Result<usize> {
        let max = values
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        if !max.is_finite() {
            return Err(empty_values());
        }
        // 减去最大值避免 exp 溢出
        let weights: Vec<f64> = values.iter().map(|v| ((v - max) / self.tau).exp()).collect();
        let dist = WeightedIndex::new(&weights)
            .map_err(|e| RlError::config(format!("softmax weights: {e}")))?;
        Ok(dist.sample(&mut rng()))
    }

    fn set_parameter(&mut self, name: &str, value: f64) -> Result<()> {
        match name {
            "tau" => {
                check_temperature(value)?;
                self.tau = value;
                Ok(())
            }
            _ => Err(RlError::invalid_parameter("Softmax", name)),
        }
    }

    fn to_record(&self) -> DecisionFunctionRecord {
        DecisionFunctionRecord::Softmax { tau: self.tau }
    }
}

fn argmax_random_tie(values: &[f64]) -> Result<usize> {
    let max = values
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    let maximizers: Vec<usize> = values
        .iter()
        .enumerate()
        .filter(|(_, v)| **v == max)
        .map(|(i, _)| i)
        .collect();
    maximizers.choose(&mut rng()).copied().ok_or_else(empty_values)
}

fn empty_values() -> RlError {
    RlError::ShapeMismatch {
        field: "values".to_string(),
        expected: vec![-1],
        actual: vec![0],
    }
}

fn check_probability(epsilon: f64) -> Result<()> {
    if (0.0..=1.0).contains(&epsilon) {
        Ok(())
    } else {
        Err(RlError::config(format!("epsilon must be in [0, 1], got {epsilon}")))
    }
}

fn check_temperature(tau: f64) -> Result<()> {
    if tau > 0.0 {
        Ok(())
    } else {
        Err(RlError::config(format!("tau must be positive, got {tau}")))
    }
}
