//! Typed trajectory record exchanged between policies, environments and learners.
//!
//! Every tensor leaf carries the number of parallel environments as its leading
//! dimension, and all leaves of one record agree on it.

use serde_json::Value;
use tch::{Kind, Tensor};

use crate::error::{Result, RlError};

/// Outcome of applying an action: what the environment returned.
pub struct NextStep {
    pub observation: Tensor,
    pub reward: Tensor,
    pub done: Tensor,
    pub info: Value,
}

impl NextStep {
    pub fn new(observation: Tensor, reward: Tensor, done: Tensor) -> Self {
        NextStep {
            observation,
            reward,
            done,
            info: Value::Null,
        }
    }

    pub fn with_info(mut self, info: Value) -> Self {
        self.info = info;
        self
    }
}

impl Clone for NextStep {
    fn clone(&self) -> Self {
        NextStep {
            observation: self.observation.copy(),
            reward: self.reward.copy(),
            done: self.done.copy(),
            info: self.info.clone(),
        }
    }
}

/// One step of experience: `{observation, action, next: {observation, reward, done, info}}`.
pub struct Trajectory {
    pub observation: Tensor,
    pub action: Option<Tensor>,
    pub next: Option<NextStep>,
}

impl Clone for Trajectory {
    fn clone(&self) -> Self {
        Trajectory {
            observation: self.observation.copy(),
            action: self.action.as_ref().map(Tensor::copy),
            next: self.next.clone(),
        }
    }
}

impl Trajectory {
    pub fn new(observation: Tensor) -> Self {
        Trajectory {
            observation,
            action: None,
            next: None,
        }
    }

    pub fn with_action(mut self, action: Tensor) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_next(mut self, next: NextStep) -> Self {
        self.next = Some(next);
        self
    }

    /// Number of parallel environments in this record.
    pub fn batch_size(&self) -> i64 {
        self.observation.size().first().copied().unwrap_or(0)
    }

    pub fn action(&self) -> Result<&Tensor> {
        self.action.as_ref().ok_or(RlError::MissingField("action"))
    }

    pub fn next(&self) -> Result<&NextStep> {
        self.next.as_ref().ok_or(RlError::MissingField("next"))
    }

    /// Checks that every populated leaf has the same leading dimension.
    pub fn validate(&self) -> Result<()> {
        let n = leading_dim("observation", &self.observation)?;
        let mut leaves: Vec<(&str, &Tensor)> = Vec::with_capacity(5);
        if let Some(action) = &self.action {
            leaves.push(("action", action));
        }
        if let Some(next) = &self.next {
            leaves.push(("next.observation", &next.observation));
            leaves.push(("next.reward", &next.reward));
            leaves.push(("next.done", &next.done));
        }
        for (field, leaf) in leaves {
            let m = leading_dim(field, leaf)?;
            if m != n {
                return Err(RlError::ShapeMismatch {
                    field: field.to_string(),
                    expected: vec![n],
                    actual: leaf.size(),
                });
            }
        }
        Ok(())
    }

    /// True when any environment in the batch reported termination.
    pub fn is_done(&self) -> Result<bool> {
        let done = &self.next()?.done;
        Ok(done.to_kind(Kind::Int64).sum(Kind::Int64).int64_value(&[]) > 0)
    }

    /// Advances the record: the next observation becomes the current one.
    pub fn step_mdp(self) -> Result<Trajectory> {
        let next = self.next.ok_or(RlError::MissingField("next"))?;
        Ok(Trajectory::new(next.observation))
    }

    /// Splits a complete transition into one record per environment.
    pub fn split(&self) -> Result<Vec<Trajectory>> {
        self.validate()?;
        let action = self.action()?;
        let next = self.next()?;
        let rows = (0..self.batch_size())
            .map(|i| {
                Trajectory::new(self.observation.narrow(0, i, 1).copy())
                    .with_action(action.narrow(0, i, 1).copy())
                    .with_next(
                        NextStep::new(
                            next.observation.narrow(0, i, 1).copy(),
                            next.reward.narrow(0, i, 1).copy(),
                            next.done.narrow(0, i, 1).copy(),
                        )
                        .with_info(next.info.clone()),
                    )
            })
            .collect();
        Ok(rows)
    }

    /// Concatenates complete transitions along the batch dimension.
    pub fn stack(records: &[Trajectory]) -> Result<Trajectory> {
        if records.is_empty() {
            return Err(RlError::InsufficientData {
                requested: 1,
                available: 0,
            });
        }
        let mut observations = Vec::with_capacity(records.len());
        let mut actions = Vec::with_capacity(records.len());
        let mut next_observations = Vec::with_capacity(records.len());
        let mut rewards = Vec::with_capacity(records.len());
        let mut dones = Vec::with_capacity(records.len());
        let mut infos = Vec::with_capacity(records.len());
        for record in records {
            record.validate()?;
            let next = record.next()?;
            observations.push(&record.observation);
            actions.push(record.action()?);
            next_observations.push(&next.observation);
            rewards.push(&next.reward);
            dones.push(&next.done);
            infos.push(next.info.clone());
        }
        let stacked = Trajectory::new(Tensor::f_cat(&observations, 0)?)
            .with_action(Tensor::f_cat(&actions, 0)?)
            .with_next(
                NextStep::new(
                    Tensor::f_cat(&next_observations, 0)?,
                    Tensor::f_cat(&rewards, 0)?,
                    Tensor::f_cat(&dones, 0)?,
                )
                .with_info(Value::Array(infos)),
            );
        Ok(stacked)
    }
}

fn leading_dim(field: &str, leaf: &Tensor) -> Result<i64> {
    leaf.size().first().copied().ok_or_else(|| RlError::ShapeMismatch {
        field: field.to_string(),
        expected: vec![-1],
        actual: leaf.size(),
    })
}
