use serde::{Deserialize, Serialize};
use tch::{Device, Kind, Tensor};

use super::ActionValueFunction;
use crate::environment::EnvParams;
use crate::error::{Result, RlError};
use crate::utils::{tensor_from_blob, tensor_indices, tensors_to_blob};

/// Constructor arguments of a [`QTable`], kept so a saved table can be rebuilt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QTableArgs {
    pub state_dim: usize,
    pub action_dim: usize,
    /// One table per parallel environment.
    pub batch_size: usize,
    pub initial_value: f64,
    pub track_visits: bool,
}

/// Dense action-value table indexed `[batch, state, action]`.
pub struct QTable {
    args: QTableArgs,
    q_table: Tensor,
    visit_table: Option<Tensor>,
    device: Device,
}

impl QTable {
    pub fn new(args: QTableArgs, device: Device) -> Result<Self> {
        if args.state_dim == 0 || args.action_dim == 0 || args.batch_size == 0 {
            return Err(RlError::config(format!(
                "q-table dimensions must be positive, got {args:?}"
            )));
        }
        let shape = [
            args.batch_size as i64,
            args.state_dim as i64,
            args.action_dim as i64,
        ];
        let q_table = Tensor::full(shape, args.initial_value, (Kind::Float, device));
        let visit_table = args
            .track_visits
            .then(|| Tensor::zeros(shape, (Kind::Int64, device)));
        Ok(QTable {
            args,
            q_table,
            visit_table,
            device,
        })
    }

    /// Sizes the table from discrete spaces; continuous spaces are rejected.
    pub fn from_env_params(
        env_params: &EnvParams,
        batch_size: usize,
        initial_value: f64,
        track_visits: bool,
        device: Device,
    ) -> Result<Self> {
        env_params.require_discrete("QTable")?;
        let args = QTableArgs {
            state_dim: env_params.discrete_observation_dim()?,
            action_dim: env_params.discrete_action_dim()?,
            batch_size,
            initial_value,
            track_visits,
        };
        QTable::new(args, device)
    }

    pub fn init_args(&self) -> &QTableArgs {
        &self.args
    }

    pub fn table(&self) -> &Tensor {
        &self.q_table
    }

    pub fn visit_table(&self) -> Option<&Tensor> {
        self.visit_table.as_ref()
    }

    /// `[N, action_dim]` values for the states in a `[N, 1]` index tensor.
    pub fn get_action_values(&self, state: &Tensor) -> Result<Tensor> {
        let (batch, state) = self.state_index(state)?;
        Ok(self.q_table.index(&[Some(&batch), Some(&state)]))
    }

    /// `[N, 1]` values of the given state-action pairs.
    pub fn get_state_action_value(&self, state: &Tensor, action: &Tensor) -> Result<Tensor> {
        let (batch, state) = self.state_index(state)?;
        let action = self.action_index(action)?;
        Ok(self
            .q_table
            .index(&[Some(&batch), Some(&state), Some(&action)])
            .view([-1, 1]))
    }

    /// Overwrites the estimates of the given state-action pairs with `value`.
    pub fn update_q_value(&mut self, state: &Tensor, action: &Tensor, value: &Tensor) -> Result<()> {
        let (batch, state) = self.state_index(state)?;
        let action = self.action_index(action)?;
        let n = batch.size()[0];
        let value = value.to_kind(Kind::Float).to_device(self.device).view([-1]);
        if value.size()[0] != n {
            return Err(RlError::ShapeMismatch {
                field: "value".to_string(),
                expected: vec![n],
                actual: value.size(),
            });
        }
        let indices = [Some(&batch), Some(&state), Some(&action)];
        let _ = self.q_table.index_put_(&indices, &value, false);
        if let Some(visits) = self.visit_table.as_mut() {
            let ones = Tensor::ones([n], (Kind::Int64, self.device));
            let _ = visits.index_put_(&indices, &ones, true);
        }
        Ok(())
    }

    /// `[N, 1]` visit counts, or `None` when visits are not tracked.
    pub fn get_visit_count(&self, state: &Tensor, action: &Tensor) -> Result<Option<Tensor>> {
        let Some(visits) = &self.visit_table else {
            return Ok(None);
        };
        let (batch, state) = self.state_index(state)?;
        let action = self.action_index(action)?;
        Ok(Some(
            visits
                .index(&[Some(&batch), Some(&state), Some(&action)])
                .view([-1, 1]),
        ))
    }

    /// Opaque blob with the value table and, when tracked, the visit table.
    pub fn to_blob(&self) -> Result<Vec<u8>> {
        match &self.visit_table {
            Some(visits) => tensors_to_blob(&[("q_table", &self.q_table), ("visit_table", visits)]),
            None => tensors_to_blob(&[("q_table", &self.q_table)]),
        }
    }

    pub fn from_blob(args: QTableArgs, blob: &[u8], device: Device) -> Result<Self> {
        let mut table = QTable::new(args, device)?;
        let q_table = tensor_from_blob(blob, "q_table")?.to_device(device);
        if q_table.size() != table.q_table.size() {
            return Err(RlError::ShapeMismatch {
                field: "q_table".to_string(),
                expected: table.q_table.size(),
                actual: q_table.size(),
            });
        }
        table.q_table = q_table;
        if let Some(expected) = table.visit_table.as_ref().map(Tensor::size) {
            let visits = tensor_from_blob(blob, "visit_table")?.to_device(device);
            if visits.size() != expected {
                return Err(RlError::ShapeMismatch {
                    field: "visit_table".to_string(),
                    expected,
                    actual: visits.size(),
                });
            }
            table.visit_table = Some(visits.to_kind(Kind::Int64));
        }
        Ok(table)
    }

    fn state_index(&self, state: &Tensor) -> Result<(Tensor, Tensor)> {
        let states = tensor_indices(state)?;
        let n = states.len() as i64;
        if n != self.args.batch_size as i64 {
            return Err(RlError::ShapeMismatch {
                field: "observation".to_string(),
                expected: vec![self.args.batch_size as i64, 1],
                actual: state.size(),
            });
        }
        check_range("state", &states, self.args.state_dim as i64)?;
        let batch = Tensor::arange(n, (Kind::Int64, self.device));
        Ok((batch, Tensor::from_slice(&states).to_device(self.device)))
    }

    fn action_index(&self, action: &Tensor) -> Result<Tensor> {
        let actions = tensor_indices(action)?;
        if actions.len() != self.args.batch_size {
            return Err(RlError::ShapeMismatch {
                field: "action".to_string(),
                expected: vec![self.args.batch_size as i64, 1],
                actual: action.size(),
            });
        }
        check_range("action", &actions, self.args.action_dim as i64)?;
        Ok(Tensor::from_slice(&actions).to_device(self.device))
    }
}

impl ActionValueFunction for QTable {
    fn action_values(&self, observation: &Tensor) -> Result<Tensor> {
        self.get_action_values(observation)
    }
}

fn check_range(what: &'static str, indices: &[i64], bound: i64) -> Result<()> {
    match indices.iter().find(|i| !(0..bound).contains(*i)) {
        Some(&index) => Err(RlError::IndexOutOfRange { what, index, bound }),
        None => Ok(()),
    }
}
