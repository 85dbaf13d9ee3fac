use tch::{Device, Tensor};

use super::{default_decision_function, select_from_values};
use crate::decision_functions::DecisionFunction;
use crate::environment::EnvParams;
use crate::error::{Result, RlError};
use crate::policy::{Policy, PolicyRecord};
use crate::trajectory::Trajectory;
use crate::value_functions::QTable;

/// Tabular action values combined with a decision function.
///
/// Requires discrete action and observation spaces. When no table is given a
/// zero-initialised one without visit tracking is created; when no decision
/// function is given, epsilon-greedy with epsilon 0.1 is used.
pub struct QTablePolicy {
    env_params: EnvParams,
    num_envs: usize,
    decision_function: Box<dyn DecisionFunction>,
    q_table: QTable,
    device: Device,
}

impl QTablePolicy {
    pub fn new(
        env_params: EnvParams,
        num_envs: usize,
        decision_function: Option<Box<dyn DecisionFunction>>,
        q_table: Option<QTable>,
        device: Device,
    ) -> Result<Self> {
        env_params.require_discrete("QTablePolicy")?;
        let q_table = match q_table {
            Some(table) => {
                let args = table.init_args();
                if args.state_dim != env_params.discrete_observation_dim()?
                    || args.action_dim != env_params.discrete_action_dim()?
                    || args.batch_size != num_envs
                {
                    return Err(RlError::config(format!(
                        "q-table {args:?} does not match the environment with {num_envs} instances"
                    )));
                }
                table
            }
            None => QTable::from_env_params(&env_params, num_envs, 0.0, false, device)?,
        };
        let decision_function = match decision_function {
            Some(df) => df,
            None => default_decision_function()?,
        };
        Ok(QTablePolicy {
            env_params,
            num_envs,
            decision_function,
            q_table,
            device,
        })
    }

    pub fn get_action_values(&self, observation: &Tensor) -> Result<Tensor> {
        self.q_table.get_action_values(observation)
    }

    pub fn q_table(&self) -> &QTable {
        &self.q_table
    }

    pub fn q_table_mut(&mut self) -> &mut QTable {
        &mut self.q_table
    }

    pub fn decision_function(&self) -> &dyn DecisionFunction {
        self.decision_function.as_ref()
    }

    pub fn num_envs(&self) -> usize {
        self.num_envs
    }

    pub fn load_from_dict(record: PolicyRecord) -> Result<Self> {
        match record {
            PolicyRecord::QTablePolicy {
                env_params,
                num_envs,
                decision_function,
                q_table_init_args,
                q_table,
                device,
            } => {
                let device = Device::from(device);
                let table = QTable::from_blob(q_table_init_args, &q_table, device)?;
                QTablePolicy::new(
                    env_params,
                    num_envs,
                    Some(decision_function.build()?),
                    Some(table),
                    device,
                )
            }
            other => Err(other.mismatch("QTablePolicy")),
        }
    }
}

impl Policy for QTablePolicy {
    fn name(&self) -> &'static str {
        "QTablePolicy"
    }

    fn env_params(&self) -> &EnvParams {
        &self.env_params
    }

    fn get_action(&mut self, state: Trajectory) -> Result<Trajectory> {
        select_from_values(&self.q_table, self.decision_function.as_ref(), state)
    }

    fn set_parameter(&mut self, name: &str, value: f64) -> Result<()> {
        self.decision_function.set_parameter(name, value)
    }

    fn save_to_dict(&self) -> Result<PolicyRecord> {
        Ok(PolicyRecord::QTablePolicy {
            env_params: self.env_params.clone(),
            num_envs: self.num_envs,
            decision_function: self.decision_function.to_record(),
            q_table_init_args: self.q_table.init_args().clone(),
            q_table: self.q_table.to_blob()?,
            device: self.device.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision_functions::{DecisionFunctionRecord, Greedy};

    #[test]
    fn greedy_action_follows_the_table() {
        let params = EnvParams::discrete(3, 2);
        let mut policy =
            QTablePolicy::new(params, 1, Some(Box::new(Greedy)), None, Device::Cpu).unwrap();
        let state = Tensor::from_slice(&[2i64]).view([1, 1]);
        policy
            .q_table_mut()
            .update_q_value(&state, &Tensor::from_slice(&[1i64]), &Tensor::from_slice(&[1.0f32]))
            .unwrap();
        let action = policy.get_action(Trajectory::new(state)).unwrap();
        assert_eq!(action.action().unwrap().int64_value(&[0, 0]), 1);
    }

    #[test]
    fn continuous_spaces_are_configuration_errors() {
        let mut params = EnvParams::discrete(3, 2);
        params.action_continuous = true;
        assert!(matches!(
            QTablePolicy::new(params, 1, None, None, Device::Cpu),
            Err(RlError::Configuration(_))
        ));
    }

    #[test]
    fn set_parameter_forwards_to_the_decision_function() {
        let mut policy =
            QTablePolicy::new(EnvParams::discrete(2, 2), 1, None, None, Device::Cpu).unwrap();
        policy.set_parameter("epsilon", 0.5).unwrap();
        assert_eq!(
            policy.decision_function().to_record(),
            DecisionFunctionRecord::EpsilonGreedy { epsilon: 0.5 }
        );
        assert!(matches!(
            policy.set_parameter("alpha", 0.5),
            Err(RlError::InvalidParameter { name, .. }) if name == "alpha"
        ));
    }

    #[test]
    fn wrong_table_size_is_rejected() {
        let table = QTable::from_env_params(&EnvParams::discrete(4, 2), 1, 0.0, false, Device::Cpu)
            .unwrap();
        let result = QTablePolicy::new(EnvParams::discrete(3, 2), 1, None, Some(table), Device::Cpu);
        assert!(result.is_err());
    }

    #[test]
    fn offset_action_space_is_rejected() {
        let mut params = EnvParams::discrete(3, 4);
        params.action_min = crate::environment::Bound::Scalar(2.0);
        params.action_max = crate::environment::Bound::Scalar(3.0);
        assert!(matches!(
            QTablePolicy::new(params, 1, None, None, Device::Cpu),
            Err(RlError::Configuration(_))
        ));
    }
}
