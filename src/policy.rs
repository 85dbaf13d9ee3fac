use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::decision_functions::DecisionFunctionRecord;
use crate::distributions::DistributionKind;
use crate::environment::EnvParams;
use crate::error::{Result, RlError};
use crate::networks::MlpConfig;
use crate::policies::{ActorCriticPolicy, QNetworkPolicy, QTablePolicy, RandomPolicy};
use crate::trajectory::Trajectory;
use crate::utils::DeviceSpec;
use crate::value_functions::QTableArgs;

pub trait Policy {
    /// Short type name used in error messages.
    fn name(&self) -> &'static str;

    fn env_params(&self) -> &EnvParams;

    // 根据状态选择动作, 返回带有 action 的记录
    fn get_action(&mut self, state: Trajectory) -> Result<Trajectory>;

    /// Sets a tunable parameter by name. Policies without tunable parameters
    /// reject every name.
    fn set_parameter(&mut self, name: &str, _value: f64) -> Result<()> {
        Err(RlError::invalid_parameter(self.name(), name))
    }

    fn save_to_dict(&self) -> Result<PolicyRecord>;
}

/// Persisted policy artifact. The tag selects the concrete policy on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PolicyRecord {
    RandomPolicy {
        env_params: EnvParams,
    },
    QTablePolicy {
        env_params: EnvParams,
        num_envs: usize,
        decision_function: DecisionFunctionRecord,
        q_table_init_args: QTableArgs,
        /// Opaque blob with the value table and, if tracked, the visit table.
        q_table: Vec<u8>,
        device: DeviceSpec,
    },
    QNetworkPolicy {
        env_params: EnvParams,
        num_envs: usize,
        decision_function: DecisionFunctionRecord,
        q_network_init_args: MlpConfig,
        q_network: Vec<u8>,
        device: DeviceSpec,
    },
    ActorCriticPolicy {
        env_params: EnvParams,
        distribution: DistributionKind,
        actor_init_args: MlpConfig,
        actor: Vec<u8>,
        critic_init_args: MlpConfig,
        critic: Vec<u8>,
        device: DeviceSpec,
    },
}

impl PolicyRecord {
    pub fn type_name(&self) -> &'static str {
        match self {
            PolicyRecord::RandomPolicy { .. } => "RandomPolicy",
            PolicyRecord::QTablePolicy { .. } => "QTablePolicy",
            PolicyRecord::QNetworkPolicy { .. } => "QNetworkPolicy",
            PolicyRecord::ActorCriticPolicy { .. } => "ActorCriticPolicy",
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        PolicyRecord::from_json(&fs::read(path)?)
    }

    pub(crate) fn mismatch(&self, expected: &str) -> RlError {
        RlError::config(format!(
            "expected a {expected} record, found {}",
            self.type_name()
        ))
    }
}

/// Rebuilds whichever policy a record describes.
pub fn load_policy(record: PolicyRecord) -> Result<Box<dyn Policy>> {
    Ok(match record {
        PolicyRecord::RandomPolicy { .. } => Box::new(RandomPolicy::load_from_dict(record)?),
        PolicyRecord::QTablePolicy { .. } => Box::new(QTablePolicy::load_from_dict(record)?),
        PolicyRecord::QNetworkPolicy { .. } => Box::new(QNetworkPolicy::load_from_dict(record)?),
        PolicyRecord::ActorCriticPolicy { .. } => {
            Box::new(ActorCriticPolicy::load_from_dict(record)?)
        }
    })
}
