use tch::{Device, Kind, Tensor};

use crate::environment::EnvParams;
use crate::error::Result;
use crate::policy::{Policy, PolicyRecord};
use crate::trajectory::Trajectory;

/// Samples actions uniformly within `[action_min, action_max]`.
pub struct RandomPolicy {
    env_params: EnvParams,
}

impl RandomPolicy {
    pub fn new(env_params: EnvParams) -> Self {
        RandomPolicy { env_params }
    }

    pub fn load_from_dict(record: PolicyRecord) -> Result<Self> {
        match record {
            PolicyRecord::RandomPolicy { env_params } => Ok(RandomPolicy::new(env_params)),
            other => Err(other.mismatch("RandomPolicy")),
        }
    }
}

impl Policy for RandomPolicy {
    fn name(&self) -> &'static str {
        "RandomPolicy"
    }

    fn env_params(&self) -> &EnvParams {
        &self.env_params
    }

    fn get_action(&mut self, state: Trajectory) -> Result<Trajectory> {
        let n = state.batch_size();
        let dims = self.env_params.action_size();
        let options = (Kind::Double, Device::Cpu);
        let min = Tensor::from_slice(&self.env_params.action_min.expand(dims)?).unsqueeze(0);
        let max = Tensor::from_slice(&self.env_params.action_max.expand(dims)?).unsqueeze(0);
        let u = Tensor::rand([n, dims as i64], options);

        let action = if self.env_params.action_continuous {
            (u * (&max - &min) + &min).to_kind(Kind::Float)
        } else {
            // 整数动作区间为 [min, max], 包含 max
            (u * (&max - &min + 1.0) + &min)
                .floor()
                .minimum(&max)
                .to_kind(Kind::Int64)
        };
        Ok(state.with_action(action))
    }

    fn save_to_dict(&self) -> Result<PolicyRecord> {
        Ok(PolicyRecord::RandomPolicy {
            env_params: self.env_params.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Bound;

    fn obs(n: i64) -> Trajectory {
        Trajectory::new(Tensor::zeros([n, 1], (Kind::Int64, Device::Cpu)))
    }

    #[test]
    fn discrete_actions_cover_the_inclusive_range() {
        let mut policy = RandomPolicy::new(EnvParams::discrete(1, 3));
        let mut seen = [false; 3];
        for _ in 0..200 {
            let action = policy.get_action(obs(4)).unwrap();
            let action = action.action().unwrap();
            assert_eq!(action.size(), vec![4, 1]);
            for i in 0..4 {
                let a = action.int64_value(&[i, 0]);
                assert!((0..3).contains(&a));
                seen[a as usize] = true;
            }
        }
        assert_eq!(seen, [true; 3]);
    }

    #[test]
    fn continuous_actions_respect_per_dimension_bounds() {
        let params = EnvParams {
            action_shape: vec![2],
            action_continuous: true,
            action_min: Bound::PerDimension(vec![-1.0, 10.0]),
            action_max: Bound::PerDimension(vec![1.0, 20.0]),
            observation_shape: vec![1],
            observation_continuous: true,
            observation_min: Bound::Scalar(0.0),
            observation_max: Bound::Scalar(1.0),
        };
        let mut policy = RandomPolicy::new(params);
        let action = policy.get_action(obs(64)).unwrap();
        let action = action.action().unwrap();
        assert_eq!(action.size(), vec![64, 2]);
        for i in 0..64 {
            let a0 = action.double_value(&[i, 0]);
            let a1 = action.double_value(&[i, 1]);
            assert!((-1.0..=1.0).contains(&a0));
            assert!((10.0..=20.0).contains(&a1));
        }
    }

    #[test]
    fn unknown_parameters_are_rejected() {
        let mut policy = RandomPolicy::new(EnvParams::discrete(1, 2));
        let err = policy.set_parameter("epsilon", 0.1).unwrap_err();
        assert!(err.to_string().contains("epsilon"));
        assert!(err.to_string().contains("RandomPolicy"));
    }
}
