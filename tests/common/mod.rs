#![allow(dead_code)]

use tch::Tensor;
use tdrl::{EnvParams, Environment, NextStep, Result, Trajectory};

/// 一维链式环境: 动作 1 向右, 动作 0 向左, 到达最右端得到奖励 1 并结束
pub struct Chain {
    pub length: usize,
    pub step_limit: usize,
    pub step_count: usize,
    positions: Vec<i64>,
}

impl Chain {
    pub fn new(length: usize, num_envs: usize) -> Self {
        Self {
            length,
            step_limit: 50,
            step_count: 0,
            positions: vec![0; num_envs],
        }
    }

    fn observation(&self) -> Tensor {
        Tensor::from_slice(&self.positions).view([-1, 1])
    }
}

impl Environment for Chain {
    fn get_parameters(&self) -> EnvParams {
        EnvParams::discrete(self.length, 2)
    }

    fn reset(&mut self) -> Result<Trajectory> {
        self.positions.iter_mut().for_each(|p| *p = 0);
        self.step_count = 0;
        Ok(Trajectory::new(self.observation()))
    }

    fn step(&mut self, state: Trajectory) -> Result<Trajectory> {
        let actions: Vec<i64> = Vec::<i64>::try_from(&state.action()?.view([-1]))?;
        self.step_count += 1;
        let last = self.length as i64 - 1;
        let mut rewards = Vec::with_capacity(actions.len());
        let mut dones = Vec::with_capacity(actions.len());
        for (pos, action) in self.positions.iter_mut().zip(&actions) {
            *pos = if *action == 1 { (*pos + 1).min(last) } else { (*pos - 1).max(0) };
            rewards.push(if *pos == last { 1.0f32 } else { 0.0 });
            dones.push(*pos == last || self.step_count >= self.step_limit);
        }
        let next = NextStep::new(
            self.observation(),
            Tensor::from_slice(&rewards).view([-1, 1]),
            Tensor::from_slice(&dones).view([-1, 1]),
        );
        Ok(state.with_next(next))
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
