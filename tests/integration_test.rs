mod common;

use anyhow::Result;
use approx::assert_relative_eq;
use common::{Chain, init_tracing};
use tch::{Device, Kind, Tensor};
use tdrl::algorithms::{A2c, A2cConfig, Dqn, DqnConfig, QLearning, Sarsa, TabularConfig};
use tdrl::decision_functions::{DecisionFunction, EpsilonGreedy, Greedy, Softmax};
use tdrl::policies::{QTablePolicy, RandomPolicy};
use tdrl::schedulers::LinearScheduler;
use tdrl::{Environment, Policy, PolicyRecord, RlError, Trainer, Trajectory, load_policy};

#[test]
fn sarsa_learns_the_chain() -> Result<()> {
    init_tracing();
    let mut env = Chain::new(4, 1);
    let mut trainer = Sarsa::new(
        env.get_parameters(),
        1,
        Some(Box::new(EpsilonGreedy::new(0.2)?)),
        TabularConfig::new(0.5, 0.9),
    )?;
    let rewards = trainer.train(&mut env, 60)?;
    assert_eq!(rewards.len(), 60);
    assert!(rewards.iter().all(|r| (0.0..=1.0).contains(r)));

    // 最右端之前的状态, 向右的价值应当更高
    let values = trainer
        .policy()
        .get_action_values(&Tensor::from_slice(&[2i64]).view([1, 1]))?;
    assert!(values.double_value(&[0, 1]) > values.double_value(&[0, 0]));
    Ok(())
}

#[test]
fn qlearning_with_parallel_environments() -> Result<()> {
    init_tracing();
    let mut env = Chain::new(5, 3);
    let mut trainer = QLearning::new(
        env.get_parameters(),
        3,
        Some(Box::new(EpsilonGreedy::new(0.3)?)),
        TabularConfig::new(0.5, 0.9),
    )?;
    trainer.train(&mut env, 40)?;
    let table = trainer.policy().q_table().table();
    assert_eq!(table.size(), vec![3, 5, 2]);
    assert!(table.abs().sum(Kind::Float).double_value(&[]) > 0.0);
    Ok(())
}

#[test]
fn epsilon_schedule_is_applied_per_episode() -> Result<()> {
    let mut env = Chain::new(3, 1);
    let mut trainer = Sarsa::new(env.get_parameters(), 1, None, TabularConfig::default())?
        .with_scheduler(LinearScheduler::new("epsilon", 1.0, 0.0, 4));
    trainer.train(&mut env, 3)?;
    // 第 2 个 episode 开始时 epsilon = 1.0 - 2/4
    let record = trainer.policy().save_to_dict()?;
    let PolicyRecord::QTablePolicy { decision_function, .. } = record else {
        panic!("unexpected record");
    };
    assert_eq!(
        decision_function,
        tdrl::decision_functions::DecisionFunctionRecord::EpsilonGreedy { epsilon: 0.5 }
    );
    Ok(())
}

#[test]
fn schedule_for_an_unknown_parameter_fails() -> Result<()> {
    let mut env = Chain::new(3, 1);
    let mut trainer = Sarsa::new(env.get_parameters(), 1, Some(Box::new(Greedy)), TabularConfig::default())?
        .with_scheduler(LinearScheduler::new("epsilon", 1.0, 0.0, 4));
    let err = trainer.train(&mut env, 1).unwrap_err();
    assert!(matches!(err, RlError::InvalidParameter { ref name, .. } if name == "epsilon"));
    Ok(())
}

#[test]
fn dqn_trains_on_the_chain() -> Result<()> {
    init_tracing();
    let mut env = Chain::new(4, 2);
    let config = DqnConfig {
        min_buffer_size: 16,
        mini_batch_size: 8,
        target_update_steps: 5,
        hidden_dims: vec![16],
        max_steps_per_episode: Some(30),
        ..DqnConfig::default()
    };
    let mut trainer = Dqn::new(
        env.get_parameters(),
        2,
        Some(Box::new(EpsilonGreedy::new(0.5)?)),
        config,
        Device::Cpu,
    )?;
    let rewards = trainer.train(&mut env, 10)?;
    assert_eq!(rewards.len(), 10);
    assert!(trainer.replay_buffer().size() >= 16);
    assert!(trainer.update_count() > 0);
    Ok(())
}

#[test]
fn a2c_trains_on_the_chain() -> Result<()> {
    let mut env = Chain::new(4, 1);
    let config = A2cConfig {
        hidden_dims: vec![16],
        max_steps_per_episode: Some(30),
        ..A2cConfig::default()
    };
    let mut trainer = A2c::new(env.get_parameters(), None, config, Device::Cpu)?;
    let rewards = trainer.train(&mut env, 5)?;
    assert_eq!(rewards.len(), 5);
    Ok(())
}

#[test]
fn qtable_policy_artifact_is_bit_identical() -> Result<()> {
    let mut env = Chain::new(4, 1);
    let mut trainer = QLearning::new(
        env.get_parameters(),
        1,
        Some(Box::new(Softmax::new(0.5)?)),
        TabularConfig::default(),
    )?;
    trainer.train(&mut env, 5)?;
    let policy = trainer.into_policy();

    let path = std::env::temp_dir().join(format!("tdrl-qtable-{}.json", std::process::id()));
    policy.save_to_dict()?.save(&path)?;
    let loaded = QTablePolicy::load_from_dict(PolicyRecord::load(&path)?)?;
    std::fs::remove_file(&path)?;

    assert!(policy.q_table().table().equal(loaded.q_table().table()));
    assert_eq!(policy.q_table().init_args(), loaded.q_table().init_args());
    assert_eq!(
        policy.decision_function().to_record(),
        loaded.decision_function().to_record()
    );
    Ok(())
}

#[test]
fn registry_rebuilds_policies_by_tag() -> Result<()> {
    let params = Chain::new(4, 1).get_parameters();
    let random = RandomPolicy::new(params.clone());
    let table = QTablePolicy::new(params, 1, None, None, Device::Cpu)?;

    let mut loaded = load_policy(PolicyRecord::from_json(&random.save_to_dict()?.to_json()?)?)?;
    assert_eq!(loaded.name(), "RandomPolicy");
    let state = loaded.get_action(Trajectory::new(Tensor::from_slice(&[0i64]).view([1, 1])))?;
    let action = state.action()?.int64_value(&[0, 0]);
    assert!((0..2).contains(&action));

    let mut loaded = load_policy(table.save_to_dict()?)?;
    assert_eq!(loaded.name(), "QTablePolicy");
    loaded.set_parameter("epsilon", 0.0)?;
    assert!(loaded.set_parameter("temperature", 1.0).is_err());
    Ok(())
}

#[test]
fn wrong_record_type_is_rejected() -> Result<()> {
    let params = Chain::new(4, 1).get_parameters();
    let record = RandomPolicy::new(params).save_to_dict()?;
    assert!(QTablePolicy::load_from_dict(record).is_err());
    Ok(())
}

#[test]
fn single_sarsa_step_matches_the_update_rule() -> Result<()> {
    let mut env = Chain::new(3, 1);
    let mut trainer = Sarsa::new(
        env.get_parameters(),
        1,
        Some(Box::new(Greedy)),
        TabularConfig::new(0.1, 0.9),
    )?;
    let state = env.reset()?.with_action(Tensor::from_slice(&[1i64]).view([1, 1]));
    let experience = env.step(state)?;
    trainer.update_policy(&experience)?;
    // r = 0 在中间状态, 所以 Q 保持 0
    assert_relative_eq!(trainer.policy().q_table().table().double_value(&[0, 0, 1]), 0.0);

    let state = experience.step_mdp()?.with_action(Tensor::from_slice(&[1i64]).view([1, 1]));
    let experience = env.step(state)?;
    trainer.update_policy(&experience)?;
    assert_relative_eq!(
        trainer.policy().q_table().table().double_value(&[0, 1, 1]),
        0.1,
        epsilon = 1e-6
    );
    Ok(())
}
