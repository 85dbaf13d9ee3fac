//! Policies driven by a human-input backend running on its own thread.
//!
//! The listener pushes the most recent sample into a single-slot channel; the
//! policy reads it without blocking and falls back to a default action when
//! nothing new has arrived since the previous step.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tch::Tensor;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::environment::EnvParams;
use crate::error::{Result, RlError};
use crate::policy::{Policy, PolicyRecord};
use crate::trajectory::Trajectory;

/// A device or other producer of action samples.
///
/// Each sample is consumed once: after the policy has read it, later steps use
/// the default action until a new sample arrives. A device whose value should
/// persist between events (a held stick or trigger) must re-emit its current
/// value on every poll.
pub trait InputSource: Send + 'static {
    /// Called once before the listener starts; report a missing backend or
    /// device here.
    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    /// Latest action sample, or `None` when there is no new input. Returning
    /// `None` makes the policy fall back to its default action.
    fn poll(&mut self) -> Result<Option<Vec<f64>>>;
}

/// Background thread forwarding samples from an [`InputSource`].
///
/// The thread is never joined; `stop` marks it non-running and it exits at its
/// next poll.
pub struct InputListener {
    running: Arc<AtomicBool>,
}

impl InputListener {
    pub fn spawn<S: InputSource>(
        mut source: S,
        poll_interval: Duration,
    ) -> Result<(Self, watch::Receiver<Option<Vec<f64>>>)> {
        source.connect()?;
        let (tx, rx) = watch::channel(None);
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        thread::Builder::new()
            .name("input-listener".to_string())
            .spawn(move || {
                while flag.load(Ordering::Relaxed) {
                    match source.poll() {
                        Ok(Some(sample)) => {
                            // 没有接收者时退出
                            if tx.send(Some(sample)).is_err() {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            warn!(error = %e, "input source failed, stopping listener");
                            break;
                        }
                    }
                    thread::sleep(poll_interval);
                }
                flag.store(false, Ordering::Relaxed);
                debug!("input listener exited");
            })?;
        Ok((InputListener { running }, rx))
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

/// Non-blocking policy reading the latest input sample.
///
/// Only a single environment instance is supported.
pub struct InteractivePolicy {
    env_params: EnvParams,
    receiver: watch::Receiver<Option<Vec<f64>>>,
    listener: InputListener,
    default_action: Vec<f64>,
}

impl InteractivePolicy {
    pub fn new<S: InputSource>(
        env_params: EnvParams,
        source: S,
        default_action: Vec<f64>,
        poll_interval: Duration,
    ) -> Result<Self> {
        if default_action.len() != env_params.action_size() {
            return Err(RlError::config(format!(
                "default action has {} values, the action space has {}",
                default_action.len(),
                env_params.action_size()
            )));
        }
        let (listener, receiver) = InputListener::spawn(source, poll_interval)?;
        Ok(InteractivePolicy {
            env_params,
            receiver,
            listener,
            default_action,
        })
    }

    pub fn listener(&self) -> &InputListener {
        &self.listener
    }

    fn latest_sample(&mut self) -> Option<Vec<f64>> {
        match self.receiver.has_changed() {
            Ok(true) => self.receiver.borrow_and_update().clone(),
            _ => None,
        }
    }
}

impl Policy for InteractivePolicy {
    fn name(&self) -> &'static str {
        "InteractivePolicy"
    }

    fn env_params(&self) -> &EnvParams {
        &self.env_params
    }

    fn get_action(&mut self, state: Trajectory) -> Result<Trajectory> {
        if state.batch_size() != 1 {
            return Err(RlError::ShapeMismatch {
                field: "observation".to_string(),
                expected: vec![1],
                actual: state.observation.size(),
            });
        }
        let dims = self.env_params.action_size();
        let values = match self.latest_sample() {
            Some(sample) if sample.len() == dims => sample,
            Some(sample) => {
                return Err(RlError::ShapeMismatch {
                    field: "action".to_string(),
                    expected: vec![dims as i64],
                    actual: vec![sample.len() as i64],
                });
            }
            None => self.default_action.clone(),
        };
        let min = self.env_params.action_min.expand(dims)?;
        let max = self.env_params.action_max.expand(dims)?;
        let clipped: Vec<f64> = values
            .iter()
            .zip(min.iter().zip(&max))
            .map(|(v, (lo, hi))| v.clamp(*lo, *hi))
            .collect();

        let action = if self.env_params.action_continuous {
            let values: Vec<f32> = clipped.iter().map(|v| *v as f32).collect();
            Tensor::from_slice(&values).view([1, -1])
        } else {
            let values: Vec<i64> = clipped.iter().map(|v| v.round() as i64).collect();
            Tensor::from_slice(&values).view([1, -1])
        };
        Ok(state.with_action(action))
    }

    fn save_to_dict(&self) -> Result<PolicyRecord> {
        Err(RlError::config("InteractivePolicy cannot be saved"))
    }
}

impl Drop for InteractivePolicy {
    fn drop(&mut self) {
        self.listener.stop();
    }
}
