/// Per-episode value for a named policy parameter.
pub trait ParameterScheduler: Send {
    fn parameter_name(&self) -> &str;

    fn value_at(&self, episode: usize) -> f64;
}

/// Moves linearly from `start` to `end` over `num_episodes`, then holds `end`.
#[derive(Debug, Clone)]
pub struct LinearScheduler {
    parameter_name: String,
    start: f64,
    end: f64,
    num_episodes: usize,
}

impl LinearScheduler {
    pub fn new(parameter_name: impl Into<String>, start: f64, end: f64, num_episodes: usize) -> Self {
        LinearScheduler {
            parameter_name: parameter_name.into(),
            start,
            end,
            num_episodes,
        }
    }
}

impl ParameterScheduler for LinearScheduler {
    fn parameter_name(&self) -> &str {
        &self.parameter_name
    }

    fn value_at(&self, episode: usize) -> f64 {
        if self.num_episodes == 0 || episode >= self.num_episodes {
            return self.end;
        }
        let fraction = episode as f64 / self.num_episodes as f64;
        self.start + (self.end - self.start) * fraction
    }
}
