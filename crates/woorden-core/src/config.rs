//! Engine configuration.

use serde::{Deserialize, Serialize};

/// When a bandit arm refits once its sample buffer has reached the
/// threshold for the first time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum RetrainPolicy {
    /// Refit on every update once the threshold is crossed.
    #[default]
    EveryUpdate,
    /// Refit only when the buffer length is an exact multiple of the
    /// threshold.
    AtMultiples,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Exploration rate for exercise-format selection. 0.0 disables
    /// exploration entirely (deterministic mode).
    pub epsilon: f64,
    /// Retrain the per-learner mastery model after every Nth recorded
    /// answer. 1 retrains on every answer.
    pub mastery_retrain_every: u32,
    /// Buffered samples required before a bandit arm first trains.
    pub bandit_buffer_threshold: usize,
    pub retrain_policy: RetrainPolicy,
    /// Seed for the selection/shuffling RNG. None draws from entropy.
    pub rng_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.1,
            mastery_retrain_every: 10,
            bandit_buffer_threshold: 10,
            retrain_policy: RetrainPolicy::default(),
            rng_seed: None,
        }
    }
}
