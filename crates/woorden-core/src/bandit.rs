//! Contextual bandit over exercise presentation formats.
//!
//! One reward model per (learner, exercise kind). Selection is
//! epsilon-greedy over the trained arms' predicted reward; before any arm
//! is trained, choice falls back to a pool biased toward multiple choice,
//! which has less answer friction than free text early on. Reward
//! outcomes buffer per arm and refit the arm's model once the buffer
//! reaches the configured threshold.

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

use crate::config::{EngineConfig, RetrainPolicy};
use crate::error::CoreResult;
use crate::features;
use crate::storage::{EventFilter, Storage};
use crate::types::{
    ExerciseArmModel, ExerciseKind, LearnerId, LinearModelParams, RewardSample, VocabularyItem,
    FEATURE_VERSION,
};
use woorden_algo::{
    epsilon_greedy, FitOptions, LogisticRegression, PolicyChoice, StandardScaler,
};

/// Latency at or above which the time bonus is zero, in seconds.
pub const REWARD_LATENCY_CEILING: f64 = 20.0;
/// Weight of the time bonus in the reward score.
pub const REWARD_TIME_BONUS_WEIGHT: f64 = 0.2;
/// Reward scores above this threshold label the sample positive. A
/// correct answer alone scores 1.0 and always crosses it; the time bonus
/// is kept for future threshold changes.
pub const REWARD_POSITIVE_THRESHOLD: f64 = 0.5;
/// Minimum buffered samples for an arm refit.
pub const MIN_RETRAIN_ROWS: usize = 5;

/// Untrained-arm fallback weights, in [`ExerciseKind::ALL`] order:
/// multiple choice 3:3, free text 1:1.
const FALLBACK_WEIGHTS: [u32; 4] = [3, 3, 1, 1];

pub struct ExerciseBandit {
    epsilon: f64,
    buffer_threshold: usize,
    retrain_policy: RetrainPolicy,
    fit: FitOptions,
    rng: ChaCha8Rng,
}

impl ExerciseBandit {
    pub fn from_config(config: &EngineConfig) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            epsilon: config.epsilon,
            buffer_threshold: config.bandit_buffer_threshold,
            retrain_policy: config.retrain_policy,
            fit: FitOptions::default(),
            rng,
        }
    }

    /// Picks the exercise format for an item.
    pub fn select_format(
        &mut self,
        storage: &dyn Storage,
        learner_id: LearnerId,
        item: &VocabularyItem,
        now: DateTime<Utc>,
    ) -> CoreResult<ExerciseKind> {
        let context = self.context_vector(storage, learner_id, item, now)?;

        let mut scores: Vec<Option<f64>> = Vec::with_capacity(ExerciseKind::ALL.len());
        for kind in ExerciseKind::ALL {
            let score = storage
                .load_arm_model(learner_id, kind)?
                .and_then(|arm| arm_score(&arm, &context));
            scores.push(score);
        }

        let choice = epsilon_greedy(&mut self.rng, self.epsilon, &scores, &FALLBACK_WEIGHTS)
            .unwrap_or(PolicyChoice::Fallback(0));
        let kind = ExerciseKind::ALL[choice.index()];
        debug!(learner = %learner_id, exercise = kind.as_str(), ?choice, "format selected");
        Ok(kind)
    }

    /// Records a reward observation for the arm and refits its model when
    /// the buffer policy says so. Insufficient or single-class buffers
    /// leave the previous model state untouched.
    pub fn update_reward(
        &mut self,
        storage: &dyn Storage,
        learner_id: LearnerId,
        item: &VocabularyItem,
        exercise: ExerciseKind,
        correct: bool,
        response_time_secs: f64,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        let context = self.context_vector(storage, learner_id, item, now)?;
        let label = reward_label(correct, response_time_secs);

        let mut arm = storage
            .load_arm_model(learner_id, exercise)?
            .unwrap_or_else(|| ExerciseArmModel::untrained(learner_id, exercise, now));
        arm.buffer.push(RewardSample {
            features: context,
            label,
        });

        if self.should_retrain(arm.buffer.len()) {
            self.retrain_arm(&mut arm);
        }

        arm.updated_at = now;
        storage.save_arm_model(&arm)?;
        Ok(())
    }

    fn should_retrain(&self, buffered: usize) -> bool {
        if buffered < self.buffer_threshold {
            return false;
        }
        match self.retrain_policy {
            RetrainPolicy::EveryUpdate => true,
            RetrainPolicy::AtMultiples => buffered % self.buffer_threshold == 0,
        }
    }

    /// Refits on the full accumulated buffer. The buffer is never cleared.
    fn retrain_arm(&self, arm: &mut ExerciseArmModel) {
        if arm.buffer.len() < MIN_RETRAIN_ROWS {
            return;
        }
        let positives = arm.buffer.iter().filter(|s| s.label > 0.5).count();
        if positives == 0 || positives == arm.buffer.len() {
            debug!(
                learner = %arm.learner_id,
                exercise = arm.exercise.as_str(),
                "arm retrain skipped: single label class"
            );
            return;
        }

        let rows: Vec<Vec<f64>> = arm.buffer.iter().map(|s| s.features.clone()).collect();
        let labels: Vec<f64> = arm.buffer.iter().map(|s| s.label).collect();

        let Some(scaler) = StandardScaler::fit(&rows) else {
            return;
        };
        let scaled = scaler.transform_rows(&rows);
        let Some(model) = LogisticRegression::fit(&scaled, &labels, &self.fit) else {
            return;
        };

        arm.params = Some(LinearModelParams {
            coefficients: model.weights,
            intercept: model.bias,
            scaler_mean: scaler.mean,
            scaler_scale: scaler.scale,
            feature_version: FEATURE_VERSION,
        });
        arm.trained = true;
        debug!(
            learner = %arm.learner_id,
            exercise = arm.exercise.as_str(),
            samples = arm.buffer.len(),
            "arm model refit"
        );
    }

    /// Historical accuracy per exercise kind, 0.0 for kinds never used.
    pub fn exercise_performance(
        &self,
        storage: &dyn Storage,
        learner_id: LearnerId,
    ) -> CoreResult<Vec<(ExerciseKind, f64)>> {
        let mut out = Vec::with_capacity(ExerciseKind::ALL.len());
        for kind in ExerciseKind::ALL {
            let events = storage.review_events(learner_id, EventFilter::for_exercise(kind))?;
            let accuracy = if events.is_empty() {
                0.0
            } else {
                events.iter().filter(|e| e.correct).count() as f64 / events.len() as f64
            };
            out.push((kind, accuracy));
        }
        Ok(out)
    }

    fn context_vector(
        &self,
        storage: &dyn Storage,
        learner_id: LearnerId,
        item: &VocabularyItem,
        now: DateTime<Utc>,
    ) -> CoreResult<Vec<f64>> {
        let item_events = storage.review_events(learner_id, EventFilter::for_item(item.id))?;
        let learner_events = storage.review_events(learner_id, EventFilter::all())?;
        Ok(features::bandit_vector_for(
            item,
            &item_events,
            &learner_events,
            now,
        ))
    }
}

/// Binary reward label. Correctness dominates; the time bonus alone can
/// never cross the positive threshold.
pub fn reward_label(correct: bool, response_time_secs: f64) -> f64 {
    let base_reward = if correct { 1.0 } else { 0.0 };
    let time_bonus = ((REWARD_LATENCY_CEILING - response_time_secs) / REWARD_LATENCY_CEILING)
        .max(0.0);
    if base_reward + REWARD_TIME_BONUS_WEIGHT * time_bonus > REWARD_POSITIVE_THRESHOLD {
        1.0
    } else {
        0.0
    }
}

/// Predicted positive-reward probability for one arm, or None when the
/// arm is untrained or its stored parameters are unusable. A bad arm is
/// only ever excluded, never an error.
fn arm_score(arm: &ExerciseArmModel, context: &[f64]) -> Option<f64> {
    if !arm.trained {
        return None;
    }
    let params = arm.params.as_ref()?;
    if !params.matches_current_features()
        || params.coefficients.len() != context.len()
        || params.scaler_mean.len() != context.len()
        || params.scaler_scale.len() != context.len()
    {
        warn!(
            learner = %arm.learner_id,
            exercise = arm.exercise.as_str(),
            "arm excluded: stored parameters do not match the feature contract"
        );
        return None;
    }

    let scaler = StandardScaler::from_params(
        params.scaler_mean.clone(),
        params.scaler_scale.clone(),
    );
    let model = LogisticRegression::from_params(params.coefficients.clone(), params.intercept);
    let p = model.predict_proba(&scaler.transform(context));
    if p.is_finite() {
        Some(p)
    } else {
        warn!(
            learner = %arm.learner_id,
            exercise = arm.exercise.as_str(),
            "arm excluded: non-finite prediction"
        );
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::types::Learner;

    fn config(epsilon: f64, seed: u64) -> EngineConfig {
        EngineConfig {
            epsilon,
            rng_seed: Some(seed),
            ..EngineConfig::default()
        }
    }

    fn setup(epsilon: f64) -> (MemoryStore, Learner, ExerciseBandit, VocabularyItem) {
        let store = MemoryStore::new();
        let now = Utc::now();
        let learner = store.add_learner("tg:1", now);
        let item = store.add_item(learner.id, "huis", "house", now);
        let bandit = ExerciseBandit::from_config(&config(epsilon, 7));
        (store, learner, bandit, item)
    }

    /// Stores an arm whose model always predicts `p`, independent of
    /// context: zero coefficients, intercept = logit(p).
    fn store_constant_arm(
        store: &MemoryStore,
        learner_id: LearnerId,
        exercise: ExerciseKind,
        p: f64,
    ) {
        let mut arm = ExerciseArmModel::untrained(learner_id, exercise, Utc::now());
        arm.trained = true;
        arm.params = Some(LinearModelParams {
            coefficients: vec![0.0; features::BANDIT_DIM],
            intercept: (p / (1.0 - p)).ln(),
            scaler_mean: vec![0.0; features::BANDIT_DIM],
            scaler_scale: vec![1.0; features::BANDIT_DIM],
            feature_version: FEATURE_VERSION,
        });
        store.save_arm_model(&arm).unwrap();
    }

    #[test]
    fn reward_label_correct_always_positive() {
        assert_eq!(reward_label(true, 0.0), 1.0);
        assert_eq!(reward_label(true, 19.0), 1.0);
        assert_eq!(reward_label(true, 500.0), 1.0);
    }

    #[test]
    fn reward_label_incorrect_always_negative() {
        // Even an instant wrong answer only scores 0.2.
        assert_eq!(reward_label(false, 0.0), 0.0);
        assert_eq!(reward_label(false, 10.0), 0.0);
        assert_eq!(reward_label(false, 60.0), 0.0);
    }

    #[test]
    fn deterministic_mode_picks_strongest_arm() {
        let (store, learner, mut bandit, item) = setup(0.0);
        store_constant_arm(&store, learner.id, ExerciseKind::MultipleChoiceEnToNl, 0.8);
        store_constant_arm(&store, learner.id, ExerciseKind::TranslationNlToEn, 0.3);

        for _ in 0..20 {
            let kind = bandit
                .select_format(&store, learner.id, &item, Utc::now())
                .unwrap();
            assert_eq!(kind, ExerciseKind::MultipleChoiceEnToNl);
        }
    }

    #[test]
    fn untrained_arms_fall_back_to_multiple_choice_bias() {
        let (store, learner, mut bandit, item) = setup(0.0);
        let mut mc = 0usize;
        let mut free = 0usize;
        for _ in 0..400 {
            let kind = bandit
                .select_format(&store, learner.id, &item, Utc::now())
                .unwrap();
            if kind.is_multiple_choice() {
                mc += 1;
            } else {
                free += 1;
            }
        }
        // 3:3:1:1 pool: multiple choice should win roughly 3 of 4 draws.
        assert!(mc > free * 2, "mc={mc} free={free}");
    }

    #[test]
    fn malformed_arm_is_excluded_not_fatal() {
        let (store, learner, mut bandit, item) = setup(0.0);

        // Wrong dimensionality: unusable, must be skipped.
        let mut broken =
            ExerciseArmModel::untrained(learner.id, ExerciseKind::MultipleChoiceEnToNl, Utc::now());
        broken.trained = true;
        broken.params = Some(LinearModelParams {
            coefficients: vec![1.0; 3],
            intercept: 5.0,
            scaler_mean: vec![0.0; 3],
            scaler_scale: vec![1.0; 3],
            feature_version: FEATURE_VERSION,
        });
        store.save_arm_model(&broken).unwrap();

        store_constant_arm(&store, learner.id, ExerciseKind::TranslationEnToNl, 0.6);

        let kind = bandit
            .select_format(&store, learner.id, &item, Utc::now())
            .unwrap();
        assert_eq!(kind, ExerciseKind::TranslationEnToNl);
    }

    #[test]
    fn stale_feature_version_is_excluded() {
        let (store, learner, mut bandit, item) = setup(0.0);
        let mut stale =
            ExerciseArmModel::untrained(learner.id, ExerciseKind::MultipleChoiceEnToNl, Utc::now());
        stale.trained = true;
        stale.params = Some(LinearModelParams {
            coefficients: vec![0.0; features::BANDIT_DIM],
            intercept: 10.0,
            scaler_mean: vec![0.0; features::BANDIT_DIM],
            scaler_scale: vec![1.0; features::BANDIT_DIM],
            feature_version: FEATURE_VERSION + 1,
        });
        store.save_arm_model(&stale).unwrap();

        store_constant_arm(&store, learner.id, ExerciseKind::TranslationNlToEn, 0.55);
        let kind = bandit
            .select_format(&store, learner.id, &item, Utc::now())
            .unwrap();
        assert_eq!(kind, ExerciseKind::TranslationNlToEn);
    }

    #[test]
    fn update_reward_buffers_until_threshold() {
        let (store, learner, mut bandit, item) = setup(0.0);
        let kind = ExerciseKind::MultipleChoiceEnToNl;
        let now = Utc::now();

        for i in 0..9 {
            bandit
                .update_reward(&store, learner.id, &item, kind, i % 2 == 0, 4.0, now)
                .unwrap();
        }
        let arm = store.load_arm_model(learner.id, kind).unwrap().unwrap();
        assert_eq!(arm.buffer.len(), 9);
        assert!(!arm.trained);
        assert!(arm.params.is_none());

        bandit
            .update_reward(&store, learner.id, &item, kind, false, 4.0, now)
            .unwrap();
        let arm = store.load_arm_model(learner.id, kind).unwrap().unwrap();
        assert_eq!(arm.buffer.len(), 10);
        assert!(arm.trained);
        let params = arm.params.unwrap();
        assert_eq!(params.coefficients.len(), features::BANDIT_DIM);
        assert_eq!(params.feature_version, FEATURE_VERSION);
    }

    #[test]
    fn single_class_buffer_never_trains() {
        let (store, learner, mut bandit, item) = setup(0.0);
        let kind = ExerciseKind::TranslationEnToNl;
        let now = Utc::now();

        for _ in 0..15 {
            bandit
                .update_reward(&store, learner.id, &item, kind, true, 4.0, now)
                .unwrap();
        }
        let arm = store.load_arm_model(learner.id, kind).unwrap().unwrap();
        assert_eq!(arm.buffer.len(), 15);
        assert!(!arm.trained);
    }

    #[test]
    fn at_multiples_policy_gates_between_thresholds() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let learner = store.add_learner("tg:1", now);
        let item = store.add_item(learner.id, "huis", "house", now);
        let mut bandit = ExerciseBandit::from_config(&EngineConfig {
            epsilon: 0.0,
            retrain_policy: RetrainPolicy::AtMultiples,
            rng_seed: Some(7),
            ..EngineConfig::default()
        });
        let kind = ExerciseKind::MultipleChoiceNlToEn;

        for i in 0..10 {
            bandit
                .update_reward(&store, learner.id, &item, kind, i % 2 == 0, 4.0, now)
                .unwrap();
        }
        let trained_at_10 = store
            .load_arm_model(learner.id, kind)
            .unwrap()
            .unwrap();
        assert!(trained_at_10.trained);
        let params_at_10 = trained_at_10.params.clone();

        // Updates 11..14 must not refit under AtMultiples.
        for i in 10..14 {
            bandit
                .update_reward(&store, learner.id, &item, kind, i % 2 == 0, 4.0, now)
                .unwrap();
        }
        let arm = store.load_arm_model(learner.id, kind).unwrap().unwrap();
        assert_eq!(arm.buffer.len(), 14);
        assert_eq!(arm.params, params_at_10);
    }

    #[test]
    fn retrain_is_idempotent_on_unchanged_buffer() {
        let (store, learner, bandit, _) = setup(0.0);
        let now = Utc::now();
        let mut arm =
            ExerciseArmModel::untrained(learner.id, ExerciseKind::MultipleChoiceEnToNl, now);
        for i in 0..10 {
            arm.buffer.push(RewardSample {
                features: vec![i as f64; features::BANDIT_DIM],
                label: (i % 2) as f64,
            });
        }

        bandit.retrain_arm(&mut arm);
        let first = arm.params.clone();
        assert!(first.is_some());

        bandit.retrain_arm(&mut arm);
        assert_eq!(arm.params, first);
    }

    #[test]
    fn exercise_performance_defaults_to_zero() {
        let (store, learner, bandit, item) = setup(0.0);
        let now = Utc::now();
        store
            .append_review_event(&crate::types::ReviewEvent::new(
                learner.id,
                item.id,
                ExerciseKind::MultipleChoiceEnToNl,
                true,
                3.0,
                now,
            ))
            .unwrap();
        store
            .append_review_event(&crate::types::ReviewEvent::new(
                learner.id,
                item.id,
                ExerciseKind::MultipleChoiceEnToNl,
                false,
                3.0,
                now,
            ))
            .unwrap();

        let perf = bandit.exercise_performance(&store, learner.id).unwrap();
        let mc = perf
            .iter()
            .find(|(k, _)| *k == ExerciseKind::MultipleChoiceEnToNl)
            .unwrap();
        assert!((mc.1 - 0.5).abs() < 1e-9);
        let unused = perf
            .iter()
            .find(|(k, _)| *k == ExerciseKind::TranslationNlToEn)
            .unwrap();
        assert_eq!(unused.1, 0.0);
    }
}
