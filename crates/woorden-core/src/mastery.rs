//! Per-learner mastery prediction.
//!
//! A binary classifier per learner, trained on the learner's reviewed
//! items with the heuristic mastery level as the label source. Models are
//! derived state and live in memory; a restart costs one retrain.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::CoreResult;
use crate::features;
use crate::storage::{EventFilter, Storage};
use crate::types::{LearnerId, ReviewEvent, VocabularyItem};
use woorden_algo::{FitOptions, LogisticRegression, StandardScaler};

/// An item counts as mastered for labeling once its mastery level reaches
/// this threshold.
pub const MASTERY_LABEL_THRESHOLD: f64 = 0.7;
/// Minimum training rows; below this, training is skipped.
pub const MIN_TRAINING_ROWS: usize = 5;

/// Tagged prediction result. `value()` collapses to the probability the
/// callers persist, with 0.0 standing in for the untrained/unseen cases.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MasteryPrediction {
    /// The item has never been reviewed.
    Unseen,
    /// No model has been trained for this learner yet.
    Untrained,
    /// Probability that the learner has mastered the item.
    Predicted(f64),
}

impl MasteryPrediction {
    pub fn value(&self) -> f64 {
        match *self {
            Self::Predicted(p) => p,
            Self::Unseen | Self::Untrained => 0.0,
        }
    }
}

#[derive(Debug, Clone)]
struct LearnerModel {
    scaler: StandardScaler,
    model: LogisticRegression,
}

#[derive(Debug, Default)]
pub struct MasteryPredictor {
    models: HashMap<LearnerId, LearnerModel>,
    fit: FitOptions,
}

impl MasteryPredictor {
    pub fn new() -> Self {
        Self {
            models: HashMap::new(),
            fit: FitOptions::default(),
        }
    }

    pub fn is_trained(&self, learner_id: LearnerId) -> bool {
        self.models.contains_key(&learner_id)
    }

    /// Retrains the learner's model on all reviewed items. Skipped (prior
    /// model kept, including "none") when there are fewer than
    /// [`MIN_TRAINING_ROWS`] rows or only one label class. Returns whether
    /// a new model was fitted.
    pub fn train(
        &mut self,
        storage: &dyn Storage,
        learner_id: LearnerId,
        now: DateTime<Utc>,
    ) -> CoreResult<bool> {
        let items = storage.active_items(learner_id, Some(true))?;
        if items.len() < MIN_TRAINING_ROWS {
            debug!(
                learner = %learner_id,
                rows = items.len(),
                "mastery training skipped: not enough reviewed items"
            );
            return Ok(false);
        }

        let learner_events = storage.review_events(learner_id, EventFilter::all())?;
        let mut rows = Vec::with_capacity(items.len());
        let mut labels = Vec::with_capacity(items.len());
        for item in &items {
            let item_events = events_for_item(&learner_events, item);
            rows.push(features::mastery_vector_for(
                item,
                &item_events,
                &learner_events,
                now,
            ));
            labels.push(if item.mastery_level >= MASTERY_LABEL_THRESHOLD {
                1.0
            } else {
                0.0
            });
        }

        let positives = labels.iter().filter(|&&l| l > 0.5).count();
        if positives == 0 || positives == labels.len() {
            debug!(
                learner = %learner_id,
                "mastery training skipped: single label class"
            );
            return Ok(false);
        }

        let Some(scaler) = StandardScaler::fit(&rows) else {
            return Ok(false);
        };
        let scaled = scaler.transform_rows(&rows);
        let Some(model) = LogisticRegression::fit(&scaled, &labels, &self.fit) else {
            return Ok(false);
        };

        self.models.insert(learner_id, LearnerModel { scaler, model });
        debug!(learner = %learner_id, rows = rows.len(), "mastery model trained");
        Ok(true)
    }

    /// Predicted mastery for one item.
    pub fn predict(
        &self,
        storage: &dyn Storage,
        learner_id: LearnerId,
        item: &VocabularyItem,
        now: DateTime<Utc>,
    ) -> CoreResult<MasteryPrediction> {
        if !item.is_seen() {
            return Ok(MasteryPrediction::Unseen);
        }
        let Some(state) = self.models.get(&learner_id) else {
            return Ok(MasteryPrediction::Untrained);
        };

        let item_events = storage.review_events(learner_id, EventFilter::for_item(item.id))?;
        let learner_events = storage.review_events(learner_id, EventFilter::all())?;
        let vector = features::mastery_vector_for(item, &item_events, &learner_events, now);
        let p = state.model.predict_proba(&state.scaler.transform(&vector));
        Ok(MasteryPrediction::Predicted(p))
    }

    /// Predicts mastery for every reviewed item and persists the batch,
    /// superseding the scheduler's heuristic values. No-op while
    /// untrained. Returns the number of items updated.
    pub fn apply_to_all(
        &self,
        storage: &dyn Storage,
        learner_id: LearnerId,
        now: DateTime<Utc>,
    ) -> CoreResult<usize> {
        let Some(state) = self.models.get(&learner_id) else {
            return Ok(0);
        };

        let items = storage.active_items(learner_id, Some(true))?;
        if items.is_empty() {
            return Ok(0);
        }
        let learner_events = storage.review_events(learner_id, EventFilter::all())?;

        let rows: Vec<Vec<f64>> = items
            .iter()
            .map(|item| {
                let item_events = events_for_item(&learner_events, item);
                let vector =
                    features::mastery_vector_for(item, &item_events, &learner_events, now);
                state.scaler.transform(&vector)
            })
            .collect();
        let predictions = state.model.predict_batch(&rows);

        for (item, p) in items.iter().zip(predictions.iter()) {
            let mut updated = item.clone();
            updated.mastery_level = p.clamp(0.0, 1.0);
            storage.update_vocabulary_item(&updated)?;
        }
        Ok(items.len())
    }
}

fn events_for_item(learner_events: &[ReviewEvent], item: &VocabularyItem) -> Vec<ReviewEvent> {
    learner_events
        .iter()
        .filter(|e| e.item_id == item.id)
        .cloned()
        .collect()
}
