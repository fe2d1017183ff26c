//! In-memory reference implementation of the storage contract.
//!
//! Used by the test suite and suitable for embedders that keep learner
//! state in process. Arm models are held as JSON text internally, the same
//! shape a text-column backend would store, so every save/load exercises
//! the model codec. Individual calls are serialized by a read-write lock;
//! there is no transactionality across calls (last write wins, matching
//! the documented concurrency model).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::storage::{EventFilter, Storage, StorageError, StorageResult};
use crate::types::{
    ExerciseArmModel, ExerciseKind, ItemId, Learner, LearnerId, ReviewEvent, VocabularyItem,
};

#[derive(Default)]
struct State {
    learners: Vec<Learner>,
    items: Vec<VocabularyItem>,
    events: Vec<ReviewEvent>,
    arm_models: HashMap<(LearnerId, ExerciseKind), String>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a learner under a front-end identity. Returns the
    /// existing record when the identity is already known (first-contact
    /// creation is idempotent).
    pub fn add_learner(&self, external_id: &str, now: DateTime<Utc>) -> Learner {
        let mut state = self.inner.write();
        if let Some(existing) = state.learners.iter().find(|l| l.external_id == external_id) {
            return existing.clone();
        }
        let learner = Learner::new(external_id, now);
        state.learners.push(learner.clone());
        learner
    }

    /// Adds a vocabulary item. Re-adding a word that was soft-deleted
    /// reactivates the existing record, keeping its history.
    pub fn add_item(
        &self,
        learner_id: LearnerId,
        source_text: &str,
        target_text: &str,
        now: DateTime<Utc>,
    ) -> VocabularyItem {
        let mut state = self.inner.write();
        if let Some(existing) = state
            .items
            .iter_mut()
            .find(|i| i.learner_id == learner_id && i.source_text == source_text)
        {
            existing.active = true;
            existing.target_text = target_text.to_string();
            return existing.clone();
        }
        let item = VocabularyItem::new(learner_id, source_text, target_text, now);
        state.items.push(item.clone());
        item
    }
}

impl Storage for MemoryStore {
    fn learner_by_external_id(&self, external_id: &str) -> StorageResult<Option<Learner>> {
        let state = self.inner.read();
        Ok(state
            .learners
            .iter()
            .find(|l| l.external_id == external_id)
            .cloned())
    }

    fn vocabulary_item(&self, item_id: ItemId) -> StorageResult<Option<VocabularyItem>> {
        let state = self.inner.read();
        Ok(state.items.iter().find(|i| i.id == item_id).cloned())
    }

    fn update_vocabulary_item(&self, item: &VocabularyItem) -> StorageResult<()> {
        let mut state = self.inner.write();
        match state.items.iter_mut().find(|i| i.id == item.id) {
            Some(slot) => {
                *slot = item.clone();
                Ok(())
            }
            None => Err(StorageError::Backend(format!(
                "unknown vocabulary item {}",
                item.id
            ))),
        }
    }

    fn delete_vocabulary_item(&self, item_id: ItemId) -> StorageResult<()> {
        let mut state = self.inner.write();
        if let Some(item) = state.items.iter_mut().find(|i| i.id == item_id) {
            item.active = false;
        }
        Ok(())
    }

    fn active_items(
        &self,
        learner_id: LearnerId,
        seen: Option<bool>,
    ) -> StorageResult<Vec<VocabularyItem>> {
        let state = self.inner.read();
        Ok(state
            .items
            .iter()
            .filter(|i| i.learner_id == learner_id && i.active)
            .filter(|i| seen.map_or(true, |wanted| i.is_seen() == wanted))
            .cloned()
            .collect())
    }

    fn append_review_event(&self, event: &ReviewEvent) -> StorageResult<()> {
        let mut state = self.inner.write();
        state.events.push(event.clone());
        Ok(())
    }

    fn review_events(
        &self,
        learner_id: LearnerId,
        filter: EventFilter,
    ) -> StorageResult<Vec<ReviewEvent>> {
        let state = self.inner.read();
        let mut events: Vec<ReviewEvent> = state
            .events
            .iter()
            .filter(|e| e.learner_id == learner_id && filter.matches(e))
            .cloned()
            .collect();
        events.sort_by_key(|e| e.timestamp);
        Ok(events)
    }

    fn load_arm_model(
        &self,
        learner_id: LearnerId,
        exercise: ExerciseKind,
    ) -> StorageResult<Option<ExerciseArmModel>> {
        let state = self.inner.read();
        match state.arm_models.get(&(learner_id, exercise)) {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    fn save_arm_model(&self, model: &ExerciseArmModel) -> StorageResult<()> {
        let json = serde_json::to_string(model)?;
        let mut state = self.inner.write();
        state
            .arm_models
            .insert((model.learner_id, model.exercise), json);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LinearModelParams, RewardSample, FEATURE_VERSION};

    #[test]
    fn add_learner_is_idempotent_per_identity() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let a = store.add_learner("tg:1", now);
        let b = store.add_learner("tg:1", now);
        assert_eq!(a.id, b.id);
        let found = store.learner_by_external_id("tg:1").unwrap().unwrap();
        assert_eq!(found.id, a.id);
        assert!(store.learner_by_external_id("tg:2").unwrap().is_none());
    }

    #[test]
    fn readding_a_deleted_item_reactivates_it() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let learner = store.add_learner("tg:1", now);
        let item = store.add_item(learner.id, "de kat", "the cat", now);

        store.delete_vocabulary_item(item.id).unwrap();
        assert!(store.active_items(learner.id, None).unwrap().is_empty());

        let readded = store.add_item(learner.id, "de kat", "the cat", now);
        assert_eq!(readded.id, item.id);
        assert_eq!(store.active_items(learner.id, None).unwrap().len(), 1);
    }

    #[test]
    fn active_items_filters_on_seen() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let learner = store.add_learner("tg:1", now);
        let mut seen = store.add_item(learner.id, "huis", "house", now);
        store.add_item(learner.id, "kat", "cat", now);
        seen.times_seen = 3;
        store.update_vocabulary_item(&seen).unwrap();

        assert_eq!(store.active_items(learner.id, None).unwrap().len(), 2);
        let seen_only = store.active_items(learner.id, Some(true)).unwrap();
        assert_eq!(seen_only.len(), 1);
        assert_eq!(seen_only[0].id, seen.id);
        assert_eq!(store.active_items(learner.id, Some(false)).unwrap().len(), 1);
    }

    #[test]
    fn review_events_sorted_and_filtered() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let learner = store.add_learner("tg:1", now);
        let item = store.add_item(learner.id, "huis", "house", now);
        let other = store.add_item(learner.id, "kat", "cat", now);

        let later = ReviewEvent::new(
            learner.id,
            item.id,
            ExerciseKind::TranslationNlToEn,
            true,
            4.0,
            now + chrono::Duration::hours(1),
        );
        let earlier = ReviewEvent::new(
            learner.id,
            item.id,
            ExerciseKind::MultipleChoiceEnToNl,
            false,
            6.0,
            now,
        );
        let unrelated = ReviewEvent::new(
            learner.id,
            other.id,
            ExerciseKind::MultipleChoiceEnToNl,
            true,
            2.0,
            now,
        );
        store.append_review_event(&later).unwrap();
        store.append_review_event(&earlier).unwrap();
        store.append_review_event(&unrelated).unwrap();

        let events = store
            .review_events(learner.id, EventFilter::for_item(item.id))
            .unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].timestamp < events[1].timestamp);

        let mc = store
            .review_events(
                learner.id,
                EventFilter::for_exercise(ExerciseKind::MultipleChoiceEnToNl),
            )
            .unwrap();
        assert_eq!(mc.len(), 2);
    }

    #[test]
    fn arm_model_round_trips_through_json_storage() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let learner = store.add_learner("tg:1", now);

        let mut model = ExerciseArmModel::untrained(learner.id, ExerciseKind::TranslationEnToNl, now);
        model.trained = true;
        model.params = Some(LinearModelParams {
            coefficients: vec![0.25, -0.75],
            intercept: 0.125,
            scaler_mean: vec![1.0, 2.0],
            scaler_scale: vec![0.5, 0.25],
            feature_version: FEATURE_VERSION,
        });
        model.buffer.push(RewardSample {
            features: vec![1.0, 2.0],
            label: 1.0,
        });

        store.save_arm_model(&model).unwrap();
        let loaded = store
            .load_arm_model(learner.id, ExerciseKind::TranslationEnToNl)
            .unwrap()
            .unwrap();
        assert_eq!(loaded.params, model.params);
        assert_eq!(loaded.buffer, model.buffer);
        assert!(loaded.trained);

        assert!(store
            .load_arm_model(learner.id, ExerciseKind::TranslationNlToEn)
            .unwrap()
            .is_none());
    }
}
