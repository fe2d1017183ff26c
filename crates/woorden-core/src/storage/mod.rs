//! Storage collaborator contract.
//!
//! The core reads and writes plain data records through this trait and is
//! otherwise agnostic to the persistence technology. Calls may block on
//! I/O; one learner turn performs one synchronous read-compute-write cycle
//! against it. [`MemoryStore`] is the bundled reference implementation.

pub mod memory;

pub use memory::MemoryStore;

use crate::types::{
    ExerciseArmModel, ExerciseKind, ItemId, Learner, LearnerId, ReviewEvent, VocabularyItem,
};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage backend failure: {0}")]
    Backend(String),
    #[error("stored record could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Filter for review-event listings. Fields combine conjunctively.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventFilter {
    pub item: Option<ItemId>,
    pub exercise: Option<ExerciseKind>,
}

impl EventFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_item(item: ItemId) -> Self {
        Self {
            item: Some(item),
            ..Self::default()
        }
    }

    pub fn for_exercise(exercise: ExerciseKind) -> Self {
        Self {
            exercise: Some(exercise),
            ..Self::default()
        }
    }

    pub fn matches(&self, event: &ReviewEvent) -> bool {
        self.item.map_or(true, |id| event.item_id == id)
            && self.exercise.map_or(true, |kind| event.exercise == kind)
    }
}

pub trait Storage: Send + Sync {
    fn learner_by_external_id(&self, external_id: &str) -> StorageResult<Option<Learner>>;

    fn vocabulary_item(&self, item_id: ItemId) -> StorageResult<Option<VocabularyItem>>;

    fn update_vocabulary_item(&self, item: &VocabularyItem) -> StorageResult<()>;

    /// Soft delete: clears the active flag, keeping history intact.
    fn delete_vocabulary_item(&self, item_id: ItemId) -> StorageResult<()>;

    /// Active items for a learner, in insertion order. `seen` filters on
    /// whether the item has been reviewed at least once.
    fn active_items(
        &self,
        learner_id: LearnerId,
        seen: Option<bool>,
    ) -> StorageResult<Vec<VocabularyItem>>;

    fn append_review_event(&self, event: &ReviewEvent) -> StorageResult<()>;

    /// A learner's review events in chronological order.
    fn review_events(
        &self,
        learner_id: LearnerId,
        filter: EventFilter,
    ) -> StorageResult<Vec<ReviewEvent>>;

    fn load_arm_model(
        &self,
        learner_id: LearnerId,
        exercise: ExerciseKind,
    ) -> StorageResult<Option<ExerciseArmModel>>;

    fn save_arm_model(&self, model: &ExerciseArmModel) -> StorageResult<()>;
}
