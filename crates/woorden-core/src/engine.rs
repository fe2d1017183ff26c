//! Front-end-facing facade.
//!
//! One learner turn runs through here: pick an item, pick a format,
//! render, check the answer, record the outcome, retrain when due. Each
//! call is one synchronous unit of work against storage. Unknown learners
//! or items are "nothing to do", never errors.

use chrono::Utc;
use tracing::{debug, warn};

use crate::bandit::ExerciseBandit;
use crate::config::EngineConfig;
use crate::error::CoreResult;
use crate::exercises::{ExerciseManager, ExercisePrompt};
use crate::mastery::MasteryPredictor;
use crate::scheduler::{ReviewScheduler, ReviewStats};
use crate::storage::Storage;
use crate::types::{
    ExerciseKind, ItemId, Learner, ReviewEvent, SessionState, VocabularyItem,
};

pub struct LearningEngine<S: Storage> {
    storage: S,
    config: EngineConfig,
    scheduler: ReviewScheduler,
    mastery: MasteryPredictor,
    bandit: ExerciseBandit,
    exercises: ExerciseManager,
}

impl<S: Storage> LearningEngine<S> {
    pub fn new(storage: S) -> Self {
        Self::with_config(storage, EngineConfig::default())
    }

    pub fn with_config(storage: S, config: EngineConfig) -> Self {
        let bandit = ExerciseBandit::from_config(&config);
        let exercises = ExerciseManager::new(config.rng_seed);
        Self {
            storage,
            config,
            scheduler: ReviewScheduler::new(),
            mastery: MasteryPredictor::new(),
            bandit,
            exercises,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn learner(&self, external_id: &str) -> CoreResult<Option<Learner>> {
        Ok(self.storage.learner_by_external_id(external_id)?)
    }

    /// Item owned by the learner, or None when either side is unknown or
    /// the ownership does not line up.
    fn owned_item(
        &self,
        learner: &Learner,
        item_id: ItemId,
    ) -> CoreResult<Option<VocabularyItem>> {
        let Some(item) = self.storage.vocabulary_item(item_id)? else {
            return Ok(None);
        };
        if item.learner_id != learner.id {
            warn!(item = %item_id, learner = %learner.id, "item belongs to another learner");
            return Ok(None);
        }
        Ok(Some(item))
    }

    /// The next item to review, or None when the learner is unknown or
    /// has no active vocabulary.
    pub fn pick_next(&self, external_id: &str) -> CoreResult<Option<VocabularyItem>> {
        let Some(learner) = self.learner(external_id)? else {
            return Ok(None);
        };
        self.scheduler
            .pick_next(&self.storage, &self.mastery, &learner, Utc::now())
    }

    /// The exercise format to present the item in.
    pub fn select_format(
        &mut self,
        external_id: &str,
        item_id: ItemId,
    ) -> CoreResult<Option<ExerciseKind>> {
        let Some(learner) = self.learner(external_id)? else {
            return Ok(None);
        };
        let Some(item) = self.owned_item(&learner, item_id)? else {
            return Ok(None);
        };
        let kind = self
            .bandit
            .select_format(&self.storage, learner.id, &item, Utc::now())?;
        Ok(Some(kind))
    }

    /// The rendered prompt for an item in a format, or None for an
    /// unknown item.
    pub fn render_prompt(
        &mut self,
        item_id: ItemId,
        kind: ExerciseKind,
    ) -> CoreResult<Option<ExercisePrompt>> {
        let Some(item) = self.storage.vocabulary_item(item_id)? else {
            return Ok(None);
        };
        let prompt = self.exercises.render_prompt(&self.storage, &item, kind)?;
        Ok(Some(prompt))
    }

    pub fn check_answer(&self, item: &VocabularyItem, kind: ExerciseKind, raw_answer: &str) -> bool {
        ExerciseManager::check_answer(item, kind, raw_answer)
    }

    /// Records one answered exercise: appends the review event, updates
    /// the item's schedule and response-time average, and feeds the bandit
    /// arm, as one logical unit of work.
    pub fn record_outcome(
        &mut self,
        external_id: &str,
        item_id: ItemId,
        kind: ExerciseKind,
        correct: bool,
        response_time_secs: f64,
        session: &mut SessionState,
    ) -> CoreResult<()> {
        let Some(learner) = self.learner(external_id)? else {
            debug!(external_id, "outcome dropped: unknown learner");
            return Ok(());
        };
        let Some(mut item) = self.owned_item(&learner, item_id)? else {
            debug!(item = %item_id, "outcome dropped: unknown item");
            return Ok(());
        };

        let now = Utc::now();
        let event = ReviewEvent::new(
            learner.id,
            item.id,
            kind,
            correct,
            response_time_secs,
            now,
        );
        self.storage.append_review_event(&event)?;

        self.scheduler
            .record_outcome(&self.storage, &mut item, correct, now)?;

        item.update_response_time(response_time_secs);
        self.storage.update_vocabulary_item(&item)?;

        self.bandit.update_reward(
            &self.storage,
            learner.id,
            &item,
            kind,
            correct,
            response_time_secs,
            now,
        )?;

        session.record_answer();
        Ok(())
    }

    /// Retrains the learner's mastery model and reapplies predictions when
    /// the session has reached the configured cadence. A no-op otherwise,
    /// and on unknown learners.
    pub fn retrain_if_due(
        &mut self,
        external_id: &str,
        session: &SessionState,
    ) -> CoreResult<()> {
        let cadence = self.config.mastery_retrain_every.max(1);
        if session.answers_recorded == 0 || session.answers_recorded % cadence != 0 {
            return Ok(());
        }
        let Some(learner) = self.learner(external_id)? else {
            return Ok(());
        };

        let now = Utc::now();
        if self.mastery.train(&self.storage, learner.id, now)? {
            let updated = self.mastery.apply_to_all(&self.storage, learner.id, now)?;
            debug!(learner = %learner.id, updated, "mastery predictions reapplied");
        }
        Ok(())
    }

    /// Aggregate review counts for the learner's active vocabulary.
    pub fn review_stats(&self, external_id: &str) -> CoreResult<Option<ReviewStats>> {
        let Some(learner) = self.learner(external_id)? else {
            return Ok(None);
        };
        let stats = self
            .scheduler
            .review_stats(&self.storage, &learner, Utc::now())?;
        Ok(Some(stats))
    }

    /// Historical accuracy per exercise kind.
    pub fn exercise_performance(
        &self,
        external_id: &str,
    ) -> CoreResult<Option<Vec<(ExerciseKind, f64)>>> {
        let Some(learner) = self.learner(external_id)? else {
            return Ok(None);
        };
        let perf = self.bandit.exercise_performance(&self.storage, learner.id)?;
        Ok(Some(perf))
    }
}
