//! Core data records: learners, vocabulary items, review events, and the
//! persisted bandit arm models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type LearnerId = Uuid;
pub type ItemId = Uuid;

/// Version of the feature-vector layout baked into persisted model
/// parameters. Bump whenever the field order or dimensionality of the
/// vectors in [`crate::features`] changes; parameters stored under another
/// version are treated as untrained.
pub const FEATURE_VERSION: u32 = 1;

/// Smoothing factor for the per-item response-time moving average.
pub const RESPONSE_TIME_ALPHA: f64 = 0.3;

/// Ease factor bounds and steps for the review scheduler.
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;
pub const MIN_EASE_FACTOR: f64 = 1.3;
pub const MAX_EASE_FACTOR: f64 = 3.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Learner {
    pub id: LearnerId,
    /// Identity assigned by the conversational front-end.
    pub external_id: String,
    pub created_at: DateTime<Utc>,
}

impl Learner {
    pub fn new(external_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            external_id: external_id.into(),
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyItem {
    pub id: ItemId,
    pub learner_id: LearnerId,
    /// The word being learned (Dutch).
    pub source_text: String,
    /// Its translation (English).
    pub target_text: String,
    pub active: bool,
    pub added_at: DateTime<Utc>,
    pub times_seen: u32,
    pub times_correct: u32,
    /// Exponential moving average of answer latency in seconds.
    pub average_response_time: f64,
    /// Model-predicted mastery probability, heuristic until a per-learner
    /// model is trained.
    pub mastery_level: f64,
    pub last_seen: Option<DateTime<Utc>>,
    pub next_review_at: Option<DateTime<Utc>>,
    pub repetition_count: u32,
    pub ease_factor: f64,
}

impl VocabularyItem {
    pub fn new(
        learner_id: LearnerId,
        source_text: impl Into<String>,
        target_text: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            learner_id,
            source_text: source_text.into(),
            target_text: target_text.into(),
            active: true,
            added_at: now,
            times_seen: 0,
            times_correct: 0,
            average_response_time: 0.0,
            mastery_level: 0.0,
            last_seen: None,
            next_review_at: None,
            repetition_count: 0,
            ease_factor: DEFAULT_EASE_FACTOR,
        }
    }

    pub fn is_seen(&self) -> bool {
        self.times_seen > 0
    }

    pub fn accuracy(&self) -> f64 {
        if self.times_seen == 0 {
            return 0.0;
        }
        self.times_correct as f64 / self.times_seen as f64
    }

    /// Folds a new answer latency into the moving average. The first
    /// sample is taken verbatim.
    pub fn update_response_time(&mut self, response_time_secs: f64) {
        if self.average_response_time == 0.0 {
            self.average_response_time = response_time_secs;
        } else {
            self.average_response_time = RESPONSE_TIME_ALPHA * response_time_secs
                + (1.0 - RESPONSE_TIME_ALPHA) * self.average_response_time;
        }
    }
}

/// The four exercise presentations: two translation directions, each as
/// multiple choice or free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseKind {
    MultipleChoiceEnToNl,
    MultipleChoiceNlToEn,
    TranslationEnToNl,
    TranslationNlToEn,
}

impl ExerciseKind {
    /// Multiple-choice kinds first; the bandit's fallback weights are
    /// declared in this order.
    pub const ALL: [ExerciseKind; 4] = [
        Self::MultipleChoiceEnToNl,
        Self::MultipleChoiceNlToEn,
        Self::TranslationEnToNl,
        Self::TranslationNlToEn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MultipleChoiceEnToNl => "multiple_choice_en_to_nl",
            Self::MultipleChoiceNlToEn => "multiple_choice_nl_to_en",
            Self::TranslationEnToNl => "translation_en_to_nl",
            Self::TranslationNlToEn => "translation_nl_to_en",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "multiple_choice_en_to_nl" => Some(Self::MultipleChoiceEnToNl),
            "multiple_choice_nl_to_en" => Some(Self::MultipleChoiceNlToEn),
            "translation_en_to_nl" => Some(Self::TranslationEnToNl),
            "translation_nl_to_en" => Some(Self::TranslationNlToEn),
            _ => None,
        }
    }

    pub fn is_multiple_choice(&self) -> bool {
        matches!(self, Self::MultipleChoiceEnToNl | Self::MultipleChoiceNlToEn)
    }

    /// True when the learner answers in the source language (Dutch).
    pub fn answers_in_source(&self) -> bool {
        matches!(self, Self::MultipleChoiceEnToNl | Self::TranslationEnToNl)
    }
}

/// One answered exercise. Immutable once appended; timestamp order drives
/// recency features and interval computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewEvent {
    pub id: Uuid,
    pub learner_id: LearnerId,
    pub item_id: ItemId,
    pub exercise: ExerciseKind,
    pub correct: bool,
    pub response_time_secs: f64,
    pub timestamp: DateTime<Utc>,
}

impl ReviewEvent {
    pub fn new(
        learner_id: LearnerId,
        item_id: ItemId,
        exercise: ExerciseKind,
        correct: bool,
        response_time_secs: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            learner_id,
            item_id,
            exercise,
            correct,
            response_time_secs,
            timestamp,
        }
    }
}

/// Trained linear-model parameters for one bandit arm, together with the
/// feature scaling that was fitted alongside them. This is the only shape
/// model coefficients are persisted in; [`Self::to_json`]/[`Self::from_json`]
/// are the single codec storage backends should use for text columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModelParams {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub scaler_mean: Vec<f64>,
    pub scaler_scale: Vec<f64>,
    pub feature_version: u32,
}

impl LinearModelParams {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn matches_current_features(&self) -> bool {
        self.feature_version == FEATURE_VERSION
    }
}

/// A context/label pair buffered for a bandit arm until retrain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardSample {
    pub features: Vec<f64>,
    /// Binary reward label, 0.0 or 1.0.
    pub label: f64,
}

/// Per-(learner, exercise kind) reward model. The sample buffer
/// accumulates across turns and is never cleared; retraining refits on the
/// full history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseArmModel {
    pub learner_id: LearnerId,
    pub exercise: ExerciseKind,
    pub params: Option<LinearModelParams>,
    pub trained: bool,
    pub buffer: Vec<RewardSample>,
    pub updated_at: DateTime<Utc>,
}

impl ExerciseArmModel {
    pub fn untrained(learner_id: LearnerId, exercise: ExerciseKind, now: DateTime<Utc>) -> Self {
        Self {
            learner_id,
            exercise,
            params: None,
            trained: false,
            buffer: Vec::new(),
            updated_at: now,
        }
    }
}

/// Per-session state threaded through the turn-handling calls. Owned by
/// the caller: created when a learner's session starts, dropped when it
/// ends. Replaces ambient per-learner counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub started_at: DateTime<Utc>,
    pub answers_recorded: u32,
}

impl SessionState {
    pub fn start(now: DateTime<Utc>) -> Self {
        Self {
            started_at: now,
            answers_recorded: 0,
        }
    }

    pub fn record_answer(&mut self) {
        self.answers_recorded += 1;
    }
}
