//! Feature extraction for the mastery and reward models.
//!
//! Three pure feature groups (word, per-item session history, learner
//! global) are assembled into two fixed-order vectors. The field order is
//! part of the persisted-model contract: changing it invalidates stored
//! coefficients, which is what [`FEATURE_VERSION`] guards.

use chrono::{DateTime, Timelike, Utc};

use crate::types::{ReviewEvent, VocabularyItem};
use woorden_algo::sanitize_feature_vector;

pub use crate::types::FEATURE_VERSION;

/// Dimension of the mastery-model vector.
pub const MASTERY_DIM: usize = 15;
/// Dimension of the bandit context vector.
pub const BANDIT_DIM: usize = 10;

/// Assumed answer latency when an item has no recorded latencies.
pub const DEFAULT_RESPONSE_TIME: f64 = 10.0;
/// Assumed global accuracy for a learner with no history.
pub const DEFAULT_GLOBAL_ACCURACY: f64 = 0.5;
/// Recent-performance window, in events.
const RECENT_WINDOW: usize = 5;

/// Article prefixes that mark a noun as carrying grammatical gender.
const ARTICLE_PREFIXES: [&str; 2] = ["de ", "het "];
/// Prefixes accepted for the noun part-of-speech bonus.
const NOUN_PREFIXES: [&str; 3] = ["de ", "het ", "een "];
const DIACRITICS: &str = "áàäéèëíìïóòöúùüñç";
const NUMBER_WORDS: [&str; 10] = [
    "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
];

#[derive(Debug, Clone, PartialEq)]
pub struct WordFeatures {
    pub length: usize,
    pub difficulty: f64,
    pub has_article: bool,
    pub is_compound: bool,
    pub has_diacritics: bool,
    pub is_verb: bool,
    pub is_number: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionFeatures {
    pub total: usize,
    pub accuracy: f64,
    pub avg_response_time: f64,
    pub days_since_first: i64,
    pub days_since_last: i64,
    pub recent_accuracy: f64,
    pub exercise_diversity: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserFeatures {
    pub global_accuracy: f64,
    pub hour_of_day: u32,
}

/// Additive difficulty heuristic over the word's surface form, in [0, 1].
pub fn word_difficulty(source_text: &str, target_text: &str) -> f64 {
    if source_text.is_empty() {
        return 0.5;
    }

    let mut difficulty = 0.0;

    // Base difficulty from word length, capped at 0.5.
    let length = source_text.chars().count() as f64;
    difficulty += (length * 0.03).min(0.5);

    if has_article_prefix(source_text) {
        difficulty += 0.2;
    }
    if is_compound(source_text) {
        difficulty += 0.15;
    }
    if has_diacritics(source_text) {
        difficulty += 0.1;
    }

    // Part of speech inferred from surface patterns.
    if !target_text.is_empty() {
        if target_text.starts_with("to ") {
            difficulty += 0.2; // verb
        } else if NOUN_PREFIXES.iter().any(|p| source_text.starts_with(p)) {
            difficulty += 0.1; // noun
        } else if NUMBER_WORDS.contains(&target_text) {
            difficulty += 0.05; // number
        } else {
            difficulty += 0.1; // adjective/adverb/other
        }
    }

    difficulty.min(1.0)
}

fn has_article_prefix(source_text: &str) -> bool {
    ARTICLE_PREFIXES.iter().any(|p| source_text.starts_with(p))
}

fn is_compound(source_text: &str) -> bool {
    source_text.split_whitespace().count() > 1
}

fn has_diacritics(source_text: &str) -> bool {
    source_text
        .chars()
        .flat_map(|c| c.to_lowercase())
        .any(|c| DIACRITICS.contains(c))
}

pub fn word_features(item: &VocabularyItem) -> WordFeatures {
    let source = item.source_text.as_str();
    let target = item.target_text.as_str();
    if source.is_empty() {
        return WordFeatures {
            length: 0,
            difficulty: 0.5,
            has_article: false,
            is_compound: false,
            has_diacritics: false,
            is_verb: false,
            is_number: false,
        };
    }

    WordFeatures {
        length: source.chars().count(),
        difficulty: word_difficulty(source, target),
        has_article: has_article_prefix(source),
        is_compound: is_compound(source),
        has_diacritics: has_diacritics(source),
        is_verb: target.starts_with("to "),
        is_number: NUMBER_WORDS.contains(&target),
    }
}

/// Session features over one item's review events, oldest first.
pub fn session_features(events: &[ReviewEvent], now: DateTime<Utc>) -> SessionFeatures {
    if events.is_empty() {
        return SessionFeatures {
            total: 0,
            accuracy: 0.0,
            avg_response_time: DEFAULT_RESPONSE_TIME,
            days_since_first: 0,
            days_since_last: 0,
            recent_accuracy: 0.0,
            exercise_diversity: 0,
        };
    }

    let total = events.len();
    let correct = events.iter().filter(|e| e.correct).count();
    let accuracy = correct as f64 / total as f64;

    let latencies: Vec<f64> = events
        .iter()
        .map(|e| e.response_time_secs)
        .filter(|&t| t > 0.0)
        .collect();
    let avg_response_time = if latencies.is_empty() {
        DEFAULT_RESPONSE_TIME
    } else {
        latencies.iter().sum::<f64>() / latencies.len() as f64
    };

    let days_since_first = (now - events[0].timestamp).num_days().max(0);
    let days_since_last = (now - events[total - 1].timestamp).num_days().max(0);

    let recent = &events[total.saturating_sub(RECENT_WINDOW)..];
    let recent_accuracy =
        recent.iter().filter(|e| e.correct).count() as f64 / recent.len() as f64;

    let mut kinds: Vec<_> = events.iter().map(|e| e.exercise).collect();
    kinds.sort_by_key(|k| k.as_str());
    kinds.dedup();

    SessionFeatures {
        total,
        accuracy,
        avg_response_time,
        days_since_first,
        days_since_last,
        recent_accuracy,
        exercise_diversity: kinds.len(),
    }
}

/// Learner-global features over all of the learner's review events.
pub fn user_features(events: &[ReviewEvent], now: DateTime<Utc>) -> UserFeatures {
    let global_accuracy = if events.is_empty() {
        DEFAULT_GLOBAL_ACCURACY
    } else {
        events.iter().filter(|e| e.correct).count() as f64 / events.len() as f64
    };

    UserFeatures {
        global_accuracy,
        hour_of_day: now.hour(),
    }
}

/// 15-dimensional mastery-model vector. Order is the model contract.
pub fn mastery_vector(
    word: &WordFeatures,
    session: &SessionFeatures,
    user: &UserFeatures,
) -> Vec<f64> {
    let mut v = vec![
        word.length as f64,
        word.difficulty,
        word.has_article as u8 as f64,
        word.is_compound as u8 as f64,
        word.has_diacritics as u8 as f64,
        word.is_verb as u8 as f64,
        word.is_number as u8 as f64,
        session.total as f64,
        session.accuracy,
        session.avg_response_time,
        session.days_since_first as f64,
        session.days_since_last as f64,
        session.recent_accuracy,
        session.exercise_diversity as f64,
        user.global_accuracy,
    ];
    debug_assert_eq!(v.len(), MASTERY_DIM);
    sanitize_feature_vector(&mut v);
    v
}

/// 10-dimensional bandit context vector (reduced subset). Order is the
/// model contract.
pub fn bandit_vector(
    word: &WordFeatures,
    session: &SessionFeatures,
    user: &UserFeatures,
) -> Vec<f64> {
    let mut v = vec![
        word.length as f64,
        word.difficulty,
        word.has_article as u8 as f64,
        word.is_compound as u8 as f64,
        word.is_verb as u8 as f64,
        session.accuracy,
        session.avg_response_time,
        session.total as f64,
        user.hour_of_day as f64,
        user.global_accuracy,
    ];
    debug_assert_eq!(v.len(), BANDIT_DIM);
    sanitize_feature_vector(&mut v);
    v
}

/// Mastery vector straight from an item and its event history.
pub fn mastery_vector_for(
    item: &VocabularyItem,
    item_events: &[ReviewEvent],
    learner_events: &[ReviewEvent],
    now: DateTime<Utc>,
) -> Vec<f64> {
    mastery_vector(
        &word_features(item),
        &session_features(item_events, now),
        &user_features(learner_events, now),
    )
}

/// Bandit context vector straight from an item and its event history.
pub fn bandit_vector_for(
    item: &VocabularyItem,
    item_events: &[ReviewEvent],
    learner_events: &[ReviewEvent],
    now: DateTime<Utc>,
) -> Vec<f64> {
    bandit_vector(
        &word_features(item),
        &session_features(item_events, now),
        &user_features(learner_events, now),
    )
}
