//! Spaced-repetition scheduling (SM-2 style).
//!
//! Selection prefers due items and falls back through unseen, lowest
//! predicted mastery, and least recently seen. Updates grow the review
//! interval geometrically by a bounded ease factor on success and reset
//! it on failure.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::CoreResult;
use crate::mastery::{MasteryPrediction, MasteryPredictor};
use crate::storage::{EventFilter, Storage};
use crate::types::{
    Learner, VocabularyItem, MAX_EASE_FACTOR, MIN_EASE_FACTOR,
};

/// First and second review intervals, in days.
const INITIAL_INTERVALS: [i64; 2] = [1, 6];
const EASE_FACTOR_BONUS: f64 = 0.1;
const EASE_FACTOR_PENALTY: f64 = 0.2;
/// Denominator of the exposure weight in the heuristic mastery level.
const MASTERY_EXPOSURE_SCALE: f64 = 10.0;

/// Aggregate review counts for a learner's active vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReviewStats {
    /// Scheduled items whose review time has passed.
    pub due_for_review: usize,
    /// Items never reviewed.
    pub new_available: usize,
    /// Items reviewed at least once.
    pub in_progress: usize,
}

#[derive(Debug, Default)]
pub struct ReviewScheduler;

impl ReviewScheduler {
    pub fn new() -> Self {
        Self
    }

    /// Picks the next item to review. Due items win (never-scheduled
    /// first, then earliest deadline, ties by lowest mastery); otherwise
    /// an unseen item, oldest first; otherwise the seen item with the
    /// lowest predicted mastery once a model exists; otherwise the least
    /// recently seen item. None only when the learner has no active
    /// vocabulary.
    pub fn pick_next(
        &self,
        storage: &dyn Storage,
        mastery: &MasteryPredictor,
        learner: &Learner,
        now: DateTime<Utc>,
    ) -> CoreResult<Option<VocabularyItem>> {
        let items = storage.active_items(learner.id, None)?;
        if items.is_empty() {
            return Ok(None);
        }

        let mut due: Vec<&VocabularyItem> = items
            .iter()
            .filter(|i| i.next_review_at.map_or(true, |at| at <= now))
            .collect();
        if !due.is_empty() {
            due.sort_by(|a, b| compare_due(a, b));
            return Ok(Some(due[0].clone()));
        }

        let mut unseen: Vec<&VocabularyItem> =
            items.iter().filter(|i| !i.is_seen()).collect();
        if !unseen.is_empty() {
            unseen.sort_by_key(|i| i.added_at);
            return Ok(Some(unseen[0].clone()));
        }

        // All items are seen and scheduled in the future. Surface the
        // weakest one by model prediction when a model exists.
        if mastery.is_trained(learner.id) {
            let mut weakest: Option<(&VocabularyItem, f64)> = None;
            for item in &items {
                if let MasteryPrediction::Predicted(p) =
                    mastery.predict(storage, learner.id, item, now)?
                {
                    if weakest.map_or(true, |(_, best)| p < best) {
                        weakest = Some((item, p));
                    }
                }
            }
            if let Some((item, p)) = weakest {
                debug!(item = %item.id, predicted = p, "picked weakest item by model");
                return Ok(Some(item.clone()));
            }
        }

        let least_recent = items
            .iter()
            .min_by_key(|i| i.last_seen)
            .cloned();
        Ok(least_recent)
    }

    /// Applies one answer to the item's schedule, progress counters, and
    /// heuristic mastery. The review event for this answer must already be
    /// appended; the previous interval reads off the two most recent
    /// events.
    pub fn record_outcome(
        &self,
        storage: &dyn Storage,
        item: &mut VocabularyItem,
        correct: bool,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        let mut repetition_count = item.repetition_count + 1;
        let mut ease_factor = item.ease_factor;

        let interval_days = if correct {
            let interval = match repetition_count {
                1 => INITIAL_INTERVALS[0],
                2 => INITIAL_INTERVALS[1],
                _ => {
                    let prev = self.previous_interval_days(storage, item)?;
                    ((prev as f64 * ease_factor).round() as i64).max(1)
                }
            };
            ease_factor = (ease_factor + EASE_FACTOR_BONUS).min(MAX_EASE_FACTOR);
            interval
        } else {
            repetition_count = 0;
            ease_factor = (ease_factor - EASE_FACTOR_PENALTY).max(MIN_EASE_FACTOR);
            INITIAL_INTERVALS[0]
        };

        item.next_review_at = Some(now + Duration::days(interval_days));
        item.repetition_count = repetition_count;
        item.ease_factor = ease_factor;

        item.times_seen += 1;
        if correct {
            item.times_correct += 1;
        }
        item.last_seen = Some(now);
        item.mastery_level =
            (item.accuracy() * (item.times_seen as f64 / MASTERY_EXPOSURE_SCALE)).min(1.0);

        storage.update_vocabulary_item(item)?;
        Ok(())
    }

    /// Day difference between the item's two most recent review events,
    /// floored at one day. Defaults to one day with fewer than two events.
    fn previous_interval_days(
        &self,
        storage: &dyn Storage,
        item: &VocabularyItem,
    ) -> CoreResult<i64> {
        let events = storage.review_events(item.learner_id, EventFilter::for_item(item.id))?;
        if events.len() < 2 {
            return Ok(1);
        }
        let latest = events[events.len() - 1].timestamp;
        let previous = events[events.len() - 2].timestamp;
        Ok((latest - previous).num_days().max(1))
    }

    pub fn review_stats(
        &self,
        storage: &dyn Storage,
        learner: &Learner,
        now: DateTime<Utc>,
    ) -> CoreResult<ReviewStats> {
        let items = storage.active_items(learner.id, None)?;
        Ok(ReviewStats {
            due_for_review: items
                .iter()
                .filter(|i| i.next_review_at.map_or(false, |at| at <= now))
                .count(),
            new_available: items.iter().filter(|i| !i.is_seen()).count(),
            in_progress: items.iter().filter(|i| i.is_seen()).count(),
        })
    }
}

/// Never-scheduled items first, then earliest deadline; lowest mastery
/// breaks ties.
fn compare_due(a: &VocabularyItem, b: &VocabularyItem) -> Ordering {
    let by_deadline = match (a.next_review_at, b.next_review_at) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.cmp(&y),
    };
    by_deadline.then(
        a.mastery_level
            .partial_cmp(&b.mastery_level)
            .unwrap_or(Ordering::Equal),
    )
}
