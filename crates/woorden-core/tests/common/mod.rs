//! Shared helpers for integration tests.

use chrono::{Duration, Utc};
use woorden_core::{Learner, MemoryStore, ReviewEvent, Storage, VocabularyItem};

pub const DUTCH_WORDS: [(&str, &str); 10] = [
    ("het huis", "the house"),
    ("de kat", "the cat"),
    ("de hond", "the dog"),
    ("brood", "bread"),
    ("water", "water"),
    ("zwemmen", "to swim"),
    ("lopen", "to walk"),
    ("drie", "three"),
    ("mooi", "beautiful"),
    ("één", "one"),
];

/// Registers a learner with the full sample vocabulary.
pub fn seed_learner(store: &MemoryStore, external_id: &str) -> (Learner, Vec<VocabularyItem>) {
    let now = Utc::now();
    let learner = store.add_learner(external_id, now);
    let items = DUTCH_WORDS
        .iter()
        .map(|(nl, en)| store.add_item(learner.id, nl, en, now))
        .collect();
    (learner, items)
}

/// Gives an item a review history with the requested accuracy profile and
/// matching progress counters, so mastery training has signal to fit.
pub fn give_history(
    store: &MemoryStore,
    learner: &Learner,
    item: &VocabularyItem,
    reviews: u32,
    correct: u32,
    kind: woorden_core::ExerciseKind,
) {
    let now = Utc::now();
    for i in 0..reviews {
        store
            .append_review_event(&ReviewEvent::new(
                learner.id,
                item.id,
                kind,
                i < correct,
                3.0 + i as f64,
                now - Duration::days((reviews - i) as i64),
            ))
            .unwrap();
    }

    let mut updated = item.clone();
    updated.times_seen = reviews;
    updated.times_correct = correct;
    updated.mastery_level = if reviews == 0 {
        0.0
    } else {
        ((correct as f64 / reviews as f64) * (reviews as f64 / 10.0)).min(1.0)
    };
    updated.last_seen = Some(now - Duration::days(1));
    store.update_vocabulary_item(&updated).unwrap();
}
