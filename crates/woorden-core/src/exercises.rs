//! Exercise rendering and answer checking.
//!
//! Multiple-choice prompts draw distractors from the learner's own active
//! vocabulary; free-text prompts take typed answers and match them with a
//! small tolerance for articles and multi-variant translations.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::error::CoreResult;
use crate::storage::Storage;
use crate::types::{ExerciseKind, VocabularyItem};

/// Wrong options presented alongside the correct answer.
pub const MAX_DISTRACTORS: usize = 3;
/// Containment matching only applies to answers longer than this many
/// characters, to avoid false positives on short words.
const MIN_CONTAINMENT_CHARS: usize = 3;
/// Leading articles stripped before free-text comparison.
const STRIP_ARTICLES: [&str; 2] = ["de ", "het "];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerShape {
    /// The learner picks one of the options.
    MultipleChoice,
    /// The learner types the answer.
    FreeText,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExercisePrompt {
    pub question: String,
    pub answer_shape: AnswerShape,
    /// Shuffled options for multiple choice; empty for free text.
    pub options: Vec<String>,
}

pub struct ExerciseManager {
    rng: ChaCha8Rng,
}

impl ExerciseManager {
    pub fn new(rng_seed: Option<u64>) -> Self {
        let rng = match rng_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self { rng }
    }

    /// Builds the prompt for an item in the given format.
    pub fn render_prompt(
        &mut self,
        storage: &dyn Storage,
        item: &VocabularyItem,
        kind: ExerciseKind,
    ) -> CoreResult<ExercisePrompt> {
        let (question, correct) = if kind.answers_in_source() {
            (
                format!("Translate to Dutch: '{}'", item.target_text),
                item.source_text.clone(),
            )
        } else {
            (
                format!("Translate to English: '{}'", item.source_text),
                item.target_text.clone(),
            )
        };

        if !kind.is_multiple_choice() {
            return Ok(ExercisePrompt {
                question,
                answer_shape: AnswerShape::FreeText,
                options: Vec::new(),
            });
        }

        let pool: Vec<VocabularyItem> = storage
            .active_items(item.learner_id, None)?
            .into_iter()
            .filter(|i| i.id != item.id)
            .collect();
        let mut options: Vec<String> = pool
            .choose_multiple(&mut self.rng, MAX_DISTRACTORS)
            .map(|i| {
                if kind.answers_in_source() {
                    i.source_text.clone()
                } else {
                    i.target_text.clone()
                }
            })
            .collect();
        options.push(correct);
        options.shuffle(&mut self.rng);

        Ok(ExercisePrompt {
            question,
            answer_shape: AnswerShape::MultipleChoice,
            options,
        })
    }

    /// Checks a raw answer against the item for the given format.
    /// Multiple choice requires a case-insensitive exact match. Free text
    /// also accepts a match after stripping one leading article from both
    /// sides, or containment in either direction for answers longer than
    /// three characters.
    pub fn check_answer(item: &VocabularyItem, kind: ExerciseKind, raw_answer: &str) -> bool {
        let correct = if kind.answers_in_source() {
            item.source_text.as_str()
        } else {
            item.target_text.as_str()
        };

        let user = raw_answer.trim().to_lowercase();
        let correct = correct.trim().to_lowercase();

        if kind.is_multiple_choice() {
            return user == correct;
        }

        if user == correct {
            return true;
        }

        if strip_leading_article(&user) == strip_leading_article(&correct) {
            return true;
        }

        if user.chars().count() > MIN_CONTAINMENT_CHARS
            && (correct.contains(&user) || user.contains(&correct))
        {
            return true;
        }

        false
    }
}

fn strip_leading_article(s: &str) -> &str {
    for article in STRIP_ARTICLES {
        if let Some(rest) = s.strip_prefix(article) {
            return rest;
        }
    }
    s
}
