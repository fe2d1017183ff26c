//! Epsilon-greedy selection over a fixed set of arms.
//!
//! Arms are addressed by index. A score of `None` marks an arm whose model
//! is untrained or unusable; such arms never win exploitation but remain
//! eligible for exploration. When no arm has a score, choice falls back to
//! a weighted pool.

use rand::Rng;

/// Outcome of an epsilon-greedy draw, carrying the winning arm index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyChoice {
    /// Uniform random draw across all arms.
    Explore(usize),
    /// Highest-scoring arm among those with a score.
    Exploit(usize),
    /// Weighted draw because no arm had a score.
    Fallback(usize),
}

impl PolicyChoice {
    pub fn index(&self) -> usize {
        match *self {
            Self::Explore(i) | Self::Exploit(i) | Self::Fallback(i) => i,
        }
    }
}

/// Draws an index from `weights` proportionally. Zero-weight arms are
/// never drawn unless every weight is zero, in which case the draw is
/// uniform.
pub fn weighted_choice<R: Rng + ?Sized>(rng: &mut R, weights: &[u32]) -> usize {
    let total: u32 = weights.iter().sum();
    if total == 0 {
        return rng.gen_range(0..weights.len());
    }
    let mut pick = rng.gen_range(0..total);
    for (i, &w) in weights.iter().enumerate() {
        if pick < w {
            return i;
        }
        pick -= w;
    }
    weights.len() - 1
}

/// Epsilon-greedy over `scores`. `fallback_weights` must have the same
/// length as `scores`. Returns None when `scores` is empty.
pub fn epsilon_greedy<R: Rng + ?Sized>(
    rng: &mut R,
    epsilon: f64,
    scores: &[Option<f64>],
    fallback_weights: &[u32],
) -> Option<PolicyChoice> {
    if scores.is_empty() || scores.len() != fallback_weights.len() {
        return None;
    }

    if epsilon > 0.0 && rng.gen::<f64>() < epsilon {
        return Some(PolicyChoice::Explore(rng.gen_range(0..scores.len())));
    }

    let mut best: Option<(usize, f64)> = None;
    for (i, score) in scores.iter().enumerate() {
        if let Some(s) = *score {
            if s.is_finite() && best.map_or(true, |(_, b)| s > b) {
                best = Some((i, s));
            }
        }
    }

    match best {
        Some((i, _)) => Some(PolicyChoice::Exploit(i)),
        None => Some(PolicyChoice::Fallback(weighted_choice(rng, fallback_weights))),
    }
}
