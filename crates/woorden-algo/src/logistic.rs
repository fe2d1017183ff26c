//! Binary logistic regression.
//!
//! Small dense models (10-20 features, tens of rows) trained by full-batch
//! gradient descent with L2 regularization. Coefficients and intercept are
//! plain fields so trained models can be persisted and restored without
//! this crate owning a serialization format.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FitOptions {
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2_lambda: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            epochs: 500,
            l2_lambda: 0.001,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl LogisticRegression {
    pub fn new(dim: usize) -> Self {
        Self {
            weights: vec![0.0; dim],
            bias: 0.0,
        }
    }

    /// Rebuilds a model from persisted coefficients.
    pub fn from_params(weights: Vec<f64>, bias: f64) -> Self {
        Self { weights, bias }
    }

    fn sigmoid(x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }

    pub fn dim(&self) -> usize {
        self.weights.len()
    }

    /// Probability of the positive class. Features beyond the model
    /// dimension are ignored; missing features contribute nothing.
    pub fn predict_proba(&self, features: &[f64]) -> f64 {
        let z: f64 = self
            .weights
            .iter()
            .zip(features.iter())
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias;
        Self::sigmoid(z)
    }

    /// Parallel batch prediction.
    pub fn predict_batch(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.par_iter().map(|r| self.predict_proba(r)).collect()
    }

    /// Fits a fresh model on (rows, labels) where labels are 0.0 or 1.0.
    /// Deterministic: zero-initialized weights, fixed epoch count, no
    /// shuffling. Returns None for empty, ragged, or mismatched input.
    pub fn fit(rows: &[Vec<f64>], labels: &[f64], opts: &FitOptions) -> Option<Self> {
        let first = rows.first()?;
        let dim = first.len();
        if dim == 0 || rows.len() != labels.len() || rows.iter().any(|r| r.len() != dim) {
            return None;
        }

        let n = rows.len() as f64;
        let mut model = Self::new(dim);

        for _ in 0..opts.epochs {
            let mut grad_w = vec![0.0; dim];
            let mut grad_b = 0.0;

            for (row, &label) in rows.iter().zip(labels.iter()) {
                let error = label - model.predict_proba(row);
                for (g, x) in grad_w.iter_mut().zip(row.iter()) {
                    *g += error * x;
                }
                grad_b += error;
            }

            for (w, g) in model.weights.iter_mut().zip(grad_w.iter()) {
                *w += opts.learning_rate * (g / n - opts.l2_lambda * *w);
            }
            model.bias += opts.learning_rate * grad_b / n;
        }

        Some(model)
    }
}
