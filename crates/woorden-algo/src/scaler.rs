//! Per-feature standardization.
//!
//! Centers each feature on its mean and divides by its standard deviation,
//! the same transform the reward and mastery models are trained against.
//! Parameters are plain vectors so they can be persisted alongside model
//! coefficients and restored without refitting.

use serde::{Deserialize, Serialize};

/// Lower bound on a stored scale entry. A constant feature column gets a
/// scale of 1.0 at fit time; this guard only protects against degenerate
/// restored parameters.
pub const MIN_SCALE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Fits mean and scale over the rows. Constant columns scale by 1.0 so
    /// transformed values stay finite. Returns None for empty input or
    /// ragged rows.
    pub fn fit(rows: &[Vec<f64>]) -> Option<Self> {
        let first = rows.first()?;
        let dim = first.len();
        if dim == 0 || rows.iter().any(|r| r.len() != dim) {
            return None;
        }

        let n = rows.len() as f64;
        let mut mean = vec![0.0; dim];
        for row in rows {
            for (m, x) in mean.iter_mut().zip(row.iter()) {
                *m += x;
            }
        }
        for m in mean.iter_mut() {
            *m /= n;
        }

        let mut scale = vec![0.0; dim];
        for row in rows {
            for (i, x) in row.iter().enumerate() {
                let d = x - mean[i];
                scale[i] += d * d;
            }
        }
        for s in scale.iter_mut() {
            *s = (*s / n).sqrt();
            if *s < MIN_SCALE {
                *s = 1.0;
            }
        }

        Some(Self { mean, scale })
    }

    /// Rebuilds a scaler from persisted parameters. Degenerate scale
    /// entries are floored so transform never divides by zero.
    pub fn from_params(mean: Vec<f64>, scale: Vec<f64>) -> Self {
        let scale = scale
            .into_iter()
            .map(|s| if s.is_finite() && s >= MIN_SCALE { s } else { 1.0 })
            .collect();
        Self { mean, scale }
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }

    pub fn transform_rows(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter().map(|r| self.transform(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_computes_mean_and_scale() {
        let rows = vec![vec![1.0, 10.0], vec![3.0, 10.0], vec![5.0, 10.0]];
        let scaler = StandardScaler::fit(&rows).unwrap();
        assert!((scaler.mean[0] - 3.0).abs() < 1e-9);
        assert!((scaler.mean[1] - 10.0).abs() < 1e-9);
        // population std of [1, 3, 5]
        let expected = (8.0f64 / 3.0).sqrt();
        assert!((scaler.scale[0] - expected).abs() < 1e-9);
        // constant column
        assert_eq!(scaler.scale[1], 1.0);
    }

    #[test]
    fn transform_centers_and_scales() {
        let rows = vec![vec![0.0], vec![2.0]];
        let scaler = StandardScaler::fit(&rows).unwrap();
        let out = scaler.transform(&[2.0]);
        assert!((out[0] - 1.0).abs() < 1e-9);
        let out = scaler.transform(&[0.0]);
        assert!((out[0] + 1.0).abs() < 1e-9);
    }

    #[test]
    fn fit_rejects_empty_and_ragged_input() {
        assert!(StandardScaler::fit(&[]).is_none());
        assert!(StandardScaler::fit(&[vec![]]).is_none());
        let ragged = vec![vec![1.0, 2.0], vec![1.0]];
        assert!(StandardScaler::fit(&ragged).is_none());
    }

    #[test]
    fn from_params_floors_degenerate_scales() {
        let scaler = StandardScaler::from_params(vec![0.0, 0.0], vec![0.0, f64::NAN]);
        assert_eq!(scaler.scale, vec![1.0, 1.0]);
        let out = scaler.transform(&[3.0, 4.0]);
        assert_eq!(out, vec![3.0, 4.0]);
    }

    #[test]
    fn transform_rows_matches_single_transform() {
        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let scaler = StandardScaler::fit(&rows).unwrap();
        let batch = scaler.transform_rows(&rows);
        assert_eq!(batch[0], scaler.transform(&rows[0]));
        assert_eq!(batch[1], scaler.transform(&rows[1]));
    }
}
