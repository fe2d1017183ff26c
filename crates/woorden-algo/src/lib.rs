//! # woorden-algo - online-learning primitives for vocabulary review
//!
//! Pure-Rust building blocks shared by the review core:
//!
//! - **Logistic regression** - binary reward/mastery models trained by
//!   batch gradient descent
//! - **Standard scaling** - per-feature mean/scale normalization with
//!   restorable parameters
//! - **Epsilon-greedy policy** - exploration/exploitation arm choice with
//!   a weighted fallback pool
//! - **Sanitization** - numerical-stability guards for feature vectors
//!
//! Design goals:
//! - **Pure Rust** - no I/O, no clocks, no global state
//! - **Reusable** - models carry their own parameters and serialize with
//!   serde, so callers own persistence
//! - **Fully tested** - every module has unit tests
//!
//! ## Module structure
//!
//! - [`logistic`] - binary classifier (fit, probability, batch predict)
//! - [`scaler`] - feature standardization
//! - [`policy`] - epsilon-greedy selection helpers
//! - [`sanitize`] - numerical stability utilities

pub mod logistic;
pub mod policy;
pub mod sanitize;
pub mod scaler;

pub use logistic::{FitOptions, LogisticRegression};
pub use policy::{epsilon_greedy, weighted_choice, PolicyChoice};
pub use sanitize::{has_invalid_values, sanitize_feature_vector, MAX_FEATURE_ABS};
pub use scaler::StandardScaler;
