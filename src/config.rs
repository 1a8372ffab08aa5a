//! Training configuration knobs.
//!
//! Defaults match the legacy constants that `RealTimeFaceDetection.cpp`
//! hardcoded inline (`AdaBoostFaceDetection::AdaBoostFaceDetection`,
//! `GenerateClassifierCadidates`, `TrainWeakClassifier`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Fraction of positives a stage must keep after bias fitting (rho).
    pub recall: f64,
    /// Similarity above which a candidate is pruned after a feature is chosen.
    pub similarity_threshold: f64,
    /// Grid stride, in pixels, used both for candidate origin and for the
    /// minimum-extent step sizes in `candidates::generate`.
    pub candidate_stride: usize,
    /// Clamp applied to weak-learner training error before computing weights.
    pub epsilon_min: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            recall: 0.999,
            similarity_threshold: 0.24,
            candidate_stride: 4,
            epsilon_min: 1.0e-10,
        }
    }
}
