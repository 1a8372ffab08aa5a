//! Feature candidate generator and similarity-based pruning (C4).
//!
//! Grounded on `AdaBoostFaceDetection::GenerateClassifierCadidates` and
//! `RemoveSimilarClassifierCandidates` in `RealTimeFaceDetection.cpp`.

use crate::features::{FeatureType, HaarFeature};

/// The enumerated Haar features for a stage, with a dense `live` bitset
/// standing in for the original's null-tombstone pattern: pruned entries are
/// marked dead in place so indices stay stable across a stage's training.
pub struct CandidatePool {
    features: Vec<HaarFeature>,
    live: Vec<bool>,
}

impl CandidatePool {
    /// Enumerates every `(position, size, type)` Haar feature on a
    /// `window`-sized square, stepped on a `stride`-pixel grid for origins
    /// and per-type minimum/step extents (spec 4.4).
    pub fn generate(window: usize, stride: usize) -> CandidatePool {
        let mut features = Vec::new();

        let mut s_row = 0;
        while s_row < window {
            let mut s_col = 0;
            while s_col < window {
                let row_max = window - s_row;
                let col_max = window - s_col;

                push_type(&mut features, s_row, s_col, row_max, col_max, 4, 8, FeatureType::V2);
                push_type(&mut features, s_row, s_col, row_max, col_max, 8, 4, FeatureType::H2);
                push_type(&mut features, s_row, s_col, row_max, col_max, 4, 12, FeatureType::V3);
                push_type(&mut features, s_row, s_col, row_max, col_max, 8, 8, FeatureType::D4);

                s_col += stride;
            }
            s_row += stride;
        }

        log::info!("generated {} Haar feature candidates", features.len());
        let live = vec![true; features.len()];
        CandidatePool { features, live }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.iter().all(|&alive| !alive)
    }

    pub fn feature(&self, idx: usize) -> &HaarFeature {
        &self.features[idx]
    }

    pub fn is_live(&self, idx: usize) -> bool {
        self.live[idx]
    }

    pub fn live_count(&self) -> usize {
        self.live.iter().filter(|&&a| a).count()
    }

    /// Removes every remaining live candidate whose similarity to `chosen`
    /// exceeds `threshold`.
    pub fn prune_similar(&mut self, chosen: &HaarFeature, threshold: f64) {
        let mut remaining = 0;
        for (idx, feature) in self.features.iter().enumerate() {
            if self.live[idx] && feature.similarity(chosen) > threshold {
                self.live[idx] = false;
            } else if self.live[idx] {
                remaining += 1;
            }
        }
        log::debug!("  valid candidate count: {}", remaining);
    }
}

#[allow(clippy::too_many_arguments)]
fn push_type(
    out: &mut Vec<HaarFeature>,
    s_row: usize,
    s_col: usize,
    row_max: usize,
    col_max: usize,
    row_step: usize,
    col_step: usize,
    feature_type: FeatureType,
) {
    let mut l_row = row_step;
    while l_row <= row_max {
        let mut l_col = col_step;
        while l_col <= col_max {
            out.push(HaarFeature::new(s_row, s_col, l_row, l_col, feature_type));
            l_col += col_step;
        }
        l_row += row_step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_features_respect_window_bounds() {
        let pool = CandidatePool::generate(24, 4);
        assert!(!pool.is_empty());
        for idx in 0..pool.len() {
            let f = pool.feature(idx);
            assert!(f.s_row + f.l_row <= 24);
            assert!(f.s_col + f.l_col <= 24);
        }
    }

    #[test]
    fn pruning_marks_similar_candidates_dead() {
        let mut pool = CandidatePool::generate(24, 4);
        let before = pool.live_count();
        let chosen = HaarFeature::new(0, 0, 8, 8, FeatureType::D4);
        pool.prune_similar(&chosen, 0.24);
        assert!(pool.live_count() < before);
    }
}
