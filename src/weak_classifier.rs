//! Weak learner (C3): sorted-sweep threshold and polarity search for a
//! single Haar feature.
//!
//! Grounded on `HaarClassifier::Learn` in `RealTimeFaceDetection.cpp`, with
//! one deliberate correction over the original: the sweep consumes
//! equal-valued positives *and* negatives together before recording an
//! error, so equal-valued positives and negatives never straddle the
//! threshold. The original's sweep sometimes records an error after only
//! one side of a tie has been consumed; this crate does not replicate that.

use crate::features::Polarity;

#[derive(Debug, Clone, Copy)]
pub struct WeakLearnResult {
    pub threshold: f64,
    pub polarity: Polarity,
    pub error: f64,
}

/// Finds the `(threshold, polarity)` minimizing weighted misclassification
/// error for one feature, given its already-evaluated values on every
/// positive and negative sample.
pub fn train_stump(
    pos_values: &[i64],
    pos_weights: &[f64],
    neg_values: &[i64],
    neg_weights: &[f64],
) -> WeakLearnResult {
    assert_eq!(pos_values.len(), pos_weights.len());
    assert_eq!(neg_values.len(), neg_weights.len());

    let mut pos: Vec<(i64, f64)> = pos_values
        .iter()
        .zip(pos_weights.iter())
        .map(|(&v, &w)| (v, w))
        .collect();
    let mut neg: Vec<(i64, f64)> = neg_values
        .iter()
        .zip(neg_weights.iter())
        .map(|(&v, &w)| (v, w))
        .collect();
    pos.sort_by_key(|&(v, _)| v);
    neg.sort_by_key(|&(v, _)| v);

    let total_pos: f64 = pos_weights.iter().sum();
    let total_neg: f64 = neg_weights.iter().sum();

    let mut pi = 0;
    let mut ni = 0;
    let mut face_acc = 0.0;
    let mut nonface_acc = 0.0;

    let mut best_error = f64::INFINITY;
    let mut best_threshold = 0.0;
    let mut best_polarity = Polarity::Less;

    while pi < pos.len() || ni < neg.len() {
        let cur_value = match (pi < pos.len(), ni < neg.len()) {
            (true, true) => pos[pi].0.min(neg[ni].0),
            (true, false) => pos[pi].0,
            (false, true) => neg[ni].0,
            (false, false) => unreachable!(),
        };

        while pi < pos.len() && pos[pi].0 == cur_value {
            face_acc += pos[pi].1;
            pi += 1;
        }
        while ni < neg.len() && neg[ni].0 == cur_value {
            nonface_acc += neg[ni].1;
            ni += 1;
        }

        let less_error = (total_pos - face_acc) + nonface_acc;
        let greater_error = face_acc + (total_neg - nonface_acc);

        if less_error < best_error {
            best_error = less_error;
            best_threshold = cur_value as f64 + 0.25;
            best_polarity = Polarity::Less;
        }
        if greater_error < best_error {
            best_error = greater_error;
            best_threshold = cur_value as f64 + 0.25;
            best_polarity = Polarity::Greater;
        }
    }

    WeakLearnResult {
        threshold: best_threshold,
        polarity: best_polarity,
        error: best_error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separable_case_finds_zero_error_threshold() {
        // Positives all at feature value 0, negatives all at feature value
        // 10, uniform weights.
        let pos_values = vec![0i64; 20];
        let pos_weights = vec![1.0 / 20.0; 20];
        let neg_values = vec![10i64; 20];
        let neg_weights = vec![1.0 / 20.0; 20];

        let result = train_stump(&pos_values, &pos_weights, &neg_values, &neg_weights);
        assert!(result.error < 1e-9);
        assert_eq!(result.polarity, Polarity::Less);
        assert!(result.threshold > 0.0 && result.threshold < 10.0);
    }

    #[test]
    fn ties_across_classes_are_consumed_together() {
        // A positive and a negative share the same feature value; neither
        // "less" nor "greater" can separate them perfectly, so the best
        // achievable error is bounded below by the tied mass.
        let pos_values = vec![5i64, 0];
        let pos_weights = vec![0.25, 0.25];
        let neg_values = vec![5i64, 10];
        let neg_weights = vec![0.25, 0.25];

        let result = train_stump(&pos_values, &pos_weights, &neg_values, &neg_weights);
        assert!(result.error <= 0.25 + 1e-9);
    }
}
