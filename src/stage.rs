//! AdaBoost stage training (C5).
//!
//! A stage is a weighted additive ensemble of `HaarClassifier`s plus a bias
//! fit to hit a target recall on the positive set. Grounded on
//! `AdaBoostFaceDetection` in `RealTimeFaceDetection.cpp`; the progress-bar
//! pattern over the candidate pool follows `WeakClassifier::get_optimals`.

use std::io::{self, Write};

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use crate::candidates::CandidatePool;
use crate::config::TrainingConfig;
use crate::error::{DetectorError, Result};
use crate::features::HaarClassifier;
use crate::preprocess::ImageLoader;
use crate::weak_classifier::{self, WeakLearnResult};

pub struct Stage {
    pub classifiers: Vec<HaarClassifier>,
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl Stage {
    /// Trains `target_count` rounds of boosting. `neg_valid` selects which
    /// negatives from `neg` are still live survivors of earlier stages.
    pub fn train(
        pos: &ImageLoader,
        neg: &ImageLoader,
        neg_valid: &[bool],
        target_count: usize,
        config: &TrainingConfig,
    ) -> Result<Stage> {
        let pos_count = pos.count();
        let neg_indices: Vec<usize> = neg_valid
            .iter()
            .enumerate()
            .filter_map(|(i, &valid)| valid.then_some(i))
            .collect();
        let neg_count = neg_indices.len();

        if neg_count == 0 {
            log::info!("no valid negative data remains for this stage");
            return Err(DetectorError::EmptyInput(
                "no valid negative samples remain".into(),
            ));
        }

        let mut pos_weights = vec![0.5 / pos_count as f64; pos_count];
        let mut neg_weights = vec![0.5 / neg_count as f64; neg_count];

        let window = pos.image_width(0);
        let mut pool = CandidatePool::generate(window, config.candidate_stride);

        let mut classifiers = Vec::with_capacity(target_count);
        let mut weights = Vec::with_capacity(target_count);

        for round in 0..target_count {
            if pool.is_empty() {
                log::warn!("candidate pool exhausted at round {}", round);
                return Err(DetectorError::InvalidResult(
                    "weak learner found no usable feature".into(),
                ));
            }

            let pb = ProgressBar::new(pool.live_count() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {wide_bar} ({eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );

            // The selection step is embarrassingly parallel per candidate;
            // the only shared state is the read-only image loaders. Ties
            // break on the lowest candidate index so selection stays
            // deterministic under any thread scheduling.
            let best: (usize, WeakLearnResult) = (0..pool.len())
                .into_par_iter()
                .filter(|&idx| pool.is_live(idx))
                .map(|idx| {
                    let feature = pool.feature(idx);
                    let pos_values: Vec<i64> = (0..pos_count)
                        .map(|pid| feature.value_at(&pos.view(pid), 0, 0, 1.0))
                        .collect();
                    let neg_values: Vec<i64> = neg_indices
                        .iter()
                        .map(|&nid| feature.value_at(&neg.view(nid), 0, 0, 1.0))
                        .collect();
                    let result =
                        weak_classifier::train_stump(&pos_values, &pos_weights, &neg_values, &neg_weights);
                    pb.inc(1);
                    (idx, result)
                })
                .reduce_with(|a, b| {
                    if b.1.error < a.1.error || (b.1.error == a.1.error && b.0 < a.0) {
                        b
                    } else {
                        a
                    }
                })
                .expect("pool is non-empty here");
            pb.finish_and_clear();

            let (chosen_idx, learn_result) = best;
            let feature = *pool.feature(chosen_idx);
            let classifier =
                HaarClassifier::new(feature, learn_result.threshold, learn_result.polarity);

            let mut training_error = 0.0;
            let pos_mistakes: Vec<bool> = (0..pos_count)
                .map(|pid| {
                    let mistake = !classifier.predict(&pos.view(pid));
                    if mistake {
                        training_error += pos_weights[pid];
                    }
                    mistake
                })
                .collect();
            let neg_mistakes: Vec<bool> = neg_indices
                .iter()
                .enumerate()
                .map(|(i, &nid)| {
                    let mistake = classifier.predict(&neg.view(nid));
                    if mistake {
                        training_error += neg_weights[i];
                    }
                    mistake
                })
                .collect();

            let eps_min = config.epsilon_min;
            if training_error > 1.0 - eps_min {
                log::warn!(
                    "round {}: training error {} overflowed, clamped to {}",
                    round,
                    training_error,
                    1.0 - eps_min
                );
                training_error = 1.0 - eps_min;
            } else if training_error < eps_min {
                log::warn!(
                    "round {}: training error {} underflowed, clamped to {}",
                    round,
                    training_error,
                    eps_min
                );
                training_error = eps_min;
            }

            let beta = training_error / (1.0 - training_error);
            let weight = ((1.0 - training_error) / training_error).ln();
            log::debug!(
                "round {}: error={} weight={} beta={}",
                round,
                training_error,
                weight,
                beta
            );

            let mut weight_sum = 0.0;
            for (w, &mistake) in pos_weights.iter_mut().zip(pos_mistakes.iter()) {
                *w *= beta.powf(1.0 - mistake as u8 as f64);
                weight_sum += *w;
            }
            for (w, &mistake) in neg_weights.iter_mut().zip(neg_mistakes.iter()) {
                *w *= beta.powf(1.0 - mistake as u8 as f64);
                weight_sum += *w;
            }
            for w in pos_weights.iter_mut() {
                *w /= weight_sum;
            }
            for w in neg_weights.iter_mut() {
                *w /= weight_sum;
            }

            pool.prune_similar(&feature, config.similarity_threshold);

            classifiers.push(classifier);
            weights.push(weight);
        }

        let mut scores: Vec<f64> = (0..pos_count)
            .map(|pid| {
                classifiers
                    .iter()
                    .zip(weights.iter())
                    .map(|(c, w)| (c.predict(&pos.view(pid)) as u8 as f64) * w)
                    .sum()
            })
            .collect();
        let bias = fit_bias(&mut scores, config.recall);
        log::info!("stage trained: {} classifiers, bias={}", classifiers.len(), bias);

        Ok(Stage {
            classifiers,
            weights,
            bias,
        })
    }

    pub fn predict(&self, loader: &ImageLoader, idx: usize) -> bool {
        let view = loader.view(idx);
        let score: f64 = self
            .classifiers
            .iter()
            .zip(self.weights.iter())
            .map(|(c, w)| (c.predict(&view) as u8 as f64) * w)
            .sum();
        score > self.bias
    }

    pub fn predict_scaled(
        &self,
        integral: &[u32],
        img_w: usize,
        img_h: usize,
        s_row: usize,
        s_col: usize,
        scale: f64,
    ) -> bool {
        let score: f64 = self
            .classifiers
            .iter()
            .zip(self.weights.iter())
            .map(|(c, w)| {
                (c.predict_scaled(integral, img_w, img_h, s_row, s_col, scale) as u8 as f64) * w
            })
            .sum();
        score > self.bias
    }

    pub fn save(&self, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "{} {}", self.bias, self.classifiers.len())?;
        for c in &self.classifiers {
            writeln!(out, "{}", c.to_line())?;
        }
        let weight_line: Vec<String> = self.weights.iter().map(|w| w.to_string()).collect();
        writeln!(out, "{}", weight_line.join(" "))?;
        Ok(())
    }

    pub fn load<'a, I: Iterator<Item = &'a str>>(tokens: &mut I) -> Result<Stage> {
        let bias: f64 = tokens
            .next()
            .ok_or_else(|| DetectorError::Parse("missing stage bias".into()))?
            .parse()
            .map_err(|e: std::num::ParseFloatError| DetectorError::Parse(e.to_string()))?;
        let count: usize = tokens
            .next()
            .ok_or_else(|| DetectorError::Parse("missing stage classifier count".into()))?
            .parse()
            .map_err(|e: std::num::ParseIntError| DetectorError::Parse(e.to_string()))?;

        let mut classifiers = Vec::with_capacity(count);
        for _ in 0..count {
            classifiers.push(HaarClassifier::from_tokens(tokens)?);
        }
        let mut weights = Vec::with_capacity(count);
        for _ in 0..count {
            let w: f64 = tokens
                .next()
                .ok_or_else(|| DetectorError::Parse("missing classifier weight".into()))?
                .parse()
                .map_err(|e: std::num::ParseFloatError| DetectorError::Parse(e.to_string()))?;
            weights.push(w);
        }

        Ok(Stage {
            classifiers,
            weights,
            bias,
        })
    }
}

/// The bias at the `floor(|pos| * (1 - recall) + 0.5)`-th element of the
/// ascending-sorted unnormalized positive scores (spec 4.5).
fn fit_bias(scores: &mut [f64], recall: f64) -> f64 {
    scores.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = scores.len();
    let idx = ((n as f64) * (1.0 - recall) + 0.5).floor() as usize;
    let idx = idx.min(n.saturating_sub(1));
    scores[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bias_keeps_target_recall() {
        // floor(1000 * (1 - 0.999) + 0.5) = 1, so bias = scores[1] = 1.0 and
        // indices 2..=999 (998 of 1000) pass the strict `score > bias` test.
        // The recall target is a floor, not an exact fraction.
        let mut scores: Vec<f64> = (0..1000).map(|i| i as f64).collect();
        let bias = fit_bias(&mut scores, 0.999);
        let passing = scores.iter().filter(|&&s| s > bias).count();
        assert_eq!(passing, 998, "only {} of 1000 pass", passing);
    }
}
