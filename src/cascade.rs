//! Cascade trainer and top-level model (C6).
//!
//! Grounded on `AdaBoostFaceDetection::Learn`/`Save`/`Load` in
//! `RealTimeFaceDetection.cpp`. Positives stay fixed across every stage;
//! only the negative pool is filtered between rounds.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::config::TrainingConfig;
use crate::detector;
use crate::error::{DetectorError, Result};
use crate::postprocess;
use crate::preprocess::ImageLoader;
use crate::stage::Stage;
use crate::util::Rect;

/// A trained cascade: an ordered conjunction of stages sharing one base
/// window size. Any stage's rejection terminates evaluation of a window.
pub struct Cascade {
    window: usize,
    stages: Vec<Stage>,
}

/// Detection counts from re-running a freshly trained cascade over its own
/// training data, as a coarse training-time sanity check.
#[derive(Debug, Clone, Copy)]
pub struct SelfTestReport {
    pub detected_faces: usize,
    pub total_faces: usize,
    pub detected_non_faces: usize,
    pub total_non_faces: usize,
}

impl Cascade {
    /// Trains a cascade with one stage per entry of `stage_counts`, each
    /// entry giving that stage's target weak-learner count (spec 4.6).
    pub fn learn<P: AsRef<Path>>(
        positive_paths: &[P],
        negative_paths: &[P],
        stage_counts: &[usize],
        config: &TrainingConfig,
    ) -> Result<Cascade> {
        if positive_paths.is_empty() || negative_paths.is_empty() {
            return Err(DetectorError::EmptyInput(
                "cascade training requires at least one positive and one negative sample".into(),
            ));
        }
        if stage_counts.is_empty() {
            return Err(DetectorError::EmptyInput(
                "cascade training requires at least one stage target count".into(),
            ));
        }
        if stage_counts.iter().any(|&t| t == 0) {
            return Err(DetectorError::InvalidInput(
                "stage target weak-learner counts must be positive".into(),
            ));
        }

        log::info!(
            "loading {} positive and {} negative samples",
            positive_paths.len(),
            negative_paths.len()
        );
        let positives = ImageLoader::load_grayscale(positive_paths)?;
        let negatives = ImageLoader::load_grayscale(negative_paths)?;
        let window = positives.image_width(0);

        let mut neg_valid = vec![true; negatives.count()];
        let mut stages = Vec::with_capacity(stage_counts.len());

        for (round, &target_count) in stage_counts.iter().enumerate() {
            log::info!("training cascade stage {} (target {} classifiers)", round, target_count);
            let stage = match Stage::train(&positives, &negatives, &neg_valid, target_count, config) {
                Ok(stage) => stage,
                Err(DetectorError::EmptyInput(msg)) => {
                    log::info!("stage {} discarded: {}", round, msg);
                    break;
                }
                Err(other) => return Err(other),
            };

            for idx in 0..negatives.count() {
                if neg_valid[idx] && !stage.predict(&negatives, idx) {
                    neg_valid[idx] = false;
                }
            }
            let remaining = neg_valid.iter().filter(|&&v| v).count();
            log::info!("stage {} trained; {} negatives remain valid", round, remaining);

            stages.push(stage);

            if remaining == 0 {
                log::info!("negative pool exhausted after stage {}; stopping early", round);
                break;
            }
        }

        if stages.is_empty() {
            return Err(DetectorError::InvalidResult(
                "the first cascade stage could not be trained".into(),
            ));
        }

        let cascade = Cascade { window, stages };
        let report = cascade.self_test(&positives, &negatives);
        log::info!(
            "self-test: detected {}/{} faces, {}/{} false positives on non-faces",
            report.detected_faces,
            report.total_faces,
            report.detected_non_faces,
            report.total_non_faces
        );

        Ok(cascade)
    }

    /// Re-runs the trained cascade over its own training data and reports
    /// detection/false-positive counts, as the original source does at the
    /// end of `Learn` before persisting. A diagnostic, not a gate: training
    /// always returns the cascade regardless of the numbers here.
    pub fn self_test(&self, positives: &ImageLoader, negatives: &ImageLoader) -> SelfTestReport {
        let detected_faces = (0..positives.count())
            .filter(|&idx| self.accepts_loaded(positives, idx))
            .count();
        let detected_non_faces = (0..negatives.count())
            .filter(|&idx| self.accepts_loaded(negatives, idx))
            .count();

        SelfTestReport {
            detected_faces,
            total_faces: positives.count(),
            detected_non_faces,
            total_non_faces: negatives.count(),
        }
    }

    fn accepts_loaded(&self, loader: &ImageLoader, idx: usize) -> bool {
        self.stages.iter().all(|stage| stage.predict(loader, idx))
    }

    /// Renders every classifier in every stage as a debug grayscale image
    /// under `dir`, named `stage<k>_classifier<j>.png`, mirroring
    /// `SaveFeatureAsImage` in the original source.
    pub fn save_feature_images<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|source| DetectorError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        for (stage_idx, stage) in self.stages.iter().enumerate() {
            for (classifier_idx, classifier) in stage.classifiers.iter().enumerate() {
                let image = classifier.feature.render(self.window as u32);
                let path = dir.join(format!("stage{}_classifier{}.png", stage_idx, classifier_idx));
                image.save(&path).map_err(|source| DetectorError::Image {
                    path: path.clone(),
                    source,
                })?;
            }
        }
        Ok(())
    }

    pub(crate) fn from_stages(window: usize, stages: Vec<Stage>) -> Cascade {
        Cascade { window, stages }
    }

    /// Evaluates every stage in order against one scaled window, returning
    /// `true` only if every stage accepts. Short-circuits on first rejection.
    pub fn accepts_scaled(
        &self,
        integral: &[u32],
        img_w: usize,
        img_h: usize,
        s_row: usize,
        s_col: usize,
        scale: f64,
    ) -> bool {
        self.stages
            .iter()
            .all(|stage| stage.predict_scaled(integral, img_w, img_h, s_row, s_col, scale))
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Scans a grayscale image at every scale and clusters the raw hits
    /// (spec external interface `detect`). Never fails: inference has no
    /// error channel, the worst case is an empty face list.
    pub fn detect(&self, gray: &[u8], height: usize, width: usize) -> Vec<Rect> {
        let raw = detector::scan(self, gray, height, width);
        postprocess::cluster(&raw)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| DetectorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut out = BufWriter::new(file);
        (|| -> std::io::Result<()> {
            writeln!(out, "{} {}", self.window, self.stages.len())?;
            for stage in &self.stages {
                stage.save(&mut out)?;
            }
            Ok(())
        })()
        .map_err(|source| DetectorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("saved cascade ({} stages) to {}", self.stages.len(), path.display());
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Cascade> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| DetectorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut tokens: Vec<String> = Vec::new();
        for line in reader.lines() {
            let line = line.map_err(|source| DetectorError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            tokens.extend(line.split_whitespace().map(str::to_owned));
        }
        let mut iter = tokens.iter().map(String::as_str);

        let window: usize = iter
            .next()
            .ok_or_else(|| DetectorError::Parse("missing base window size".into()))?
            .parse()
            .map_err(|e: std::num::ParseIntError| DetectorError::Parse(e.to_string()))?;
        let stage_count: usize = iter
            .next()
            .ok_or_else(|| DetectorError::Parse("missing stage count".into()))?
            .parse()
            .map_err(|e: std::num::ParseIntError| DetectorError::Parse(e.to_string()))?;

        let mut stages = Vec::with_capacity(stage_count);
        for _ in 0..stage_count {
            stages.push(Stage::load(&mut iter)?);
        }

        log::info!("loaded cascade ({} stages, window {}) from {}", stages.len(), window, path.display());
        Ok(Cascade { window, stages })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FeatureType, HaarClassifier, HaarFeature, Polarity};

    fn infinite_bias_cascade(window: usize) -> Cascade {
        let classifier = HaarClassifier::new(
            HaarFeature::new(0, 0, 4, 8, FeatureType::V2),
            0.0,
            Polarity::Greater,
        );
        let stage = Stage {
            classifiers: vec![classifier],
            weights: vec![1.0],
            bias: f64::INFINITY,
        };
        Cascade {
            window,
            stages: vec![stage],
        }
    }

    #[test]
    fn s5_infinite_bias_first_stage_rejects_everything() {
        let cascade = infinite_bias_cascade(24);
        let gray = vec![200u8; 64 * 64];
        let detections = cascade.detect(&gray, 64, 64);
        assert!(detections.is_empty());
    }

    #[test]
    fn save_then_load_round_trips_detections() {
        let classifier = HaarClassifier::new(
            HaarFeature::new(0, 0, 4, 8, FeatureType::V2),
            1.0,
            Polarity::Greater,
        );
        let stage = Stage {
            classifiers: vec![classifier],
            weights: vec![0.5],
            bias: -1.0,
        };
        let cascade = Cascade {
            window: 24,
            stages: vec![stage],
        };

        let dir = std::env::temp_dir();
        let path = dir.join(format!("cascade-roundtrip-test-{}.model", std::process::id()));
        cascade.save(&path).unwrap();
        let loaded = Cascade::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let gray = vec![180u8; 64 * 64];
        assert_eq!(cascade.detect(&gray, 64, 64), loaded.detect(&gray, 64, 64));
    }
}
