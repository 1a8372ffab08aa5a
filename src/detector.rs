//! Multi-scale sliding-window scan (C7).
//!
//! Grounded on `RealTimeFaceDetection::DetectFaces`'s scale loop in
//! `RealTimeFaceDetection.cpp`. Each window is handed to the cascade, which
//! short-circuits on the first rejecting stage.

use crate::cascade::Cascade;
use crate::preprocess::compute_integral;
use crate::util::{round_half_up, Rect};

const STEP0: f64 = 2.0;
const SCALE_RATIO: f64 = 1.25;

/// Scans `gray` (row-major, `height` x `width`) at every scale from 1.0
/// upward until the scaled window no longer fits, returning every accepted
/// window as a raw (unclustered) rectangle.
pub fn scan(cascade: &Cascade, gray: &[u8], height: usize, width: usize) -> Vec<Rect> {
    let integral = compute_integral(gray, width, height);
    let base = cascade.window() as f64;

    let mut detections = Vec::new();
    let mut scale = 1.0f64;

    loop {
        let win_size = round_half_up(base * scale) as usize;
        if win_size > height.min(width) {
            break;
        }
        let stride = round_half_up(scale * STEP0).max(1) as usize;

        let mut y = 0;
        while y + win_size <= height {
            let mut x = 0;
            while x + win_size <= width {
                if cascade.accepts_scaled(&integral, width, height, y, x, scale) {
                    detections.push(Rect::new(y as i64, x as i64, win_size as i64, win_size as i64));
                }
                x += stride;
            }
            y += stride;
        }

        scale *= SCALE_RATIO;
    }

    detections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FeatureType, HaarClassifier, HaarFeature, Polarity};
    use crate::stage::Stage;

    fn always_accepts_cascade(window: usize) -> Cascade {
        // threshold far below any achievable feature value, so "greater"
        // always holds and the single stage never rejects.
        let classifier = HaarClassifier::new(
            HaarFeature::new(0, 0, 4, 8, FeatureType::V2),
            -1.0e9,
            Polarity::Greater,
        );
        let stage = Stage {
            classifiers: vec![classifier],
            weights: vec![1.0],
            bias: -1.0e9,
        };
        Cascade::from_stages(window, vec![stage])
    }

    #[test]
    fn scan_emits_at_least_one_window_for_an_always_accepting_cascade() {
        let cascade = always_accepts_cascade(24);
        let gray = vec![128u8; 48 * 48];
        let detections = scan(&cascade, &gray, 48, 48);
        assert!(!detections.is_empty());
    }

    #[test]
    fn windows_never_exceed_image_bounds() {
        let cascade = always_accepts_cascade(24);
        let gray = vec![128u8; 50 * 70];
        for rect in scan(&cascade, &gray, 50, 70) {
            assert!(rect.y + rect.h <= 50);
            assert!(rect.x + rect.w <= 70);
        }
    }
}
