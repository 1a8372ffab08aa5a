//! Haar feature and classifier definitions (C2).
//!
//! Haar feature types are a closed, tagged enum rather than a class
//! hierarchy, so evaluation dispatches via a `match` instead of a virtual
//! call — the inner loop of training and inference never pays for dynamic
//! dispatch. Grounded on `HaarFeature`/`HaarClassifier` in
//! `RealTimeFaceDetection.cpp`.

use image::{GrayImage, Luma};

use crate::error::{DetectorError, Result};
use crate::util::{round_half_up, FlatIntegral, IntegralSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureType {
    /// Two-rectangle vertical split (left/right).
    V2 = 0,
    /// Two-rectangle horizontal split (top/bottom).
    H2 = 1,
    /// Three-rectangle vertical split.
    V3 = 2,
    /// Four-rectangle checker.
    D4 = 3,
}

impl FeatureType {
    fn code(self) -> u8 {
        self as u8
    }

    fn from_code(code: u8) -> Result<FeatureType> {
        match code {
            0 => Ok(FeatureType::V2),
            1 => Ok(FeatureType::H2),
            2 => Ok(FeatureType::V3),
            3 => Ok(FeatureType::D4),
            other => Err(DetectorError::Parse(format!(
                "unknown Haar feature type code {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HaarFeature {
    pub s_row: usize,
    pub s_col: usize,
    pub l_row: usize,
    pub l_col: usize,
    pub feature_type: FeatureType,
}

impl HaarFeature {
    pub fn new(
        s_row: usize,
        s_col: usize,
        l_row: usize,
        l_col: usize,
        feature_type: FeatureType,
    ) -> HaarFeature {
        HaarFeature {
            s_row,
            s_col,
            l_row,
            l_col,
            feature_type,
        }
    }

    /// Normalized feature value at `scale`, window-origin `(row_offset,
    /// col_offset)` in the supplied integral table. At `scale == 1.0` and a
    /// zero offset this is the unscaled, base-window evaluation used during
    /// training.
    pub fn value_at<T: IntegralSource>(
        &self,
        src: &T,
        row_offset: i64,
        col_offset: i64,
        scale: f64,
    ) -> i64 {
        let l_row = round_half_up(self.l_row as f64 * scale);
        let l_col = round_half_up(self.l_col as f64 * scale);
        let s_row = round_half_up(self.s_row as f64 * scale) + row_offset;
        let s_col = round_half_up(self.s_col as f64 * scale) + col_offset;

        let b = |sy: i64, sx: i64, ey: i64, ex: i64| -> i64 {
            crate::util::rect_sum(src, sy as usize, sx as usize, ey as usize, ex as usize)
        };

        match self.feature_type {
            FeatureType::V2 => {
                let pos = b(s_row, s_col, s_row + l_row - 1, s_col + l_col / 2 - 1);
                let neg = b(s_row, s_col + l_col / 2, s_row + l_row - 1, s_col + l_col - 1);
                (pos - neg) / (l_row * l_col / 2)
            }
            FeatureType::H2 => {
                let neg = b(s_row, s_col, s_row + l_row / 2 - 1, s_col + l_col - 1);
                let pos = b(s_row + l_row / 2, s_col, s_row + l_row - 1, s_col + l_col - 1);
                (pos - neg) / (l_row * l_col / 2)
            }
            FeatureType::V3 => {
                let pos_left = b(s_row, s_col, s_row + l_row - 1, s_col + l_col / 3 - 1);
                let pos_right = b(
                    s_row,
                    s_col + l_col * 2 / 3,
                    s_row + l_row - 1,
                    s_col + l_col - 1,
                );
                let neg = b(
                    s_row,
                    s_col + l_col / 3,
                    s_row + l_row - 1,
                    s_col + l_col * 2 / 3 - 1,
                );
                (pos_left + pos_right - neg) / (l_row * l_col / 3)
            }
            FeatureType::D4 => {
                let pos_tl = b(s_row, s_col, s_row + l_row / 2 - 1, s_col + l_col / 2 - 1);
                let pos_rd = b(
                    s_row + l_row / 2,
                    s_col + l_col / 2,
                    s_row + l_row - 1,
                    s_col + l_col - 1,
                );
                let neg_rt = b(
                    s_row,
                    s_col + l_col / 2,
                    s_row + l_row / 2 - 1,
                    s_col + l_col - 1,
                );
                let neg_ld = b(
                    s_row + l_row / 2,
                    s_col,
                    s_row + l_row - 1,
                    s_col + l_col / 2 - 1,
                );
                (pos_tl + pos_rd - neg_rt - neg_ld) / (l_row * l_col / 4)
            }
        }
    }

    /// Similarity used for candidate dedup (C4): shared type and
    /// `min(overlap/areaA, overlap/areaB)`.
    pub fn similarity(&self, other: &HaarFeature) -> f64 {
        if self.feature_type != other.feature_type {
            return 0.0;
        }
        crate::util::min_overlap_fraction(
            self.s_row as i64,
            self.s_col as i64,
            self.l_row as i64,
            self.l_col as i64,
            other.s_row as i64,
            other.s_col as i64,
            other.l_row as i64,
            other.l_col as i64,
        )
    }

    /// Renders the feature's rectangle pattern (white/black/gray fill) as a
    /// grayscale debug image, as `HaarClassifier::SaveFeatureAsImage` does
    /// in the original source.
    pub fn render(&self, base_size: u32) -> GrayImage {
        let mut img = GrayImage::from_pixel(base_size, base_size, Luma([128u8]));
        let mut fill = |y0: usize, y1: usize, x0: usize, x1: usize, v: u8| {
            for y in y0..y1 {
                for x in x0..x1 {
                    if (y as u32) < base_size && (x as u32) < base_size {
                        img.put_pixel(x as u32, y as u32, Luma([v]));
                    }
                }
            }
        };
        let (sr, sc, lr, lc) = (self.s_row, self.s_col, self.l_row, self.l_col);
        match self.feature_type {
            FeatureType::V2 => {
                fill(sr, sr + lr, sc, sc + lc / 2, 255);
                fill(sr, sr + lr, sc + lc / 2, sc + lc, 0);
            }
            FeatureType::H2 => {
                fill(sr, sr + lr / 2, sc, sc + lc, 0);
                fill(sr + lr / 2, sr + lr, sc, sc + lc, 255);
            }
            FeatureType::V3 => {
                fill(sr, sr + lr, sc, sc + lc / 3, 255);
                fill(sr, sr + lr, sc + lc * 2 / 3, sc + lc, 255);
                fill(sr, sr + lr, sc + lc / 3, sc + lc * 2 / 3, 0);
            }
            FeatureType::D4 => {
                fill(sr, sr + lr / 2, sc, sc + lc / 2, 255);
                fill(sr + lr / 2, sr + lr, sc + lc / 2, sc + lc, 255);
                fill(sr, sr + lr / 2, sc + lc / 2, sc + lc, 0);
                fill(sr + lr / 2, sr + lr, sc, sc + lc / 2, 0);
            }
        }
        img
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Less,
    Greater,
}

impl Polarity {
    fn code(self) -> u8 {
        match self {
            Polarity::Less => 0,
            Polarity::Greater => 1,
        }
    }

    fn from_code(code: u8) -> Result<Polarity> {
        match code {
            0 => Ok(Polarity::Less),
            1 => Ok(Polarity::Greater),
            other => Err(DetectorError::Parse(format!(
                "unknown polarity code {}",
                other
            ))),
        }
    }
}

/// A single-feature decision stump: feature, threshold, and polarity.
#[derive(Debug, Clone)]
pub struct HaarClassifier {
    pub feature: HaarFeature,
    pub threshold: f64,
    pub polarity: Polarity,
}

impl HaarClassifier {
    pub fn new(feature: HaarFeature, threshold: f64, polarity: Polarity) -> HaarClassifier {
        HaarClassifier {
            feature,
            threshold,
            polarity,
        }
    }

    fn accepts(&self, value: i64) -> bool {
        match self.polarity {
            Polarity::Less => (value as f64) < self.threshold,
            Polarity::Greater => (value as f64) > self.threshold,
        }
    }

    /// Unscaled, base-window prediction against a stored image's integral
    /// table (training time).
    pub fn predict<T: IntegralSource>(&self, src: &T) -> bool {
        self.accepts(self.feature.value_at(src, 0, 0, 1.0))
    }

    /// Scaled prediction against a raw scanned-image integral table
    /// (inference time).
    pub fn predict_scaled(
        &self,
        integral: &[u32],
        img_w: usize,
        img_h: usize,
        s_row: usize,
        s_col: usize,
        scale: f64,
    ) -> bool {
        let src = FlatIntegral {
            data: integral,
            width: img_w,
            height: img_h,
        };
        self.accepts(
            self.feature
                .value_at(&src, s_row as i64, s_col as i64, scale),
        )
    }

    pub fn to_line(&self) -> String {
        format!(
            "{} {} {} {} {} {} {}",
            self.feature.s_row,
            self.feature.s_col,
            self.feature.l_row,
            self.feature.l_col,
            self.feature.feature_type.code(),
            self.threshold,
            self.polarity.code()
        )
    }

    pub fn from_tokens<'a, I: Iterator<Item = &'a str>>(tokens: &mut I) -> Result<HaarClassifier> {
        let parse_usize = |tokens: &mut I| -> Result<usize> {
            tokens
                .next()
                .ok_or_else(|| DetectorError::Parse("unexpected end of classifier line".into()))?
                .parse::<usize>()
                .map_err(|e| DetectorError::Parse(e.to_string()))
        };
        let s_row = parse_usize(tokens)?;
        let s_col = parse_usize(tokens)?;
        let l_row = parse_usize(tokens)?;
        let l_col = parse_usize(tokens)?;
        let type_code: u8 = parse_usize(tokens)? as u8;
        let threshold: f64 = tokens
            .next()
            .ok_or_else(|| DetectorError::Parse("missing threshold".into()))?
            .parse()
            .map_err(|e: std::num::ParseFloatError| DetectorError::Parse(e.to_string()))?;
        let polarity_code: u8 = parse_usize(tokens)? as u8;

        let feature_type = FeatureType::from_code(type_code)?;
        let polarity = Polarity::from_code(polarity_code)?;
        Ok(HaarClassifier::new(
            HaarFeature::new(s_row, s_col, l_row, l_col, feature_type),
            threshold,
            polarity,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::FlatIntegral;

    fn uniform_integral(value: u8, w: usize, h: usize) -> Vec<u32> {
        crate::preprocess::compute_integral(&vec![value; w * h], w, h)
    }

    #[test]
    fn v2_feature_is_zero_on_uniform_image() {
        let integral = uniform_integral(128, 24, 24);
        let src = FlatIntegral {
            data: &integral,
            width: 24,
            height: 24,
        };
        let f = HaarFeature::new(0, 0, 24, 24, FeatureType::V2);
        let v = f.value_at(&src, 0, 0, 1.0);
        assert!(v.abs() <= 1, "expected ~0, got {}", v);
    }

    #[test]
    fn v2_feature_on_half_white_half_black_image() {
        // S2: 24x24 image, cols 0..11 = 255, cols 12..23 = 0.
        let mut gray = vec![0u8; 24 * 24];
        for y in 0..24 {
            for x in 0..12 {
                gray[y * 24 + x] = 255;
            }
        }
        let integral = crate::preprocess::compute_integral(&gray, 24, 24);
        let src = FlatIntegral {
            data: &integral,
            width: 24,
            height: 24,
        };
        let f = HaarFeature::new(0, 0, 24, 24, FeatureType::V2);
        assert_eq!(f.value_at(&src, 0, 0, 1.0), 255);
    }

    #[test]
    fn d4_feature_on_checker_image() {
        // S3: four 12x12 quadrants of [[200,50],[50,200]].
        let mut gray = vec![0u8; 24 * 24];
        for y in 0..24 {
            for x in 0..24 {
                let top = y < 12;
                let left = x < 12;
                let v = match (top, left) {
                    (true, true) => 200,
                    (true, false) => 50,
                    (false, true) => 50,
                    (false, false) => 200,
                };
                gray[y * 24 + x] = v;
            }
        }
        let integral = crate::preprocess::compute_integral(&gray, 24, 24);
        let src = FlatIntegral {
            data: &integral,
            width: 24,
            height: 24,
        };
        let f = HaarFeature::new(0, 0, 24, 24, FeatureType::D4);
        assert_eq!(f.value_at(&src, 0, 0, 1.0), 300);
    }

    #[test]
    fn similarity_is_zero_across_types() {
        let a = HaarFeature::new(0, 0, 8, 8, FeatureType::V2);
        let b = HaarFeature::new(0, 0, 8, 8, FeatureType::H2);
        assert_eq!(a.similarity(&b), 0.0);
    }

    #[test]
    fn similarity_is_one_for_identical_features() {
        let a = HaarFeature::new(4, 4, 8, 8, FeatureType::D4);
        let b = HaarFeature::new(4, 4, 8, 8, FeatureType::D4);
        assert_eq!(a.similarity(&b), 1.0);
    }

    #[test]
    fn classifier_round_trips_through_text_line() {
        let c = HaarClassifier::new(
            HaarFeature::new(4, 8, 8, 16, FeatureType::V3),
            12.25,
            Polarity::Greater,
        );
        let line = c.to_line();
        let mut tokens = line.split_whitespace();
        let parsed = HaarClassifier::from_tokens(&mut tokens).unwrap();
        assert_eq!(parsed.feature, c.feature);
        assert_eq!(parsed.threshold, c.threshold);
        assert_eq!(parsed.polarity, c.polarity);
    }
}
