//! General utility functions: rectangle geometry and the clamped rectangle-sum
//! recipe shared by training-time and inference-time feature evaluation.

/// An axis-aligned detection rectangle, row-major origin plus extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rect {
    pub y: i64,
    pub x: i64,
    pub h: i64,
    pub w: i64,
}

impl Rect {
    pub fn new(y: i64, x: i64, h: i64, w: i64) -> Rect {
        Rect { y, x, h, w }
    }

    pub fn area(&self) -> i64 {
        self.h * self.w
    }
}

/// Per-axis line segment overlap, zero-clamped.
///
/// Mirrors `CalCulateLineSegmentOverlap` in `RealTimeFaceDetection.cpp`.
pub fn line_segment_overlap(sa: i64, la: i64, sb: i64, lb: i64) -> i64 {
    let s_min = sa.min(sb);
    let ea = sa + la;
    let eb = sb + lb;
    let e_max = ea.max(eb);
    let inter_len = la + lb - (e_max - s_min);
    inter_len.max(0)
}

/// Fraction of `a`'s area and `b`'s area covered by their overlap, whichever
/// is smaller. Used both for Haar-feature similarity pruning (C4) and
/// detection clustering (C8), which share the same overlap math in the
/// original source (`HaarClassifier::CalFeatureSimilarity` and
/// `RealTimeFaceDetection::IsTheSameFace`).
pub fn min_overlap_fraction(
    a_y: i64,
    a_x: i64,
    a_h: i64,
    a_w: i64,
    b_y: i64,
    b_x: i64,
    b_h: i64,
    b_w: i64,
) -> f64 {
    let h_overlap = line_segment_overlap(a_y, a_h, b_y, b_h);
    let w_overlap = line_segment_overlap(a_x, a_w, b_x, b_w);
    let overlap_area = (h_overlap * w_overlap) as f64;
    let area_a = (a_h * a_w) as f64;
    let area_b = (b_h * b_w) as f64;
    let sim_a = overlap_area / area_a;
    let sim_b = overlap_area / area_b;
    sim_a.min(sim_b)
}

/// A source of integral-image values, clamped at read time to the last valid
/// row/column (spec'd OOB behavior for the integral table).
pub trait IntegralSource {
    fn get(&self, y: usize, x: usize) -> u32;
}

/// A view over a flat, row-major integral table (one image's worth).
pub struct FlatIntegral<'a> {
    pub data: &'a [u32],
    pub width: usize,
    pub height: usize,
}

impl<'a> IntegralSource for FlatIntegral<'a> {
    fn get(&self, y: usize, x: usize) -> u32 {
        let cy = y.min(self.height - 1);
        let cx = x.min(self.width - 1);
        if cy != y || cx != x {
            log::warn!(
                "integral lookup ({}, {}) out of bounds for {}x{} image, clamped to ({}, {})",
                y,
                x,
                self.height,
                self.width,
                cy,
                cx
            );
        }
        self.data[cy * self.width + cx]
    }
}

/// The legacy rectangle-sum recipe: a rectangle given by inclusive corners
/// `(sy, sx, ey, ex)`, decomposed to avoid ever indexing row/col `-1`.
///
/// Mirrors `HaarClassifier::ImgBoxValue` in `RealTimeFaceDetection.cpp`.
pub fn rect_sum<T: IntegralSource>(src: &T, sy: usize, sx: usize, ey: usize, ex: usize) -> i64 {
    let v = |y: usize, x: usize| src.get(y, x) as i64;
    if sy > 0 && sx > 0 {
        v(sy - 1, sx - 1) + v(ey, ex) - v(sy - 1, ex) - v(ey, sx - 1)
    } else if sy > 0 {
        v(ey, ex) - v(sy - 1, ex)
    } else if sx > 0 {
        v(ey, ex) - v(ey, sx - 1)
    } else {
        v(ey, ex)
    }
}

/// `floor(v + 0.5)`, the legacy "add-0.5-and-floor" rounding rule that scaled
/// feature coordinates must use instead of the platform default.
pub fn round_half_up(v: f64) -> i64 {
    (v + 0.5).floor() as i64
}
