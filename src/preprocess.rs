//! Integral-image loader (C1).
//!
//! Loads grayscale images from disk and builds their integral (summed-area)
//! tables. Grounded on `ImageLoader`'s usage pattern in
//! `RealTimeFaceDetection.cpp` and on `load_and_preprocess_data`/
//! `compute_integral_image`.

use std::path::Path;

use crate::error::{DetectorError, Result};

/// A loaded set of grayscale images and their integral tables. Read-only
/// after construction; raw pixel data is dropped once the integral table is
/// built (spec 4.6 step 1: "build integral tables; drop raw pixel data").
pub struct ImageLoader {
    width: usize,
    height: usize,
    integrals: Vec<Vec<u32>>,
}

impl ImageLoader {
    /// Loads every image in `paths` as 8-bit grayscale. All images must share
    /// the same square dimensions; the first image's size fixes `W`.
    pub fn load_grayscale<P: AsRef<Path>>(paths: &[P]) -> Result<ImageLoader> {
        if paths.is_empty() {
            return Err(DetectorError::EmptyInput(
                "no image paths given to the loader".into(),
            ));
        }

        let mut width = None;
        let mut height = None;
        let mut integrals = Vec::with_capacity(paths.len());

        for path in paths {
            let path = path.as_ref();
            let img = image::open(path).map_err(|source| DetectorError::Image {
                path: path.to_path_buf(),
                source,
            })?;
            let gray = img.into_luma8();
            let (w, h) = gray.dimensions();
            let (w, h) = (w as usize, h as usize);

            match (width, height) {
                (None, None) => {
                    width = Some(w);
                    height = Some(h);
                }
                (Some(fw), Some(fh)) if fw == w && fh == h => {}
                _ => {
                    return Err(DetectorError::InvalidInput(format!(
                        "image {} is {}x{}, expected {}x{}",
                        path.display(),
                        w,
                        h,
                        width.unwrap(),
                        height.unwrap()
                    )));
                }
            }

            integrals.push(compute_integral(gray.as_raw(), w, h));
        }

        log::info!(
            "loaded {} images at {}x{}",
            integrals.len(),
            width.unwrap(),
            height.unwrap()
        );

        Ok(ImageLoader {
            width: width.unwrap(),
            height: height.unwrap(),
            integrals,
        })
    }

    /// `I[y, x]` for image `img_idx`, clamped to the last valid row/column.
    pub fn integral_at(&self, img_idx: usize, y: usize, x: usize) -> u32 {
        let cy = y.min(self.height - 1);
        let cx = x.min(self.width - 1);
        if cy != y || cx != x {
            log::warn!(
                "integral_at({}, {}, {}) out of bounds for {}x{} image, clamped to ({}, {})",
                img_idx,
                y,
                x,
                self.height,
                self.width,
                cy,
                cx
            );
        }
        self.integrals[img_idx][cy * self.width + cx]
    }

    pub fn image_width(&self, _idx: usize) -> usize {
        self.width
    }

    pub fn image_height(&self, _idx: usize) -> usize {
        self.height
    }

    pub fn count(&self) -> usize {
        self.integrals.len()
    }

    pub(crate) fn flat(&self, idx: usize) -> &[u32] {
        &self.integrals[idx]
    }

    pub fn view(&self, idx: usize) -> LoaderView<'_> {
        LoaderView { loader: self, idx }
    }
}

/// A view over one loaded image's integral table, implementing
/// [`crate::util::IntegralSource`] so `HaarFeature::value_at` can be called
/// against it directly.
pub struct LoaderView<'a> {
    loader: &'a ImageLoader,
    idx: usize,
}

impl<'a> crate::util::IntegralSource for LoaderView<'a> {
    fn get(&self, y: usize, x: usize) -> u32 {
        self.loader.integral_at(self.idx, y, x)
    }
}

/// Computes the integral image of a row-major 8-bit grayscale buffer.
///
/// Row-major with a running row sum: `I[y, x] = I[y-1, x] + rowSum`, where
/// `rowSum` accumulates pixel values left-to-right within row `y`. This is
/// the free function inference uses directly on a scanned frame (spec 4.1).
pub fn compute_integral(gray: &[u8], w: usize, h: usize) -> Vec<u32> {
    assert_eq!(gray.len(), w * h);
    let mut integral = vec![0u32; w * h];
    for y in 0..h {
        let mut row_sum: u32 = 0;
        for x in 0..w {
            row_sum += gray[y * w + x] as u32;
            let above = if y > 0 { integral[(y - 1) * w + x] } else { 0 };
            integral[y * w + x] = above + row_sum;
        }
    }
    integral
}
