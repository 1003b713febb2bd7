//! Fixed-level and Otsu thresholding.
//!
//! The foreground test runs on the 8-bit level of each sample, so `thresh`
//! is effectively clamped to `[0, 1]` and quantized to 1/255.

use super::{expect_channels, from_level, map_channels, to_gray, to_level};
use super::{ImgprocError, ImgprocResult};
use crate::types::Mat;
use imageproc::contrast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdType {
    Binary,
    BinaryInv,
    Trunc,
    ToZero,
    ToZeroInv,
}

/// Apply `kind` to every sample of `src`.
pub fn threshold(src: &Mat, thresh: f32, maxval: f32, kind: ThresholdType) -> Mat {
    let level = to_level(thresh);
    let above = map_channels(src, |plane| {
        contrast::threshold(plane, level, contrast::ThresholdType::Binary)
    });

    let mut out = src.clone();
    for (v, &mask) in out.data_mut().iter_mut().zip(above.data()) {
        let above = mask > 0.0;
        *v = match kind {
            ThresholdType::Binary if above => maxval,
            ThresholdType::BinaryInv if !above => maxval,
            ThresholdType::Binary | ThresholdType::BinaryInv => 0.0,
            ThresholdType::Trunc => v.min(thresh),
            ThresholdType::ToZero if above => *v,
            ThresholdType::ToZeroInv if !above => *v,
            ThresholdType::ToZero | ThresholdType::ToZeroInv => 0.0,
        };
    }
    out
}

/// Otsu level of a single-channel image, as a sample value.
pub fn otsu_threshold(src: &Mat) -> ImgprocResult<f32> {
    expect_channels(src.channels(), 1)?;
    if src.is_empty() {
        return Err(ImgprocError::Empty);
    }
    Ok(from_level(contrast::otsu_level(&to_gray(src, 0))))
}
