//! Image primitives used by the built-in components.
//!
//! Thresholding, morphology and contour tracing are delegated to
//! `imageproc`; this module only moves samples between [`Mat`] and
//! [`GrayImage`]. Samples in `[0, 1]` map onto `0..=255`.
//!
//! [`Mat`]: crate::types::Mat

pub mod color;
pub mod contours;
pub mod morphology;
pub mod mser;
pub mod threshold;

use crate::types::Mat;
use image::{GrayImage, Luma};
use thiserror::Error;

/// Errors raised by image primitives
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImgprocError {
    #[error("Expected {expected} channel(s), got {found}")]
    Channels { expected: usize, found: usize },

    #[error("Empty image")]
    Empty,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type ImgprocResult<T> = std::result::Result<T, ImgprocError>;

pub(crate) fn expect_channels(found: usize, expected: usize) -> ImgprocResult<()> {
    if found == expected {
        Ok(())
    } else {
        Err(ImgprocError::Channels { expected, found })
    }
}

#[inline]
pub(crate) fn to_level(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[inline]
pub(crate) fn from_level(level: u8) -> f32 {
    f32::from(level) / 255.0
}

/// One channel of `src` as an 8-bit image.
pub(crate) fn to_gray(src: &Mat, channel: usize) -> GrayImage {
    GrayImage::from_fn(src.cols() as u32, src.rows() as u32, |x, y| {
        Luma([to_level(src.get(y as usize, x as usize, channel))])
    })
}

/// Run `f` on every channel of `src` and reassemble the results.
pub(crate) fn map_channels(src: &Mat, f: impl Fn(&GrayImage) -> GrayImage) -> Mat {
    let mut out = Mat::zeros(src.rows(), src.cols(), src.channels());
    for ch in 0..src.channels() {
        let plane = f(&to_gray(src, ch));
        for (x, y, px) in plane.enumerate_pixels() {
            out.set(y as usize, x as usize, ch, from_level(px.0[0]));
        }
    }
    out
}

pub use color::{convert_color, ColorConversion};
pub use contours::{draw_contours, draw_regions, find_regions, Region};
pub use morphology::{dilate, erode, morphology_ex, ElementShape, MorphOp};
pub use mser::{detect_mser, MserParams};
pub use threshold::{otsu_threshold, threshold, ThresholdType};
