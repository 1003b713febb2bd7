//! Color-space conversion.

use super::{expect_channels, ImgprocResult};
use crate::types::Mat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorConversion {
    Rgb2Gray,
    Bgr2Gray,
    Gray2Rgb,
    Gray2Bgr,
    Rgb2Bgr,
    Bgr2Rgb,
}

const LUMA: [f32; 3] = [0.299, 0.587, 0.114];

impl ColorConversion {
    fn source_channels(self) -> usize {
        match self {
            ColorConversion::Gray2Rgb | ColorConversion::Gray2Bgr => 1,
            _ => 3,
        }
    }
}

pub fn convert_color(src: &Mat, conversion: ColorConversion) -> ImgprocResult<Mat> {
    expect_channels(src.channels(), conversion.source_channels())?;
    let (rows, cols) = (src.rows(), src.cols());

    let out = match conversion {
        ColorConversion::Rgb2Gray | ColorConversion::Bgr2Gray => {
            let weights = if conversion == ColorConversion::Rgb2Gray {
                LUMA
            } else {
                [LUMA[2], LUMA[1], LUMA[0]]
            };
            let mut out = Mat::zeros(rows, cols, 1);
            for (dst, px) in out.data_mut().iter_mut().zip(src.data().chunks_exact(3)) {
                *dst = px.iter().zip(weights).map(|(v, w)| v * w).sum();
            }
            out
        }
        ColorConversion::Gray2Rgb | ColorConversion::Gray2Bgr => {
            let mut out = Mat::zeros(rows, cols, 3);
            for (px, &v) in out.data_mut().chunks_exact_mut(3).zip(src.data()) {
                px.fill(v);
            }
            out
        }
        ColorConversion::Rgb2Bgr | ColorConversion::Bgr2Rgb => {
            let mut out = src.clone();
            for px in out.data_mut().chunks_exact_mut(3) {
                px.swap(0, 2);
            }
            out
        }
    };
    Ok(out)
}
