//! Core data types carried by the built-in vision components
//!
//! # Main Types
//!
//! - [`Mat`] - Dense row-major image of `f32` samples with 1 to 4 channels
//! - [`Point`], [`Point2f`], [`Point3f`] - Pixel and model coordinates
//! - [`Contour`] and [`Moments`] - Region outlines and their spatial moments
//! - [`Object3D`] - Observed calibration pattern (model points + projections)
//! - [`CameraInfo`] - Intrinsic camera parameters
//!
//! Sample values are nominally in `[0, 1]`; nothing enforces the range.

use serde::{Deserialize, Serialize};

/// Maximum number of channels a [`Mat`] may carry
pub const MAX_CHANNELS: usize = 4;

/// Dense image, row-major with interleaved channels
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mat {
    rows: usize,
    cols: usize,
    channels: usize,
    data: Vec<f32>,
}

impl Mat {
    /// Zero-filled image. `channels` is clamped to `1..=MAX_CHANNELS`.
    pub fn zeros(rows: usize, cols: usize, channels: usize) -> Self {
        let channels = channels.clamp(1, MAX_CHANNELS);
        Self {
            rows,
            cols,
            channels,
            data: vec![0.0; rows * cols * channels],
        }
    }

    /// Wrap existing samples. Returns `None` if the sizes disagree.
    pub fn from_vec(rows: usize, cols: usize, channels: usize, data: Vec<f32>) -> Option<Self> {
        if channels == 0 || channels > MAX_CHANNELS || data.len() != rows * cols * channels {
            return None;
        }
        Some(Self {
            rows,
            cols,
            channels,
            data,
        })
    }

    /// Synthetic test pattern: horizontal gradient per channel, shifted by
    /// `phase` so consecutive frames differ.
    pub fn gradient(rows: usize, cols: usize, channels: usize, phase: usize) -> Self {
        let mut mat = Self::zeros(rows, cols, channels);
        let channels = mat.channels;
        let width = cols.max(1) as f32;
        for r in 0..rows {
            for c in 0..cols {
                for ch in 0..channels {
                    let x = ((c + phase + ch * cols / channels.max(1)) % cols.max(1)) as f32;
                    mat.set(r, c, ch, x / width);
                }
            }
        }
        mat
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    #[inline]
    fn offset(&self, row: usize, col: usize, channel: usize) -> usize {
        (row * self.cols + col) * self.channels + channel
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize, channel: usize) -> f32 {
        self.data[self.offset(row, col, channel)]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, channel: usize, value: f32) {
        let i = self.offset(row, col, channel);
        self.data[i] = value;
    }

    /// Same-sized image with every sample mapped through `f`.
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Mat {
        Mat {
            rows: self.rows,
            cols: self.cols,
            channels: self.channels,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Single-channel copy of `channel`.
    pub fn channel(&self, channel: usize) -> Mat {
        let data = self
            .data
            .chunks_exact(self.channels)
            .map(|px| px[channel])
            .collect();
        Mat {
            rows: self.rows,
            cols: self.cols,
            channels: 1,
            data,
        }
    }

    /// Mean of every channel.
    pub fn mean(&self) -> Vec<f32> {
        let pixels = (self.rows * self.cols).max(1) as f32;
        let mut sums = vec![0.0f32; self.channels];
        for px in self.data.chunks_exact(self.channels) {
            for (sum, v) in sums.iter_mut().zip(px) {
                *sum += v;
            }
        }
        sums.into_iter().map(|s| s / pixels).collect()
    }
}

/// Integer pixel coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Sub-pixel image coordinate
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2f {
    pub x: f32,
    pub y: f32,
}

/// Model-space coordinate
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3f {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Outline of a region, in traversal order
pub type Contour = Vec<Point>;

/// Spatial and central moments of a region up to second order
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Moments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
    pub mu20: f64,
    pub mu11: f64,
    pub mu02: f64,
}

impl Moments {
    /// Centre of mass, or `None` for an empty region.
    pub fn centroid(&self) -> Option<(f64, f64)> {
        (self.m00 > 0.0).then(|| (self.m10 / self.m00, self.m01 / self.m00))
    }
}

/// One observation of a calibration pattern
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Object3D {
    /// Pattern points in the pattern's own coordinate system.
    pub model_points: Vec<Point3f>,
    /// Where those points were observed in the image.
    pub image_points: Vec<Point2f>,
    /// Size of the image the observation came from.
    pub image_size: (u32, u32),
}

impl Object3D {
    /// Planar chessboard model of `cols` x `rows` inner corners.
    pub fn chessboard_model(cols: usize, rows: usize, square: f32) -> Vec<Point3f> {
        (0..rows)
            .flat_map(|r| {
                (0..cols).map(move |c| Point3f {
                    x: c as f32 * square,
                    y: r as f32 * square,
                    z: 0.0,
                })
            })
            .collect()
    }
}

/// Intrinsic camera parameters
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CameraInfo {
    pub width: u32,
    pub height: u32,
    /// Row-major 3x3 camera matrix.
    pub camera_matrix: [[f64; 3]; 3],
    pub dist_coeffs: Vec<f64>,
    /// Reprojection error of the calibration that produced these values.
    pub rms: f64,
}
