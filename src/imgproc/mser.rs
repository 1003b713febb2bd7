//! Maximally stable extremal regions.
//!
//! Each 8-bit level `l` of a single-channel image is thresholded (`<= l` for
//! dark regions, `>= 255 - l` for bright ones) and labelled with `imageproc`.
//! A region is followed across levels through its first pixel in scan
//! order. Its variation at `l` is the relative growth of that region by level
//! `l + delta`; regions whose variation is a local minimum along the way are
//! reported by their outer border.

use super::{expect_channels, to_gray, ImgprocError, ImgprocResult};
use crate::types::{Contour, Mat, Point};
use image::{GrayImage, ImageBuffer, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::region_labelling::{connected_components, Connectivity};
use std::collections::{BTreeMap, HashSet};

const TOP: usize = u8::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MserParams {
    /// Level step over which growth is measured.
    pub delta: u8,
    pub min_area: usize,
    pub max_area: usize,
    /// Largest accepted relative growth over `delta` levels.
    pub max_variation: f32,
}

impl Default for MserParams {
    fn default() -> Self {
        Self {
            delta: 5,
            min_area: 60,
            max_area: 14400,
            max_variation: 0.25,
        }
    }
}

type Labels = ImageBuffer<Luma<u32>, Vec<u32>>;

/// Connected components of one threshold level. `areas` is indexed by label.
struct Level {
    labels: Labels,
    seeds: Vec<(u32, u32)>,
    areas: Vec<usize>,
}

impl Level {
    fn new(gray: &GrayImage, level: usize) -> Self {
        let mask = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
            Luma([if usize::from(gray.get_pixel(x, y).0[0]) <= level { 255 } else { 0 }])
        });
        let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));
        let count = labels.pixels().map(|px| px.0[0]).max().unwrap_or(0) as usize;

        let mut seeds = vec![(0, 0); count + 1];
        let mut areas = vec![0usize; count + 1];
        for (x, y, px) in labels.enumerate_pixels() {
            let label = px.0[0] as usize;
            if label == 0 {
                continue;
            }
            if areas[label] == 0 {
                seeds[label] = (x, y);
            }
            areas[label] += 1;
        }
        Self {
            labels,
            seeds,
            areas,
        }
    }

    /// Area of the region holding `(x, y)`, or `None` if it is background.
    fn area_at(&self, (x, y): (u32, u32)) -> Option<usize> {
        match self.labels.get_pixel(x, y).0[0] as usize {
            0 => None,
            label => Some(self.areas[label]),
        }
    }
}

/// Sliding set of levels, built on demand.
struct Levels<'a> {
    gray: &'a GrayImage,
    cache: BTreeMap<usize, Level>,
}

impl<'a> Levels<'a> {
    fn ensure(&mut self, range: std::ops::RangeInclusive<usize>) {
        for level in range {
            let gray = self.gray;
            self.cache
                .entry(level)
                .or_insert_with(|| Level::new(gray, level));
        }
    }

    fn evict_below(&mut self, level: usize) {
        self.cache = self.cache.split_off(&level);
    }

    fn variation(&self, level: usize, seed: (u32, u32), delta: usize) -> Option<f32> {
        let area = self.cache.get(&level)?.area_at(seed)?;
        let grown = self.cache.get(&(level + delta).min(TOP))?.area_at(seed)?;
        Some((grown - area) as f32 / area as f32)
    }
}

fn stable_regions(gray: &GrayImage, params: &MserParams) -> Vec<Contour> {
    let delta = usize::from(params.delta);
    let mut levels = Levels {
        gray,
        cache: BTreeMap::new(),
    };
    let mut seen = HashSet::new();
    let mut found = Vec::new();

    for level in 0..=TOP {
        levels.ensure(level.saturating_sub(1)..=(level + 1 + delta).min(TOP));
        let Some(current) = levels.cache.get(&level) else {
            continue;
        };

        for label in 1..current.areas.len() {
            let (seed, area) = (current.seeds[label], current.areas[label]);
            if area < params.min_area || area > params.max_area {
                continue;
            }
            let Some(var) = levels.variation(level, seed, delta) else {
                continue;
            };
            if var > params.max_variation {
                continue;
            }
            let below = level
                .checked_sub(1)
                .and_then(|prev| levels.variation(prev, seed, delta));
            let above = (level < TOP)
                .then(|| levels.variation(level + 1, seed, delta))
                .flatten();
            if below.is_some_and(|b| var >= b) || above.is_some_and(|a| var > a) {
                continue;
            }
            if !seen.insert((seed, area)) {
                continue;
            }
            if let Some(contour) = outer_border(&current.labels, label as u32) {
                found.push(contour);
            }
        }
        levels.evict_below(level);
    }
    found
}

fn outer_border(labels: &Labels, label: u32) -> Option<Contour> {
    let mask = GrayImage::from_fn(labels.width(), labels.height(), |x, y| {
        Luma([if labels.get_pixel(x, y).0[0] == label { 255 } else { 0 }])
    });
    find_contours::<i32>(&mask)
        .into_iter()
        .find(|c| c.border_type == BorderType::Outer)
        .map(|c| c.points.iter().map(|p| Point::new(p.x, p.y)).collect())
}

/// Dark regions first, then bright ones.
pub fn detect_mser(src: &Mat, params: &MserParams) -> ImgprocResult<Vec<Contour>> {
    expect_channels(src.channels(), 1)?;
    if params.min_area > params.max_area {
        return Err(ImgprocError::InvalidParameter(format!(
            "min_area {} exceeds max_area {}",
            params.min_area, params.max_area
        )));
    }
    let gray = to_gray(src, 0);
    let mut inverted = gray.clone();
    image::imageops::invert(&mut inverted);

    let mut regions = stable_regions(&gray, params);
    regions.extend(stable_regions(&inverted, params));
    Ok(regions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dark_square() -> Mat {
        let mut m = Mat::zeros(20, 20, 1).map(|_| 1.0);
        for r in 5..11 {
            for c in 5..11 {
                m.set(r, c, 0, 0.0);
            }
        }
        m
    }

    fn params() -> MserParams {
        MserParams {
            min_area: 10,
            max_area: 200,
            ..MserParams::default()
        }
    }

    #[test]
    fn test_dark_square_is_stable() {
        let regions = detect_mser(&dark_square(), &params()).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].len(), 20);
        assert!(regions[0].contains(&Point::new(5, 5)));
        assert!(regions[0].contains(&Point::new(10, 10)));
    }

    #[test]
    fn test_bright_square_found_through_inversion() {
        let bright = dark_square().map(|v| 1.0 - v);
        let regions = detect_mser(&bright, &params()).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].len(), 20);
    }

    #[test]
    fn test_area_bounds() {
        let small = MserParams {
            max_area: 30,
            ..params()
        };
        assert!(detect_mser(&dark_square(), &small).unwrap().is_empty());

        let flat = Mat::zeros(20, 20, 1);
        assert!(detect_mser(&flat, &params()).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(detect_mser(&Mat::zeros(4, 4, 3), &params()).is_err());
        let inverted = MserParams {
            min_area: 50,
            max_area: 10,
            ..params()
        };
        assert!(detect_mser(&dark_square(), &inverted).is_err());
    }
}
