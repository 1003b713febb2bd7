//! Region extraction from binary images.
//!
//! Foreground is any sample with a nonzero 8-bit level. Outer borders come
//! from `imageproc`'s border following and regions from its 8-connected
//! labelling; each border is matched to the region holding its first point.

use super::{expect_channels, to_gray, ImgprocResult};
use crate::types::{Contour, Mat, Moments, Point};
use image::Luma;
use imageproc::contours::{find_contours, BorderType};
use imageproc::region_labelling::{connected_components, Connectivity};

/// One connected foreground region
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub contour: Contour,
    pub moments: Moments,
    pub area: usize,
}

/// Outer regions of a single-channel image, in scan order of their first
/// pixel.
pub fn find_regions(src: &Mat) -> ImgprocResult<Vec<Region>> {
    expect_channels(src.channels(), 1)?;
    let gray = to_gray(src, 0);
    let labels = connected_components(&gray, Connectivity::Eight, Luma([0u8]));

    let count = labels.pixels().map(|px| px.0[0]).max().unwrap_or(0) as usize;
    let mut moments = vec![Moments::default(); count + 1];
    for (x, y, px) in labels.enumerate_pixels() {
        let m = &mut moments[px.0[0] as usize];
        m.m00 += 1.0;
        m.m10 += f64::from(x);
        m.m01 += f64::from(y);
    }
    for (x, y, px) in labels.enumerate_pixels() {
        let m = &mut moments[px.0[0] as usize];
        let (dx, dy) = (f64::from(x) - m.m10 / m.m00, f64::from(y) - m.m01 / m.m00);
        m.mu20 += dx * dx;
        m.mu11 += dx * dy;
        m.mu02 += dy * dy;
    }

    let regions = find_contours::<i32>(&gray)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .filter_map(|c| {
            let first = c.points.first()?;
            let label = labels.get_pixel(first.x as u32, first.y as u32).0[0] as usize;
            let moments = *moments.get(label).filter(|_| label > 0)?;
            Some(Region {
                contour: c.points.iter().map(|p| Point::new(p.x, p.y)).collect(),
                area: moments.m00 as usize,
                moments,
            })
        })
        .collect();
    Ok(regions)
}

/// Single-channel mask with every contour point set to one.
pub fn draw_regions(rows: usize, cols: usize, regions: &[Region]) -> Mat {
    draw_contours(rows, cols, regions.iter().map(|r| &r.contour))
}

pub fn draw_contours<'a>(
    rows: usize,
    cols: usize,
    contours: impl IntoIterator<Item = &'a Contour>,
) -> Mat {
    let mut mask = Mat::zeros(rows, cols, 1);
    for p in contours.into_iter().flatten() {
        let (x, y) = (p.x as usize, p.y as usize);
        if p.x >= 0 && p.y >= 0 && y < rows && x < cols {
            mask.set(y, x, 0, 1.0);
        }
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(rows: usize, cols: usize, on: &[(usize, usize)]) -> Mat {
        let mut m = Mat::zeros(rows, cols, 1);
        for &(r, c) in on {
            m.set(r, c, 0, 1.0);
        }
        m
    }

    fn square(r0: usize, c0: usize, side: usize) -> Vec<(usize, usize)> {
        (r0..r0 + side)
            .flat_map(|r| (c0..c0 + side).map(move |c| (r, c)))
            .collect()
    }

    #[test]
    fn test_two_regions() {
        let mut on = square(1, 1, 3);
        on.push((6, 6));
        let regions = find_regions(&image(8, 8, &on)).unwrap();

        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].area, 9);
        assert_eq!(regions[0].contour.len(), 8);
        assert!(!regions[0].contour.contains(&Point::new(2, 2)));
        assert_eq!(regions[0].moments.centroid(), Some((2.0, 2.0)));
        assert_eq!(regions[1].contour, vec![Point::new(6, 6)]);
        assert_eq!(regions[1].area, 1);
    }

    #[test]
    fn test_diagonal_pixels_are_connected() {
        let regions = find_regions(&image(3, 3, &[(0, 0), (1, 1), (2, 2)])).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].area, 3);
    }

    #[test]
    fn test_hole_border_not_reported() {
        let mut on = square(0, 0, 5);
        on.retain(|&p| p != (2, 2));
        let regions = find_regions(&image(5, 5, &on)).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].area, 24);
    }

    #[test]
    fn test_draw_regions() {
        let src = image(4, 4, &[(1, 1), (1, 2)]);
        let regions = find_regions(&src).unwrap();
        assert_eq!(draw_regions(4, 4, &regions), src);
    }
}
