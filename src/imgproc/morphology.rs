//! Binary morphology with rectangular, cross and elliptic elements.
//!
//! Every channel is filtered on its own; a sample is foreground when its
//! 8-bit level is nonzero and the result holds `0.0` or `1.0`. Each element
//! shape is the unit ball of an `imageproc` norm, so repeating an operation
//! is the same as growing the element.

use super::{map_channels, to_level, ImgprocError, ImgprocResult};
use crate::types::Mat;
use imageproc::distance_transform::Norm;
use imageproc::morphology as morph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MorphOp {
    Erode,
    Dilate,
    Open,
    Close,
    Gradient,
    TopHat,
    BlackHat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementShape {
    Rect,
    Cross,
    Ellipse,
}

impl ElementShape {
    fn norm(self) -> Norm {
        match self {
            ElementShape::Rect => Norm::LInf,
            ElementShape::Cross => Norm::L1,
            ElementShape::Ellipse => Norm::L2,
        }
    }
}

pub fn erode(src: &Mat, shape: ElementShape, radius: u8) -> Mat {
    map_channels(src, |plane| morph::erode(plane, shape.norm(), radius))
}

pub fn dilate(src: &Mat, shape: ElementShape, radius: u8) -> Mat {
    map_channels(src, |plane| morph::dilate(plane, shape.norm(), radius))
}

fn difference(a: &Mat, b: &Mat) -> Mat {
    let mut out = a.clone();
    for (o, v) in out.data_mut().iter_mut().zip(b.data()) {
        *o = (*o - v).max(0.0);
    }
    out
}

/// Apply `op` with an element of odd `size`, `iterations` times over.
pub fn morphology_ex(
    src: &Mat,
    op: MorphOp,
    shape: ElementShape,
    size: usize,
    iterations: usize,
) -> ImgprocResult<Mat> {
    if size == 0 || size % 2 == 0 {
        return Err(ImgprocError::InvalidParameter(format!(
            "element size must be odd, got {}",
            size
        )));
    }
    let radius = (size / 2)
        .checked_mul(iterations)
        .and_then(|r| u8::try_from(r).ok())
        .ok_or_else(|| {
            ImgprocError::InvalidParameter(format!(
                "element size {} over {} iterations is too large",
                size, iterations
            ))
        })?;

    let er = |m: &Mat| erode(m, shape, radius);
    let di = |m: &Mat| dilate(m, shape, radius);
    let unit = src.map(|v| if to_level(v) > 0 { 1.0 } else { 0.0 });

    Ok(match op {
        MorphOp::Erode => er(src),
        MorphOp::Dilate => di(src),
        MorphOp::Open => di(&er(src)),
        MorphOp::Close => er(&di(src)),
        MorphOp::Gradient => difference(&di(src), &er(src)),
        MorphOp::TopHat => difference(&unit, &di(&er(src))),
        MorphOp::BlackHat => difference(&er(&di(src)), &unit),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot() -> Mat {
        let mut m = Mat::zeros(5, 5, 1);
        m.set(2, 2, 0, 1.0);
        m
    }

    fn count(m: &Mat) -> usize {
        m.data().iter().filter(|&&v| v == 1.0).count()
    }

    #[test]
    fn test_element_shapes() {
        let grow = |shape, size| morphology_ex(&dot(), MorphOp::Dilate, shape, size, 1).unwrap();
        assert_eq!(count(&grow(ElementShape::Rect, 3)), 9);
        assert_eq!(count(&grow(ElementShape::Cross, 3)), 5);
        assert_eq!(count(&grow(ElementShape::Ellipse, 5)), 13);
    }

    #[test]
    fn test_dilate_then_erode_restores_dot() {
        let closed = morphology_ex(&dot(), MorphOp::Close, ElementShape::Rect, 3, 1).unwrap();
        assert_eq!(closed, dot());
        let gradient = morphology_ex(&dot(), MorphOp::Gradient, ElementShape::Rect, 3, 1).unwrap();
        assert_eq!(count(&gradient), 9);
    }

    #[test]
    fn test_open_removes_isolated_pixel() {
        let opened = morphology_ex(&dot(), MorphOp::Open, ElementShape::Rect, 3, 1).unwrap();
        assert!(opened.data().iter().all(|&v| v == 0.0));
        let tophat = morphology_ex(&dot(), MorphOp::TopHat, ElementShape::Rect, 3, 1).unwrap();
        assert_eq!(tophat, dot());
    }

    #[test]
    fn test_iterations_grow_element() {
        let twice = morphology_ex(&dot(), MorphOp::Dilate, ElementShape::Rect, 3, 2).unwrap();
        assert_eq!(count(&twice), 25);
    }

    #[test]
    fn test_invalid_element_rejected() {
        assert!(morphology_ex(&dot(), MorphOp::Erode, ElementShape::Rect, 4, 1).is_err());
        assert!(morphology_ex(&dot(), MorphOp::Erode, ElementShape::Rect, 3, 300).is_err());
    }
}
