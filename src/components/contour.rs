//! Contour extraction component.

use crate::imgproc::{draw_regions, find_regions};
use crate::pipeline::{
    Component, InPort, Interface, OutPort, PipelineResult, Property, PropertyRegistry,
};
use crate::types::{Contour, Mat, Moments};

/// Extracts region contours from a binary `in_img`.
///
/// Regions with fewer than `min_size` contour points are discarded. Outputs
/// the contours, their moments and a mask with the contours drawn.
pub struct CvContour {
    in_img: InPort<Mat>,
    out_contours: OutPort<Vec<Contour>>,
    out_moments: OutPort<Vec<Moments>>,
    out_img: OutPort<Mat>,
    min_size: Property<u32>,
}

impl CvContour {
    pub fn new() -> Self {
        Self {
            in_img: InPort::queue("in_img"),
            out_contours: OutPort::new("out_contours"),
            out_moments: OutPort::new("out_moments"),
            out_img: OutPort::new("out_img"),
            min_size: Property::new("min_size", 0),
        }
    }
}

impl Default for CvContour {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for CvContour {
    fn register_properties(&mut self, props: &mut PropertyRegistry) -> PipelineResult<()> {
        props.register(&self.min_size)
    }

    fn prepare_interface(&mut self, iface: &mut Interface<'_>) -> PipelineResult<()> {
        iface.register_input(&self.in_img)?;
        iface.register_output(&self.out_contours)?;
        iface.register_output(&self.out_moments)?;
        iface.register_output(&self.out_img)?;

        let input = self.in_img.clone();
        let (out_contours, out_moments, out_img) = (
            self.out_contours.clone(),
            self.out_moments.clone(),
            self.out_img.clone(),
        );
        let min_size = self.min_size.clone();
        iface.register_handler("onNewImage", move || {
            let img = input.read()?;
            let min = min_size.get() as usize;
            let regions: Vec<_> = find_regions(&img)?
                .into_iter()
                .filter(|r| r.contour.len() >= min)
                .collect();

            out_img.write(draw_regions(img.rows(), img.cols(), &regions))?;
            out_moments.write(regions.iter().map(|r| r.moments).collect())?;
            out_contours.write(regions.into_iter().map(|r| r.contour).collect())?;
            Ok(())
        })?;
        iface.add_dependency("onNewImage", &self.in_img)
    }
}
