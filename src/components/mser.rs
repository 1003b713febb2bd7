//! Stable region detection component.

use crate::imgproc::{detect_mser, draw_contours, MserParams};
use crate::pipeline::{
    Component, InPort, Interface, OutPort, PipelineResult, Property, PropertyRegistry,
};
use crate::types::{Contour, Mat};

#[derive(Clone)]
struct Settings {
    delta: Property<u8>,
    min_area: Property<u32>,
    max_area: Property<u32>,
    max_variation: Property<f64>,
}

impl Settings {
    fn params(&self) -> MserParams {
        MserParams {
            delta: self.delta.get(),
            min_area: self.min_area.get() as usize,
            max_area: self.max_area.get() as usize,
            max_variation: self.max_variation.get() as f32,
        }
    }
}

/// Finds maximally stable regions of a single-channel `in_img`.
///
/// Writes the region borders to `out_contours` and a mask with them drawn
/// to `out_img`.
pub struct CvMSER {
    in_img: InPort<Mat>,
    out_contours: OutPort<Vec<Contour>>,
    out_img: OutPort<Mat>,
    settings: Settings,
}

impl CvMSER {
    pub fn new() -> Self {
        let defaults = MserParams::default();
        Self {
            in_img: InPort::queue("in_img"),
            out_contours: OutPort::new("out_contours"),
            out_img: OutPort::new("out_img"),
            settings: Settings {
                delta: Property::new("delta", defaults.delta),
                min_area: Property::new("min_area", defaults.min_area as u32),
                max_area: Property::new("max_area", defaults.max_area as u32),
                max_variation: Property::new("max_variation", f64::from(defaults.max_variation)),
            },
        }
    }
}

impl Default for CvMSER {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for CvMSER {
    fn register_properties(&mut self, props: &mut PropertyRegistry) -> PipelineResult<()> {
        let s = &self.settings;
        props.register(&s.delta)?;
        props.register(&s.min_area)?;
        props.register(&s.max_area)?;
        props.register(&s.max_variation)
    }

    fn prepare_interface(&mut self, iface: &mut Interface<'_>) -> PipelineResult<()> {
        iface.register_input(&self.in_img)?;
        iface.register_output(&self.out_contours)?;
        iface.register_output(&self.out_img)?;

        let (input, out_contours, out_img, s) = (
            self.in_img.clone(),
            self.out_contours.clone(),
            self.out_img.clone(),
            self.settings.clone(),
        );
        iface.register_handler("onNewImage", move || {
            let img = input.read()?;
            let regions = detect_mser(&img, &s.params())?;
            tracing::trace!("{} stable regions", regions.len());

            out_img.write(draw_contours(img.rows(), img.cols(), &regions))?;
            out_contours.write(regions)?;
            Ok(())
        })?;
        iface.add_dependency("onNewImage", &self.in_img)
    }
}
