//! Fixed-level thresholding component.

use crate::imgproc::{otsu_threshold, threshold, ThresholdType};
use crate::pipeline::{
    Component, EnumTable, InPort, Interface, OutPort, PipelineResult, Property, PropertyRegistry,
};
use crate::types::Mat;

pub static THRESHOLD_TYPES: EnumTable<ThresholdType> = EnumTable::new(
    &[
        (ThresholdType::Binary, "BINARY"),
        (ThresholdType::BinaryInv, "BINARY_INV"),
        (ThresholdType::Trunc, "TRUNC"),
        (ThresholdType::ToZero, "TOZERO"),
        (ThresholdType::ToZeroInv, "TOZERO_INV"),
    ],
    ThresholdType::Binary,
);

#[derive(Clone)]
struct Settings {
    kind: Property<ThresholdType>,
    thresh: Property<f64>,
    maxval: Property<f64>,
    otsu: Property<bool>,
    pass: Property<bool>,
}

/// Thresholds `in_img` into `out_img`.
///
/// With `otsu` set the level is computed per frame (single-channel input
/// only). With `pass` set frames are forwarded untouched.
pub struct CvThreshold {
    in_img: InPort<Mat>,
    out_img: OutPort<Mat>,
    settings: Settings,
}

impl CvThreshold {
    pub fn new() -> Self {
        Self {
            in_img: InPort::queue("in_img"),
            out_img: OutPort::new("out_img"),
            settings: Settings {
                kind: Property::enumerated("type", &THRESHOLD_TYPES),
                thresh: Property::new("thresh", 0.5),
                maxval: Property::new("maxval", 1.0),
                otsu: Property::new("otsu", false),
                pass: Property::new("pass", false),
            },
        }
    }
}

impl Default for CvThreshold {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for CvThreshold {
    fn register_properties(&mut self, props: &mut PropertyRegistry) -> PipelineResult<()> {
        let s = &self.settings;
        props.register(&s.kind)?;
        props.register(&s.thresh)?;
        props.register(&s.maxval)?;
        props.register(&s.otsu)?;
        props.register(&s.pass)
    }

    fn prepare_interface(&mut self, iface: &mut Interface<'_>) -> PipelineResult<()> {
        iface.register_input(&self.in_img)?;
        iface.register_output(&self.out_img)?;

        let (input, output, s) = (
            self.in_img.clone(),
            self.out_img.clone(),
            self.settings.clone(),
        );
        iface.register_handler("onNewImage", move || {
            let img = input.read()?;
            if s.pass.get() {
                output.write(img)?;
                return Ok(());
            }
            let level = if s.otsu.get() {
                otsu_threshold(&img)?
            } else {
                s.thresh.get() as f32
            };
            output.write(threshold(&img, level, s.maxval.get() as f32, s.kind.get()))?;
            Ok(())
        })?;
        iface.add_dependency("onNewImage", &self.in_img)
    }
}
