//! Morphological filtering component.

use crate::imgproc::{morphology_ex, ElementShape, MorphOp};
use crate::pipeline::{
    Component, EnumTable, InPort, Interface, OutPort, PipelineResult, Property, PropertyRegistry,
};
use crate::types::Mat;

pub static MORPH_OPS: EnumTable<MorphOp> = EnumTable::new(
    &[
        (MorphOp::Erode, "MORPH_ERODE"),
        (MorphOp::Dilate, "MORPH_DILATE"),
        (MorphOp::Open, "MORPH_OPEN"),
        (MorphOp::Close, "MORPH_CLOSE"),
        (MorphOp::Gradient, "MORPH_GRADIENT"),
        (MorphOp::TopHat, "MORPH_TOPHAT"),
        (MorphOp::BlackHat, "MORPH_BLACKHAT"),
    ],
    MorphOp::Open,
);

pub static ELEMENTS: EnumTable<ElementShape> = EnumTable::new(
    &[
        (ElementShape::Rect, "RECT"),
        (ElementShape::Cross, "CROSS"),
        (ElementShape::Ellipse, "ELLIPSE"),
    ],
    ElementShape::Rect,
);

#[derive(Clone)]
struct Settings {
    op: Property<MorphOp>,
    iterations: Property<u32>,
    element: Property<ElementShape>,
    elem_size: Property<u32>,
}

pub struct CvMorphology {
    in_img: InPort<Mat>,
    out_img: OutPort<Mat>,
    settings: Settings,
}

impl CvMorphology {
    pub fn new() -> Self {
        Self {
            in_img: InPort::queue("in_img"),
            out_img: OutPort::new("out_img"),
            settings: Settings {
                op: Property::enumerated("type", &MORPH_OPS),
                iterations: Property::new("iterations", 1),
                element: Property::enumerated("element", &ELEMENTS),
                elem_size: Property::new("elem_size", 3),
            },
        }
    }
}

impl Default for CvMorphology {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for CvMorphology {
    fn register_properties(&mut self, props: &mut PropertyRegistry) -> PipelineResult<()> {
        let s = &self.settings;
        props.register(&s.op)?;
        props.register(&s.iterations)?;
        props.register(&s.element)?;
        props.register(&s.elem_size)
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
            let out = morphology_ex(
                &img,
                s.op.get(),
                s.element.get(),
                s.elem_size.get() as usize,
                s.iterations.get() as usize,
            )?;
            output.write(out)?;
            Ok(())
        })?;
        iface.add_dependency("onNewImage", &self.in_img)
    }
}
