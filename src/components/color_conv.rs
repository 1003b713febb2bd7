//! Color-space conversion component.

use crate::imgproc::{convert_color, ColorConversion};
use crate::pipeline::{
    Component, EnumTable, InPort, Interface, OutPort, PipelineResult, Property, PropertyRegistry,
};
use crate::types::Mat;

pub static CONVERSIONS: EnumTable<ColorConversion> = EnumTable::new(
    &[
        (ColorConversion::Rgb2Gray, "RGB2GRAY"),
        (ColorConversion::Bgr2Gray, "BGR2GRAY"),
        (ColorConversion::Gray2Rgb, "GRAY2RGB"),
        (ColorConversion::Gray2Bgr, "GRAY2BGR"),
        (ColorConversion::Rgb2Bgr, "RGB2BGR"),
        (ColorConversion::Bgr2Rgb, "BGR2RGB"),
    ],
    ColorConversion::Rgb2Gray,
);

/// `in_img` -> `out_img` through the conversion named by `type`.
pub struct CvColorConv {
    in_img: InPort<Mat>,
    out_img: OutPort<Mat>,
    conversion: Property<ColorConversion>,
}

impl CvColorConv {
    pub fn new() -> Self {
        Self {
            in_img: InPort::queue("in_img"),
            out_img: OutPort::new("out_img"),
            conversion: Property::enumerated("type", &CONVERSIONS),
        }
    }
}

impl Default for CvColorConv {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for CvColorConv {
    fn register_properties(&mut self, props: &mut PropertyRegistry) -> PipelineResult<()> {
        props.register(&self.conversion)
    }

    fn prepare_interface(&mut self, iface: &mut Interface<'_>) -> PipelineResult<()> {
        iface.register_input(&self.in_img)?;
        iface.register_output(&self.out_img)?;

        let (input, output, conversion) = (
            self.in_img.clone(),
            self.out_img.clone(),
            self.conversion.clone(),
        );
        iface.register_handler("onNewImage", move || {
            let img = input.read()?;
            output.write(convert_color(&img, conversion.get())?)?;
            Ok(())
        })?;
        iface.add_dependency("onNewImage", &self.in_img)
    }
}
