//! Channel split component.

use crate::pipeline::{
    Component, InPort, Interface, OutPort, PipelineError, PipelineResult, Property,
    PropertyRegistry,
};
use crate::types::Mat;

/// Splits `in_img` into one single-channel `out_img_N` per channel.
///
/// The outputs are created during interface preparation from the configured
/// `channels` count.
pub struct CvSplit {
    in_img: InPort<Mat>,
    outputs: Vec<OutPort<Mat>>,
    channels: Property<i32>,
}

impl CvSplit {
    pub fn new() -> Self {
        Self {
            in_img: InPort::queue("in_img"),
            outputs: Vec::new(),
            channels: Property::new("channels", 3),
        }
    }
}

impl Default for CvSplit {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for CvSplit {
    fn register_properties(&mut self, props: &mut PropertyRegistry) -> PipelineResult<()> {
        props.register(&self.channels)
    }

    fn prepare_interface(&mut self, iface: &mut Interface<'_>) -> PipelineResult<()> {
        let count = self.channels.get();
        if count < 1 {
            return Err(PipelineError::InvalidValue {
                name: "channels".to_string(),
                value: count.to_string(),
                message: "number of channels must be positive".to_string(),
            });
        }

        iface.register_input(&self.in_img)?;
        self.outputs = (0..count)
            .map(|i| OutPort::new(format!("out_img_{}", i)))
            .collect();
        for port in &self.outputs {
            iface.register_output(port)?;
        }

        let (input, outputs) = (self.in_img.clone(), self.outputs.clone());
        iface.register_handler("onNewImage", move || {
            let img = input.read()?;
            anyhow::ensure!(
                img.channels() == outputs.len(),
                "expected {} channels, got {}",
                outputs.len(),
                img.channels()
            );
            for (i, port) in outputs.iter().enumerate() {
                port.write(img.channel(i))?;
            }
            Ok(())
        })?;
        iface.add_dependency("onNewImage", &self.in_img)
    }
}
