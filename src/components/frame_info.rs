//! Sink that logs frame statistics.

use crate::pipeline::{
    Component, InPort, Interface, PipelineResult, Property, PropertyRegistry,
};
use crate::types::Mat;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Logs size and per-channel mean of every `log_every`-th frame on `in_img`.
pub struct FrameInfo {
    name: String,
    in_img: InPort<Mat>,
    log_every: Property<u32>,
    frames: Arc<AtomicU64>,
}

impl FrameInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            in_img: InPort::queue("in_img"),
            log_every: Property::new("log_every", 1),
            frames: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Shared frame counter; stays valid after the component is moved into a
    /// pipeline.
    pub fn counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.frames)
    }
}

impl Component for FrameInfo {
    fn register_properties(&mut self, props: &mut PropertyRegistry) -> PipelineResult<()> {
        props.register(&self.log_every)
    }

    fn prepare_interface(&mut self, iface: &mut Interface<'_>) -> PipelineResult<()> {
        let (input, every, frames) = (
            self.in_img.clone(),
            self.log_every.clone(),
            Arc::clone(&self.frames),
        );
        let name = self.name.clone();
        iface.register_handler("onNewImage", move || {
            let img = input.read()?;
            let n = frames.fetch_add(1, Ordering::Relaxed) + 1;
            if n % u64::from(every.get().max(1)) == 0 {
                tracing::info!(
                    "{}: frame {} {}x{}x{} mean {:?}",
                    name,
                    n,
                    img.rows(),
                    img.cols(),
                    img.channels(),
                    img.mean()
                );
            }
            Ok(())
        })?;
        iface.add_dependency("onNewImage", &self.in_img)
    }

    fn on_stop(&mut self) -> bool {
        tracing::info!("{}: {} frames seen", self.name, self.frames.load(Ordering::Relaxed));
        true
    }
}
