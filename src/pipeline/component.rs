//! Plug-in contract for processing components.

use crate::pipeline::error::PipelineResult;
use crate::pipeline::handler::{HandlerTable, JoinMode};
use crate::pipeline::port::{InPort, OutPort, PortTable, PortValue};
use crate::pipeline::property::PropertyRegistry;
use crate::pipeline::signal::Signal;
use crossbeam_channel::Sender;

/// A processing unit in the pipeline graph.
///
/// Properties are registered when the component is added to a pipeline so
/// configuration can populate them. `prepare_interface` runs afterwards,
/// once, and declares ports, handlers and dependencies; it may read the
/// configured property values. The lifecycle callbacks gate the matching
/// transitions and return `false` to refuse them.
pub trait Component: Send {
    fn register_properties(&mut self, _props: &mut PropertyRegistry) -> PipelineResult<()> {
        Ok(())
    }

    fn prepare_interface(&mut self, iface: &mut Interface<'_>) -> PipelineResult<()>;

    fn on_init(&mut self) -> bool {
        true
    }

    fn on_start(&mut self) -> bool {
        true
    }

    fn on_stop(&mut self) -> bool {
        true
    }

    fn on_finish(&mut self) -> bool {
        true
    }
}

/// Registration surface handed to [`Component::prepare_interface`].
pub struct Interface<'a> {
    name: &'a str,
    ports: &'a mut PortTable,
    handlers: &'a mut HandlerTable,
    events: &'a Sender<Signal>,
}

impl<'a> Interface<'a> {
    pub(crate) fn new(
        name: &'a str,
        ports: &'a mut PortTable,
        handlers: &'a mut HandlerTable,
        events: &'a Sender<Signal>,
    ) -> Self {
        Self {
            name,
            ports,
            handlers,
            events,
        }
    }

    /// Instance name of the component being prepared.
    pub fn component_name(&self) -> &str {
        self.name
    }

    pub fn register_input<T: PortValue>(&mut self, port: &InPort<T>) -> PipelineResult<()> {
        self.ports.insert_input(port, self.events).map(|_| ())
    }

    pub fn register_output<T: PortValue>(&mut self, port: &OutPort<T>) -> PipelineResult<()> {
        self.ports.insert_output(port).map(|_| ())
    }

    pub fn register_handler<F>(&mut self, name: &str, handler: F) -> PipelineResult<()>
    where
        F: FnMut() -> anyhow::Result<()> + Send + 'static,
    {
        self.handlers.register(name, Box::new(handler)).map(|_| ())
    }

    /// Subscribe `handler` to new data on `port`.
    ///
    /// The port is registered on first use, so dependencies may be declared
    /// before `register_input`.
    pub fn add_dependency<T: PortValue>(
        &mut self,
        handler: &str,
        port: &InPort<T>,
    ) -> PipelineResult<()> {
        let id = self.ports.insert_input(port, self.events)?;
        self.handlers.add_dependency(handler, id)
    }

    pub fn set_join_mode(&mut self, handler: &str, mode: JoinMode) -> PipelineResult<()> {
        self.handlers.set_join_mode(handler, mode)
    }
}
