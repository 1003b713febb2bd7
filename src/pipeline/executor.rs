//! Pipeline graph and the single-threaded event loop.
//!
//! The orchestrator assembles a graph in phases:
//! 1. Add components (properties are collected).
//! 2. Configure properties from name/value strings.
//! 3. Prepare interfaces (ports, handlers, dependencies).
//! 4. Connect outputs to inputs by `component.port` address.
//! 5. Drive lifecycle transitions and run the scheduler.
//!
//! Every input port raises its "new data" events on one shared channel, so
//! the loop serves a global FIFO. Handlers run to completion; writes they
//! perform only enqueue further events, which are served afterwards.

use crate::pipeline::catalog::Catalog;
use crate::pipeline::component::Component;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::handler::JoinMode;
use crate::pipeline::id::ComponentId;
use crate::pipeline::lifecycle::{LifecycleState, Transition};
use crate::pipeline::port::{AnyInPort, AnyOutPort, InPort, OutPort, PortValue};
use crate::pipeline::signal::Signal;
use crate::pipeline::slot::ComponentSlot;
use crate::pipeline::snapshot::{ConnectionSnapshot, TopologySnapshot};
use crate::pipeline::worker::ThreadedPipeline;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::time::Duration;

/// Address used in snapshots for ports owned by the orchestrator.
pub const EXTERNAL: &str = "<external>";

/// Split `component.port` into its parts.
pub(crate) fn split_address(address: &str) -> PipelineResult<(&str, &str)> {
    match address.rsplit_once('.') {
        Some((component, port)) if !component.is_empty() && !port.is_empty() => {
            Ok((component, port))
        }
        _ => Err(PipelineError::InvalidAddress(address.to_string())),
    }
}

/// The pipeline graph and its event loop.
pub struct Pipeline {
    pub(crate) slots: Vec<ComponentSlot>,
    pub(crate) connections: Vec<ConnectionSnapshot>,
    pub(crate) events_tx: Sender<Signal>,
    pub(crate) events_rx: Receiver<Signal>,
    pub(crate) default_join: JoinMode,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("components", &self.component_names().collect::<Vec<_>>())
            .field("connections", &self.connections.len())
            .field("pending", &self.pending())
            .finish()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::with_join_mode(JoinMode::default())
    }

    /// Pipeline whose handlers start in `join` mode unless they override it.
    pub fn with_join_mode(join: JoinMode) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            slots: Vec::new(),
            connections: Vec::new(),
            events_tx,
            events_rx,
            default_join: join,
        }
    }

    /// Reassemble a pipeline around an event channel its slots already
    /// report to.
    pub(crate) fn from_parts(
        slots: Vec<ComponentSlot>,
        connections: Vec<ConnectionSnapshot>,
        default_join: JoinMode,
        (events_tx, events_rx): (Sender<Signal>, Receiver<Signal>),
    ) -> Self {
        for slot in &slots {
            slot.attach(&events_tx);
        }
        Self {
            slots,
            connections,
            events_tx,
            events_rx,
            default_join,
        }
    }

    pub fn default_join_mode(&self) -> JoinMode {
        self.default_join
    }

    // ── Graph assembly ──

    /// Add a component instance under a unique `name`.
    pub fn add_component(
        &mut self,
        name: &str,
        kind: &str,
        component: Box<dyn Component>,
    ) -> PipelineResult<ComponentId> {
        if self.find(name).is_some() {
            return Err(PipelineError::DuplicateComponent(name.to_string()));
        }
        let id = ComponentId::from_index(self.slots.len()).ok_or(
            PipelineError::TooManyComponents {
                limit: ComponentId::MAX_COMPONENTS,
            },
        )?;
        let slot = ComponentSlot::new(id, name, kind, component, self.default_join)?;
        tracing::debug!(
            "Added component '{}' ({}) as {:?} with {} properties",
            name,
            kind,
            id,
            slot.properties.len()
        );
        self.slots.push(slot);
        Ok(id)
    }

    /// Create a component of `kind` from the catalog and add it.
    pub fn instantiate(
        &mut self,
        catalog: &Catalog,
        kind: &str,
        name: &str,
    ) -> PipelineResult<ComponentId> {
        let component = catalog.create(kind, name)?;
        self.add_component(name, kind, component)
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.name == name)
    }

    fn slot(&self, name: &str) -> PipelineResult<&ComponentSlot> {
        self.find(name)
            .map(|i| &self.slots[i])
            .ok_or_else(|| PipelineError::UnknownComponent(name.to_string()))
    }

    fn slot_mut(&mut self, name: &str) -> PipelineResult<&mut ComponentSlot> {
        match self.find(name) {
            Some(i) => Ok(&mut self.slots[i]),
            None => Err(PipelineError::UnknownComponent(name.to_string())),
        }
    }

    /// Apply name/value property settings. Unknown keys fail before any
    /// value is written.
    pub fn configure<'a, I>(&mut self, component: &str, settings: I) -> PipelineResult<()>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.slot(component)?.properties.apply(settings)
    }

    pub fn set_property(&mut self, component: &str, name: &str, value: &str) -> PipelineResult<()> {
        self.slot(component)?.properties.set(name, value)
    }

    pub fn property(&self, component: &str, name: &str) -> PipelineResult<String> {
        self.slot(component)?.properties.get(name)
    }

    /// `(name, value)` pairs of a component's properties.
    pub fn properties(&self, component: &str) -> PipelineResult<Vec<(String, String)>> {
        Ok(self
            .slot(component)?
            .properties
            .enumerate()
            .map(|(k, v)| (k.to_string(), v))
            .collect())
    }

    pub fn prepare(&mut self, component: &str) -> PipelineResult<()> {
        let tx = self.events_tx.clone();
        self.slot_mut(component)?.prepare(&tx)
    }

    /// Prepare every component that has not been prepared yet.
    pub fn prepare_all(&mut self) -> PipelineResult<()> {
        let tx = self.events_tx.clone();
        for slot in self.slots.iter_mut().filter(|s| !s.is_prepared()) {
            slot.prepare(&tx)?;
        }
        Ok(())
    }

    fn prepared_slot(&self, name: &str) -> PipelineResult<&ComponentSlot> {
        let slot = self.slot(name)?;
        if !slot.is_prepared() {
            return Err(PipelineError::NotPrepared(name.to_string()));
        }
        Ok(slot)
    }

    /// Bind `from` (an output, `component.port`) to `to` (an input).
    pub fn connect(&mut self, from: &str, to: &str) -> PipelineResult<()> {
        let (src_name, src_port) = split_address(from)?;
        let (dst_name, dst_port) = split_address(to)?;
        let output = self.prepared_slot(src_name)?.ports.output(src_port)?;
        let input = self.prepared_slot(dst_name)?.ports.input(dst_port)?;
        output.bind_dyn(input, from, to)?;

        tracing::info!("Connected {} -> {}", from, to);
        self.connections.push(ConnectionSnapshot {
            from: from.to_string(),
            to: to.to_string(),
        });
        Ok(())
    }

    /// Feed a component input from a port the orchestrator owns.
    pub fn connect_external<T: PortValue>(
        &mut self,
        source: &OutPort<T>,
        to: &str,
    ) -> PipelineResult<()> {
        let (dst_name, dst_port) = split_address(to)?;
        let input = self.prepared_slot(dst_name)?.ports.input(dst_port)?;
        let from = format!("{}.{}", EXTERNAL, source.name());
        AnyOutPort::bind_dyn(source, input, &from, to)?;

        tracing::info!("Connected {} -> {}", from, to);
        self.connections.push(ConnectionSnapshot {
            from,
            to: to.to_string(),
        });
        Ok(())
    }

    /// Observe a component output through a port the orchestrator owns.
    /// The tap raises no events; read it directly.
    pub fn tap<T: PortValue>(&mut self, from: &str, sink: &InPort<T>) -> PipelineResult<()> {
        let (src_name, src_port) = split_address(from)?;
        let output = self.prepared_slot(src_name)?.ports.output(src_port)?;
        let to = format!("{}.{}", EXTERNAL, sink.name());
        output.bind_dyn(sink as &dyn AnyInPort, from, &to)?;

        tracing::info!("Tapped {} -> {}", from, to);
        self.connections.push(ConnectionSnapshot {
            from: from.to_string(),
            to,
        });
        Ok(())
    }

    // ── Lifecycle ──

    pub fn transition(
        &mut self,
        component: &str,
        transition: Transition,
    ) -> PipelineResult<LifecycleState> {
        self.slot_mut(component)?.transition(transition)
    }

    pub fn init(&mut self, component: &str) -> PipelineResult<LifecycleState> {
        self.transition(component, Transition::Init)
    }

    pub fn start(&mut self, component: &str) -> PipelineResult<LifecycleState> {
        self.transition(component, Transition::Start)
    }

    pub fn stop(&mut self, component: &str) -> PipelineResult<LifecycleState> {
        self.transition(component, Transition::Stop)
    }

    pub fn finish(&mut self, component: &str) -> PipelineResult<LifecycleState> {
        self.transition(component, Transition::Finish)
    }

    /// Apply `transition` to every component in insertion order.
    ///
    /// A refusal does not stop the remaining components; the first error is
    /// returned once all have been attempted.
    pub fn transition_all(&mut self, transition: Transition) -> PipelineResult<()> {
        let mut first_err = None;
        for slot in &mut self.slots {
            if let Err(e) = slot.transition(transition) {
                tracing::warn!("Component '{}': {}", slot.name, e);
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn init_all(&mut self) -> PipelineResult<()> {
        self.transition_all(Transition::Init)
    }

    pub fn start_all(&mut self) -> PipelineResult<()> {
        self.transition_all(Transition::Start)
    }

    pub fn stop_all(&mut self) -> PipelineResult<()> {
        self.transition_all(Transition::Stop)
    }

    pub fn finish_all(&mut self) -> PipelineResult<()> {
        self.transition_all(Transition::Finish)
    }

    pub fn state(&self, component: &str) -> PipelineResult<LifecycleState> {
        Ok(self.slot(component)?.state())
    }

    /// Invoke a named handler of a running component immediately.
    pub fn trigger(&mut self, component: &str, handler: &str) -> PipelineResult<()> {
        self.slot_mut(component)?.trigger(handler)
    }

    // ── Scheduling ──

    /// Handle a command or lifecycle handle for a loop running elsewhere.
    pub fn controller(&self) -> PipelineController {
        PipelineController {
            events: self.events_tx.clone(),
        }
    }

    /// Number of signals waiting in the event queue.
    pub fn pending(&self) -> usize {
        self.events_rx.len()
    }

    /// Serve one queued signal. Returns the handler invocations it caused,
    /// or `None` if the queue was empty or a shutdown was requested.
    pub fn step(&mut self) -> Option<usize> {
        let signal = self.events_rx.try_recv().ok()?;
        self.process(signal)
    }

    /// Serve queued signals until the queue is empty. Returns the number of
    /// handler invocations.
    pub fn run_until_idle(&mut self) -> usize {
        let mut invoked = 0;
        while let Ok(signal) = self.events_rx.try_recv() {
            match self.process(signal) {
                Some(n) => invoked += n,
                None => break,
            }
        }
        invoked
    }

    /// Serve signals until a controller requests shutdown.
    pub fn run(&mut self) -> PipelineResult<()> {
        tracing::info!("Event loop running ({} components)", self.slots.len());
        loop {
            let signal = self
                .events_rx
                .recv()
                .map_err(|_| PipelineError::ChannelRecv)?;
            if self.process(signal).is_none() {
                break;
            }
        }
        tracing::info!("Event loop stopped");
        Ok(())
    }

    /// Like [`run`](Self::run) but returns after `timeout` without a signal.
    pub fn run_timeout(&mut self, timeout: Duration) -> usize {
        let mut invoked = 0;
        while let Ok(signal) = self.events_rx.recv_timeout(timeout) {
            match self.process(signal) {
                Some(n) => invoked += n,
                None => break,
            }
        }
        invoked
    }

    fn process(&mut self, signal: Signal) -> Option<usize> {
        match signal {
            Signal::Data(port) => match self.slots.get_mut(port.component().index()) {
                Some(slot) => Some(slot.on_data(port)),
                None => {
                    tracing::warn!("Event for unknown {:?}", port);
                    Some(0)
                }
            },
            Signal::Control {
                component,
                transition,
                reply,
            } => {
                let result = self.transition(&component, transition);
                match reply {
                    Some(reply) => {
                        let _ = reply.send(result);
                    }
                    None => {
                        if let Err(e) = result {
                            tracing::error!("{}", e);
                        }
                    }
                }
                Some(0)
            }
            Signal::Trigger { component, handler } => {
                let result = self.trigger(&component, &handler);
                let invoked = matches!(result, Ok(()) | Err(PipelineError::Handler { .. }));
                if let Err(e) = result {
                    tracing::warn!("Trigger '{}.{}': {}", component, handler, e);
                }
                Some(usize::from(invoked))
            }
            Signal::Handover(_) => {
                tracing::debug!("Ignoring worker handover on the event loop");
                Some(0)
            }
            Signal::Shutdown => None,
        }
    }

    /// Move every component onto its own worker thread.
    pub fn spawn(self) -> PipelineResult<ThreadedPipeline> {
        ThreadedPipeline::spawn(self)
    }

    // ── Introspection ──

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.name.as_str())
    }

    pub fn describe(&self) -> TopologySnapshot {
        TopologySnapshot {
            components: self.slots.iter().map(ComponentSlot::snapshot).collect(),
            connections: self.connections.clone(),
        }
    }
}

/// Cloneable handle that sends requests into a running event loop.
#[derive(Clone)]
pub struct PipelineController {
    events: Sender<Signal>,
}

impl PipelineController {
    /// Queue a lifecycle request; the reply arrives once the loop serves it.
    pub fn request(
        &self,
        component: &str,
        transition: Transition,
    ) -> PipelineResult<Receiver<PipelineResult<LifecycleState>>> {
        let (reply_tx, reply_rx) = bounded(1);
        self.events
            .send(Signal::Control {
                component: component.to_string(),
                transition,
                reply: Some(reply_tx),
            })
            .map_err(|_| PipelineError::ChannelSend)?;
        Ok(reply_rx)
    }

    /// Queue a lifecycle request and wait for its outcome. The loop must be
    /// running on another thread.
    pub fn transition(
        &self,
        component: &str,
        transition: Transition,
    ) -> PipelineResult<LifecycleState> {
        self.request(component, transition)?
            .recv()
            .map_err(|_| PipelineError::ChannelRecv)?
    }

    pub fn trigger(&self, component: &str, handler: &str) -> PipelineResult<()> {
        self.events
            .send(Signal::Trigger {
                component: component.to_string(),
                handler: handler.to_string(),
            })
            .map_err(|_| PipelineError::ChannelSend)
    }

    pub fn shutdown(&self) -> PipelineResult<()> {
        self.events
            .send(Signal::Shutdown)
            .map_err(|_| PipelineError::ChannelSend)
    }
}
