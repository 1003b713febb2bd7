//! A component instance together with everything the scheduler keeps for it.

use crate::pipeline::component::{Component, Interface};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::handler::{HandlerTable, JoinMode};
use crate::pipeline::id::{ComponentId, PortId};
use crate::pipeline::lifecycle::{self, LifecycleState, Transition};
use crate::pipeline::paused::PausedQueue;
use crate::pipeline::port::PortTable;
use crate::pipeline::property::PropertyRegistry;
use crate::pipeline::signal::Signal;
use crate::pipeline::snapshot::ComponentSnapshot;
use crossbeam_channel::Sender;

pub(crate) struct ComponentSlot {
    pub id: ComponentId,
    pub name: String,
    pub kind: String,
    component: Box<dyn Component>,
    state: LifecycleState,
    prepared: bool,
    pub properties: PropertyRegistry,
    pub ports: PortTable,
    handlers: HandlerTable,
    paused: PausedQueue,
}

impl ComponentSlot {
    /// Wrap `component` and collect its properties.
    pub fn new(
        id: ComponentId,
        name: &str,
        kind: &str,
        mut component: Box<dyn Component>,
        join: JoinMode,
    ) -> PipelineResult<Self> {
        let mut properties = PropertyRegistry::new(name);
        component.register_properties(&mut properties)?;
        Ok(Self {
            id,
            name: name.to_string(),
            kind: kind.to_string(),
            component,
            state: LifecycleState::Created,
            prepared: false,
            properties,
            ports: PortTable::new(name, id),
            handlers: HandlerTable::new(name, join),
            paused: PausedQueue::new(),
        })
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Run `prepare_interface` once, routing input events to `events`.
    pub fn prepare(&mut self, events: &Sender<Signal>) -> PipelineResult<()> {
        if self.prepared {
            return Err(PipelineError::AlreadyPrepared(self.name.clone()));
        }
        let mut iface = Interface::new(&self.name, &mut self.ports, &mut self.handlers, events);
        self.component.prepare_interface(&mut iface)?;
        self.prepared = true;
        tracing::debug!(
            "Component '{}' ({}): {} ports, {} handlers",
            self.name,
            self.kind,
            self.ports.len(),
            self.handlers.len()
        );
        Ok(())
    }

    /// Drive a lifecycle transition. Entering `Running` replays deferred
    /// events.
    pub fn transition(&mut self, transition: Transition) -> PipelineResult<LifecycleState> {
        if !self.prepared {
            return Err(PipelineError::NotPrepared(self.name.clone()));
        }
        let state = lifecycle::drive(
            self.component.as_mut(),
            &self.name,
            &mut self.state,
            transition,
        )?;
        match state {
            LifecycleState::Running => {
                self.replay();
            }
            LifecycleState::Stopped => self.handlers.reset_joins(),
            LifecycleState::Finished => self.paused.clear(),
            _ => {}
        }
        Ok(state)
    }

    /// Handle a "new data" event for one of this component's ports.
    /// Returns the number of handler invocations.
    pub fn on_data(&mut self, port: PortId) -> usize {
        match self.state {
            LifecycleState::Running => self.handlers.dispatch(port),
            LifecycleState::Finished => {
                tracing::trace!("Component '{}' finished, dropping event", self.name);
                0
            }
            _ => {
                if self.handlers.is_subscribed(port) {
                    let newest = self.ports.is_newest(port);
                    self.paused.defer(port, newest, &self.name);
                }
                0
            }
        }
    }

    fn replay(&mut self) -> usize {
        self.paused
            .drain(&self.name)
            .into_iter()
            .map(|port| self.handlers.dispatch(port))
            .sum()
    }

    /// Invoke a named handler now. The component must be running.
    pub fn trigger(&mut self, handler: &str) -> PipelineResult<()> {
        if !self.state.is_running() {
            self.handlers.find(handler)?;
            return Err(PipelineError::NotRunning(self.name.clone()));
        }
        self.handlers.trigger(handler)
    }

    /// Route this component's input events to a different channel.
    pub fn attach(&self, events: &Sender<Signal>) {
        self.ports.attach_all(events);
    }

    pub fn snapshot(&self) -> ComponentSnapshot {
        ComponentSnapshot {
            id: self.id,
            name: self.name.clone(),
            kind: self.kind.clone(),
            state: self.state,
            properties: self
                .properties
                .enumerate()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            ports: self.ports.descriptors(),
            handlers: self.handlers.snapshots(&self.ports),
            deferred: self.paused.len(),
        }
    }
}
