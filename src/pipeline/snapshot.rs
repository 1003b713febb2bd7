//! Serializable views of a pipeline for introspection.

use crate::pipeline::handler::JoinMode;
use crate::pipeline::id::ComponentId;
use crate::pipeline::lifecycle::LifecycleState;
use crate::pipeline::port::PortDescriptor;
use serde::Serialize;

/// Snapshot of a single handler.
#[derive(Debug, Clone, Serialize)]
pub struct HandlerSnapshot {
    pub name: String,
    /// Names of the input ports the handler depends on.
    pub dependencies: Vec<String>,
    pub join_mode: JoinMode,
    pub fired: u64,
    pub failed: u64,
}

/// Snapshot of a single component instance.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentSnapshot {
    pub id: ComponentId,
    pub name: String,
    pub kind: String,
    pub state: LifecycleState,
    pub properties: Vec<(String, String)>,
    pub ports: Vec<PortDescriptor>,
    pub handlers: Vec<HandlerSnapshot>,
    /// Events waiting for the component to run.
    pub deferred: usize,
}

/// A binding between two named ports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionSnapshot {
    pub from: String,
    pub to: String,
}

/// Complete topology snapshot of the pipeline graph.
#[derive(Debug, Clone, Serialize)]
pub struct TopologySnapshot {
    pub components: Vec<ComponentSnapshot>,
    pub connections: Vec<ConnectionSnapshot>,
}

impl TopologySnapshot {
    pub fn component(&self, name: &str) -> Option<&ComponentSnapshot> {
        self.components.iter().find(|c| c.name == name)
    }
}
