//! Handler registry and dependency dispatch.
//!
//! Handlers are keyed by name within their component and stored alongside
//! the input ports they depend on. A "new data" event on a port fires every
//! handler subscribed to that port, in registration order.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::{HandlerId, PortId};
use crate::pipeline::port::PortTable;
use crate::pipeline::snapshot::HandlerSnapshot;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};

/// Zero-argument handler body. Errors are logged and contained by the
/// scheduler.
pub type HandlerFn = Box<dyn FnMut() -> anyhow::Result<()> + Send>;

/// When a handler with several dependencies fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinMode {
    /// Once per arrival on any dependency.
    #[default]
    Any,
    /// Once every dependency has fresh data since the last firing.
    All,
}

struct HandlerEntry {
    name: String,
    callback: HandlerFn,
    dependencies: Vec<PortId>,
    join: JoinMode,
    /// Dependencies with an arrival since the last firing (`All` only).
    fresh: Vec<PortId>,
    fired: u64,
    failed: u64,
}

impl HandlerEntry {
    /// Record an arrival on `port` and report whether the handler is due.
    fn arrive(&mut self, port: PortId) -> bool {
        if !self.dependencies.contains(&port) {
            return false;
        }
        match self.join {
            JoinMode::Any => true,
            JoinMode::All => {
                if !self.fresh.contains(&port) {
                    self.fresh.push(port);
                }
                if self.fresh.len() == self.dependencies.len() {
                    self.fresh.clear();
                    true
                } else {
                    false
                }
            }
        }
    }
}

/// Handlers owned by one component.
pub(crate) struct HandlerTable {
    owner: String,
    default_join: JoinMode,
    entries: Vec<HandlerEntry>,
}

impl HandlerTable {
    pub fn new(owner: impl Into<String>, default_join: JoinMode) -> Self {
        Self {
            owner: owner.into(),
            default_join,
            entries: Vec::new(),
        }
    }

    pub fn register(&mut self, name: &str, callback: HandlerFn) -> PipelineResult<HandlerId> {
        if self.entries.iter().any(|h| h.name == name) {
            return Err(PipelineError::Duplicate {
                component: self.owner.clone(),
                kind: "handler",
                name: name.to_string(),
            });
        }
        let id = HandlerId(self.entries.len() as u32);
        self.entries.push(HandlerEntry {
            name: name.to_string(),
            callback,
            dependencies: Vec::new(),
            join: self.default_join,
            fresh: Vec::new(),
            fired: 0,
            failed: 0,
        });
        tracing::trace!("Component '{}': handler '{}'", self.owner, name);
        Ok(id)
    }

    pub fn find(&self, name: &str) -> PipelineResult<HandlerId> {
        self.entries
            .iter()
            .position(|h| h.name == name)
            .map(|i| HandlerId(i as u32))
            .ok_or_else(|| PipelineError::UnknownHandler {
                component: self.owner.clone(),
                name: name.to_string(),
            })
    }

    /// Subscribe `handler` to arrivals on `port`. Repeating a pair is a no-op.
    pub fn add_dependency(&mut self, handler: &str, port: PortId) -> PipelineResult<()> {
        let id = self.find(handler)?;
        let entry = &mut self.entries[id.index()];
        if !entry.dependencies.contains(&port) {
            entry.dependencies.push(port);
        }
        Ok(())
    }

    pub fn set_join_mode(&mut self, handler: &str, mode: JoinMode) -> PipelineResult<()> {
        let id = self.find(handler)?;
        let entry = &mut self.entries[id.index()];
        entry.join = mode;
        entry.fresh.clear();
        Ok(())
    }

    /// Whether any handler depends on `port`.
    pub fn is_subscribed(&self, port: PortId) -> bool {
        self.entries.iter().any(|h| h.dependencies.contains(&port))
    }

    /// Fire every handler due for one arrival on `port`. Returns the number
    /// of invocations.
    pub fn dispatch(&mut self, port: PortId) -> usize {
        let mut invoked = 0;
        for entry in &mut self.entries {
            if entry.arrive(port) {
                // Failures are logged inside; the next event is still served.
                let _ = invoke(&self.owner, entry);
                invoked += 1;
            }
        }
        invoked
    }

    /// Invoke a handler directly, bypassing its dependencies.
    pub fn trigger(&mut self, handler: &str) -> PipelineResult<()> {
        let id = self.find(handler)?;
        invoke(&self.owner, &mut self.entries[id.index()]).map_err(|message| {
            PipelineError::Handler {
                component: self.owner.clone(),
                handler: handler.to_string(),
                message,
            }
        })
    }

    /// Forget partial `All` joins, e.g. after the component stops.
    pub fn reset_joins(&mut self) {
        for entry in &mut self.entries {
            entry.fresh.clear();
        }
    }

    pub fn snapshots(&self, ports: &PortTable) -> Vec<HandlerSnapshot> {
        self.entries
            .iter()
            .map(|h| HandlerSnapshot {
                name: h.name.clone(),
                dependencies: h
                    .dependencies
                    .iter()
                    .filter_map(|p| ports.name_of(*p).map(str::to_string))
                    .collect(),
                join_mode: h.join,
                fired: h.fired,
                failed: h.failed,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Run one handler body with errors and panics contained.
fn invoke(owner: &str, entry: &mut HandlerEntry) -> Result<(), String> {
    tracing::trace!(component = owner, handler = %entry.name, "Invoking handler");
    entry.fired += 1;

    let message = match panic::catch_unwind(AssertUnwindSafe(|| (entry.callback)())) {
        Ok(Ok(())) => return Ok(()),
        Ok(Err(e)) => {
            let message = format!("{:#}", e);
            tracing::error!(
                component = owner,
                handler = %entry.name,
                error = %message,
                "Handler failed"
            );
            message
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(
                component = owner,
                handler = %entry.name,
                panic = %message,
                "Handler panicked"
            );
            format!("panicked: {}", message)
        }
    };
    entry.failed += 1;
    Err(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::id::ComponentId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn port(i: u16) -> PortId {
        PortId::new(ComponentId(0), i)
    }

    fn counting(counter: &Arc<AtomicUsize>) -> HandlerFn {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn test_fires_only_for_declared_ports() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut table = HandlerTable::new("c", JoinMode::Any);
        table.register("on_img", counting(&hits)).unwrap();
        table.add_dependency("on_img", port(0)).unwrap();
        table.add_dependency("on_img", port(0)).unwrap();

        assert_eq!(table.dispatch(port(0)), 1);
        assert_eq!(table.dispatch(port(1)), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_any_join_fires_per_arrival() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut table = HandlerTable::new("c", JoinMode::Any);
        table.register("h", counting(&hits)).unwrap();
        table.add_dependency("h", port(0)).unwrap();
        table.add_dependency("h", port(1)).unwrap();

        table.dispatch(port(0));
        table.dispatch(port(1));
        table.dispatch(port(0));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_all_join_waits_for_every_dependency() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut table = HandlerTable::new("c", JoinMode::Any);
        table.register("h", counting(&hits)).unwrap();
        table.add_dependency("h", port(0)).unwrap();
        table.add_dependency("h", port(1)).unwrap();
        table.set_join_mode("h", JoinMode::All).unwrap();

        table.dispatch(port(0));
        table.dispatch(port(0));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        table.dispatch(port(1));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        table.dispatch(port(1));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_errors_and_panics_are_contained() {
        let mut table = HandlerTable::new("c", JoinMode::Any);
        table
            .register("err", Box::new(|| Err(anyhow::anyhow!("empty port"))))
            .unwrap();
        table.register("boom", Box::new(|| panic!("bad frame"))).unwrap();

        assert!(matches!(
            table.trigger("err"),
            Err(PipelineError::Handler { message, .. }) if message == "empty port"
        ));
        assert!(table.trigger("boom").is_err());
        assert!(table.trigger("boom").is_err());
        let snapshot = &table.snapshots(&PortTable::new("c", ComponentId(0)))[1];
        assert_eq!((snapshot.fired, snapshot.failed), (2, 2));
        assert!(matches!(
            table.trigger("missing"),
            Err(PipelineError::UnknownHandler { .. })
        ));
    }

    #[test]
    fn test_duplicate_handler_rejected() {
        let mut table = HandlerTable::new("c", JoinMode::Any);
        table.register("h", Box::new(|| Ok(()))).unwrap();
        assert!(matches!(
            table.register("h", Box::new(|| Ok(()))),
            Err(PipelineError::Duplicate { kind: "handler", .. })
        ));
        assert!(table.add_dependency("nope", port(0)).is_err());
    }
}
