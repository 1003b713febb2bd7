//! Typed ports and bindings.
//!
//! An [`OutPort`] fans out to any number of [`InPort`]s; an input port can be
//! bound at most once. Ports are handles over shared state, so a component
//! keeps its own copy and the pipeline keeps a type-erased one for wiring by
//! name. Writing stores the value in every bound input per its
//! [`BufferPolicy`] and then raises a "new data" event for that input.

use crate::pipeline::buffer::{BufferPolicy, PortBuffer, PushOutcome};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::{ComponentId, PortId};
use crate::pipeline::signal::{Notifier, Signal};
use crossbeam_channel::Sender;
use serde::Serialize;
use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::time::{Duration, Instant};

/// Values that can travel through ports.
pub trait PortValue: Clone + Send + 'static {}

impl<T: Clone + Send + 'static> PortValue for T {}

/// Whether a port is an input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PortDirection {
    Input,
    Output,
}

/// Descriptor of a registered port, for introspection.
#[derive(Debug, Clone, Serialize)]
pub struct PortDescriptor {
    pub name: String,
    pub direction: PortDirection,
    pub value_type: &'static str,
    /// Buffering policy (inputs only).
    pub policy: Option<String>,
    /// Unread values (inputs) or bound inputs (outputs).
    pub depth: usize,
}

// ── Input ports ──

struct InPortShared<T> {
    name: String,
    policy: BufferPolicy,
    buffer: Mutex<PortBuffer<T>>,
    available: Condvar,
    bound: AtomicBool,
    notifier: Mutex<Option<Notifier>>,
    received: AtomicU64,
}

/// Consuming end of a connection.
pub struct InPort<T> {
    shared: Arc<InPortShared<T>>,
}

impl<T> Clone for InPort<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: PortValue> InPort<T> {
    pub fn new(name: impl Into<String>, policy: BufferPolicy) -> Self {
        Self {
            shared: Arc::new(InPortShared {
                name: name.into(),
                buffer: Mutex::new(PortBuffer::new(&policy)),
                policy,
                available: Condvar::new(),
                bound: AtomicBool::new(false),
                notifier: Mutex::new(None),
                received: AtomicU64::new(0),
            }),
        }
    }

    /// Input that keeps only the latest value.
    pub fn newest(name: impl Into<String>) -> Self {
        Self::new(name, BufferPolicy::Newest)
    }

    /// Input with an unbounded, non-blocking FIFO.
    pub fn queue(name: impl Into<String>) -> Self {
        Self::new(name, BufferPolicy::queue())
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn policy(&self) -> BufferPolicy {
        self.shared.policy
    }

    pub fn is_bound(&self) -> bool {
        self.shared.bound.load(Ordering::Acquire)
    }

    /// Total values delivered to this port.
    pub fn received(&self) -> u64 {
        self.shared.received.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.lock_buffer().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_buffer(&self) -> std::sync::MutexGuard<'_, PortBuffer<T>> {
        self.shared.buffer.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn empty(&self) -> PipelineError {
        PipelineError::EmptyPort(self.shared.name.clone())
    }

    /// Next value per the port's policy.
    ///
    /// `Newest` returns the retained value without consuming it. `Queue`
    /// removes the oldest value; on an empty queue it fails with
    /// [`PipelineError::EmptyPort`], or waits if the policy is blocking.
    pub fn read(&self) -> PipelineResult<T> {
        let mut buffer = self.lock_buffer();
        if self.shared.policy.is_blocking() {
            while buffer.len() == 0 {
                buffer = self
                    .shared
                    .available
                    .wait(buffer)
                    .unwrap_or_else(|e| e.into_inner());
            }
        }
        buffer.take().ok_or_else(|| self.empty())
    }

    /// Like [`read`](Self::read) but waits at most `timeout` for a value,
    /// regardless of the blocking flag.
    pub fn read_timeout(&self, timeout: Duration) -> PipelineResult<T> {
        let deadline = Instant::now() + timeout;
        let mut buffer = self.lock_buffer();
        while buffer.len() == 0 {
            let now = Instant::now();
            if now >= deadline {
                return Err(self.empty());
            }
            let (guard, _) = self
                .shared
                .available
                .wait_timeout(buffer, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            buffer = guard;
        }
        buffer.take().ok_or_else(|| self.empty())
    }

    /// Retained value of a `Newest` port.
    pub fn peek(&self) -> PipelineResult<T> {
        if !self.shared.policy.is_newest() {
            return Err(PipelineError::Unsupported {
                port: self.shared.name.clone(),
                operation: "peek",
                policy: self.shared.policy.label(),
            });
        }
        self.lock_buffer().take().ok_or_else(|| self.empty())
    }

    /// Store `value` and raise a "new data" event.
    pub(crate) fn deliver(&self, value: T) -> PipelineResult<PushOutcome> {
        let outcome = {
            let mut buffer = self.lock_buffer();
            buffer.push(value, &self.shared.policy, &self.shared.name)?
        };
        self.shared.available.notify_all();
        self.shared.received.fetch_add(1, Ordering::Relaxed);

        if outcome == PushOutcome::DroppedOldest {
            tracing::debug!("Port '{}': queue full, dropped oldest", self.shared.name);
        }

        let notifier = self
            .shared
            .notifier
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(notifier) = notifier.as_ref() {
            if !notifier.notify() {
                tracing::warn!("Port '{}': scheduler is gone, event lost", self.shared.name);
            }
        }
        Ok(outcome)
    }

    fn attach_notifier(&self, notifier: Notifier) {
        *self
            .shared
            .notifier
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(notifier);
    }

    fn same_port(&self, other: &InPort<T>) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl<T> std::fmt::Debug for InPort<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InPort")
            .field("name", &self.shared.name)
            .field("policy", &self.shared.policy)
            .finish()
    }
}

// ── Output ports ──

struct OutPortShared<T> {
    name: String,
    targets: RwLock<Vec<InPort<T>>>,
    written: AtomicU64,
}

/// Producing end of a connection.
pub struct OutPort<T> {
    shared: Arc<OutPortShared<T>>,
}

impl<T> Clone for OutPort<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: PortValue> OutPort<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(OutPortShared {
                name: name.into(),
                targets: RwLock::new(Vec::new()),
                written: AtomicU64::new(0),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn bound_count(&self) -> usize {
        self.shared
            .targets
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn written(&self) -> u64 {
        self.shared.written.load(Ordering::Relaxed)
    }

    /// Push `value` to every bound input.
    ///
    /// Delivery continues past a full queue so one slow consumer does not
    /// starve the others; the first failure is returned afterwards.
    pub fn write(&self, value: T) -> PipelineResult<()> {
        let targets = self
            .shared
            .targets
            .read()
            .unwrap_or_else(|e| e.into_inner());
        self.shared.written.fetch_add(1, Ordering::Relaxed);

        let Some((last, rest)) = targets.split_last() else {
            tracing::trace!("Port '{}': write with no consumers", self.shared.name);
            return Ok(());
        };

        let mut first_err = None;
        for target in rest {
            if let Err(e) = target.deliver(value.clone()) {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        if let Err(e) = last.deliver(value) {
            if first_err.is_none() {
                first_err = Some(e);
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<T> std::fmt::Debug for OutPort<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutPort")
            .field("name", &self.shared.name)
            .finish()
    }
}

/// Bind `output` to `input`. Fails if the input is already bound.
pub fn bind<T: PortValue>(output: &OutPort<T>, input: &InPort<T>) -> PipelineResult<()> {
    if input
        .shared
        .bound
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return Err(PipelineError::AlreadyBound(input.name().to_string()));
    }
    output
        .shared
        .targets
        .write()
        .unwrap_or_else(|e| e.into_inner())
        .push(input.clone());
    tracing::debug!("Bound '{}' -> '{}'", output.name(), input.name());
    Ok(())
}

// ── Type-erased views ──

pub(crate) trait AnyInPort: Send + Sync {
    fn name(&self) -> &str;
    fn value_type(&self) -> &'static str;
    fn policy(&self) -> BufferPolicy;
    fn pending(&self) -> usize;
    fn attach(&self, notifier: Notifier);
    fn as_any(&self) -> &dyn Any;
}

impl<T: PortValue> AnyInPort for InPort<T> {
    fn name(&self) -> &str {
        InPort::name(self)
    }

    fn value_type(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn policy(&self) -> BufferPolicy {
        InPort::policy(self)
    }

    fn pending(&self) -> usize {
        self.len()
    }

    fn attach(&self, notifier: Notifier) {
        self.attach_notifier(notifier);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub(crate) trait AnyOutPort: Send + Sync {
    fn name(&self) -> &str;
    fn value_type(&self) -> &'static str;
    fn bound_count(&self) -> usize;
    fn bind_dyn(&self, input: &dyn AnyInPort, from: &str, to: &str) -> PipelineResult<()>;
}

impl<T: PortValue> AnyOutPort for OutPort<T> {
    fn name(&self) -> &str {
        OutPort::name(self)
    }

    fn value_type(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn bound_count(&self) -> usize {
        OutPort::bound_count(self)
    }

    fn bind_dyn(&self, input: &dyn AnyInPort, from: &str, to: &str) -> PipelineResult<()> {
        match input.as_any().downcast_ref::<InPort<T>>() {
            Some(input) => bind(self, input),
            None => Err(PipelineError::TypeMismatch {
                from: from.to_string(),
                to: to.to_string(),
                expected: input.value_type(),
                found: std::any::type_name::<T>(),
            }),
        }
    }
}

// ── Per-component port table ──

pub(crate) enum PortEntry {
    Input(Box<dyn AnyInPort>),
    Output(Box<dyn AnyOutPort>),
}

impl PortEntry {
    fn name(&self) -> &str {
        match self {
            PortEntry::Input(p) => p.name(),
            PortEntry::Output(p) => p.name(),
        }
    }
}

/// Ports owned by one component. Inputs and outputs share one namespace;
/// a port's position in the table is its [`PortId`] index.
pub(crate) struct PortTable {
    owner: String,
    component: ComponentId,
    entries: Vec<PortEntry>,
}

impl PortTable {
    pub fn new(owner: impl Into<String>, component: ComponentId) -> Self {
        Self {
            owner: owner.into(),
            component,
            entries: Vec::new(),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name() == name)
    }

    fn next_id(&self) -> PipelineResult<PortId> {
        if self.entries.len() >= PortId::MAX_PORTS {
            return Err(PipelineError::TooManyPorts {
                component: self.owner.clone(),
                limit: PortId::MAX_PORTS,
            });
        }
        Ok(PortId::new(self.component, self.entries.len() as u16))
    }

    fn duplicate(&self, name: &str) -> PipelineError {
        PipelineError::Duplicate {
            component: self.owner.clone(),
            kind: "port",
            name: name.to_string(),
        }
    }

    /// Register an input and route its events to `events`. Registering the
    /// same handle twice returns the existing id.
    pub fn insert_input<T: PortValue>(
        &mut self,
        port: &InPort<T>,
        events: &Sender<Signal>,
    ) -> PipelineResult<PortId> {
        if let Some(index) = self.position(port.name()) {
            let same = match &self.entries[index] {
                PortEntry::Input(existing) => existing
                    .as_any()
                    .downcast_ref::<InPort<T>>()
                    .is_some_and(|p| p.same_port(port)),
                PortEntry::Output(_) => false,
            };
            return if same {
                Ok(PortId::new(self.component, index as u16))
            } else {
                Err(self.duplicate(port.name()))
            };
        }

        let id = self.next_id()?;
        port.attach_notifier(Notifier::new(id, events.clone()));
        self.entries.push(PortEntry::Input(Box::new(port.clone())));
        tracing::trace!("Component '{}': input '{}' as {:?}", self.owner, port.name(), id);
        Ok(id)
    }

    pub fn insert_output<T: PortValue>(&mut self, port: &OutPort<T>) -> PipelineResult<PortId> {
        if self.position(port.name()).is_some() {
            return Err(self.duplicate(port.name()));
        }
        let id = self.next_id()?;
        self.entries.push(PortEntry::Output(Box::new(port.clone())));
        tracing::trace!("Component '{}': output '{}' as {:?}", self.owner, port.name(), id);
        Ok(id)
    }

    pub fn input(&self, name: &str) -> PipelineResult<&dyn AnyInPort> {
        match self.position(name).map(|i| &self.entries[i]) {
            Some(PortEntry::Input(p)) => Ok(p.as_ref()),
            Some(PortEntry::Output(_)) => Err(PipelineError::PortMismatch(format!(
                "'{}.{}' is an output, expected an input",
                self.owner, name
            ))),
            None => Err(PipelineError::UnknownPort(format!("{}.{}", self.owner, name))),
        }
    }

    pub fn output(&self, name: &str) -> PipelineResult<&dyn AnyOutPort> {
        match self.position(name).map(|i| &self.entries[i]) {
            Some(PortEntry::Output(p)) => Ok(p.as_ref()),
            Some(PortEntry::Input(_)) => Err(PipelineError::PortMismatch(format!(
                "'{}.{}' is an input, expected an output",
                self.owner, name
            ))),
            None => Err(PipelineError::UnknownPort(format!("{}.{}", self.owner, name))),
        }
    }

    pub fn name_of(&self, port: PortId) -> Option<&str> {
        self.entries
            .get(port.port_index() as usize)
            .map(|e| e.name())
    }

    /// Whether `port` is an input retaining only its newest value.
    pub fn is_newest(&self, port: PortId) -> bool {
        matches!(
            self.entries.get(port.port_index() as usize),
            Some(PortEntry::Input(p)) if p.policy().is_newest()
        )
    }

    /// Re-route every input's events to `events`.
    pub fn attach_all(&self, events: &Sender<Signal>) {
        for (index, entry) in self.entries.iter().enumerate() {
            if let PortEntry::Input(p) = entry {
                p.attach(Notifier::new(
                    PortId::new(self.component, index as u16),
                    events.clone(),
                ));
            }
        }
    }

    pub fn descriptors(&self) -> Vec<PortDescriptor> {
        self.entries
            .iter()
            .map(|entry| match entry {
                PortEntry::Input(p) => PortDescriptor {
                    name: p.name().to_string(),
                    direction: PortDirection::Input,
                    value_type: p.value_type(),
                    policy: Some(p.policy().describe()),
                    depth: p.pending(),
                },
                PortEntry::Output(p) => PortDescriptor {
                    name: p.name().to_string(),
                    direction: PortDirection::Output,
                    value_type: p.value_type(),
                    policy: None,
                    depth: p.bound_count(),
                },
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
