//! Data-flow execution core.
//!
//! Components own typed properties, typed named ports and named handlers.
//! Writing to an output port stores the value in every bound input according
//! to that input's buffering policy and raises a "new data" event; the
//! scheduler fires every handler that declared the input as a dependency.
//!
//! # Architecture
//!
//! ```text
//! OutPort::write ──► InPort buffer (Newest | Queue)
//!                         │
//!                         └──► Signal::Data ──► event loop / worker ──► handlers
//! ```
//!
//! # Design
//!
//! - **Policy values, not port types**: `BufferPolicy` is attached to each
//!   `InPort<T>` instance.
//! - **String-keyed dispatch**: handlers are closures stored by name with
//!   their dependency ports; no component base class.
//! - **Explicit catalog**: `Catalog` is populated by `register` calls at
//!   startup; there is no global registration.
//! - **Two strategies**: `Pipeline::run_until_idle` serves one global FIFO on
//!   the calling thread; `Pipeline::spawn` gives every component a worker.

pub(crate) mod buffer;
pub mod catalog;
pub mod component;
pub mod error;
pub mod executor;
pub mod handler;
pub mod id;
pub mod lifecycle;
mod paused;
pub mod port;
pub mod property;
pub(crate) mod signal;
pub(crate) mod slot;
pub mod snapshot;
pub mod translator;
pub mod worker;

pub use buffer::{BufferPolicy, Overflow, PushOutcome};
pub use catalog::{Catalog, ComponentFactory};
pub use component::{Component, Interface};
pub use error::{PipelineError, PipelineResult};
pub use executor::{Pipeline, PipelineController, EXTERNAL};
pub use handler::{HandlerFn, JoinMode};
pub use id::{ComponentId, HandlerId, PortId};
pub use lifecycle::{LifecycleState, Transition};
pub use port::{bind, InPort, OutPort, PortDescriptor, PortDirection, PortValue};
pub use property::{AnyProperty, Property, PropertyIter, PropertyRegistry};
pub use snapshot::{ComponentSnapshot, ConnectionSnapshot, HandlerSnapshot, TopologySnapshot};
pub use translator::{EnumTable, PropertyValue, Translator, ValueTranslator};
pub use worker::ThreadedPipeline;
