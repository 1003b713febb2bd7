//! Messages carried by the scheduler's event channels.
//!
//! In the single event loop every component shares one channel; in the
//! threaded executor each worker owns one. Data notifications and control
//! requests travel on the same channel, which is what orders a lifecycle
//! request after every notification raised before it.

use crate::pipeline::error::PipelineResult;
use crate::pipeline::id::PortId;
use crate::pipeline::lifecycle::{LifecycleState, Transition};
use crossbeam_channel::Sender;

/// Reply channel for a lifecycle request.
pub(crate) type TransitionReply = Sender<PipelineResult<LifecycleState>>;

pub(crate) enum Signal {
    /// An input port received a value.
    Data(PortId),
    /// Drive a component through a lifecycle transition.
    Control {
        component: String,
        transition: Transition,
        reply: Option<TransitionReply>,
    },
    /// Invoke a named handler directly.
    Trigger { component: String, handler: String },
    /// Re-route this component's events to another channel, pass along
    /// whatever is still queued, and stop.
    Handover(Sender<Signal>),
    Shutdown,
}

/// Raises "new data" events for one input port.
#[derive(Clone)]
pub(crate) struct Notifier {
    port: PortId,
    tx: Sender<Signal>,
}

impl Notifier {
    pub fn new(port: PortId, tx: Sender<Signal>) -> Self {
        Self { port, tx }
    }

    /// Returns `false` if the receiving side is gone.
    pub fn notify(&self) -> bool {
        self.tx.send(Signal::Data(self.port)).is_ok()
    }
}
