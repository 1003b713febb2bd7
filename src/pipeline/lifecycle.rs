//! Component lifecycle state machine.
//!
//! ```text
//! Created --init--> Initialized --start--> Running <--stop/start--> Stopped --finish--> Finished
//!                        |                                                      ^
//!                        +--------------------------finish----------------------+
//! ```
//!
//! Each transition is gated by the matching component callback. A callback
//! returning `false` leaves the component in its prior state and surfaces a
//! [`PipelineError::Lifecycle`] to the caller; transitions are never retried.

use crate::pipeline::component::Component;
use crate::pipeline::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    Created,
    Initialized,
    Running,
    Stopped,
    Finished,
}

impl LifecycleState {
    /// Whether handlers are live for event delivery.
    #[inline]
    pub fn is_running(self) -> bool {
        self == LifecycleState::Running
    }

    /// State reached by applying `transition`, or `None` if the transition
    /// is not allowed from this state.
    pub fn apply(self, transition: Transition) -> Option<LifecycleState> {
        use LifecycleState::*;
        match (self, transition) {
            (Created, Transition::Init) => Some(Initialized),
            (Initialized | Stopped, Transition::Start) => Some(Running),
            (Running, Transition::Stop) => Some(Stopped),
            (Initialized | Stopped, Transition::Finish) => Some(Finished),
            _ => None,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A lifecycle transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transition {
    Init,
    Start,
    Stop,
    Finish,
}

impl Transition {
    pub fn name(self) -> &'static str {
        match self {
            Transition::Init => "init",
            Transition::Start => "start",
            Transition::Stop => "stop",
            Transition::Finish => "finish",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Run the gating callback for `transition` and update `state` on success.
pub(crate) fn drive(
    component: &mut dyn Component,
    name: &str,
    state: &mut LifecycleState,
    transition: Transition,
) -> PipelineResult<LifecycleState> {
    let Some(next) = state.apply(transition) else {
        return Err(PipelineError::InvalidTransition {
            component: name.to_string(),
            transition,
            state: *state,
        });
    };

    let accepted = match transition {
        Transition::Init => component.on_init(),
        Transition::Start => component.on_start(),
        Transition::Stop => component.on_stop(),
        Transition::Finish => component.on_finish(),
    };

    if !accepted {
        tracing::error!(
            component = name,
            transition = transition.name(),
            state = %state,
            "Lifecycle callback reported failure"
        );
        return Err(PipelineError::Lifecycle {
            component: name.to_string(),
            transition,
        });
    }

    tracing::info!("Component '{}': {} -> {}", name, state, next);
    *state = next;
    Ok(next)
}
