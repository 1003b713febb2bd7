//! Pipeline-specific error types.
//!
//! Errors fall into three groups: configuration errors raised while the
//! graph is assembled, lifecycle errors raised when a component refuses a
//! transition, and runtime errors raised by port reads and writes inside a
//! handler. Only the first two ever reach the orchestrator; runtime errors
//! are contained at the handler boundary.

use crate::pipeline::lifecycle::{LifecycleState, Transition};
use thiserror::Error;

/// Errors that can occur within the pipeline system.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Duplicate {kind} '{name}' in component '{component}'")]
    Duplicate {
        component: String,
        kind: &'static str,
        name: String,
    },

    #[error("Unknown property '{name}' on component '{component}'")]
    UnknownProperty { component: String, name: String },

    #[error("Invalid value '{value}' for property '{name}': {message}")]
    InvalidValue {
        name: String,
        value: String,
        message: String,
    },

    #[error("Unknown port '{0}'")]
    UnknownPort(String),

    #[error("Unknown handler '{name}' on component '{component}'")]
    UnknownHandler { component: String, name: String },

    #[error("Unknown component '{0}'")]
    UnknownComponent(String),

    #[error("Component name '{0}' is already in use")]
    DuplicateComponent(String),

    #[error("Unknown component kind '{0}'")]
    UnknownKind(String),

    #[error("Component kind '{0}' is already registered")]
    DuplicateKind(String),

    #[error("Invalid port address '{0}', expected 'component.port'")]
    InvalidAddress(String),

    #[error("Port mismatch: {0}")]
    PortMismatch(String),

    #[error("Cannot bind '{from}' ({found}) to '{to}' ({expected})")]
    TypeMismatch {
        from: String,
        to: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Input port '{0}' is already bound")]
    AlreadyBound(String),

    #[error("Component '{component}' exceeds the port limit of {limit}")]
    TooManyPorts { component: String, limit: usize },

    #[error("Pipeline exceeds the component limit of {limit}")]
    TooManyComponents { limit: usize },

    #[error("Port '{0}' is empty")]
    EmptyPort(String),

    #[error("Queue on port '{port}' is full (capacity {capacity})")]
    QueueFull { port: String, capacity: usize },

    #[error("Port '{port}' does not support {operation} under the {policy} policy")]
    Unsupported {
        port: String,
        operation: &'static str,
        policy: &'static str,
    },

    #[error("Component '{0}' has not been prepared")]
    NotPrepared(String),

    #[error("Component '{0}' has already been prepared")]
    AlreadyPrepared(String),

    #[error("Component '{component}' failed to {transition}")]
    Lifecycle {
        component: String,
        transition: Transition,
    },

    #[error("Component '{component}' cannot {transition} while {state}")]
    InvalidTransition {
        component: String,
        transition: Transition,
        state: LifecycleState,
    },

    #[error("Component '{0}' is not running")]
    NotRunning(String),

    #[error("Handler '{handler}' of component '{component}' failed: {message}")]
    Handler {
        component: String,
        handler: String,
        message: String,
    },

    #[error("Worker thread for '{0}' panicked")]
    WorkerPanicked(String),

    #[error("Channel send error")]
    ChannelSend,

    #[error("Channel receive error")]
    ChannelRecv,
}

impl PipelineError {
    /// Errors that must stop graph assembly before the pipeline starts.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PipelineError::Duplicate { .. }
                | PipelineError::UnknownProperty { .. }
                | PipelineError::InvalidValue { .. }
                | PipelineError::UnknownPort(_)
                | PipelineError::UnknownHandler { .. }
                | PipelineError::UnknownComponent(_)
                | PipelineError::DuplicateComponent(_)
                | PipelineError::UnknownKind(_)
                | PipelineError::DuplicateKind(_)
                | PipelineError::InvalidAddress(_)
                | PipelineError::PortMismatch(_)
                | PipelineError::TypeMismatch { .. }
                | PipelineError::AlreadyBound(_)
                | PipelineError::TooManyPorts { .. }
                | PipelineError::TooManyComponents { .. }
                | PipelineError::NotPrepared(_)
                | PipelineError::AlreadyPrepared(_)
        )
    }

    /// Errors that are fatal for a single component's lifecycle.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            PipelineError::Lifecycle { .. } | PipelineError::InvalidTransition { .. }
        )
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let dup = PipelineError::Duplicate {
            component: "thresh".into(),
            kind: "property",
            name: "type".into(),
        };
        assert!(dup.is_configuration());
        assert!(!dup.is_lifecycle());

        let failed = PipelineError::Lifecycle {
            component: "thresh".into(),
            transition: Transition::Init,
        };
        assert!(failed.is_lifecycle());
        assert!(!failed.is_configuration());

        let empty = PipelineError::EmptyPort("in_img".into());
        assert!(!empty.is_configuration());
        assert!(!empty.is_lifecycle());
    }

    #[test]
    fn test_error_display() {
        let err = PipelineError::InvalidTransition {
            component: "calib".into(),
            transition: Transition::Start,
            state: LifecycleState::Created,
        };
        assert_eq!(
            err.to_string(),
            "Component 'calib' cannot start while Created"
        );
    }
}
