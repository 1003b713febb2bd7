//! Buffering policies for input ports.
//!
//! The policy is a value attached to each input port rather than a type
//! parameter, so one `InPort<T>` type serves both retention rules.

use crate::pipeline::error::{PipelineError, PipelineResult};
use std::collections::VecDeque;

/// What a bounded queue does when a write arrives at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Overflow {
    /// Refuse the new value and report `QueueFull` to the writer.
    #[default]
    Reject,
    /// Discard the oldest unread value to make room.
    DropOldest,
}

/// Retention and consumption rule of an input port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferPolicy {
    /// Keep only the most recent value; reads do not consume it.
    Newest,
    /// Keep every value in FIFO order; reads consume the oldest.
    Queue {
        capacity: Option<usize>,
        overflow: Overflow,
        /// Reads on an empty queue wait for a value instead of failing.
        blocking: bool,
    },
}

impl BufferPolicy {
    /// Unbounded, non-blocking queue.
    pub const fn queue() -> Self {
        BufferPolicy::Queue {
            capacity: None,
            overflow: Overflow::Reject,
            blocking: false,
        }
    }

    pub const fn bounded(capacity: usize, overflow: Overflow) -> Self {
        BufferPolicy::Queue {
            capacity: Some(capacity),
            overflow,
            blocking: false,
        }
    }

    /// Same policy with blocking reads. No effect on `Newest`.
    pub const fn blocking(self) -> Self {
        match self {
            BufferPolicy::Queue {
                capacity, overflow, ..
            } => BufferPolicy::Queue {
                capacity,
                overflow,
                blocking: true,
            },
            BufferPolicy::Newest => BufferPolicy::Newest,
        }
    }

    #[inline]
    pub fn is_newest(&self) -> bool {
        matches!(self, BufferPolicy::Newest)
    }

    #[inline]
    pub fn is_blocking(&self) -> bool {
        matches!(self, BufferPolicy::Queue { blocking: true, .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            BufferPolicy::Newest => "newest",
            BufferPolicy::Queue { .. } => "queue",
        }
    }

    /// Human-readable description for snapshots.
    pub fn describe(&self) -> String {
        match self {
            BufferPolicy::Newest => "newest".to_string(),
            BufferPolicy::Queue {
                capacity,
                overflow,
                blocking,
            } => {
                let mut s = match capacity {
                    Some(c) => format!("queue({}, {:?})", c, overflow),
                    None => "queue(unbounded)".to_string(),
                };
                if *blocking {
                    s.push_str(" blocking");
                }
                s
            }
        }
    }
}

impl Default for BufferPolicy {
    fn default() -> Self {
        Self::queue()
    }
}

/// Result of storing a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Stored,
    /// An unread value was overwritten (`Newest`).
    Replaced,
    /// The oldest unread value was discarded (`DropOldest`).
    DroppedOldest,
}

/// Storage behind an input port.
#[derive(Debug)]
pub(crate) enum PortBuffer<T> {
    Newest(Option<T>),
    Queue(VecDeque<T>),
}

impl<T: Clone> PortBuffer<T> {
    pub fn new(policy: &BufferPolicy) -> Self {
        match policy {
            BufferPolicy::Newest => PortBuffer::Newest(None),
            BufferPolicy::Queue {
                capacity: Some(c), ..
            } => PortBuffer::Queue(VecDeque::with_capacity((*c).min(64))),
            BufferPolicy::Queue { .. } => PortBuffer::Queue(VecDeque::new()),
        }
    }

    pub fn push(
        &mut self,
        value: T,
        policy: &BufferPolicy,
        port: &str,
    ) -> PipelineResult<PushOutcome> {
        match self {
            PortBuffer::Newest(slot) => Ok(match slot.replace(value) {
                Some(_) => PushOutcome::Replaced,
                None => PushOutcome::Stored,
            }),
            PortBuffer::Queue(items) => {
                let (capacity, overflow) = match policy {
                    BufferPolicy::Queue {
                        capacity, overflow, ..
                    } => (*capacity, *overflow),
                    BufferPolicy::Newest => (None, Overflow::Reject),
                };
                match capacity {
                    Some(cap) if items.len() >= cap => match overflow {
                        Overflow::Reject => Err(PipelineError::QueueFull {
                            port: port.to_string(),
                            capacity: cap,
                        }),
                        Overflow::DropOldest => {
                            items.pop_front();
                            items.push_back(value);
                            Ok(PushOutcome::DroppedOldest)
                        }
                    },
                    _ => {
                        items.push_back(value);
                        Ok(PushOutcome::Stored)
                    }
                }
            }
        }
    }

    /// Next value per policy: newest is cloned and retained, queue is popped.
    pub fn take(&mut self) -> Option<T> {
        match self {
            PortBuffer::Newest(slot) => slot.clone(),
            PortBuffer::Queue(items) => items.pop_front(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PortBuffer::Newest(slot) => usize::from(slot.is_some()),
            PortBuffer::Queue(items) => items.len(),
        }
    }
}
