//! Events held back while a component is not running.
//!
//! Port values are already retained by their buffers, so only the
//! "new data" notifications need deferring. Replay happens in arrival order
//! when the component enters `Running`.

use crate::pipeline::id::PortId;
use std::collections::VecDeque;
use tracing::{debug, info};

#[derive(Debug, Default)]
pub(crate) struct PausedQueue {
    queue: VecDeque<PortId>,
    coalesced: u64,
}

impl PausedQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Events folded into an already pending one.
    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }

    /// Defer an event for `port`.
    ///
    /// A `Newest` port holds one value no matter how many writes arrive, so a
    /// pending event for it absorbs later ones. Returns `false` if the event
    /// was coalesced.
    pub fn defer(&mut self, port: PortId, newest: bool, component: &str) -> bool {
        if newest && self.queue.contains(&port) {
            self.coalesced += 1;
            debug!("Component '{}': coalesced deferred event for {:?}", component, port);
            return false;
        }
        self.queue.push_back(port);
        debug!(
            "Component '{}': deferring event while not running (queue_size={})",
            component,
            self.queue.len()
        );
        true
    }

    /// Remove every pending event, oldest first.
    pub fn drain(&mut self, component: &str) -> Vec<PortId> {
        if !self.queue.is_empty() {
            info!(
                "Component '{}': replaying {} deferred events",
                component,
                self.queue.len()
            );
        }
        self.queue.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::id::ComponentId;

    fn port(i: u16) -> PortId {
        PortId::new(ComponentId(1), i)
    }

    #[test]
    fn test_queue_events_keep_order() {
        let mut q = PausedQueue::new();
        assert!(q.defer(port(0), false, "c"));
        assert!(q.defer(port(1), false, "c"));
        assert!(q.defer(port(0), false, "c"));
        assert_eq!(q.drain("c"), vec![port(0), port(1), port(0)]);
        assert!(q.is_empty());
    }

    #[test]
    fn test_newest_events_coalesce() {
        let mut q = PausedQueue::new();
        assert!(q.defer(port(2), true, "c"));
        assert!(q.defer(port(3), false, "c"));
        assert!(!q.defer(port(2), true, "c"));
        assert_eq!(q.len(), 2);
        assert_eq!(q.coalesced(), 1);
        assert_eq!(q.drain("c"), vec![port(2), port(3)]);
    }
}
