//! Dense identifiers for components, ports and handlers.
//!
//! Each id is the position of its entry in the owning table, so lookups are
//! plain indexing.

use serde::Serialize;
use std::fmt;

/// Position of a component in the pipeline, in insertion order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct ComponentId(pub u32);

impl ComponentId {
    /// Components a pipeline can hold, bounded by the owner bits of [`PortId`].
    pub const MAX_COMPONENTS: usize = 1 << (32 - PortId::SLOT_BITS);

    /// Id for the component at `index`, if it fits in a [`PortId`].
    pub fn from_index(index: usize) -> Option<Self> {
        (index < Self::MAX_COMPONENTS).then(|| Self(index as u32))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "component#{}", self.0)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A port of a specific component.
///
/// The owner sits in the upper bits and the port's slot in its [`PortTable`]
/// in the lower [`PortId::SLOT_BITS`] bits, so a signal carrying a `PortId`
/// can be routed to its component without any extra lookup.
///
/// [`PortTable`]: crate::pipeline::port::PortTable
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PortId(pub u32);

impl PortId {
    pub const SLOT_BITS: u32 = 12;

    /// Largest number of ports a single component may register.
    pub const MAX_PORTS: usize = 1 << Self::SLOT_BITS;

    pub fn new(component: ComponentId, slot: u16) -> Self {
        debug_assert!((slot as usize) < Self::MAX_PORTS);
        let slot = u32::from(slot) % Self::MAX_PORTS as u32;
        Self(component.0 << Self::SLOT_BITS | slot)
    }

    #[inline]
    pub fn component(self) -> ComponentId {
        ComponentId(self.0 >> Self::SLOT_BITS)
    }

    #[inline]
    pub fn port_index(self) -> u16 {
        (self.0 % Self::MAX_PORTS as u32) as u16
    }
}

impl fmt::Debug for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port#{}.{}", self.component().0, self.port_index())
    }
}

/// Registration order of a handler within its component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HandlerId(pub u32);

impl HandlerId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_id_packs_owner_and_slot() {
        let port = PortId::new(ComponentId(100), 7);
        assert_eq!(port.component(), ComponentId(100));
        assert_eq!(port.port_index(), 7);

        let last = PortId::new(ComponentId((1 << 20) - 1), 4095);
        assert_eq!(last.component().index(), (1 << 20) - 1);
        assert_eq!(last.port_index(), 4095);
    }

    #[test]
    fn test_component_index_bounded_by_port_bits() {
        let last = ComponentId::MAX_COMPONENTS - 1;
        assert_eq!(ComponentId::from_index(last), Some(ComponentId(last as u32)));
        assert_eq!(ComponentId::from_index(ComponentId::MAX_COMPONENTS), None);

        let port = PortId::new(ComponentId::from_index(last).unwrap(), 3);
        assert_eq!(port.component().index(), last);
    }

    #[test]
    fn test_same_slot_on_other_component() {
        let a = PortId::new(ComponentId(0), 1);
        let b = PortId::new(ComponentId(1), 1);
        assert_ne!(a, b);
        assert_eq!(format!("{b:?}"), "port#1.1");
        assert_eq!(ComponentId(4).to_string(), "#4");
    }
}
