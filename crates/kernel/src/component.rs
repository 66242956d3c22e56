//! The `Component` and `TickingComponent` traits.
//!
//! Per the design notes on connection back-pointers: a port never holds a
//! reference back to the connection that feeds or drains it. Instead, a
//! [`PortSet`] hands out `Rc<RefCell<Port>>` handles, and a connection
//! holds clones of the handles for exactly the ports it binds. The
//! component retains ownership (it built the `PortSet`); the connection
//! merely has shared, interior-mutable access.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::port::Port;

/// A shared, interior-mutable handle to a [`Port`].
pub type PortHandle = Rc<RefCell<Port>>;

/// A named entity with a fixed set of named ports.
///
/// Ports are owned by the component for its entire lifetime; a component
/// never holds a back-reference to whatever connection feeds or drains a
/// given port (see [`crate::connection`]).
pub trait Component {
    /// This component's name, used in trace output and error messages.
    fn name(&self) -> &str;

    /// Looks up a port by name, returning a shared handle a connection can
    /// bind to without the component needing to stay borrowed.
    fn port(&self, name: &str) -> Option<PortHandle>;

    /// Performs any first-cycle setup. Default: no-op.
    fn initialize(&mut self) {}

    /// Clears all internal state and every port. Default: no-op beyond
    /// clearing ports, which callers do directly through the `PortSet`.
    fn reset(&mut self) {}

    /// Whether the component currently participates in simulation. A
    /// disabled component does not self-schedule further ticks, but does
    /// not cancel events already queued.
    fn enabled(&self) -> bool {
        true
    }
}

/// A simple named-port map, usable as the backing storage for a
/// [`Component`] implementation.
#[derive(Debug, Default)]
pub struct PortSet {
    ports: HashMap<String, PortHandle>,
}

impl PortSet {
    /// Creates an empty port set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a port, replacing any existing port of the same name, and
    /// returns its shared handle so the caller doesn't need a separate
    /// `handle` lookup right after inserting.
    pub fn insert(&mut self, port: Port) -> PortHandle {
        let handle = Rc::new(RefCell::new(port));
        self.ports.insert(handle.borrow().name().to_string(), handle.clone());
        handle
    }

    /// Looks up a port's shared handle by name.
    #[must_use]
    pub fn handle(&self, name: &str) -> Option<PortHandle> {
        self.ports.get(name).cloned()
    }

    /// Iterates over every port's shared handle.
    pub fn iter(&self) -> impl Iterator<Item = PortHandle> + '_ {
        self.ports.values().cloned()
    }

    /// Clears every port's held packet.
    pub fn clear_all(&self) {
        for port in self.ports.values() {
            port.borrow_mut().clear();
        }
    }
}

/// A component with a periodic self-scheduled tick.
///
/// Ticking components and connections share the same self-scheduling
/// discipline: `start` schedules the first tick, and each tick reschedules
/// its own successor at `last_time + period`.
pub trait TickingComponent: Component {
    /// Cycles between successive ticks.
    fn period(&self) -> u64;

    /// Number of ticks executed so far.
    fn tick_count(&self) -> u64;

    /// Executes one tick. Called by the scheduled tick event.
    fn tick(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Packet;
    use crate::port::Direction;

    #[test]
    fn port_set_round_trips() {
        let mut ports = PortSet::new();
        ports.insert(Port::new("a", Direction::Input));
        assert!(ports.handle("a").is_some());
        assert!(ports.handle("b").is_none());
    }

    #[test]
    fn clear_all_empties_every_port() {
        let mut ports = PortSet::new();
        ports.insert(Port::new("a", Direction::Input));
        ports.handle("a").unwrap().borrow_mut().set_data(Packet::Scalar(1));
        ports.clear_all();
        assert!(!ports.handle("a").unwrap().borrow().has_data());
    }

    #[test]
    fn handles_share_the_same_underlying_port() {
        let mut ports = PortSet::new();
        ports.insert(Port::new("a", Direction::Input));
        let h1 = ports.handle("a").unwrap();
        let h2 = ports.handle("a").unwrap();
        h1.borrow_mut().set_data(Packet::Scalar(42));
        assert_eq!(h2.borrow().peek(), Some(&Packet::Scalar(42)));
    }
}
