//! Ports: named, single-slot data conduits owned by a component.
//!
//! A port holds zero or one packet at a time. It never reaches across to the
//! connection that feeds or drains it; connections hold the relationship in
//! the other direction, keeping a component's ports self-contained and
//! independently testable.

use crate::packet::Packet;

/// Direction a port moves data in, relative to the owning component.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Data flows into the component.
    Input,
    /// Data flows out of the component.
    Output,
}

/// A named, single-slot data conduit.
#[derive(Debug, Clone)]
pub struct Port {
    name: String,
    direction: Direction,
    slot: Option<Packet>,
}

impl Port {
    /// Creates an empty port.
    #[must_use]
    pub fn new(name: impl Into<String>, direction: Direction) -> Self {
        Self {
            name: name.into(),
            direction,
            slot: None,
        }
    }

    /// The port's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The port's direction.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Whether the port currently holds a packet.
    #[must_use]
    pub fn has_data(&self) -> bool {
        self.slot.is_some()
    }

    /// Looks at the held packet without consuming it.
    #[must_use]
    pub fn peek(&self) -> Option<&Packet> {
        self.slot.as_ref()
    }

    /// Consumes and returns the held packet, leaving the port empty.
    pub fn read(&mut self) -> Option<Packet> {
        self.slot.take()
    }

    /// Publishes a packet, but only if the port is currently empty.
    ///
    /// Returns `false` (and leaves `packet` unwritten) if the port was
    /// already occupied — this is the handshake-aware form flow-controlled
    /// connections use.
    #[must_use]
    pub fn write(&mut self, packet: Packet) -> bool {
        if self.slot.is_some() {
            return false;
        }
        self.slot = Some(packet);
        true
    }

    /// Publishes a packet unconditionally, overwriting anything already
    /// present.
    pub fn set_data(&mut self, packet: Packet) {
        self.slot = Some(packet);
    }

    /// Clears the port without returning the packet.
    pub fn clear(&mut self) {
        self.slot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_port_is_empty() {
        let p = Port::new("in0", Direction::Input);
        assert!(!p.has_data());
        assert!(p.peek().is_none());
    }

    #[test]
    fn write_fails_on_occupied_port() {
        let mut p = Port::new("in0", Direction::Input);
        assert!(p.write(Packet::Scalar(1)));
        assert!(!p.write(Packet::Scalar(2)));
        assert_eq!(p.peek(), Some(&Packet::Scalar(1)));
    }

    #[test]
    fn set_data_overwrites_unconditionally() {
        let mut p = Port::new("in0", Direction::Input);
        p.set_data(Packet::Scalar(1));
        p.set_data(Packet::Scalar(2));
        assert_eq!(p.peek(), Some(&Packet::Scalar(2)));
    }

    #[test]
    fn read_consumes_and_empties() {
        let mut p = Port::new("in0", Direction::Input);
        p.set_data(Packet::Scalar(5));
        assert_eq!(p.read(), Some(Packet::Scalar(5)));
        assert!(!p.has_data());
        assert_eq!(p.read(), None);
    }
}
