//! Ticking broadcast connection (spec.md §4.3.1).

use crate::component::PortHandle;
use crate::connection::{deliver, Connection};
use crate::event::EventKernel;
use crate::trace::{SharedSink, TraceCategory, TraceRecord};

/// Broadcasts the first source port with data to every destination port
/// each propagate; additional source packets produced the same cycle are
/// read (draining them) but discarded, per the documented tie-break policy
/// (spec.md §9 open question 1 — this crate keeps "first source wins"
/// rather than round-robining or merging).
pub struct BroadcastConnection {
    name: String,
    sources: Vec<PortHandle>,
    destinations: Vec<PortHandle>,
    latency: u64,
    period: u64,
    sink: SharedSink,
    /// Number of cycles a packet was actually broadcast.
    pub delivered: u64,
    /// Number of source packets discarded because another source already
    /// won the broadcast slot that cycle.
    pub discarded: u64,
}

impl BroadcastConnection {
    /// Creates a new broadcast connection.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        sources: Vec<PortHandle>,
        destinations: Vec<PortHandle>,
        latency: u64,
        period: u64,
        sink: SharedSink,
    ) -> Self {
        Self {
            name: name.into(),
            sources,
            destinations,
            latency,
            period,
            sink,
            delivered: 0,
            discarded: 0,
        }
    }
}

impl Connection for BroadcastConnection {
    fn name(&self) -> &str {
        &self.name
    }

    fn period(&self) -> u64 {
        self.period
    }

    fn propagate(&mut self, kernel: &mut EventKernel) {
        let now = kernel.current_time();
        let mut chosen = None;
        for src in &self.sources {
            let Some(packet) = src.borrow_mut().read() else {
                continue;
            };
            if chosen.is_none() {
                chosen = Some(packet);
            } else {
                self.discarded += 1;
            }
        }

        let Some(packet) = chosen else {
            return;
        };
        for dest in &self.destinations {
            deliver(kernel, now, self.latency, dest.clone(), packet.deep_clone());
        }
        self.delivered += 1;
        self.sink.borrow_mut().record(TraceRecord {
            timestamp: now,
            category: TraceCategory::Propagate,
            component: self.name.clone(),
            event: "broadcast".to_string(),
            details: format!("to {} destination(s)", self.destinations.len()),
            priority: crate::event::Priority::Connection,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::PortSet;
    use crate::event::{EventKernel, Priority};
    use crate::packet::Packet;
    use crate::port::{Direction, Port};
    use crate::trace::{NullSink, VecSink};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn port_handle(name: &str, dir: Direction) -> PortHandle {
        let mut set = PortSet::new();
        set.insert(Port::new(name, dir));
        set.handle(name).unwrap()
    }

    #[test]
    fn broadcasts_to_every_destination() {
        let src = port_handle("src", Direction::Output);
        let d1 = port_handle("d1", Direction::Input);
        let d2 = port_handle("d2", Direction::Input);
        src.borrow_mut().set_data(Packet::Scalar(7));

        let sink: SharedSink = Rc::new(RefCell::new(NullSink));
        let conn = Rc::new(RefCell::new(BroadcastConnection::new(
            "bc",
            vec![src],
            vec![d1.clone(), d2.clone()],
            0,
            1,
            sink,
        )));

        let mut kernel = EventKernel::new();
        crate::connection::start(conn.clone(), &mut kernel, crate::common::SimTime(0)).unwrap();
        kernel.run_for(1);

        assert_eq!(d1.borrow().peek(), Some(&Packet::Scalar(7)));
        assert_eq!(d2.borrow().peek(), Some(&Packet::Scalar(7)));
        assert_eq!(conn.borrow().delivered, 1);
    }

    #[test]
    fn first_source_wins_others_discarded() {
        let s1 = port_handle("s1", Direction::Output);
        let s2 = port_handle("s2", Direction::Output);
        let dest = port_handle("dest", Direction::Input);
        s1.borrow_mut().set_data(Packet::Scalar(1));
        s2.borrow_mut().set_data(Packet::Scalar(2));

        let sink: SharedSink = Rc::new(RefCell::new(VecSink::new()));
        let conn = Rc::new(RefCell::new(BroadcastConnection::new(
            "bc",
            vec![s1, s2],
            vec![dest.clone()],
            0,
            1,
            sink,
        )));

        let mut kernel = EventKernel::new();
        crate::connection::start(conn.clone(), &mut kernel, crate::common::SimTime(0)).unwrap();
        kernel.run_for(1);

        assert_eq!(dest.borrow().peek(), Some(&Packet::Scalar(1)));
        assert_eq!(conn.borrow().discarded, 1);
    }

    #[test]
    fn latency_one_still_delivers_via_delivery_tier_same_cycle() {
        let src = port_handle("src", Direction::Output);
        let dest = port_handle("dest", Direction::Input);
        src.borrow_mut().set_data(Packet::Scalar(9));

        let sink: SharedSink = Rc::new(RefCell::new(NullSink));
        let conn = Rc::new(RefCell::new(BroadcastConnection::new(
            "bc",
            vec![src],
            vec![dest.clone()],
            1,
            1,
            sink,
        )));

        let mut kernel = EventKernel::new();
        crate::connection::start(conn, &mut kernel, crate::common::SimTime(0)).unwrap();
        kernel.run(crate::common::SimTime(0));
        let _ = Priority::Connection;
        assert!(dest.borrow().has_data());
    }
}
