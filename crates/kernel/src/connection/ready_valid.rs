//! Ready/valid connection with a buffered FIFO (spec.md §4.3.2).

use std::collections::VecDeque;

use crate::component::PortHandle;
use crate::connection::{deliver, Connection};
use crate::event::EventKernel;
use crate::trace::{SharedSink, TraceCategory, TraceRecord};

/// A single source, single destination connection with an internal FIFO.
/// "Ready" is implicit in the destination port's occupancy; "valid" is
/// implicit in FIFO non-emptiness.
pub struct ReadyValidConnection {
    name: String,
    source: PortHandle,
    destination: PortHandle,
    fifo: VecDeque<crate::packet::Packet>,
    capacity: usize,
    latency: u64,
    period: u64,
    sink: SharedSink,
    /// Successful dequeue-and-deliver events.
    pub transfers: u64,
    /// Cycles the FIFO held data but the destination was occupied.
    pub stalls: u64,
}

impl ReadyValidConnection {
    /// Creates a new ready/valid connection with the given FIFO `capacity`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        source: PortHandle,
        destination: PortHandle,
        capacity: usize,
        latency: u64,
        period: u64,
        sink: SharedSink,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            destination,
            fifo: VecDeque::with_capacity(capacity),
            capacity,
            latency,
            period,
            sink,
            transfers: 0,
            stalls: 0,
        }
    }

    /// Current FIFO occupancy.
    #[must_use]
    pub fn occupancy(&self) -> usize {
        self.fifo.len()
    }
}

impl Connection for ReadyValidConnection {
    fn name(&self) -> &str {
        &self.name
    }

    fn period(&self) -> u64 {
        self.period
    }

    fn propagate(&mut self, kernel: &mut EventKernel) {
        let now = kernel.current_time();

        // 1 & 2: deliver if ready+valid, else count a stall.
        let dest_free = !self.destination.borrow().has_data();
        if !self.fifo.is_empty() {
            if dest_free {
                if let Some(packet) = self.fifo.pop_front() {
                    deliver(kernel, now, self.latency, self.destination.clone(), packet);
                    self.transfers += 1;
                }
            } else {
                self.stalls += 1;
                self.sink.borrow_mut().record(TraceRecord {
                    timestamp: now,
                    category: TraceCategory::QueueOp,
                    component: self.name.clone(),
                    event: "stall".to_string(),
                    details: "destination occupied".to_string(),
                    priority: crate::event::Priority::Connection,
                });
            }
        }

        // 3 & 4: enqueue if source valid and FIFO has room; otherwise the
        // source packet is left in place (back-pressure) for next cycle.
        let has_room = self.fifo.len() < self.capacity;
        if has_room && self.source.borrow().has_data() {
            if let Some(packet) = self.source.borrow_mut().read() {
                self.fifo.push_back(packet);
            }
        }
    }
}
