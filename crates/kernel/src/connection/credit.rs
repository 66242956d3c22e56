//! Credit-based connection (spec.md §4.3.3).

use std::collections::VecDeque;

use crate::component::PortHandle;
use crate::connection::{deliver, Connection};
use crate::event::EventKernel;
use crate::packet::Packet;
use crate::trace::{SharedSink, TraceCategory, TraceRecord};

/// Extends the ready/valid discipline with an additional credit port bound
/// from the destination side: an enqueue requires both FIFO space *and* a
/// positive credit balance, and decrements the balance on success.
pub struct CreditConnection {
    name: String,
    source: PortHandle,
    destination: PortHandle,
    credit_port: PortHandle,
    fifo: VecDeque<Packet>,
    capacity: usize,
    latency: u64,
    period: u64,
    credits: i64,
    sink: SharedSink,
    /// Successful dequeue-and-deliver events.
    pub transfers: u64,
    /// Stalls because the destination was occupied.
    pub stalls_not_ready: u64,
    /// Stalls because the FIFO was full.
    pub stalls_back_pressure: u64,
    /// Stalls because the credit balance was non-positive.
    pub stalls_no_credit: u64,
}

impl CreditConnection {
    /// Creates a new credit connection. `credit_port` is read each
    /// propagate and, when it holds data, overwrites the internal credit
    /// counter.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        source: PortHandle,
        destination: PortHandle,
        credit_port: PortHandle,
        capacity: usize,
        latency: u64,
        period: u64,
        sink: SharedSink,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            destination,
            credit_port,
            fifo: VecDeque::with_capacity(capacity),
            capacity,
            latency,
            period,
            credits: 0,
            sink,
            transfers: 0,
            stalls_not_ready: 0,
            stalls_back_pressure: 0,
            stalls_no_credit: 0,
        }
    }

    /// Current credit balance.
    #[must_use]
    pub fn credits(&self) -> i64 {
        self.credits
    }

    /// Current FIFO occupancy.
    #[must_use]
    pub fn occupancy(&self) -> usize {
        self.fifo.len()
    }
}

impl Connection for CreditConnection {
    fn name(&self) -> &str {
        &self.name
    }

    fn period(&self) -> u64 {
        self.period
    }

    fn propagate(&mut self, kernel: &mut EventKernel) {
        let now = kernel.current_time();

        if let Some(packet) = self.credit_port.borrow_mut().read() {
            if let Some(value) = packet.as_scalar() {
                self.credits = value as i64;
            }
        }

        let dest_free = !self.destination.borrow().has_data();
        if !self.fifo.is_empty() {
            if dest_free {
                if let Some(packet) = self.fifo.pop_front() {
                    deliver(kernel, now, self.latency, self.destination.clone(), packet);
                    self.transfers += 1;
                }
            } else {
                self.stalls_not_ready += 1;
            }
        }

        if self.source.borrow().has_data() {
            if self.fifo.len() >= self.capacity {
                self.stalls_back_pressure += 1;
            } else if self.credits <= 0 {
                self.stalls_no_credit += 1;
                self.sink.borrow_mut().record(TraceRecord {
                    timestamp: now,
                    category: TraceCategory::QueueOp,
                    component: self.name.clone(),
                    event: "stall".to_string(),
                    details: "no credit".to_string(),
                    priority: crate::event::Priority::Connection,
                });
            } else if let Some(packet) = self.source.borrow_mut().read() {
                self.fifo.push_back(packet);
                self.credits -= 1;
            }
        }
    }
}
