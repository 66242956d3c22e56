//! Structured trace output.
//!
//! The kernel and every component emit [`TraceRecord`]s synchronously to a
//! [`TraceSink`] as they run. This is a separate channel from `tracing`-crate
//! logging (see [`TracingSink`]): it is the domain-level event stream a
//! post-hoc analysis tool consumes, not a diagnostic log. The concrete
//! on-disk format (text, VCD, ...) is left entirely to the sink.

use std::cell::RefCell;
use std::rc::Rc;

use crate::common::time::SimTime;
use crate::event::Priority;

/// A trace sink shared by every component and connection that needs to
/// emit records. An explicit handle passed at construction, rather than a
/// global tracer singleton (see design notes §9).
pub type SharedSink = Rc<RefCell<dyn TraceSink>>;

/// Category of a traced event.
#[derive(Clone, Copy, Debug)]
pub enum TraceCategory {
    /// A component's periodic tick.
    Tick,
    /// An uncategorized scheduled event.
    Generic,
    /// A computation completed.
    Compute,
    /// A register or memory-equivalent read.
    MemRead,
    /// A register or memory-equivalent write.
    MemWrite,
    /// Data moved across a connection.
    Communication,
    /// A component's internal state changed.
    StateChange,
    /// An instruction-level event (dispatch, execute, retire).
    Instruction,
    /// A multiply-accumulate style operation.
    Mac,
    /// A register file read or write port access.
    RegisterAccess,
    /// A queue enqueue or dequeue.
    QueueOp,
    /// A connection propagate.
    Propagate,
    /// An application-defined category.
    Custom(&'static str),
}

/// One structured event emitted by a component or connection.
#[derive(Clone, Debug)]
pub struct TraceRecord {
    /// Simulation time the event occurred at.
    pub timestamp: SimTime,
    /// Category of the event.
    pub category: TraceCategory,
    /// Name of the component or connection that emitted it.
    pub component: String,
    /// Short event name (e.g. `"dispatch"`, `"retire"`).
    pub event: String,
    /// Free-form human-readable detail.
    pub details: String,
    /// Priority tier the originating event ran under.
    pub priority: Priority,
}

/// Receives structured trace records from kernel components.
///
/// Implementations decide what to do with a record: discard it
/// ([`NullSink`]), buffer it for assertions ([`VecSink`]), or re-emit it as a
/// `tracing` event ([`TracingSink`]).
pub trait TraceSink {
    /// Records one event.
    fn record(&mut self, record: TraceRecord);
}

/// Discards every record. The default sink; costs nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TraceSink for NullSink {
    fn record(&mut self, _record: TraceRecord) {}
}

/// Buffers every record in memory, in arrival order.
///
/// This is what scenario tests assert against: build a [`VecSink`], run the
/// simulation, then inspect `sink.records()`.
#[derive(Debug, Default, Clone)]
pub struct VecSink {
    records: Vec<TraceRecord>,
}

impl VecSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every record recorded so far, in arrival order.
    #[must_use]
    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    /// Returns only the records matching `category`.
    #[must_use]
    pub fn records_of(&self, category: TraceCategory) -> Vec<&TraceRecord> {
        self.records.iter().filter(|r| r.category == category).collect()
    }
}

impl TraceSink for VecSink {
    fn record(&mut self, record: TraceRecord) {
        self.records.push(record);
    }
}

impl PartialEq for TraceCategory {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Custom(a), Self::Custom(b)) => a == b,
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b),
        }
    }
}
impl Eq for TraceCategory {}

/// Bridges the structured trace stream into `tracing`-crate events at
/// [`tracing::Level::TRACE`], for hosts that want one unified log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn record(&mut self, record: TraceRecord) {
        tracing::trace!(
            timestamp = record.timestamp.0,
            category = ?record.category,
            component = %record.component,
            event = %record.event,
            details = %record.details,
            "trace record",
        );
    }
}
