//! The discrete-event scheduler.
//!
//! Everything in this crate makes progress by scheduling an [`Event`] and
//! letting the [`EventKernel`] dispatch it at the right time. The kernel
//! itself is deliberately dumb: it knows nothing about ports, connections,
//! or pipelines. It only knows how to order events by `(time, priority,
//! sequence)` and run them.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::common::error::{SimError, SimResult};
use crate::common::time::SimTime;

/// Priority tier an event is dispatched under.
///
/// Within the same [`SimTime`], higher-priority events run first. This is
/// what gives the kernel its two ordering guarantees: connection propagate
/// always precedes component tick, and a latency-delayed delivery scheduled
/// for cycle T lands before anything else reads its destination port that
/// cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Latency-delayed port delivery. Lowest tier, but still ordered ahead
    /// of the next cycle's connection/component events because it is
    /// conventionally scheduled one cycle early (at `T - 1`).
    Delivery,
    /// Component tick events.
    Component,
    /// Connection propagate events. Highest tier: all inter-port data
    /// movement for a cycle completes before any component observes its
    /// inputs that cycle.
    Connection,
}

/// Category tag carried by an event, independent of its priority tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// A component's periodic tick.
    Tick,
    /// A connection's periodic propagate.
    Propagate,
    /// A component-internal compute step (e.g. functional-unit completion).
    Compute,
    /// A latency-delayed port delivery.
    Delivery,
    /// Anything else a component wants to schedule.
    Custom,
}

/// The action a dispatched event performs.
///
/// Receives the kernel itself so an action can reschedule its own successor
/// (the self-ticking discipline every component and connection uses)
/// without needing a shared, runtime-borrow-checked handle back to it. Not
/// `Send`: the kernel is strictly single-threaded (see the concurrency
/// model), so there is no reason to pay for thread-safety here.
pub type Action = Box<dyn FnOnce(&mut EventKernel)>;

struct QueuedEvent {
    time: SimTime,
    priority: Priority,
    sequence: u64,
    kind: EventKind,
    label: String,
    cancelled: std::rc::Rc<std::cell::Cell<bool>>,
    action: Action,
}

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.priority == other.priority && self.sequence == other.sequence
    }
}
impl Eq for QueuedEvent {}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedEvent {
    // `BinaryHeap` is a max-heap, and we want the earliest time / highest
    // priority / earliest sequence number to come out first, so the natural
    // field order is reversed against dispatch order, then the whole
    // comparison is flipped.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .cmp(&self.time)
            .then_with(|| self.priority.cmp(&other.priority))
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// A handle to a scheduled event, usable to cancel it before it fires.
///
/// Cancellation is an O(1) flag flip, not a queue removal: the event stays
/// in the heap and is simply skipped when popped.
#[derive(Clone, Debug)]
pub struct EventHandle {
    cancelled: std::rc::Rc<std::cell::Cell<bool>>,
}

impl EventHandle {
    /// Cancels the event. A no-op if it has already fired or was already
    /// cancelled.
    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    /// Returns whether this event has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

/// The discrete-event scheduler.
///
/// Owns the single thread of control for a simulation run: no component may
/// block, and all progress is driven by popping events from this queue in
/// `(time, priority, sequence)` order.
#[derive(Default)]
pub struct EventKernel {
    heap: BinaryHeap<QueuedEvent>,
    current_time: SimTime,
    next_sequence: u64,
    #[cfg(feature = "commit-log")]
    commit_log: Vec<String>,
}

impl EventKernel {
    /// Creates an empty kernel at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the time of the most recently dispatched event, or zero if
    /// none has run yet.
    #[must_use]
    pub fn current_time(&self) -> SimTime {
        self.current_time
    }

    /// Schedules an event to fire at `time` under `priority`.
    ///
    /// Rejects (without panicking) a `time` strictly earlier than
    /// [`Self::current_time`]; the caller decides whether that is fatal.
    pub fn schedule_at(
        &mut self,
        time: SimTime,
        priority: Priority,
        kind: EventKind,
        label: impl Into<String>,
        action: impl FnOnce(&mut EventKernel) + 'static,
    ) -> SimResult<EventHandle> {
        if time < self.current_time {
            return Err(SimError::Temporal {
                requested: time.0,
                current: self.current_time.0,
            });
        }
        let cancelled = std::rc::Rc::new(std::cell::Cell::new(false));
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(QueuedEvent {
            time,
            priority,
            sequence,
            kind,
            label: label.into(),
            cancelled: cancelled.clone(),
            action: Box::new(action),
        });
        Ok(EventHandle { cancelled })
    }

    /// Schedules an already-constructed [`Event`] description.
    pub fn schedule(&mut self, event: Event) -> SimResult<EventHandle> {
        self.schedule_at(event.time, event.priority, event.kind, event.label, event.action)
    }

    /// Runs events until the queue is empty or the next event's fire time
    /// exceeds `max_time`.
    pub fn run(&mut self, max_time: SimTime) {
        while let Some(next_time) = self.heap.peek().map(|e| e.time) {
            if next_time > max_time {
                break;
            }
            self.dispatch_next();
        }
    }

    /// Executes up to `n` non-cancelled events.
    pub fn run_for(&mut self, n: usize) {
        let mut dispatched = 0;
        while dispatched < n && !self.heap.is_empty() {
            if self.dispatch_next() {
                dispatched += 1;
            }
        }
    }

    /// Clears all scheduled events and resets the clock to zero.
    pub fn reset(&mut self) {
        self.heap.clear();
        self.current_time = SimTime::ZERO;
        self.next_sequence = 0;
        #[cfg(feature = "commit-log")]
        self.commit_log.clear();
    }

    /// Returns true if no events remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Pops and runs the next event, returning whether it actually executed
    /// (as opposed to being skipped for cancellation).
    fn dispatch_next(&mut self) -> bool {
        let Some(queued) = self.heap.pop() else {
            return false;
        };
        self.current_time = queued.time;
        if queued.cancelled.get() {
            return false;
        }
        #[cfg(feature = "commit-log")]
        self.commit_log.push(queued.label.clone());
        let _ = queued.kind;
        let _ = queued.label;
        (queued.action)(self);
        true
    }

    /// Returns the labels of every dispatched (non-cancelled) event, in
    /// dispatch order. Only populated when the `commit-log` feature is
    /// enabled.
    #[cfg(feature = "commit-log")]
    #[must_use]
    pub fn commit_log(&self) -> &[String] {
        &self.commit_log
    }
}

/// A fully-described event, ready to hand to [`EventKernel::schedule`].
pub struct Event {
    time: SimTime,
    priority: Priority,
    kind: EventKind,
    label: String,
    action: Action,
}

impl Event {
    /// Builds a new event.
    pub fn new(
        time: SimTime,
        priority: Priority,
        kind: EventKind,
        label: impl Into<String>,
        action: impl FnOnce(&mut EventKernel) + 'static,
    ) -> Self {
        Self {
            time,
            priority,
            kind,
            label: label.into(),
            action: Box::new(action),
        }
    }
}

/// Schedules `target`'s `tick` to run every `period` cycles starting at
/// `start`, rescheduling itself after every firing.
///
/// This is the shared self-scheduling discipline behind every
/// [`crate::component::TickingComponent`] and connection: call this once at
/// construction instead of re-implementing the reschedule-on-fire loop in
/// every component.
pub fn schedule_periodic<T: 'static>(
    kernel: &mut EventKernel,
    start: SimTime,
    period: u64,
    priority: Priority,
    kind: EventKind,
    label: &'static str,
    target: std::rc::Rc<std::cell::RefCell<T>>,
    mut tick: impl FnMut(&mut T) + Clone + 'static,
) -> SimResult<EventHandle> {
    fn fire<T: 'static>(
        kernel: &mut EventKernel,
        time: SimTime,
        period: u64,
        priority: Priority,
        kind: EventKind,
        label: &'static str,
        target: std::rc::Rc<std::cell::RefCell<T>>,
        mut tick: impl FnMut(&mut T) + Clone + 'static,
    ) {
        tick(&mut target.borrow_mut());
        let next = time.advance(period);
        let t2 = target;
        let tick2 = tick.clone();
        let _ = kernel.schedule_at(next, priority, kind, label, move |k| {
            fire(k, next, period, priority, kind, label, t2, tick2);
        });
    }

    kernel.schedule_at(start, priority, kind, label, move |k| {
        fire(k, start, period, priority, kind, label, target, tick);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn dispatches_in_time_order() {
        let mut kernel = EventKernel::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let o = order.clone();
        kernel
            .schedule_at(SimTime(5), Priority::Component, EventKind::Tick, "late", move |_k: &mut EventKernel| {
                o.borrow_mut().push(5);
            })
            .unwrap();
        let o = order.clone();
        kernel
            .schedule_at(SimTime(1), Priority::Component, EventKind::Tick, "early", move |_k: &mut EventKernel| {
                o.borrow_mut().push(1);
            })
            .unwrap();

        kernel.run(SimTime(10));
        assert_eq!(*order.borrow(), vec![1, 5]);
    }

    #[test]
    fn connection_priority_precedes_component_at_same_time() {
        let mut kernel = EventKernel::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let o = order.clone();
        kernel
            .schedule_at(SimTime(0), Priority::Component, EventKind::Tick, "tick", move |_k: &mut EventKernel| {
                o.borrow_mut().push("component");
            })
            .unwrap();
        let o = order.clone();
        kernel
            .schedule_at(
                SimTime(0),
                Priority::Connection,
                EventKind::Propagate,
                "propagate",
                move |_k: &mut EventKernel| {
                    o.borrow_mut().push("connection");
                },
            )
            .unwrap();

        kernel.run(SimTime(0));
        assert_eq!(*order.borrow(), vec!["connection", "component"]);
    }

    #[test]
    fn ties_break_by_insertion_order() {
        let mut kernel = EventKernel::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for i in 0..5 {
            let o = order.clone();
            kernel
                .schedule_at(SimTime(0), Priority::Component, EventKind::Tick, "t", move |_k: &mut EventKernel| {
                    o.borrow_mut().push(i);
                })
                .unwrap();
        }

        kernel.run(SimTime(0));
        assert_eq!(*order.borrow(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn cancellation_skips_without_removing() {
        let mut kernel = EventKernel::new();
        let ran = Rc::new(RefCell::new(false));
        let r = ran.clone();
        let handle = kernel
            .schedule_at(SimTime(0), Priority::Component, EventKind::Tick, "t", move |_k: &mut EventKernel| {
                *r.borrow_mut() = true;
            })
            .unwrap();
        handle.cancel();
        kernel.run(SimTime(0));
        assert!(!*ran.borrow());
    }

    #[test]
    fn rejects_scheduling_in_the_past() {
        let mut kernel = EventKernel::new();
        kernel
            .schedule_at(SimTime(5), Priority::Component, EventKind::Tick, "t", |_k: &mut EventKernel| {})
            .unwrap();
        kernel.run(SimTime(5));
        assert_eq!(kernel.current_time(), SimTime(5));

        let err = kernel
            .schedule_at(SimTime(4), Priority::Component, EventKind::Tick, "t", |_k: &mut EventKernel| {})
            .unwrap_err();
        assert_eq!(
            err,
            SimError::Temporal {
                requested: 4,
                current: 5
            }
        );
    }

    #[test]
    fn run_for_counts_only_executed_events() {
        let mut kernel = EventKernel::new();
        for _ in 0..3 {
            kernel
                .schedule_at(SimTime(0), Priority::Component, EventKind::Tick, "t", |_k: &mut EventKernel| {})
                .unwrap();
        }
        kernel.run_for(2);
        assert!(!kernel.is_empty());
        kernel.run_for(1);
        assert!(kernel.is_empty());
    }

    #[test]
    fn reset_clears_queue_and_time() {
        let mut kernel = EventKernel::new();
        kernel
            .schedule_at(SimTime(3), Priority::Component, EventKind::Tick, "t", |_k: &mut EventKernel| {})
            .unwrap();
        kernel.run(SimTime(3));
        kernel.reset();
        assert_eq!(kernel.current_time(), SimTime::ZERO);
        assert!(kernel.is_empty());
    }
}
