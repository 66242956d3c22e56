//! The N-stage pipeline abstraction (spec.md §4.4).
//!
//! A pipeline is a ticking component: each stage holds at most one packet,
//! paired with a remaining-latency counter, and packets advance from stage
//! `k` to stage `k+1` only once they have resided in `k` for their full
//! latency and the downstream slot is free. Advancement is evaluated
//! backward (last stage first) so a single tick never lets a packet skip
//! more than one stage.

use std::cell::RefCell;
use std::rc::Rc;

use crate::common::error::SimResult;
use crate::common::time::SimTime;
use crate::component::{Component, PortHandle, TickingComponent};
use crate::event::{schedule_periodic, EventHandle, EventKernel, EventKind, Priority};
use crate::packet::Packet;
use crate::trace::{SharedSink, TraceCategory, TraceRecord};

/// A transform/stall pair, or a pluggable stateful object, occupying one
/// pipeline stage.
///
/// The function form is the common case: a pure `Packet -> Option<Packet>`
/// transform plus a stall predicate over the currently-resident packet. The
/// object form lets a stage own state or sub-queues and emit its own trace
/// records, for stages whose behavior is more than a pure transform.
pub enum StageBehavior {
    /// A stateless transform plus stall predicate.
    Function {
        /// Applied to the packet as it moves out of this stage.
        transform: Box<dyn FnMut(Packet) -> Option<Packet>>,
        /// Evaluated against the currently-resident packet; `true` holds it
        /// in place for another cycle regardless of its latency counter.
        stall: Box<dyn Fn(Option<&Packet>) -> bool>,
    },
    /// A stateful object standing in for the transform/stall pair.
    Object(Box<dyn StageObject>),
}

/// A pluggable stage occupant with its own internal state.
///
/// Used two ways, depending on stage index: at stage 0, `process` is called
/// with `None` once per cycle the stage is empty, standing in for the
/// pipeline's input port (spec.md §4.4 point 3), and its result becomes
/// stage 0's occupant directly, with no further call on departure. At any
/// other stage index, `process` instead replaces a raw transform function
/// and is called once, on departure, with the upstream packet.
pub trait StageObject {
    /// Name used in trace output.
    fn name(&self) -> &str;

    /// Produces a packet from the packet handed down from the upstream
    /// stage (`Some`, for stage index > 0) or sources one directly (`None`,
    /// stage 0 only). Returning `None` drops the packet (a stall or a
    /// squash, the object's choice).
    fn process(&mut self, input: Option<Packet>) -> Option<Packet>;

    /// Whether this stage should hold its resident packet in place this
    /// cycle, independent of its latency counter. Default: never stalls.
    fn stalled(&self, _resident: Option<&Packet>) -> bool {
        false
    }
}

/// One pipeline stage: its behavior, configured latency, and transient
/// occupancy state.
pub struct Stage {
    name: String,
    latency: u64,
    behavior: StageBehavior,
    occupant: Option<Packet>,
    remaining: u64,
}

impl Stage {
    /// Builds a function-form stage.
    #[must_use]
    pub fn new_function(
        name: impl Into<String>,
        latency: u64,
        transform: impl FnMut(Packet) -> Option<Packet> + 'static,
        stall: impl Fn(Option<&Packet>) -> bool + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            latency: latency.max(1),
            behavior: StageBehavior::Function {
                transform: Box::new(transform),
                stall: Box::new(stall),
            },
            occupant: None,
            remaining: 0,
        }
    }

    /// Builds an object-form stage.
    #[must_use]
    pub fn new_object(name: impl Into<String>, latency: u64, object: Box<dyn StageObject>) -> Self {
        Self {
            name: name.into(),
            latency: latency.max(1),
            behavior: StageBehavior::Object(object),
            occupant: None,
            remaining: 0,
        }
    }

    /// The packet currently resident in this stage, if any.
    #[must_use]
    pub fn occupant(&self) -> Option<&Packet> {
        self.occupant.as_ref()
    }

    /// Remaining latency cycles before this stage's occupant is eligible to
    /// advance. Zero when the stage is empty.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    fn is_stalled(&self) -> bool {
        match &self.behavior {
            StageBehavior::Function { stall, .. } => stall(self.occupant.as_ref()),
            StageBehavior::Object(obj) => obj.stalled(self.occupant.as_ref()),
        }
    }
}

/// A ticking, N-stage pipeline with per-stage latency and stall predicates.
pub struct Pipeline {
    name: String,
    stages: Vec<Stage>,
    input: PortHandle,
    output: PortHandle,
    period: u64,
    tick_count: u64,
    sink: SharedSink,
}

impl Pipeline {
    /// Builds a new pipeline. `stages` must be non-empty; `input` feeds
    /// stage 0 (ignored for object-form stage 0, which sources itself) and
    /// `output` receives whatever the final stage produces.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        stages: Vec<Stage>,
        input: PortHandle,
        output: PortHandle,
        period: u64,
        sink: SharedSink,
    ) -> Self {
        Self {
            name: name.into(),
            stages,
            input,
            output,
            period,
            tick_count: 0,
            sink,
        }
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the pipeline has no stages. Always `false` for a
    /// well-constructed pipeline; present so clippy's `len_without_is_empty`
    /// lint is satisfied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Borrows stage `idx`, for inspection in tests and trace consumers.
    #[must_use]
    pub fn stage(&self, idx: usize) -> Option<&Stage> {
        self.stages.get(idx)
    }
}

impl Component for Pipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn port(&self, name: &str) -> Option<PortHandle> {
        match name {
            "input" => Some(self.input.clone()),
            "output" => Some(self.output.clone()),
            _ => None,
        }
    }

    fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.occupant = None;
            stage.remaining = 0;
        }
        self.input.borrow_mut().clear();
        self.output.borrow_mut().clear();
    }
}

impl TickingComponent for Pipeline {
    fn period(&self) -> u64 {
        self.period
    }

    fn tick_count(&self) -> u64 {
        self.tick_count
    }

    fn tick(&mut self) {
        self.tick_count += 1;
        let n = self.stages.len();
        let mut arrived_this_tick = vec![false; n];

        // Advance eligible occupants, last stage to first, so no packet
        // skips more than one stage in a single tick.
        for k in (0..n).rev() {
            let downstream_free = if k + 1 == n {
                !self.output.borrow().has_data()
            } else {
                self.stages[k + 1].occupant.is_none()
            };
            if !downstream_free || self.stages[k].occupant.is_none() {
                continue;
            }
            if self.stages[k].is_stalled() || self.stages[k].remaining > 1 {
                continue;
            }

            let Some(packet) = self.stages[k].occupant.take() else {
                continue;
            };
            let produced = match &mut self.stages[k].behavior {
                StageBehavior::Function { transform, .. } => transform(packet),
                // Stage 0's object already produced its final content at
                // refill time (`process(None)`, below) — it stands in for
                // the input port, not for a mid-pipeline transform, so its
                // departure is a plain pass-through. An object at any other
                // index is "a raw function" replacement and is invoked here.
                StageBehavior::Object(_) if k == 0 => Some(packet),
                StageBehavior::Object(obj) => obj.process(Some(packet)),
            };
            self.sink.borrow_mut().record(TraceRecord {
                timestamp: SimTime(self.tick_count),
                category: TraceCategory::StateChange,
                component: self.name.clone(),
                event: "advance".to_string(),
                details: format!("stage {} ({})", k, self.stages[k].name),
                priority: Priority::Component,
            });

            if k + 1 == n {
                if let Some(p) = produced {
                    self.output.borrow_mut().set_data(p);
                }
            } else if let Some(p) = produced {
                self.stages[k + 1].occupant = Some(p);
                self.stages[k + 1].remaining = self.stages[k + 1].latency;
                arrived_this_tick[k + 1] = true;
            }
        }

        // Stages that didn't just receive a fresh occupant age by one
        // cycle, down to a floor of 1 (the advance-ready state).
        for (k, stage) in self.stages.iter_mut().enumerate() {
            if arrived_this_tick[k] {
                continue;
            }
            if stage.occupant.is_some() && stage.remaining > 1 {
                stage.remaining -= 1;
            }
        }

        // Refill stage 0 from the input port, or from its pluggable object.
        if self.stages[0].occupant.is_none() {
            let incoming = match &mut self.stages[0].behavior {
                StageBehavior::Object(obj) => obj.process(None),
                StageBehavior::Function { .. } => self.input.borrow_mut().read(),
            };
            if let Some(p) = incoming {
                self.stages[0].remaining = self.stages[0].latency;
                self.stages[0].occupant = Some(p);
            }
        }
    }
}

/// Schedules `pipeline`'s first tick at `start_time`, rescheduling its own
/// successor at `last_time + period` thereafter.
pub fn start(pipeline: Rc<RefCell<Pipeline>>, kernel: &mut EventKernel, start_time: SimTime) -> SimResult<EventHandle> {
    let period = pipeline.borrow().period();
    schedule_periodic(
        kernel,
        start_time,
        period,
        Priority::Component,
        EventKind::Tick,
        "pipeline-tick",
        pipeline,
        |p: &mut Pipeline| p.tick(),
    )
}
