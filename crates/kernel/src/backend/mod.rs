//! The out-of-order execution backend: dispatch, execute, and retire
//! (spec.md §4.6).
//!
//! Generic [`crate::pipeline::Pipeline`] assumes exactly one in-flight
//! packet per stage with a simple latency countdown. The backend needs more
//! than that at every stage: an instruction queue plus decode expansion at
//! dispatch, many concurrently in-flight micro-ops with independent
//! latencies at execute, and ROB-ordered out-of-order completion with
//! in-order retirement. So `Backend` is its own [`TickingComponent`]
//! sequencing three internal phases each cycle, rather than a
//! `Pipeline` of `StageObject`s.

pub mod dispatch;
pub mod execute;
pub mod retire;
pub mod rob;

use crate::component::{Component, PortSet, TickingComponent};
use crate::event::{EventHandle, EventKernel, Priority};
use crate::packet::Packet;
use crate::trace::{SharedSink, TraceCategory, TraceRecord};
use crate::common::{SimResult, SimTime};

pub use dispatch::{DispatchStage, Dispatched, Instruction};
pub use execute::ExecuteStage;
pub use retire::RetireStage;
pub use rob::{DestKind, Rob, RobEntry};

/// Assembles the dispatch, execute, and retire stages around a shared
/// reorder buffer, and runs them in sequence once per cycle.
pub struct Backend {
    name: String,
    dispatch: DispatchStage,
    execute: ExecuteStage,
    retire: RetireStage,
    rob: Rob,
    ports: PortSet,
    period: u64,
    tick_count: u64,
    sink: SharedSink,
}

impl Backend {
    /// Builds a backend. `rob_capacity` bounds in-flight instructions;
    /// `retire_width` sizes both the retire stage's per-cycle drain count
    /// and its `retire{i}_addr`/`retire{i}_data`/`retire{i}_mask`
    /// write-source port triples, meant to be wired to a destination
    /// register file through a
    /// [`crate::connection::regfile_wire::RegFileWritebackConnection`].
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        dispatch: DispatchStage,
        execute: ExecuteStage,
        retire_width: usize,
        rob_capacity: usize,
        period: u64,
        sink: SharedSink,
    ) -> Self {
        let mut ports = PortSet::new();
        ports.insert(crate::port::Port::new("trap", crate::port::Direction::Output));

        Self {
            name: name.into(),
            dispatch,
            execute,
            retire: RetireStage::new(retire_width),
            rob: Rob::new(rob_capacity),
            ports,
            period,
            tick_count: 0,
            sink,
        }
    }

    /// Enqueues an instruction for decode, if the instruction queue has
    /// room.
    #[must_use]
    pub fn submit(&mut self, instr: Instruction) -> bool {
        self.dispatch.enqueue(instr)
    }

    /// Micro-ops successfully dispatched so far.
    #[must_use]
    pub fn dispatched(&self) -> u64 {
        self.dispatch.dispatched
    }

    /// Cycles where a hazard blocked further dispatch issue.
    #[must_use]
    pub fn stall_cycles(&self) -> u64 {
        self.dispatch.stall_cycles
    }

    /// Micro-ops that finished executing so far.
    #[must_use]
    pub fn executed(&self) -> u64 {
        self.execute.executed
    }

    /// Instructions retired so far.
    #[must_use]
    pub fn retired(&self) -> u64 {
        self.retire.retired
    }

    /// Retired instructions that raised a trap.
    #[must_use]
    pub fn traps(&self) -> u64 {
        self.retire.traps
    }

    /// Current reorder-buffer occupancy.
    #[must_use]
    pub fn rob_occupancy(&self) -> usize {
        self.rob.len()
    }
}

impl Component for Backend {
    fn name(&self) -> &str {
        &self.name
    }

    fn port(&self, name: &str) -> Option<crate::component::PortHandle> {
        self.ports.handle(name).or_else(|| self.retire.port(name))
    }

    fn reset(&mut self) {
        self.ports.clear_all();
        self.retire.reset();
        self.tick_count = 0;
    }
}

impl TickingComponent for Backend {
    fn period(&self) -> u64 {
        self.period
    }

    fn tick_count(&self) -> u64 {
        self.tick_count
    }

    fn tick(&mut self) {
        let cycle = self.tick_count;

        // Run tail-to-head, the same order the generic pipeline advances
        // stages in: retire drains entries completed on a prior cycle,
        // then execute ages entries dispatched on a prior cycle, and only
        // then does dispatch issue new micro-ops. This keeps a micro-op
        // dispatched this cycle from also executing (or even retiring) in
        // the same cycle.
        let retired = self.retire.tick(&mut self.rob);

        let completed_dests = self.execute.tick(&mut self.rob, cycle);
        for dest in completed_dests {
            self.dispatch.mark_forwarded(dest);
        }

        let dispatched = self.dispatch.tick(&mut self.rob, cycle);
        self.execute.accept(&dispatched);

        if retired.iter().any(|e| e.traps) {
            if let Some(trap_port) = self.ports.handle("trap") {
                trap_port.borrow_mut().set_data(Packet::Flag(true));
            }
        }

        if !retired.is_empty() || !dispatched.is_empty() {
            self.sink.borrow_mut().record(TraceRecord {
                timestamp: SimTime(cycle),
                category: TraceCategory::Instruction,
                component: self.name.clone(),
                event: "tick".to_string(),
                details: format!(
                    "dispatched={} retired={} rob_occupancy={}",
                    dispatched.len(),
                    retired.len(),
                    self.rob.len()
                ),
                priority: Priority::Component,
            });
        }

        self.tick_count += 1;
    }
}

/// Starts a backend's self-scheduled tick loop at `start_time`.
pub fn start(
    backend: std::rc::Rc<std::cell::RefCell<Backend>>,
    kernel: &mut EventKernel,
    start_time: SimTime,
) -> SimResult<EventHandle> {
    let period = backend.borrow().period();
    crate::event::schedule_periodic(
        kernel,
        start_time,
        period,
        Priority::Component,
        crate::event::EventKind::Tick,
        "backend",
        backend,
        |b: &mut Backend| b.tick(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dispatch::DispatchStage;
    use crate::backend::execute::ExecuteStage;
    use crate::common::SimTime;
    use crate::event::EventKernel;
    use crate::packet::OpcodeCategory;
    use crate::trace::NullSink;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn a_simple_instruction_flows_through_dispatch_execute_retire() {
        let sink: SharedSink = Rc::new(RefCell::new(NullSink));
        let dispatch = DispatchStage::new(8, 4, 2, 4, 32, 4);
        let execute = ExecuteStage::new();
        let mut backend = Backend::new("backend", dispatch, execute, 2, 8, 1, sink);

        assert!(backend.submit(Instruction {
            id: 1,
            logical_dest: 5,
            sources: vec![],
            opcode: OpcodeCategory::Logical,
            traps: false,
            group_multiplier: 1,
        }));

        // cycle 0: dispatch issues, nothing yet in execute/retire.
        backend.tick();
        assert_eq!(backend.dispatched(), 1);
        assert_eq!(backend.rob_occupancy(), 1);

        // cycle 1: logical latency is 1, completes this cycle; retire sees
        // it the cycle after completion.
        backend.tick();
        assert_eq!(backend.executed(), 1);

        backend.tick();
        assert_eq!(backend.retired(), 1);
        assert_eq!(backend.rob_occupancy(), 0);
        assert_eq!(backend.port("retire0_data").unwrap().borrow().peek(), Some(&Packet::Scalar(0)));
    }

    #[test]
    fn start_self_schedules_ticks_at_the_configured_period() {
        let sink: SharedSink = Rc::new(RefCell::new(NullSink));
        let dispatch = DispatchStage::new(8, 4, 2, 4, 32, 4);
        let execute = ExecuteStage::new();
        let backend = Rc::new(RefCell::new(Backend::new("backend", dispatch, execute, 2, 8, 1, sink)));

        let mut kernel = EventKernel::new();
        start(backend.clone(), &mut kernel, SimTime(0)).unwrap();
        kernel.run(SimTime(3));
        assert!(backend.borrow().tick_count() >= 3);
    }
}
