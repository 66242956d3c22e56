//! The execute stage: independently-latency-tracked in-flight micro-ops
//! (spec.md §4.6.2).

use crate::backend::dispatch::Dispatched;
use crate::backend::rob::Rob;
use crate::packet::OpcodeCategory;

/// One micro-op currently executing, counting down to completion.
struct InFlight {
    rob_index: u32,
    dest: usize,
    remaining: u64,
}

/// Holds every micro-op currently executing and retires them into the ROB
/// as their latency expires. Results are placeholders: this simulator
/// models timing, not functional correctness (see Non-goals).
#[derive(Default)]
pub struct ExecuteStage {
    in_flight: Vec<InFlight>,
    /// Micro-ops that finished executing so far.
    pub executed: u64,
}

impl ExecuteStage {
    /// Builds an empty execute stage.
    #[must_use]
    pub fn new() -> Self {
        Self { in_flight: Vec::new(), executed: 0 }
    }

    /// Number of micro-ops currently in flight.
    #[must_use]
    pub fn occupancy(&self) -> usize {
        self.in_flight.len()
    }

    /// Accepts newly-dispatched micro-ops this cycle, seeding each with its
    /// opcode's latency.
    pub fn accept(&mut self, dispatched: &[Dispatched]) {
        for d in dispatched {
            self.in_flight.push(InFlight {
                rob_index: d.rob_index,
                dest: d.micro_op.dest,
                remaining: latency_of(d.micro_op.opcode),
            });
        }
    }

    /// Advances every in-flight micro-op by one cycle, completing any whose
    /// latency has expired into `rob`. Returns the destination registers of
    /// every micro-op that completed this cycle, so the dispatch stage can
    /// mark them as forwarded.
    pub fn tick(&mut self, rob: &mut Rob, cycle: u64) -> Vec<usize> {
        let mut completed_dests = Vec::new();
        self.in_flight.retain_mut(|entry| {
            entry.remaining = entry.remaining.saturating_sub(1);
            if entry.remaining == 0 {
                rob.complete(entry.rob_index, 0, u8::MAX, cycle);
                completed_dests.push(entry.dest);
                self.executed += 1;
                false
            } else {
                true
            }
        });
        completed_dests
    }
}

fn latency_of(opcode: OpcodeCategory) -> u64 {
    opcode.latency_cycles().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dispatch::Dispatched;
    use crate::backend::rob::DestKind;
    use crate::packet::MicroOp;

    fn dispatched(rob_index: u32, dest: usize, opcode: OpcodeCategory) -> Dispatched {
        Dispatched {
            micro_op: MicroOp { instruction_id: 0, micro_index: 0, dest, sources: vec![], opcode, traps: false },
            rob_index,
        }
    }

    #[test]
    fn completes_after_its_opcode_latency() {
        let mut rob = Rob::new(4);
        let idx = rob.dispatch(0, 0, 1, DestKind::Scalar, false, 0).unwrap();
        let mut exec = ExecuteStage::new();
        exec.accept(&[dispatched(idx, 1, OpcodeCategory::Arithmetic)]);

        assert!(exec.tick(&mut rob, 1).is_empty(), "latency 2 still counting down after the first tick");
        let completed = exec.tick(&mut rob, 2);
        assert_eq!(completed, vec![1]);
        assert_eq!(exec.executed, 1);
        assert_eq!(exec.occupancy(), 0);
    }

    #[test]
    fn longer_latencies_take_proportionally_longer() {
        let mut rob = Rob::new(4);
        let idx = rob.dispatch(0, 0, 2, DestKind::Scalar, false, 0).unwrap();
        let mut exec = ExecuteStage::new();
        exec.accept(&[dispatched(idx, 2, OpcodeCategory::Divide(32))]);

        for _ in 0..64 {
            assert!(exec.tick(&mut rob, 1).is_empty());
        }
        let completed = exec.tick(&mut rob, 1);
        assert_eq!(completed, vec![2]);
    }
}
