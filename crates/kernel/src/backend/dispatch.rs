//! The dispatch stage: instruction queue, register-grouping decode, and
//! hazard-checked issue (spec.md §4.6.1).

use std::collections::VecDeque;

use crate::backend::rob::{DestKind, Rob};
use crate::packet::{MicroOp, OpcodeCategory};

/// One not-yet-decoded instruction sitting in the instruction queue.
#[derive(Clone, Debug)]
pub struct Instruction {
    /// Originating instruction id, carried onto every micro-op it expands
    /// to.
    pub id: u64,
    /// Logical destination register, before register-group expansion.
    pub logical_dest: usize,
    /// Source registers the expanded micro-ops read.
    pub sources: Vec<usize>,
    /// Opcode category, for execute-latency lookup.
    pub opcode: OpcodeCategory,
    /// Whether retiring this instruction raises a trap.
    pub traps: bool,
    /// Register-group multiplier: how many micro-ops this instruction
    /// expands into (1..8).
    pub group_multiplier: usize,
}

/// Expands one instruction into its register-grouped micro-ops.
///
/// For multiplier `m` and logical register `r`, produces `m` micro-ops with
/// physical destinations `(r / m) * m + g` for `g` in `0..m`, skipping any
/// mapped index that would fall outside `num_registers`.
#[must_use]
pub fn expand(instr: &Instruction, num_registers: usize) -> Vec<MicroOp> {
    let m = instr.group_multiplier.max(1);
    let base = (instr.logical_dest / m) * m;
    (0..m)
        .filter_map(|g| {
            let dest = base + g;
            if dest >= num_registers {
                return None;
            }
            Some(MicroOp {
                instruction_id: instr.id,
                micro_index: g as u32,
                dest,
                sources: instr.sources.clone(),
                opcode: instr.opcode,
                traps: instr.traps,
            })
        })
        .collect()
}

/// A micro-op that has been assigned a ROB index and is ready for the
/// execute stage to pick up.
#[derive(Clone, Debug)]
pub struct Dispatched {
    /// The dispatched micro-op.
    pub micro_op: MicroOp,
    /// Its assigned ROB index.
    pub rob_index: u32,
}

/// Holds the instruction queue, decode expansion, and hazard-checked issue
/// logic of the dispatch stage.
pub struct DispatchStage {
    instruction_queue: VecDeque<Instruction>,
    instruction_queue_capacity: usize,
    ready_micro_ops: VecDeque<MicroOp>,
    decode_width: usize,
    issue_width: usize,
    num_read_ports: usize,
    num_registers: usize,
    forwarding_buffer: VecDeque<usize>,
    forwarding_capacity: usize,
    /// Micro-ops successfully dispatched (assigned a ROB index) so far.
    pub dispatched: u64,
    /// Cycles where at least one hazard blocked further issue.
    pub stall_cycles: u64,
}

impl DispatchStage {
    /// Builds a dispatch stage. `instruction_queue_capacity` bounds the
    /// instruction queue; `decode_width` caps micro-ops decoded per cycle;
    /// `issue_width` caps micro-ops issued per cycle; `num_read_ports` and
    /// `num_registers` mirror the bound register file's shape;
    /// `forwarding_capacity` bounds the in-flight-result forwarding buffer.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        instruction_queue_capacity: usize,
        decode_width: usize,
        issue_width: usize,
        num_read_ports: usize,
        num_registers: usize,
        forwarding_capacity: usize,
    ) -> Self {
        Self {
            instruction_queue: VecDeque::with_capacity(instruction_queue_capacity),
            instruction_queue_capacity,
            ready_micro_ops: VecDeque::new(),
            decode_width: decode_width.max(1),
            issue_width: issue_width.max(1),
            num_read_ports,
            num_registers,
            forwarding_buffer: VecDeque::with_capacity(forwarding_capacity),
            forwarding_capacity: forwarding_capacity.max(1),
            dispatched: 0,
            stall_cycles: 0,
        }
    }

    /// Enqueues an instruction for decode, if the instruction queue has
    /// room. Returns `false` (and drops nothing internally — the caller
    /// keeps the instruction for a later cycle) if the queue is full.
    #[must_use]
    pub fn enqueue(&mut self, instr: Instruction) -> bool {
        if self.instruction_queue.len() >= self.instruction_queue_capacity {
            return false;
        }
        self.instruction_queue.push_back(instr);
        true
    }

    /// Records that `reg`'s result is available via forwarding (e.g. an
    /// execute-stage completion this cycle), bumping out the oldest forward
    /// if the buffer is already at capacity.
    pub fn mark_forwarded(&mut self, reg: usize) {
        if self.forwarding_buffer.len() >= self.forwarding_capacity {
            self.forwarding_buffer.pop_front();
        }
        self.forwarding_buffer.push_back(reg);
    }

    fn raw_hazard(&self, rob: &Rob, sources: &[usize]) -> bool {
        sources.iter().any(|&src| {
            rob.active_entries()
                .any(|entry| entry.dest == src && !entry.complete)
                && !self.forwarding_buffer.contains(&src)
        })
    }

    /// Runs one cycle of decode-then-issue against `rob`, returning every
    /// micro-op that was successfully assigned a ROB index this cycle.
    pub fn tick(&mut self, rob: &mut Rob, cycle: u64) -> Vec<Dispatched> {
        // Decode: drain the instruction queue into ready micro-ops, up to
        // decode_width micro-ops produced this cycle.
        let mut decoded = 0usize;
        while decoded < self.decode_width {
            let Some(instr) = self.instruction_queue.pop_front() else { break };
            let micro_ops = expand(&instr, self.num_registers);
            decoded += micro_ops.len();
            self.ready_micro_ops.extend(micro_ops);
        }

        // Issue: pop ready micro-ops up to issue_width, checking hazards
        // in order; the first hazard halts further issue this cycle
        // (in-order issue).
        let mut issued = Vec::with_capacity(self.issue_width);
        let mut read_ports_used = 0usize;
        let mut stalled = false;
        while issued.len() < self.issue_width {
            let Some(front) = self.ready_micro_ops.front() else { break };

            if self.raw_hazard(rob, &front.sources) {
                stalled = true;
                break;
            }
            if read_ports_used + front.sources.len() > self.num_read_ports {
                stalled = true;
                break;
            }

            let Some(uop) = self.ready_micro_ops.pop_front() else { break };
            read_ports_used += uop.sources.len();
            let Some(rob_index) = rob.dispatch(uop.instruction_id, uop.micro_index, uop.dest, DestKind::Scalar, uop.traps, cycle) else {
                // ROB full: put it back and stop, a structural hazard.
                self.ready_micro_ops.push_front(uop);
                stalled = true;
                break;
            };
            self.dispatched += 1;
            issued.push(Dispatched { micro_op: uop, rob_index });
        }

        if stalled {
            self.stall_cycles += 1;
        }
        issued
    }

    /// Current instruction-queue occupancy.
    #[must_use]
    pub fn instruction_queue_len(&self) -> usize {
        self.instruction_queue.len()
    }

    /// Current ready-micro-op queue occupancy (decoded, not yet issued).
    #[must_use]
    pub fn ready_len(&self) -> usize {
        self.ready_micro_ops.len()
    }
}
