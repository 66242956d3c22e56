//! Top-level wiring: assembles a register file, an out-of-order backend,
//! and the writeback connections between them from a [`Config`], and runs
//! the result to completion (spec.md §4.8, addition).
//!
//! `Simulator` plays the same role a `sim::simulator::Simulator` owning a
//! CPU and a memory system side by side would: a struct owning the pieces a
//! run needs, with a fallible `new(config)` constructor and a `run` method.
//! This crate has no CPU to own — dispatch, execute, and retire already live
//! inside [`Backend`] — so `Simulator`'s job shrinks to: build the pieces
//! `Config` describes, wire them together, submit the loaded program, and
//! drive the event kernel until it drains or `max_cycles` is reached.
//!
//! Several backend sizing parameters (instruction-queue capacity, decode
//! and issue width, ROB capacity, retire width, forwarding-buffer
//! capacity) are not exposed as `Config` fields: spec.md names them only
//! as illustrative constants ("e.g., 16", "e.g., 2-4"), not as tunable
//! inputs. They are fixed here as internal constants instead.

use std::cell::RefCell;
use std::rc::Rc;

use crate::backend::{Backend, Instruction};
use crate::common::{SimResult, SimTime};
use crate::component::Component;
use crate::config::Config;
use crate::connection::{self, RegFileWritebackConnection};
use crate::event::EventKernel;
use crate::loader;
use crate::regfile::RegisterFile;
use crate::stats::Stats;
use crate::trace::{NullSink, SharedSink, TracingSink, VecSink};

/// Instruction-queue capacity ahead of decode.
const INSTRUCTION_QUEUE_CAPACITY: usize = 16;
/// Micro-ops decoded from the instruction queue per cycle.
const DECODE_WIDTH: usize = 6;
/// Micro-ops issued from the ready queue per cycle.
const ISSUE_WIDTH: usize = 4;
/// Entries the forwarding buffer can track at once.
const FORWARDING_CAPACITY: usize = 16;
/// Reorder-buffer depth.
const ROB_CAPACITY: usize = 64;
/// Entries retired from the ROB head per cycle.
const RETIRE_WIDTH: usize = 4;

/// Selects what a [`Simulator`] records trace output to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceMode {
    /// Discard every trace record.
    Discard,
    /// Retain every trace record in memory, inspectable after the run.
    Capture,
    /// Forward every trace record to the `tracing` crate at `trace` level.
    Diagnostic,
}

/// Owns a register file, an out-of-order backend, and the writeback wires
/// between them, and drives the shared event kernel.
pub struct Simulator {
    kernel: EventKernel,
    regfile: Rc<RefCell<RegisterFile>>,
    backend: Rc<RefCell<Backend>>,
    writebacks: Vec<Rc<RefCell<RegFileWritebackConnection>>>,
    sink: SharedSink,
    max_cycles: u64,
}

impl Simulator {
    /// Validates `config`, builds the register file, backend, and
    /// writeback connections it describes, submits the loaded program,
    /// and starts every self-ticking entity at time zero.
    ///
    /// Trace mode is derived from `config.general`: tracing disabled
    /// selects [`TraceMode::Discard`]; tracing enabled without `verbose`
    /// selects [`TraceMode::Capture`]; tracing enabled with `verbose`
    /// selects [`TraceMode::Diagnostic`]. Use
    /// [`Simulator::with_trace_mode`] to pick one explicitly.
    pub fn new(config: &Config) -> SimResult<Self> {
        let mode = match (config.general.enable_tracing, config.general.verbose) {
            (false, _) => TraceMode::Discard,
            (true, false) => TraceMode::Capture,
            (true, true) => TraceMode::Diagnostic,
        };
        Self::with_trace_mode(config, mode)
    }

    /// Like [`Simulator::new`], but with the trace sink chosen explicitly
    /// rather than derived from `config.general.enable_tracing`/`verbose`.
    pub fn with_trace_mode(config: &Config, mode: TraceMode) -> SimResult<Self> {
        config.validate()?;

        let sink: SharedSink = match mode {
            TraceMode::Discard => Rc::new(RefCell::new(NullSink)),
            TraceMode::Capture => Rc::new(RefCell::new(VecSink::new())),
            TraceMode::Diagnostic => Rc::new(RefCell::new(TracingSink)),
        };

        let mut kernel = EventKernel::new();

        let regfile = Rc::new(RefCell::new(RegisterFile::new(
            "regfile",
            config.register_file.num_registers,
            config.register_file.num_read_ports,
            config.register_file.num_write_ports,
            config.register_file.reg_width,
            config.register_file.use_regfile_forwarding,
            config.register_file.enable_scoreboard,
            1,
            sink.clone(),
        )));

        let dispatch = crate::backend::DispatchStage::new(
            INSTRUCTION_QUEUE_CAPACITY,
            DECODE_WIDTH,
            ISSUE_WIDTH,
            config.register_file.num_read_ports,
            config.register_file.num_registers,
            FORWARDING_CAPACITY,
        );
        let execute = crate::backend::ExecuteStage::new();
        let backend = Rc::new(RefCell::new(Backend::new(
            "backend",
            dispatch,
            execute,
            RETIRE_WIDTH,
            ROB_CAPACITY,
            1,
            sink.clone(),
        )));

        let writeback_lanes = RETIRE_WIDTH.min(config.register_file.num_write_ports);
        let mut writebacks = Vec::with_capacity(writeback_lanes);
        for i in 0..writeback_lanes {
            let addr_source = backend
                .borrow()
                .port(&format!("retire{i}_addr"))
                .ok_or_else(|| crate::common::SimError::GraphWiring(format!("missing retire{i}_addr")))?;
            let data_source = backend
                .borrow()
                .port(&format!("retire{i}_data"))
                .ok_or_else(|| crate::common::SimError::GraphWiring(format!("missing retire{i}_data")))?;
            let mask_source = backend.borrow().port(&format!("retire{i}_mask"));

            let dest_addr = regfile
                .borrow()
                .port(&format!("write{i}_addr"))
                .ok_or_else(|| crate::common::SimError::GraphWiring(format!("missing write{i}_addr")))?;
            let dest_data = regfile
                .borrow()
                .port(&format!("write{i}_data"))
                .ok_or_else(|| crate::common::SimError::GraphWiring(format!("missing write{i}_data")))?;
            let dest_mask = regfile.borrow().port(&format!("write{i}_mask"));

            let wire = Rc::new(RefCell::new(RegFileWritebackConnection::new(
                format!("writeback{i}"),
                addr_source,
                data_source,
                mask_source,
                dest_addr,
                dest_data,
                dest_mask,
                1,
                sink.clone(),
            )));
            writebacks.push(wire);
        }

        let mut sim = Self {
            kernel,
            regfile,
            backend,
            writebacks,
            sink,
            max_cycles: config.general.max_cycles,
        };

        for instr in loader::translate_program(config) {
            sim.submit(instr);
        }

        sim.start()?;
        Ok(sim)
    }

    /// Enqueues one instruction for dispatch, if the instruction queue has
    /// room. Returns whether it was accepted.
    pub fn submit(&mut self, instr: Instruction) -> bool {
        self.backend.borrow_mut().submit(instr)
    }

    fn start(&mut self) -> SimResult<()> {
        crate::regfile::start(self.regfile.clone(), &mut self.kernel, SimTime::ZERO)?;
        crate::backend::start(self.backend.clone(), &mut self.kernel, SimTime::ZERO)?;
        for wire in &self.writebacks {
            connection::start(wire.clone(), &mut self.kernel, SimTime::ZERO)?;
        }
        Ok(())
    }

    /// Runs the event kernel to `max_cycles` (from `Config::general`) and
    /// returns the aggregated counters.
    pub fn run(&mut self) -> Stats {
        self.kernel.run(SimTime(self.max_cycles));
        self.stats()
    }

    /// Snapshots the current counters without advancing the simulation.
    #[must_use]
    pub fn stats(&self) -> Stats {
        let backend = self.backend.borrow();
        let regfile = self.regfile.borrow();
        let transfers = self
            .writebacks
            .iter()
            .map(|w| w.borrow().delivered)
            .sum();

        Stats {
            cycles: self.kernel.current_time().0,
            dispatched: backend.dispatched(),
            executed: backend.executed(),
            retired: backend.retired(),
            stall_cycles: backend.stall_cycles(),
            conflicts: regfile.conflicts,
            forwards: regfile.forwards,
            transfers,
            ..Stats::default()
        }
    }

    /// The shared trace sink every wired component and connection emits
    /// to. Useful for downcasting to [`crate::trace::VecSink`] when
    /// `TraceMode::Capture` was selected.
    #[must_use]
    pub fn sink(&self) -> SharedSink {
        self.sink.clone()
    }

    /// Current simulated time.
    #[must_use]
    pub fn current_time(&self) -> SimTime {
        self.kernel.current_time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProgramWord;

    #[test]
    fn builds_and_runs_a_tiny_program() {
        let mut config = Config::default();
        config.general.max_cycles = 50;
        config.program.push(ProgramWord { address: 0, instruction: 0x0000_0093 });
        config.program.push(ProgramWord { address: 4, instruction: 0x0000_0113 });

        let mut sim = Simulator::new(&config).unwrap();
        let stats = sim.run();
        assert_eq!(stats.dispatched, 2);
        assert!(stats.retired >= 1);
    }

    #[test]
    fn rejects_invalid_configuration_before_wiring_anything() {
        let mut config = Config::default();
        config.register_file.num_registers = 0;
        assert!(Simulator::new(&config).is_err());
    }

    #[test]
    fn empty_program_runs_to_max_cycles_without_panicking() {
        let mut config = Config::default();
        config.general.max_cycles = 10;
        let mut sim = Simulator::new(&config).unwrap();
        let stats = sim.run();
        assert_eq!(stats.dispatched, 0);
        assert_eq!(stats.retired, 0);
    }
}
