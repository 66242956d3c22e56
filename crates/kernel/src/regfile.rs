//! Multi-ported register file with scoreboard and write forwarding
//! (spec.md §4.5).
//!
//! Register 0 is hard-wired to zero, mirroring the RISC-V `x0`
//! convention: writes to it are silently dropped and its scoreboard bit
//! never sets.

use crate::component::{Component, PortHandle, PortSet, TickingComponent};
use crate::packet::{Packet, RegWrite};
use crate::port::{Direction, Port};
use crate::trace::{SharedSink, TraceCategory, TraceRecord};

/// One read port's address/data port pair.
struct ReadPort {
    addr: PortHandle,
    data: PortHandle,
}

/// One write port's address/data/mask port triple.
struct WritePort {
    addr: PortHandle,
    data: PortHandle,
    mask: PortHandle,
}

/// A multi-ported register file with a per-register pending-write
/// scoreboard and an optional forwarding counter.
pub struct RegisterFile {
    name: String,
    registers: Vec<u64>,
    reg_width: u8,
    use_forwarding: bool,
    enable_scoreboard: bool,
    reads: Vec<ReadPort>,
    writes: Vec<WritePort>,
    scoreboard: u32,
    previous_scoreboard: u32,
    scoreboard_regd: PortHandle,
    scoreboard_comb: PortHandle,
    write_count: PortHandle,
    ports: PortSet,
    period: u64,
    tick_count: u64,
    sink: SharedSink,
    /// Write requests dropped because another write targeted the same
    /// register the same cycle.
    pub conflicts: u64,
    /// Reads satisfied while the target's scoreboard bit was set.
    pub forwards: u64,
}

impl RegisterFile {
    /// Builds a register file with `num_registers` architectural registers,
    /// `num_read_ports` read address/data pairs, and `num_write_ports`
    /// write address/data/mask triples. Each read/write port is named
    /// `read{n}_addr`/`read{n}_data` and `write{n}_addr`/`write{n}_data`/
    /// `write{n}_mask` respectively; the scoreboard and write-count ports
    /// are `scoreboard_regd`, `scoreboard_comb`, and `write_count`.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        num_registers: usize,
        num_read_ports: usize,
        num_write_ports: usize,
        reg_width: u8,
        use_forwarding: bool,
        enable_scoreboard: bool,
        period: u64,
        sink: SharedSink,
    ) -> Self {
        let mut ports = PortSet::new();
        let mut reads = Vec::with_capacity(num_read_ports);
        for i in 0..num_read_ports {
            let addr = ports.insert(Port::new(format!("read{i}_addr"), Direction::Input));
            let data = ports.insert(Port::new(format!("read{i}_data"), Direction::Output));
            reads.push(ReadPort { addr, data });
        }

        let mut writes = Vec::with_capacity(num_write_ports);
        for i in 0..num_write_ports {
            let addr = ports.insert(Port::new(format!("write{i}_addr"), Direction::Input));
            let data = ports.insert(Port::new(format!("write{i}_data"), Direction::Input));
            let mask = ports.insert(Port::new(format!("write{i}_mask"), Direction::Input));
            writes.push(WritePort { addr, data, mask });
        }

        let scoreboard_regd = ports.insert(Port::new("scoreboard_regd", Direction::Output));
        let scoreboard_comb = ports.insert(Port::new("scoreboard_comb", Direction::Output));
        let write_count = ports.insert(Port::new("write_count", Direction::Output));

        Self {
            name: name.into(),
            registers: vec![0u64; num_registers.max(1)],
            reg_width,
            use_forwarding,
            enable_scoreboard,
            reads,
            writes,
            scoreboard: 0,
            previous_scoreboard: 0,
            scoreboard_regd,
            scoreboard_comb,
            write_count,
            ports,
            period,
            tick_count: 0,
            sink,
            conflicts: 0,
            forwards: 0,
        }
    }

    /// Reads a register's current committed value. Register 0 always reads
    /// as 0 regardless of history.
    #[must_use]
    pub fn read(&self, reg: usize) -> u64 {
        if reg == 0 {
            return 0;
        }
        self.registers.get(reg).copied().unwrap_or(0)
    }

    /// Marks register `reg`'s scoreboard bit pending, for an external agent
    /// (the dispatch stage) to call when it issues a write that hasn't
    /// landed yet. A no-op for register 0 or an out-of-range index.
    pub fn set_scoreboard(&mut self, reg: usize) {
        if reg == 0 || reg >= self.registers.len() {
            return;
        }
        self.scoreboard |= 1 << (reg % 32);
    }

    /// Whether `reg`'s scoreboard bit is currently set.
    #[must_use]
    pub fn scoreboard_bit(&self, reg: usize) -> bool {
        reg != 0 && (self.scoreboard & (1 << (reg % 32))) != 0
    }

    fn width_mask(&self) -> u64 {
        if self.reg_width >= 64 {
            u64::MAX
        } else {
            (1u64 << self.reg_width) - 1
        }
    }

    fn apply_write(&mut self, req: RegWrite) {
        if req.reg == 0 || req.reg >= self.registers.len() {
            return;
        }
        let mask = self.width_mask();
        let mut merged = self.registers[req.reg];
        for byte in 0..8u32 {
            if req.byte_enable & (1 << byte) != 0 {
                let shift = byte * 8;
                let byte_mask = 0xFFu64 << shift;
                merged = (merged & !byte_mask) | (req.data & byte_mask);
            }
        }
        self.registers[req.reg] = merged & mask;
        if req.byte_enable == u8::MAX {
            self.scoreboard &= !(1 << (req.reg % 32));
        }
    }
}

impl Component for RegisterFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn port(&self, name: &str) -> Option<PortHandle> {
        self.ports.handle(name)
    }

    fn reset(&mut self) {
        self.registers.iter_mut().for_each(|r| *r = 0);
        self.scoreboard = 0;
        self.previous_scoreboard = 0;
        self.ports.clear_all();
    }
}

impl TickingComponent for RegisterFile {
    fn period(&self) -> u64 {
        self.period
    }

    fn tick_count(&self) -> u64 {
        self.tick_count
    }

    fn tick(&mut self) {
        self.tick_count += 1;

        // Phase 1: process writes, port-index order, first-writer-wins on
        // same-register conflicts within this cycle.
        let mut seen = std::collections::HashSet::new();
        let mut applied = 0u64;
        let mut requests = Vec::new();
        for port in &self.writes {
            let (addr, data, mask) = (port.addr.borrow_mut().read(), port.data.borrow_mut().read(), port.mask.borrow_mut().read());
            let (Some(addr), Some(data)) = (addr.and_then(|p| p.as_scalar()), data.and_then(|p| p.as_scalar())) else {
                continue;
            };
            let byte_enable = mask.and_then(|p| p.as_scalar()).map_or(u8::MAX, |v| v as u8);
            requests.push(RegWrite {
                reg: addr as usize,
                data,
                byte_enable,
            });
        }
        for req in requests {
            if !seen.insert(req.reg) {
                self.conflicts += 1;
                continue;
            }
            self.apply_write(req);
            applied += 1;
        }
        self.write_count.borrow_mut().set_data(Packet::Scalar(applied));

        // Phase 2: process reads, bumping the forwarding counter on a
        // scoreboard hit.
        for port in &self.reads {
            let Some(addr) = port.addr.borrow_mut().read().and_then(|p| p.as_scalar()) else {
                continue;
            };
            let reg = addr as usize;
            if self.use_forwarding && self.enable_scoreboard && self.scoreboard_bit(reg) {
                self.forwards += 1;
                self.sink.borrow_mut().record(TraceRecord {
                    timestamp: crate::common::time::SimTime(self.tick_count),
                    category: TraceCategory::RegisterAccess,
                    component: self.name.clone(),
                    event: "forward".to_string(),
                    details: format!("reg={reg}"),
                    priority: crate::event::Priority::Component,
                });
            }
            port.data.borrow_mut().set_data(Packet::Scalar(self.read(reg)));
        }

        // Phase 3: publish the scoreboard. `scoreboard_regd` carries last
        // cycle's mask; `scoreboard_comb` carries it minus whatever cleared
        // this cycle.
        if self.enable_scoreboard {
            self.scoreboard_regd.borrow_mut().set_data(Packet::Scalar(u64::from(self.previous_scoreboard)));
            let cleared = self.previous_scoreboard & !self.scoreboard;
            self.scoreboard_comb
                .borrow_mut()
                .set_data(Packet::Scalar(u64::from(self.previous_scoreboard & !cleared)));
            self.previous_scoreboard = self.scoreboard;
        }
    }
}

/// Starts a register file's self-scheduled tick loop at `start_time`.
pub fn start(
    regfile: std::rc::Rc<std::cell::RefCell<RegisterFile>>,
    kernel: &mut crate::event::EventKernel,
    start_time: crate::common::SimTime,
) -> crate::common::SimResult<crate::event::EventHandle> {
    let period = regfile.borrow().period();
    crate::event::schedule_periodic(
        kernel,
        start_time,
        period,
        crate::event::Priority::Component,
        crate::event::EventKind::Tick,
        "regfile",
        regfile,
        |r: &mut RegisterFile| r.tick(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::NullSink;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn rf(num_registers: usize, reads: usize, writes: usize) -> RegisterFile {
        let sink: SharedSink = Rc::new(RefCell::new(NullSink));
        RegisterFile::new("rf", num_registers, reads, writes, 64, true, true, 1, sink)
    }

    #[test]
    fn register_zero_is_always_zero() {
        let mut regfile = rf(32, 1, 1);
        regfile.port("write0_addr").unwrap().borrow_mut().set_data(Packet::Scalar(0));
        regfile.port("write0_data").unwrap().borrow_mut().set_data(Packet::Scalar(0xFF));
        regfile.tick();
        assert_eq!(regfile.read(0), 0);
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut regfile = rf(32, 1, 1);
        regfile.port("write0_addr").unwrap().borrow_mut().set_data(Packet::Scalar(5));
        regfile.port("write0_data").unwrap().borrow_mut().set_data(Packet::Scalar(42));
        regfile.tick();
        assert_eq!(regfile.read(5), 42);
    }

    #[test]
    fn conflicting_writes_keep_first_port_wins() {
        let mut regfile = rf(32, 1, 2);
        regfile.port("write0_addr").unwrap().borrow_mut().set_data(Packet::Scalar(3));
        regfile.port("write0_data").unwrap().borrow_mut().set_data(Packet::Scalar(100));
        regfile.port("write1_addr").unwrap().borrow_mut().set_data(Packet::Scalar(3));
        regfile.port("write1_data").unwrap().borrow_mut().set_data(Packet::Scalar(200));
        regfile.tick();
        assert_eq!(regfile.read(3), 100);
        assert_eq!(regfile.conflicts, 1);
    }

    #[test]
    fn scoreboard_clears_on_unmasked_write() {
        let mut regfile = rf(32, 1, 1);
        regfile.set_scoreboard(7);
        assert!(regfile.scoreboard_bit(7));

        regfile.port("write0_addr").unwrap().borrow_mut().set_data(Packet::Scalar(7));
        regfile.port("write0_data").unwrap().borrow_mut().set_data(Packet::Scalar(1));
        regfile.tick();
        assert!(!regfile.scoreboard_bit(7));
    }

    #[test]
    fn masked_write_leaves_scoreboard_bit_set() {
        let mut regfile = rf(32, 1, 1);
        regfile.set_scoreboard(2);

        regfile.port("write0_addr").unwrap().borrow_mut().set_data(Packet::Scalar(2));
        regfile.port("write0_data").unwrap().borrow_mut().set_data(Packet::Scalar(1));
        regfile.port("write0_mask").unwrap().borrow_mut().set_data(Packet::Scalar(0x0F));
        regfile.tick();
        assert!(regfile.scoreboard_bit(2), "masked write is speculative, bit stays set");
    }

    #[test]
    fn forwarding_counts_scoreboard_hit_reads() {
        let mut regfile = rf(32, 1, 0);
        regfile.set_scoreboard(9);
        regfile.port("read0_addr").unwrap().borrow_mut().set_data(Packet::Scalar(9));
        regfile.tick();
        assert_eq!(regfile.forwards, 1);
    }
}
