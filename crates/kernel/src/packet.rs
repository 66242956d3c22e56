//! The data packet model.
//!
//! The original design this crate is modeled on passes packets between ports
//! as a polymorphic base class, downcast at the consumer. Rust has no
//! open-ended dynamic cast of that kind worth reaching for here — a closed
//! tagged union covers every payload shape this kernel needs and lets the
//! compiler check every match is exhaustive, so `Packet` is a plain enum
//! rather than a trait object.

use crate::common::time::SimTime;

/// A `(register index, data word)` pair, as carried by register-write ports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegWrite {
    /// Destination register index.
    pub reg: usize,
    /// Value to write.
    pub data: u64,
    /// Per-byte write-enable mask (bit i enables byte i). `u8::MAX` for a
    /// full-width, unmasked write.
    pub byte_enable: u8,
}

/// A micro-op flowing through the dispatch/execute/retire pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MicroOp {
    /// Index of the originating instruction (for WAW/forwarding bookkeeping
    /// and trace output).
    pub instruction_id: u64,
    /// Index of this micro-op within its instruction's expansion, `0..M`.
    pub micro_index: u32,
    /// Physical destination register.
    pub dest: usize,
    /// Source register operands this micro-op reads.
    pub sources: Vec<usize>,
    /// Opcode category, used to look up execute latency.
    pub opcode: OpcodeCategory,
    /// Whether this micro-op raises a trap when it retires.
    pub traps: bool,
}

/// Latency-lookup category for an opcode. The concrete arithmetic/logic
/// tables behind these categories are out of scope for the kernel; it only
/// needs to know how many cycles a category takes to execute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpcodeCategory {
    /// Arithmetic (add/sub-class), 2 cycles.
    Arithmetic,
    /// Logical (and/or/xor-class), 1 cycle.
    Logical,
    /// Shift, 2 cycles.
    Shift,
    /// Compare, 1 cycle.
    Compare,
    /// Division at a given operand width in bits (8/16/32/64).
    Divide(u8),
}

impl OpcodeCategory {
    /// Fixed execute latency in cycles for this category.
    #[must_use]
    pub fn latency_cycles(self) -> u64 {
        match self {
            Self::Arithmetic | Self::Shift => 2,
            Self::Logical | Self::Compare => 1,
            Self::Divide(8) => 17,
            Self::Divide(16) => 33,
            Self::Divide(32) => 65,
            Self::Divide(_) => 129,
        }
    }
}

/// The closed set of payloads a [`crate::port::Port`] can carry.
#[derive(Clone, Debug, PartialEq)]
pub enum Packet {
    /// A single scalar integer value.
    Scalar(u64),
    /// A boolean signal (e.g. a ready/valid or credit-available line).
    Flag(bool),
    /// A register read request: the register index being read.
    RegRead(usize),
    /// A register write descriptor.
    RegWrite(RegWrite),
    /// A micro-op moving through the out-of-order backend.
    MicroOp(MicroOp),
    /// A ROB index, used on completion/retire notification ports.
    RobIndex(u32),
    /// A vector of raw data words, for wide (vector-geometry) transfers.
    Vector(Vec<u64>),
}

impl Packet {
    /// Origin timestamp is not carried on the packet itself in this model
    /// (it is implicit in which cycle's port it occupies); this helper
    /// exists purely as a deep-clone entry point for broadcast connections,
    /// which must deliver independent copies to every destination.
    #[must_use]
    pub fn deep_clone(&self) -> Self {
        self.clone()
    }

    /// Returns the scalar payload, if this packet carries one.
    #[must_use]
    pub fn as_scalar(&self) -> Option<u64> {
        match self {
            Self::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the register-write payload, if this packet carries one.
    #[must_use]
    pub fn as_reg_write(&self) -> Option<RegWrite> {
        match self {
            Self::RegWrite(rw) => Some(*rw),
            _ => None,
        }
    }
}

/// A packet paired with the time it was produced, for components that need
/// to measure latency across a pipeline stage.
#[derive(Clone, Debug)]
pub struct TimedPacket {
    /// The payload.
    pub packet: Packet,
    /// Time the packet was produced.
    pub origin: SimTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_clone_is_independent() {
        let p = Packet::Vector(vec![1, 2, 3]);
        let q = p.deep_clone();
        assert_eq!(p, q);
    }

    #[test]
    fn opcode_latencies_match_category_table() {
        assert_eq!(OpcodeCategory::Arithmetic.latency_cycles(), 2);
        assert_eq!(OpcodeCategory::Logical.latency_cycles(), 1);
        assert_eq!(OpcodeCategory::Shift.latency_cycles(), 2);
        assert_eq!(OpcodeCategory::Compare.latency_cycles(), 1);
        assert_eq!(OpcodeCategory::Divide(8).latency_cycles(), 17);
        assert_eq!(OpcodeCategory::Divide(16).latency_cycles(), 33);
        assert_eq!(OpcodeCategory::Divide(32).latency_cycles(), 65);
        assert_eq!(OpcodeCategory::Divide(64).latency_cycles(), 129);
    }

    #[test]
    fn as_scalar_only_matches_scalar_variant() {
        assert_eq!(Packet::Scalar(7).as_scalar(), Some(7));
        assert_eq!(Packet::Flag(true).as_scalar(), None);
    }
}
