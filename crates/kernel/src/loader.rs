//! Program image and initial data-memory ingestion (spec.md §4.8,
//! supplemented).
//!
//! No ELF or object-file parsing happens here — `Config`'s `program` and
//! `initial_data` lists arrive already parsed as `(address, word)` pairs.
//! This module's only job is translating those lists into the handful of
//! source packets the backend and a memory-mapped demo component need.

use std::collections::BTreeMap;

use crate::backend::Instruction;
use crate::config::{Config, ProgramWord};
use crate::packet::OpcodeCategory;

/// A flat, sparse byte-addressed word store built from `Config`'s
/// `initial_data` regions. Stands in for a `libc`-mmap-backed RAM image;
/// this crate has no functional-correctness scope (see Non-goals), so it
/// exists purely as something a demo memory component can read from and
/// trace.
#[derive(Debug, Default, Clone)]
pub struct Memory {
    words: BTreeMap<u64, u32>,
}

impl Memory {
    /// Builds a memory image from `config`'s `initial_data` regions. A
    /// region's words are laid out at `address`, `address + 4`, `address +
    /// 8`, ... Later regions overwrite earlier ones on overlap.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let mut words = BTreeMap::new();
        for region in &config.initial_data {
            for (i, word) in region.words.iter().enumerate() {
                let addr = region.address + (i as u64) * 4;
                words.insert(addr, *word);
            }
        }
        Self { words }
    }

    /// Reads the 32-bit word at `address`, or `0` if nothing was loaded
    /// there.
    #[must_use]
    pub fn read(&self, address: u64) -> u32 {
        self.words.get(&address).copied().unwrap_or(0)
    }

    /// Writes a 32-bit word at `address`.
    pub fn write(&mut self, address: u64, word: u32) {
        self.words.insert(address, word);
    }

    /// Number of distinct addresses currently holding a nonzero-loaded
    /// word.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether no words were loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Translates one program word into a backend-ready [`Instruction`].
///
/// There is no real instruction-set decode table in scope here (see
/// spec.md's Non-goals): fields are derived deterministically from the
/// encoded word's bits, enough to drive dispatch's hazard and latency
/// modeling without claiming to execute real RISC-V semantics.
#[must_use]
pub fn decode(word: &ProgramWord, num_registers: usize) -> Instruction {
    let bits = word.instruction;
    let dest = ((bits >> 7) & 0x1F) as usize % num_registers.max(1);
    let src1 = ((bits >> 15) & 0x1F) as usize % num_registers.max(1);
    let src2 = ((bits >> 20) & 0x1F) as usize % num_registers.max(1);
    let sources = if (bits & 0x7F) == 0x13 {
        vec![src1]
    } else {
        vec![src1, src2]
    };
    let opcode = match bits & 0x3 {
        0 => OpcodeCategory::Arithmetic,
        1 => OpcodeCategory::Logical,
        2 => OpcodeCategory::Shift,
        _ => OpcodeCategory::Compare,
    };
    Instruction {
        id: word.address,
        logical_dest: dest,
        sources,
        opcode,
        traps: false,
        group_multiplier: 1,
    }
}

/// Translates every program word in `config` into backend-ready
/// instructions, in address order.
#[must_use]
pub fn translate_program(config: &Config) -> Vec<Instruction> {
    let mut ordered = config.program.clone();
    ordered.sort_by_key(|w| w.address);
    ordered
        .iter()
        .map(|w| decode(w, config.register_file.num_registers))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataRegion;

    #[test]
    fn memory_lays_out_region_words_at_four_byte_strides() {
        let mut config = Config::default();
        config.initial_data.push(DataRegion { address: 0x100, words: vec![1, 2, 3] });
        let mem = Memory::from_config(&config);
        assert_eq!(mem.read(0x100), 1);
        assert_eq!(mem.read(0x104), 2);
        assert_eq!(mem.read(0x108), 3);
        assert_eq!(mem.len(), 3);
    }

    #[test]
    fn unloaded_address_reads_zero() {
        let mem = Memory::from_config(&Config::default());
        assert_eq!(mem.read(0xDEAD), 0);
    }

    #[test]
    fn translate_program_orders_by_address() {
        let mut config = Config::default();
        config.program.push(ProgramWord { address: 8, instruction: 0x0000_0093 });
        config.program.push(ProgramWord { address: 0, instruction: 0x0000_0013 });
        let instrs = translate_program(&config);
        assert_eq!(instrs.len(), 2);
        assert_eq!(instrs[0].id, 0);
        assert_eq!(instrs[1].id, 8);
    }

    #[test]
    fn decode_keeps_destinations_within_register_count() {
        let word = ProgramWord { address: 0, instruction: u32::MAX };
        let instr = decode(&word, 32);
        assert!(instr.logical_dest < 32);
        assert!(instr.sources.iter().all(|&s| s < 32));
    }
}
