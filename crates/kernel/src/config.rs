//! Configuration system for the microarchitecture simulator.
//!
//! This module defines the structured configuration document described in
//! spec.md §6. It provides:
//! 1. **Defaults:** baseline parameters (issue width, register file shape,
//!    functional-unit latencies, vector geometry).
//! 2. **Structures:** one `#[derive(Deserialize)]` struct per concern, each
//!    with a `defaults` submodule plus per-field `#[serde(default = "...")]`.
//! 3. **Validation:** `Config::validate` checks every range named in
//!    spec.md §7 ("Configuration" error category) at construction time,
//!    rather than via `assert!`.
//!
//! Configuration is supplied as JSON (no TOML files) via `serde_json`,
//! whether it arrives from the CLI's `--config file.json`, a test fixture,
//! or an embedded host. The kernel itself is agnostic to this format: it
//! only ever consumes an already validated, in-memory `Config`.

use serde::Deserialize;

use crate::common::error::{SimError, SimResult};

/// Default configuration constants.
///
/// These values define the baseline parameterization when a field is
/// omitted from the input JSON document.
mod defaults {
    /// Instructions dispatchable per cycle (`num_instruction_lanes`).
    pub const NUM_INSTRUCTION_LANES: usize = 2;

    /// Architectural register count.
    pub const NUM_REGISTERS: usize = 32;
    /// Register-file read ports.
    pub const NUM_READ_PORTS: usize = 4;
    /// Register-file write ports.
    pub const NUM_WRITE_PORTS: usize = 4;
    /// Register bit-width.
    pub const REG_WIDTH: u8 = 64;

    /// Arithmetic (add/sub-class) latency, cycles.
    pub const ARITHMETIC_PERIOD: u64 = 2;
    /// Logical (and/or/xor-class) latency, cycles.
    pub const LOGICAL_PERIOD: u64 = 1;
    /// Shift latency, cycles.
    pub const SHIFT_PERIOD: u64 = 2;
    /// Compare latency, cycles.
    pub const COMPARE_PERIOD: u64 = 1;
    /// Number of parallel branch units.
    pub const NUM_BRANCH_UNITS: usize = 1;

    /// Vector register length in bits.
    pub const VLEN: u32 = 128;
    /// Configured vector length in elements.
    pub const VL: u32 = 4;
    /// Selected element width in bits (SEW).
    pub const SEW: u32 = 32;
    /// Register-group multiplier (LMUL).
    pub const LMUL: u32 = 1;

    /// Upper bound on simulated cycles, a safety net against a
    /// misconfigured graph that never drains its event queue.
    pub const MAX_CYCLES: u64 = 1_000_000;

    /// Maximum addressable data-memory bound in bytes (bound only — no
    /// backing store is modeled, per spec.md §1's scope cut).
    pub const DATA_MEMORY_SIZE: u64 = 16 * 1024 * 1024;
}

/// Instruction-issue and branch-unit shape.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    /// How many instructions may be dispatched per cycle.
    #[serde(default = "GeneralConfig::default_lanes")]
    pub num_instruction_lanes: usize,

    /// Upper bound on simulated cycles (`run`'s `max_time`).
    #[serde(default = "GeneralConfig::default_max_cycles")]
    pub max_cycles: u64,

    /// Whether the kernel emits structured `TraceRecord`s at all. When
    /// false, the `Simulator` wires a `NullSink` regardless of
    /// `trace_output`.
    #[serde(default)]
    pub enable_tracing: bool,

    /// Free-form sink identifier (e.g. a file path); the core only ever
    /// sees it as an opaque string and never opens it itself — the CLI
    /// is responsible for turning it into a concrete `TraceSink`.
    #[serde(default)]
    pub trace_output: Option<String>,

    /// Emit `tracing::debug!`-level detail in addition to `trace!`.
    #[serde(default)]
    pub verbose: bool,
}

impl GeneralConfig {
    fn default_lanes() -> usize {
        defaults::NUM_INSTRUCTION_LANES
    }

    fn default_max_cycles() -> u64 {
        defaults::MAX_CYCLES
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            num_instruction_lanes: defaults::NUM_INSTRUCTION_LANES,
            max_cycles: defaults::MAX_CYCLES,
            enable_tracing: false,
            trace_output: None,
            verbose: false,
        }
    }
}

/// Register-file dimensions and feature flags.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterFileConfig {
    /// Architectural register count, `1..=256`.
    #[serde(default = "RegisterFileConfig::default_num_registers")]
    pub num_registers: usize,
    /// Read ports, one address+data port pair each.
    #[serde(default = "RegisterFileConfig::default_read_ports")]
    pub num_read_ports: usize,
    /// Write ports, one address+data+mask port triple each.
    #[serde(default = "RegisterFileConfig::default_write_ports")]
    pub num_write_ports: usize,
    /// Register bit-width, `32` or `64`.
    #[serde(default = "RegisterFileConfig::default_width")]
    pub reg_width: u8,
    /// Whether a scoreboard hit on read bumps the `forwards` counter.
    #[serde(default = "RegisterFileConfig::default_true")]
    pub use_regfile_forwarding: bool,
    /// Whether the scoreboard is tracked at all.
    #[serde(default = "RegisterFileConfig::default_true")]
    pub enable_scoreboard: bool,
    /// Whether the debug read/write port pair is wired.
    #[serde(default)]
    pub enable_debug_port: bool,
}

impl RegisterFileConfig {
    fn default_num_registers() -> usize {
        defaults::NUM_REGISTERS
    }

    fn default_read_ports() -> usize {
        defaults::NUM_READ_PORTS
    }

    fn default_write_ports() -> usize {
        defaults::NUM_WRITE_PORTS
    }

    fn default_width() -> u8 {
        defaults::REG_WIDTH
    }

    fn default_true() -> bool {
        true
    }
}

impl Default for RegisterFileConfig {
    fn default() -> Self {
        Self {
            num_registers: defaults::NUM_REGISTERS,
            num_read_ports: defaults::NUM_READ_PORTS,
            num_write_ports: defaults::NUM_WRITE_PORTS,
            reg_width: defaults::REG_WIDTH,
            use_regfile_forwarding: true,
            enable_scoreboard: true,
            enable_debug_port: false,
        }
    }
}

/// Per-opcode-category execute latency and branch-unit count.
///
/// The concrete arithmetic/logic/branch/divide operation tables are out of
/// scope (spec.md §1): these are opaque `<unit>_period` latency lookups.
#[derive(Debug, Clone, Deserialize)]
pub struct FunctionalUnitConfig {
    /// Arithmetic category latency, cycles.
    #[serde(default = "FunctionalUnitConfig::default_arithmetic")]
    pub arithmetic_period: u64,
    /// Logical category latency, cycles.
    #[serde(default = "FunctionalUnitConfig::default_logical")]
    pub logical_period: u64,
    /// Shift category latency, cycles.
    #[serde(default = "FunctionalUnitConfig::default_shift")]
    pub shift_period: u64,
    /// Compare category latency, cycles.
    #[serde(default = "FunctionalUnitConfig::default_compare")]
    pub compare_period: u64,
    /// Number of parallel branch units (affects structural hazard checks
    /// for branch-category micro-ops).
    #[serde(default = "FunctionalUnitConfig::default_branch_units")]
    pub num_branch_units: usize,
}

impl FunctionalUnitConfig {
    fn default_arithmetic() -> u64 {
        defaults::ARITHMETIC_PERIOD
    }

    fn default_logical() -> u64 {
        defaults::LOGICAL_PERIOD
    }

    fn default_shift() -> u64 {
        defaults::SHIFT_PERIOD
    }

    fn default_compare() -> u64 {
        defaults::COMPARE_PERIOD
    }

    fn default_branch_units() -> usize {
        defaults::NUM_BRANCH_UNITS
    }
}

impl Default for FunctionalUnitConfig {
    fn default() -> Self {
        Self {
            arithmetic_period: defaults::ARITHMETIC_PERIOD,
            logical_period: defaults::LOGICAL_PERIOD,
            shift_period: defaults::SHIFT_PERIOD,
            compare_period: defaults::COMPARE_PERIOD,
            num_branch_units: defaults::NUM_BRANCH_UNITS,
        }
    }
}

/// Vector-backend element geometry (`vlen`, `vl`, `sew`, `lmul`).
#[derive(Debug, Clone, Deserialize)]
pub struct VectorConfig {
    /// Vector register length in bits.
    #[serde(default = "VectorConfig::default_vlen")]
    pub vlen: u32,
    /// Configured vector length in elements.
    #[serde(default = "VectorConfig::default_vl")]
    pub vl: u32,
    /// Selected element width in bits.
    #[serde(default = "VectorConfig::default_sew")]
    pub sew: u32,
    /// Register-group multiplier.
    #[serde(default = "VectorConfig::default_lmul")]
    pub lmul: u32,
}

impl VectorConfig {
    fn default_vlen() -> u32 {
        defaults::VLEN
    }

    fn default_vl() -> u32 {
        defaults::VL
    }

    fn default_sew() -> u32 {
        defaults::SEW
    }

    fn default_lmul() -> u32 {
        defaults::LMUL
    }
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            vlen: defaults::VLEN,
            vl: defaults::VL,
            sew: defaults::SEW,
            lmul: defaults::LMUL,
        }
    }
}

/// Data-memory size bound. No backing store is modeled (spec.md §1): this
/// exists only so a loader or demo memory stage can reject an
/// out-of-bounds address the same way real hardware tie-off would.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    /// Maximum addressable data-memory offset, in bytes.
    #[serde(default = "MemoryConfig::default_size")]
    pub data_memory_size: u64,
}

impl MemoryConfig {
    fn default_size() -> u64 {
        defaults::DATA_MEMORY_SIZE
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            data_memory_size: defaults::DATA_MEMORY_SIZE,
        }
    }
}

/// One `(address, 32-bit encoded instruction)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ProgramWord {
    /// Byte address of this instruction.
    pub address: u64,
    /// 32-bit encoded instruction. The concrete decode table is out of
    /// scope (spec.md §1); the loader carries it opaquely.
    pub instruction: u32,
}

/// One `(base address, word list)` initial data-memory region.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DataRegion {
    /// Byte address of the region's first word.
    pub address: u64,
    /// Consecutive 32-bit words starting at `address`.
    pub words: Vec<u32>,
}

/// Root configuration document.
///
/// Supplied by an embedding host or the CLI as JSON via `serde_json`; the
/// core itself only ever consumes the resulting struct, already validated
/// by [`Config::validate`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Issue width, cycle bound, and tracing knobs.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Register-file shape.
    #[serde(default)]
    pub register_file: RegisterFileConfig,
    /// Functional-unit latencies.
    #[serde(default)]
    pub functional_units: FunctionalUnitConfig,
    /// Vector element geometry.
    #[serde(default)]
    pub vector: VectorConfig,
    /// Data-memory bounds.
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Program image (address, instruction) pairs.
    #[serde(default)]
    pub program: Vec<ProgramWord>,
    /// Initial data memory (address, word-list) regions.
    #[serde(default)]
    pub initial_data: Vec<DataRegion>,
}

impl Config {
    /// Validates every range named in spec.md §7's "Configuration" error
    /// category. Fatal to simulation start: returned as `Err`, never a
    /// panic.
    pub fn validate(&self) -> SimResult<()> {
        let regs = self.register_file.num_registers;
        if regs == 0 || regs > 256 {
            return Err(SimError::Configuration(format!(
                "num_registers must be in 1..=256, got {regs}"
            )));
        }
        if !matches!(self.register_file.reg_width, 32 | 64) {
            return Err(SimError::Configuration(format!(
                "reg_width must be 32 or 64, got {}",
                self.register_file.reg_width
            )));
        }
        if self.register_file.num_read_ports == 0 {
            return Err(SimError::Configuration(
                "num_read_ports must be at least 1".to_string(),
            ));
        }
        if self.register_file.num_write_ports == 0 {
            return Err(SimError::Configuration(
                "num_write_ports must be at least 1".to_string(),
            ));
        }
        if self.general.num_instruction_lanes == 0 {
            return Err(SimError::Configuration(
                "num_instruction_lanes must be at least 1".to_string(),
            ));
        }
        if self.vector.vlen == 0 || self.vector.sew == 0 || self.vector.lmul == 0 {
            return Err(SimError::Configuration(
                "vlen, sew, and lmul must all be nonzero".to_string(),
            ));
        }
        for word in &self.program {
            if word.address >= self.memory.data_memory_size {
                return Err(SimError::Configuration(format!(
                    "program word at {:#x} exceeds data_memory_size {:#x}",
                    word.address, self.memory.data_memory_size
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_registers() {
        let mut config = Config::default();
        config.register_file.num_registers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_register_count_above_256() {
        let mut config = Config::default();
        config.register_file.num_registers = 257;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bad_register_width() {
        let mut config = Config::default();
        config.register_file.reg_width = 48;
        assert!(config.validate().is_err());
    }

    #[test]
    fn deserializes_from_json_with_defaults() {
        let json = r#"{
            "general": { "num_instruction_lanes": 4 },
            "register_file": { "num_registers": 64 }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.general.num_instruction_lanes, 4);
        assert_eq!(config.register_file.num_registers, 64);
        assert_eq!(config.register_file.num_read_ports, defaults::NUM_READ_PORTS);
        assert!(config.validate().is_ok());
    }
}
