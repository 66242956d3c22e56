//! `uarchsim-core`: a cycle-accurate, event-driven simulator for parametric
//! hardware microarchitectures.
//!
//! The crate is organized bottom-up, the way the modeled hardware is built:
//! 1. **Kernel:** [`event`], the time-ordered, priority-tiered event queue
//!    that drives all progress.
//! 2. **Wiring primitives:** [`packet`] (the closed payload union),
//!    [`port`] and [`component`] (named slots and entities), and
//!    [`connection`] (the flow-control variants that move packets between
//!    ports).
//! 3. **Modeling primitives:** [`pipeline`] (the N-stage, stall/latency
//!    abstraction) and [`regfile`] (the multi-ported register file with
//!    scoreboard and forwarding).
//! 4. **A representative client:** [`backend`], a reorder-buffer-based
//!    out-of-order execution pipeline (dispatch / execute / retire) built
//!    entirely out of the above primitives.
//! 5. **Ambient stack:** [`common`] (time and error types), [`config`]
//!    (the configuration document), [`loader`] (program/data-memory
//!    ingestion), [`stats`] (run counters), and [`trace`] (the structured
//!    trace sink).

/// Common types shared throughout the crate: simulation time, error taxonomy.
pub mod common;
/// Configuration document and validation.
pub mod config;
/// The discrete-event scheduler.
pub mod event;
/// Data packet model: the closed union of payloads ports carry.
pub mod packet;
/// Named input/output slots on a component.
pub mod port;
/// The `Component` and `TickingComponent` traits, and a port-set helper.
pub mod component;
/// Connection framework and its flow-control variants.
pub mod connection;
/// The N-stage pipeline abstraction with stall predicates and latency.
pub mod pipeline;
/// Multi-ported register file with scoreboard and write forwarding.
pub mod regfile;
/// Reorder-buffer-based out-of-order execution backend.
pub mod backend;
/// Program image and initial data memory ingestion.
pub mod loader;
/// Run-time statistics (dispatched, retired, executed, stalls, ...).
pub mod stats;
/// Structured trace output, independent of `tracing`-crate logging.
pub mod trace;
/// Top-level wiring: a register file and backend assembled from a
/// `Config`, ready to run.
pub mod sim;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// The discrete-event scheduler.
pub use crate::event::EventKernel;
/// Error taxonomy and result alias.
pub use crate::common::{SimError, SimResult};
/// Simulation time.
pub use crate::common::SimTime;
/// Top-level simulation wiring, built from a `Config`.
pub use crate::sim::{Simulator, TraceMode};
