//! Run-time statistics collection and reporting (spec.md §6, addition).
//!
//! Unlike a real RISC-V core's reporting, which tracks instruction mix,
//! branch prediction, and cache hierarchy, this crate has no
//! functional-correctness scope: there is no instruction mix, no branch
//! predictor, no cache to report on. What remains is the handful of
//! counters the backend, register file, and connections already expose,
//! gathered into one place for the CLI to print.

use std::time::Instant;

/// Aggregate run counters, sourced from [`crate::backend::Backend`],
/// [`crate::regfile::RegisterFile`], and the wired connections.
#[derive(Debug, Clone)]
pub struct Stats {
    start_time: Instant,
    /// Total simulated cycles elapsed.
    pub cycles: u64,
    /// Micro-ops successfully dispatched.
    pub dispatched: u64,
    /// Micro-ops that finished executing.
    pub executed: u64,
    /// Instructions retired (including trapping ones).
    pub retired: u64,
    /// Cycles where a hazard blocked further dispatch issue.
    pub stall_cycles: u64,
    /// Register-write conflicts resolved by first-writer-wins.
    pub conflicts: u64,
    /// Register reads satisfied via scoreboard forwarding.
    pub forwards: u64,
    /// Packets successfully delivered across tracked connections.
    pub transfers: u64,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            start_time: Instant::now(),
            cycles: 0,
            dispatched: 0,
            executed: 0,
            retired: 0,
            stall_cycles: 0,
            conflicts: 0,
            forwards: 0,
            transfers: 0,
        }
    }
}

/// Section names accepted by [`Stats::print_sections`].
pub const STATS_SECTIONS: &[&str] = &["summary", "dispatch", "rob", "regfile", "connections"];

impl Stats {
    /// Instructions retired per cycle, guarding against a zero-cycle run.
    #[must_use]
    pub fn ipc(&self) -> f64 {
        self.retired as f64 / self.cycles.max(1) as f64
    }

    /// Prints only the requested sections to stdout; an empty slice prints
    /// all of them.
    pub fn print_sections(&self, sections: &[String]) {
        let want = |s: &str| sections.is_empty() || sections.iter().any(|x| x == s);
        let seconds = self.start_time.elapsed().as_secs_f64();
        let cycles = self.cycles.max(1);

        if want("summary") {
            let khz = (self.cycles as f64 / seconds.max(f64::EPSILON)) / 1000.0;
            println!("==========================================================");
            println!("SIMULATION STATISTICS");
            println!("==========================================================");
            println!("host_seconds             {seconds:.4} s");
            println!("sim_cycles               {}", self.cycles);
            println!("sim_freq                 {khz:.2} kHz");
            println!("sim_retired              {}", self.retired);
            println!("sim_ipc                  {:.4}", self.ipc());
            println!("----------------------------------------------------------");
        }
        if want("dispatch") {
            println!("DISPATCH / EXECUTE");
            println!("  dispatched             {}", self.dispatched);
            println!("  executed               {}", self.executed);
            println!(
                "  stall_cycles           {} ({:.2}%)",
                self.stall_cycles,
                (self.stall_cycles as f64 / cycles as f64) * 100.0
            );
            println!("----------------------------------------------------------");
        }
        if want("rob") {
            println!("RETIREMENT");
            println!("  retired                {}", self.retired);
            println!("----------------------------------------------------------");
        }
        if want("regfile") {
            println!("REGISTER FILE");
            println!("  conflicts              {}", self.conflicts);
            println!("  forwards               {}", self.forwards);
            println!("----------------------------------------------------------");
        }
        if want("connections") {
            println!("CONNECTIONS");
            println!("  transfers              {}", self.transfers);
        }
        println!("==========================================================");
    }

    /// Prints every section. Equivalent to `print_sections(&[])`.
    pub fn print(&self) {
        self.print_sections(&[]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipc_is_zero_for_a_fresh_run() {
        assert_eq!(Stats::default().ipc(), 0.0);
    }

    #[test]
    fn ipc_divides_retired_by_cycles() {
        let mut stats = Stats::default();
        stats.cycles = 100;
        stats.retired = 50;
        assert!((stats.ipc() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn ipc_never_divides_by_zero_cycles() {
        let mut stats = Stats::default();
        stats.retired = 10;
        assert_eq!(stats.ipc(), 10.0);
    }
}
