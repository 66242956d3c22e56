//! Microarchitecture simulator CLI.
//!
//! A thin `clap`-derived front end over [`uarchsim_core`]: load a JSON
//! configuration document, build a [`Simulator`], run it to completion,
//! and print the resulting counters.

use std::path::PathBuf;
use std::{fs, process};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use uarchsim_core::config::Config;
use uarchsim_core::sim::Simulator;
use uarchsim_core::stats::STATS_SECTIONS;

#[derive(Parser, Debug)]
#[command(
    name = "uarchsim",
    author,
    version,
    about = "Cycle-accurate discrete-event microarchitecture simulator",
    long_about = "Run a parametric out-of-order pipeline described by a JSON configuration \
document.\n\nExample:\n  uarchsim run --config examples/tiny.json --max-cycles 10000"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build and run a simulation from a configuration document.
    Run {
        /// Path to a JSON configuration document. Omit for the built-in
        /// default configuration (no program loaded).
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Overrides `general.max_cycles` from the configuration document.
        #[arg(long)]
        max_cycles: Option<u64>,

        /// Enables structured trace-record capture for this run
        /// (overrides `general.enable_tracing`).
        #[arg(long)]
        trace: bool,

        /// Restrict the printed report to these sections (summary,
        /// dispatch, rob, regfile, connections). Default: all.
        #[arg(long = "section")]
        sections: Vec<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    match cli.command {
        Commands::Run { config, max_cycles, trace, sections } => {
            cmd_run(config, max_cycles, trace, &sections);
        }
    }
}

/// Initializes `tracing`-crate diagnostic logging from `RUST_LOG`,
/// defaulting to `warn` when unset. Distinct from the simulator's own
/// structured `TraceRecord` stream (`uarchsim_core::trace`).
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn cmd_run(config_path: Option<PathBuf>, max_cycles: Option<u64>, trace: bool, sections: &[String]) {
    let mut config = match config_path {
        Some(ref path) => load_config(path),
        None => Config::default(),
    };

    if let Some(cycles) = max_cycles {
        config.general.max_cycles = cycles;
    }
    if trace {
        config.general.enable_tracing = true;
    }

    println!("uarchsim: {} instructions loaded, max_cycles={}", config.program.len(), config.general.max_cycles);

    let mut sim = match Simulator::new(&config) {
        Ok(sim) => sim,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    let stats = sim.run();

    if sections.is_empty() {
        stats.print();
    } else {
        for section in sections {
            if !STATS_SECTIONS.contains(&section.as_str()) {
                eprintln!("warning: unknown section {section:?}, skipping");
            }
        }
        stats.print_sections(sections);
    }
}

fn load_config(path: &PathBuf) -> Config {
    let text = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("error reading {}: {e}", path.display());
        process::exit(1);
    });
    serde_json::from_str(&text).unwrap_or_else(|e| {
        eprintln!("error parsing {}: {e}", path.display());
        process::exit(1);
    })
}
