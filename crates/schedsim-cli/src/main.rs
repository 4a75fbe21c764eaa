use anyhow::Context;
use clap::{Parser, Subcommand};
use log::debug;
use schedsim_kernel::event::Tee;
use schedsim_kernel::{EventTally, LogSink};
use schedsim_runtime::{Simulation, SimulationConfig};
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a randomly generated workload through the MLFQ scheduler
    Run {
        /// Stop after this many ticks
        #[arg(long, default_value_t = 100_000)]
        max_ticks: u64,

        /// Ceiling on processes admitted over the run
        #[arg(long, default_value_t = 300)]
        max_processes: usize,

        /// Percent chance per tick of admitting a new pair
        #[arg(long, default_value_t = 5)]
        admit_chance: u32,

        /// Percent chance per poll that blocked I/O completes
        #[arg(long, default_value_t = 10)]
        io_chance: u32,

        /// Percent of shared-resource pairs built with crossed lock order
        #[arg(long, default_value_t = 25)]
        deadlock_chance: u32,

        /// Wall-clock microseconds per quantum unit
        #[arg(long, default_value_t = 1)]
        quantum_us: u64,

        #[arg(long, default_value_t = 0x5eed)]
        seed: u64,

        /// Count scheduler events by kind and print the tally
        #[arg(long)]
        trace_summary: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Run {
            max_ticks,
            max_processes,
            admit_chance,
            io_chance,
            deadlock_chance,
            quantum_us,
            seed,
            trace_summary,
        } => {
            let mut config = SimulationConfig {
                max_ticks,
                max_processes,
                admit_chance,
                io_completion_chance: io_chance,
                quantum_unit: Duration::from_micros(quantum_us),
                ..SimulationConfig::default()
            }
            .with_seed(seed);
            config.workload.deadlock_chance = deadlock_chance;
            debug!("{:#?}", config);

            println!(
                "Starting scheduler: up to {} processes over {} ticks (seed {:#x})",
                max_processes, max_ticks, seed
            );

            let mut simulation =
                Simulation::new(config).context("failed to set up the simulation")?;
            let tally = EventTally::new();
            if trace_summary {
                simulation = simulation.with_sink(Tee(LogSink, tally.clone()));
            }

            let summary = simulation.run().context("simulation aborted")?;
            println!("{}", summary);

            if trace_summary {
                println!("Events:");
                for (kind, count) in tally.counts() {
                    println!("  {:<16} {}", kind, count);
                }
            }
        }
    }

    Ok(())
}
