//! LDOS command-line interface.
//!
//! Run sweeps from TOML job files:
//! ```sh
//! ldos-cli run job.toml
//! ldos-cli validate job.toml
//! ldos-cli materials
//! ```

mod config;
mod runner;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use ldos_materials::{MaterialRegistry, OMEGA_UNIT_RAD_PER_S};

#[derive(Parser)]
#[command(name = "ldos-cli")]
#[command(about = "Bloch-resolved local density of electromagnetic states")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an (Omega, kBloch) sweep from a TOML job file.
    Run {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Output directory (overrides config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check a job file and build its geometry without evaluating anything.
    Validate {
        /// Path to the job configuration file.
        config: PathBuf,
    },
    /// List the built-in materials.
    Materials,
}

fn job_dir(config: &Path) -> PathBuf {
    config
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, output } => {
            println!("LDOS Solver");
            println!("===========");
            let job = config::load_config(&config)?;
            println!("Configuration: {}", config.display());

            let out_dir = output.unwrap_or_else(|| PathBuf::from(&job.output.directory));
            let report = runner::run_job(&job, &job_dir(&config), &out_dir)?;

            for file in &report.files {
                println!("  wrote {}", file.display());
            }
            if report.skipped > 0 {
                println!("  {} point(s) skipped (singular system matrix)", report.skipped);
            }
            println!("Run complete: {} evaluation(s).", report.evaluations);
            Ok(())
        }
        Commands::Validate { config } => {
            let job = config::load_config(&config)?;
            let prepared = runner::prepare(&job, &job_dir(&config))?;
            println!("Configuration is valid: {}", config.display());
            println!(
                "  {} frequencies x {} Bloch vector(s), {} assembly",
                prepared.omegas.len(),
                prepared.k_points.len(),
                prepared.solver.strategy().name()
            );
            Ok(())
        }
        Commands::Materials => {
            let registry = MaterialRegistry::with_builtins()?;
            println!("Available materials (Omega in units of {:.4e} rad/s):", OMEGA_UNIT_RAD_PER_S);
            println!();
            for id in registry.ids() {
                let material = registry.get(id)?;
                println!("  {:<12} {}", id, material.name());
            }
            println!();
            println!("Define further materials with [[material]] entries in the job file.");
            Ok(())
        }
    }
}
