//! trajopt command-line front end.
//!
//! - `solve`: run a problem from a TOML file (or the built-in double
//!   integrator demo) and print the trajectory as a table or JSON
//! - `info`: print crate versions and the default problem file

mod report;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use trajopt_core::config::ProblemConfig;
use trajopt_core::traits::Dynamics;
use trajopt_ilqr::IlqrSolver;

use crate::report::Report;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// Finite-horizon iLQR trajectory optimizer.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a trajectory optimization problem.
    Solve {
        /// Problem file (TOML). Defaults to the double-integrator demo.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the result as JSON instead of a table.
        #[arg(long)]
        json: bool,

        /// Log every solver iteration (overridden by RUST_LOG).
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print crate information and the default problem.
    Info,
}

// ---------------------------------------------------------------------------
// Mode implementations
// ---------------------------------------------------------------------------

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_problem(path: Option<&Path>) -> Result<ProblemConfig> {
    match path {
        Some(path) => ProblemConfig::from_file(path)
            .with_context(|| format!("failed to load problem from {}", path.display())),
        None => Ok(ProblemConfig::default()),
    }
}

fn run_solve(config: Option<&Path>, json: bool) -> Result<()> {
    let problem = load_problem(config)?;
    let solver = IlqrSolver::from_problem(&problem)?;

    let start = Instant::now();
    let solution = solver.solve(&problem.initial_state(), &problem.goal())?;
    let elapsed = start.elapsed();

    let report = Report::new(solver.dynamics().name(), &problem, &solution, elapsed);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render_table());
    }
    Ok(())
}

fn run_info() -> Result<()> {
    println!("trajopt v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("crates:");
    println!("  trajopt-core  {}", trajopt_core::VERSION);
    println!("  trajopt-ilqr  {}", trajopt_ilqr::VERSION);
    println!();
    println!("default problem:");
    println!();
    print!("{}", toml::to_string_pretty(&ProblemConfig::default())?);
    Ok(())
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Solve {
            config,
            json,
            verbose,
        }) => {
            init_tracing(verbose);
            run_solve(config.as_deref(), json)
        }
        Some(Commands::Info) => run_info(),
        None => {
            init_tracing(false);
            run_solve(None, false)
        }
    }
}
