mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{cycle::CycleSubcommand, plan::PlanSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "remedy",
    about = "State-gated orchestrator for lint remediation and TDD cycles",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .remedy/ or .git/)
    #[arg(long, global = true, env = "REMEDY_ROOT")]
    root: Option<PathBuf>,

    /// Session id (independent sessions do not share state)
    #[arg(long, global = true, env = "REMEDY_SESSION", default_value = "default")]
    session: String,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize remedy in the current project
    Init,

    /// Run the analysis gate, categorize findings, and build a fresh plan
    Scan {
        /// Limit analysis to these files (repeatable; default: all)
        #[arg(long = "scope")]
        files: Vec<String>,
    },

    /// Show session status: plan, cycle, and the last gate run
    Status,

    /// Remediation plan controls
    Plan {
        #[command(subcommand)]
        subcommand: PlanSubcommand,
    },

    /// TDD cycle controls
    Cycle {
        #[command(subcommand)]
        subcommand: CycleSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Scan { files } => cmd::scan::run(&root, &cli.session, files, cli.json),
        Commands::Status => cmd::status::run(&root, &cli.session, cli.json),
        Commands::Plan { subcommand } => cmd::plan::run(&root, &cli.session, subcommand, cli.json),
        Commands::Cycle { subcommand } => {
            cmd::cycle::run(&root, &cli.session, subcommand, cli.json)
        }
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
