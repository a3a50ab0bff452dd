//! CLI argument definitions using clap
//!
//! Commands:
//! - scenariotree check --bundle <path>
//! - scenariotree replay --config <path> --tenant <id> --scenario <uuid> [--up-to <n>]
//! - scenariotree audit --config <path> --tenant <id> --scenario <uuid>
//! - scenariotree serve --config <path> [--bundle <path>]... [--tenant <id>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

/// scenariotree - event-sourced question trees
#[derive(Parser, Debug)]
#[command(name = "scenariotree")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a tree bundle without serving it
    Check {
        /// Path to the bundle file
        #[arg(long)]
        bundle: PathBuf,

        /// Tenant the bundle is checked as
        #[arg(long, default_value = "default")]
        tenant: String,
    },

    /// Project a scenario from the journal and print its state
    Replay {
        /// Path to configuration file
        #[arg(long, default_value = "./scenariotree.json")]
        config: PathBuf,

        #[arg(long)]
        tenant: String,

        #[arg(long)]
        scenario: Uuid,

        /// Stop after this version
        #[arg(long)]
        up_to: Option<u64>,
    },

    /// Print a scenario's events as JSON lines
    Audit {
        /// Path to configuration file
        #[arg(long, default_value = "./scenariotree.json")]
        config: PathBuf,

        #[arg(long)]
        tenant: String,

        #[arg(long)]
        scenario: Uuid,
    },

    /// Install bundles and start the HTTP server
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = "./scenariotree.json")]
        config: PathBuf,

        /// Bundles to install before serving
        #[arg(long)]
        bundle: Vec<PathBuf>,

        /// Tenant the bundles are installed for
        #[arg(long, default_value = "default")]
        tenant: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
