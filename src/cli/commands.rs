//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - plan: compose and schedule one cycle for a target
//! - simulate: run the scheduling loop against the in-process agent
//! - config: print the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// batchr - hack/grow/weaken batch scheduler
#[derive(Parser, Debug)]
#[command(name = "batchr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compose and schedule one cycle for a target and print its legs
    Plan {
        /// Target hostname (state comes from the snapshot store or the config)
        target: String,

        /// Hack mode (normal, xp-farm, stock-long, stock-short, share)
        #[arg(short, long)]
        mode: Option<String>,

        /// Player hacking skill
        #[arg(short, long)]
        skill: Option<u32>,

        /// Threads available (defaults to the agent's capacity)
        #[arg(short, long)]
        threads: Option<u32>,

        /// Agent whose cores apply (defaults to the target's agent)
        #[arg(short, long)]
        agent: Option<String>,

        /// Print the scheduled cycle as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the scheduling loop against the simulated agent
    Simulate {
        /// Number of ticks to run
        #[arg(short = 'n', long, default_value_t = 600)]
        ticks: u64,

        /// Delay between a launch request and the leg becoming runnable
        #[arg(long, default_value_t = 0)]
        launch_delay_ms: u64,
    },

    /// Print the effective configuration as YAML
    Config,
}
