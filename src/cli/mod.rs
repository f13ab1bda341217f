//! Command-line interface for ocwatch
//!
//! This module defines the CLI structure using clap derive macros.
//! Each subcommand is defined in its own submodule.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{Config, CONFIG_FILE};
use crate::error::Result;
use crate::output::OutputOptions;
use crate::storage::DocumentStore;

mod naughty;
mod normalize;
mod run;
mod timeline;

/// ocwatch - faction activity and crime compliance tracker
///
/// Polls the faction roster and organized crimes, keeps per-member activity
/// timelines, and flags crime participants who held up a ready crime.
#[derive(Parser, Debug)]
#[command(name = "ocwatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, env = "OCWATCH_CONFIG", default_value = CONFIG_FILE)]
    pub config: PathBuf,

    /// Token for the github store backend
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Use the local store regardless of the configured backend
    #[arg(long, global = true)]
    pub local: bool,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll the faction API once and update every store
    Run {
        /// Torn API key
        #[arg(long, env = "API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Skip the randomized startup delay
        #[arg(long)]
        no_delay: bool,
    },

    /// Print the canonical status token for a raw status
    Normalize {
        /// Status description, e.g. "Traveling to Mexico"
        description: String,

        /// Member state: Okay, Traveling, Abroad, Hospital, Jail
        #[arg(long, default_value = "Okay")]
        state: String,

        /// Status details (hospital cause)
        #[arg(long)]
        details: Option<String>,

        /// Revive setting: "Everyone", "No one", or anything else for partial
        #[arg(long, default_value = "Everyone")]
        revive: String,
    },

    /// Show a member's activity timeline
    Timeline {
        /// Member id
        user_id: u64,

        /// Only show intervals overlapping this unix time onwards
        #[arg(long)]
        since: Option<i64>,
    },

    /// List naughty list entries
    Naughty {
        /// Only entries with participants still pending review
        #[arg(long)]
        pending: bool,

        /// Show at most this many entries, newest first
        #[arg(long)]
        limit: Option<usize>,
    },
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let output = OutputOptions {
            json: self.json,
            quiet: self.quiet,
        };
        let context = Context {
            config_path: self.config,
            github_token: self.github_token,
            force_local: self.local,
        };

        match self.command {
            Commands::Run { api_key, no_delay } => run::run(run::RunOptions {
                context,
                api_key,
                no_delay,
                output,
            }),
            Commands::Normalize {
                description,
                state,
                details,
                revive,
            } => normalize::run(normalize::NormalizeOptions {
                description,
                state,
                details,
                revive,
                output,
            }),
            Commands::Timeline { user_id, since } => timeline::run(timeline::TimelineOptions {
                context,
                user_id,
                since,
                output,
            }),
            Commands::Naughty { pending, limit } => naughty::run(naughty::NaughtyOptions {
                context,
                pending,
                limit,
                output,
            }),
        }
    }
}

/// Settings shared by every command that touches the stores.
#[derive(Debug)]
struct Context {
    config_path: PathBuf,
    github_token: Option<String>,
    force_local: bool,
}

impl Context {
    fn config(&self) -> Result<Config> {
        Config::load_or_default(&self.config_path)
    }

    fn store(&self, config: &Config) -> Result<DocumentStore> {
        DocumentStore::from_config(config, self.github_token.as_deref(), self.force_local)
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
