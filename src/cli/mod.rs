//! CLI commands and argument parsing

use crate::SyncConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// dx - keep a feature branch in sync with a shared integration branch
#[derive(Parser, Debug)]
#[command(name = "dx")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if dx was started in this directory
    #[arg(short = 'C', long = "repo", env = "DX_REPO", default_value = ".", global = true)]
    pub repo: PathBuf,

    /// Remote the target branch is refreshed from
    #[arg(long, env = "DX_REMOTE", default_value = "origin", global = true)]
    pub remote: String,

    /// Shared trunk branch (default: detect main, then master)
    #[arg(long, env = "DX_TRUNK", global = true)]
    pub trunk: Option<String>,

    /// Verbose output
    #[arg(short, long, alias = "debug", short_alias = 'd', global = true)]
    pub verbose: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Commit staged changes with a change-id trailer
    Commit {
        /// Commit message
        #[arg(short, long)]
        message: String,

        /// Use this change-id instead of generating one
        #[arg(long)]
        change_id: Option<String>,
    },

    /// Replay this branch's new commits onto a target branch
    Sync {
        /// Branch to sync into (e.g. dev)
        #[arg(required_unless_present = "continue", conflicts_with = "continue")]
        target: Option<String>,

        /// Continue a sync that stopped on a conflict
        #[arg(id = "continue", long = "continue")]
        cont: bool,
    },

    /// Regenerate conflicted lockfiles and module files
    #[command(visible_alias = "resolve")]
    ResolveConflict,

    /// Show trunk, branch and any suspended sync
    Status,

    /// Print the version
    Version,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Sync configuration from the global flags
    pub fn config(&self) -> SyncConfig {
        SyncConfig::with_repo_dir(&self.repo)
            .remote(&self.remote)
            .trunk(self.trunk.clone())
    }
}
