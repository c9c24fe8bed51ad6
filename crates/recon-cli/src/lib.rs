//! Recon CLI
//!
//! Command-line front end over [`recon_core`]: normalize a raw grid, resolve
//! a snapshot's identity, reconcile one snapshot, hydrate a batch.
//!
//! # Core Concepts
//!
//! - [`Cli`] / [`Command`]: `clap` argument model
//! - [`run`]: dispatch, returning the JSON document to print
//! - Logs go to stderr so stdout stays machine-readable
//!
//! # Example
//!
//! ```rust
//! use clap::Parser;
//! use recon_cli::{Cli, Command};
//!
//! let cli = Cli::try_parse_from(["recon", "normalize", "grid.json"]).unwrap();
//! assert!(matches!(cli.command, Command::Normalize { .. }));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use recon_core::WorkflowStage;
use serde_json::Value;

mod commands;

pub use commands::{hydrate, load_config, load_masters, normalize, read_json, reconcile, resolve};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// recon - issue snapshot reconciliation
#[derive(Parser, Debug)]
#[command(name = "recon")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Engine configuration file (.toml or .json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Convert a raw or legacy grid (or a snapshot's grid) to canonical form
    Normalize {
        /// Grid payload or snapshot record
        input: PathBuf,
    },

    /// Print the identity a snapshot resolves to
    Resolve {
        /// JSON array of master templates
        #[arg(long)]
        masters: PathBuf,
        /// Snapshot record
        snapshot: PathBuf,
    },

    /// Rebuild one snapshot against the masters and print the result
    Reconcile {
        /// JSON array of master templates
        #[arg(long)]
        masters: PathBuf,
        /// Workflow stage (draft, finalized, view)
        #[arg(long, default_value = "draft")]
        stage: WorkflowStage,
        /// Snapshot record
        snapshot: PathBuf,
    },

    /// Hydrate a JSON array of snapshots as one case
    Hydrate {
        /// JSON array of master templates
        #[arg(long)]
        masters: PathBuf,
        /// Workflow stage (draft, finalized, view)
        #[arg(long, default_value = "draft")]
        stage: WorkflowStage,
        /// Case identifier used in logs and the report
        #[arg(long, default_value = "CASE")]
        case_id: String,
        /// JSON array of snapshot records
        snapshots: PathBuf,
    },
}

/// Execute `cli`, returning the document to print
pub fn run(cli: &Cli) -> Result<Value> {
    let config = load_config(cli.config.as_deref())?;
    match &cli.command {
        Command::Normalize { input } => normalize(input, &config),
        Command::Resolve { masters, snapshot } => resolve(masters, snapshot, config),
        Command::Reconcile {
            masters,
            stage,
            snapshot,
        } => reconcile(masters, snapshot, *stage, config),
        Command::Hydrate {
            masters,
            stage,
            case_id,
            snapshots,
        } => hydrate(masters, snapshots, *stage, case_id, config),
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "recon",
            "reconcile",
            "--masters",
            "m.json",
            "--stage",
            "finalized",
            "s.json",
            "--log-json",
        ])
        .unwrap();
        assert!(cli.log_json);
        match cli.command {
            Command::Reconcile { stage, .. } => assert_eq!(stage, WorkflowStage::Finalized),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_stage() {
        assert!(Cli::try_parse_from(["recon", "hydrate", "--masters", "m", "--stage", "archived", "s"]).is_err());
    }
}
