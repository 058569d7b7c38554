//! # Blueprint CLI Module
//!
//! This module implements the CLI interface for blueprint.
//!
//! ## Available Commands
//!
//! - `validate` - Validate a blueprint file
//! - `evaluate` - Evaluate intrinsic functions in a payload file
//! - `versions` - List supported definitions versions
//! - `server` - Start the HTTP server

mod commands;

use crate::config::AppConfig;
use blueprint_core::{BlueprintError, EvaluationContext};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Blueprint - function evaluation and policy validation for deployment templates
#[derive(Parser, Debug)]
#[command(name = "blueprint")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a blueprint (YAML or JSON)
    Validate {
        /// Path to the blueprint file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Evaluate intrinsic functions in a payload
    Evaluate {
        /// Path to the payload file (YAML or JSON)
        #[arg(short, long)]
        payload: PathBuf,

        /// Path to the topology snapshot (YAML or JSON)
        #[arg(short, long)]
        topology: Option<PathBuf>,

        /// Node id bound to SELF
        #[arg(long = "self")]
        self_node: Option<String>,

        /// Node id bound to SOURCE
        #[arg(long)]
        source: Option<String>,

        /// Node id bound to TARGET
        #[arg(long)]
        target: Option<String>,
    },

    /// List supported definitions versions and their features
    Versions,

    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), BlueprintError> {
    let config = AppConfig::load(cli.config.as_deref())?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Validate { file }) => cmd_validate(&config, &file, json_mode),
        Some(Commands::Evaluate {
            payload,
            topology,
            self_node,
            source,
            target,
        }) => {
            let context = EvaluationContext {
                self_node,
                source,
                target,
            };
            cmd_evaluate(&payload, topology.as_deref(), &context, json_mode)
        }
        Some(Commands::Server { host, port }) => cmd_server(config.with_cli(host, port)).await,
        Some(Commands::Versions) | None => cmd_versions(json_mode),
    }
}

// =============================================================================
// TESTS
// =============================================================================
