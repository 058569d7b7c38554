//! # Blueprint
//!
//! The main binary for blueprint function evaluation and policy validation.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for validation and evaluation
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │           apps/blueprint (THE BINARY)         │
//! │                                               │
//! │  ┌─────────────┐        ┌─────────────┐       │
//! │  │   CLI       │        │   HTTP API  │       │
//! │  │  (clap)     │        │   (axum)    │       │
//! │  └──────┬──────┘        └──────┬──────┘       │
//! │         └───────────┬──────────┘              │
//! │                     ▼                         │
//! │            ┌────────────────┐                 │
//! │            │ blueprint-core │                 │
//! │            │  (THE LOGIC)   │                 │
//! │            └────────────────┘                 │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! blueprint server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! blueprint validate -f blueprint.yaml
//! blueprint evaluate -p inputs.yaml -t topology.json --self vm
//! blueprint versions --json-mode
//! ```

use blueprint::cli;
use blueprint::config::LOG_FORMAT_ENV;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // BLUEPRINT_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var(LOG_FORMAT_ENV).unwrap_or_else(|_| "text".to_string());
    let default_filter = if cli.verbose {
        "blueprint=debug,blueprint_core=debug,tower_http=debug"
    } else {
        "blueprint=info,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        match e.code() {
            Some(code) => tracing::error!(code, "Error: {}", e),
            None => tracing::error!("Error: {}", e),
        }
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
  ┌┐ ┬  ┬ ┬┌─┐┌─┐┬─┐┬┌┐┌┌┬┐
  ├┴┐│  │ │├┤ ├─┘├┬┘││││ │
  └─┘┴─┘└─┘└─┘┴  ┴└─┴┘└┘ ┴

  Blueprint v{}

  Evaluate • Merge • Validate
"#,
        env!("CARGO_PKG_VERSION")
    );
}
