// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Costwise - quota- and cost-aware model routing.
//!
//! This is the binary entry point. It inspects routing decisions and
//! spend against the persisted ledgers; it never calls a provider.

mod context;
mod report;
mod select;
mod show_config;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use costwise_config::model::CostwiseConfig;
use costwise_core::{CostwiseError, TaskCategory};

/// Costwise - quota- and cost-aware model routing.
#[derive(Parser, Debug)]
#[command(name = "costwise", version, about, long_about = None)]
struct Cli {
    /// Load this config file instead of the standard lookup.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Evaluate the ledgers as of this date (YYYY-MM-DD) instead of today.
    #[arg(long, global = true)]
    as_of: Option<NaiveDate>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the model a task would be routed to right now.
    Select {
        /// Task category, e.g. `simple-text` or `vision-analysis`.
        category: TaskCategory,
        /// The request carries an image.
        #[arg(long)]
        image: bool,
        #[arg(long)]
        json: bool,
    },
    /// Estimate what a task would cost without recording anything.
    Estimate {
        category: TaskCategory,
        #[arg(long)]
        image: bool,
        /// Expected prompt size, for a token-based estimate.
        #[arg(long, requires = "output_tokens")]
        input_tokens: Option<u64>,
        /// Expected response size, for a token-based estimate.
        #[arg(long, requires = "input_tokens")]
        output_tokens: Option<u64>,
        #[arg(long)]
        json: bool,
    },
    /// Print spend, remaining capacity, and recommendations.
    Report {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// List task categories and what they require.
    Categories,
    /// Print the effective configuration with credentials redacted.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load and validate configuration at startup
    let loaded = match &cli.config {
        Some(path) => costwise_config::load_and_validate_path(path),
        None => costwise_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            costwise_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging.log_level);

    if let Err(e) = run(cli.command, &config, cli.as_of).await {
        eprintln!("costwise: {e}");
        std::process::exit(1);
    }
}

async fn run(
    command: Option<Commands>,
    config: &CostwiseConfig,
    as_of: Option<NaiveDate>,
) -> Result<(), CostwiseError> {
    match command {
        Some(Commands::Select {
            category,
            image,
            json,
        }) => {
            let ctx = context::open(config, as_of).await?;
            select::run_select(&ctx, category, image, json).await
        }
        Some(Commands::Estimate {
            category,
            image,
            input_tokens,
            output_tokens,
            json,
        }) => {
            let ctx = context::open(config, as_of).await?;
            let tokens = input_tokens
                .zip(output_tokens)
                .map(|(input, output)| costwise_cost::TokenEstimate::new(input, output));
            select::run_estimate(&ctx, category, image, tokens, json).await
        }
        Some(Commands::Report { json, plain }) => {
            let ctx = context::open(config, as_of).await?;
            report::run_report(&ctx, json, plain).await
        }
        Some(Commands::Categories) => select::print_categories(),
        Some(Commands::Config) => show_config::run_config(config),
        None => {
            println!("costwise: use --help for available commands");
            Ok(())
        }
    }
}

/// Initializes the tracing subscriber with the given log level.
///
/// Logs go to stderr so `--json` output stays parseable.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("costwise={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}
