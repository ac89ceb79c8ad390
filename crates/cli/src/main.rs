//! Diecast CLI - Stripe catalog maintenance scripts.
//!
//! # Usage
//!
//! ```bash
//! # Report catalog problems (read-only)
//! dc-cli audit
//!
//! # Attach images from a mapping file, printing the plan only
//! dc-cli --dry-run images --mapping images.yaml
//!
//! # Reprice products
//! dc-cli prices --mapping prices.yaml
//!
//! # Backfill category/brand/scale/year metadata
//! dc-cli categorize --overwrite
//!
//! # Write unique slugs
//! dc-cli slugs
//!
//! # Archive duplicate products
//! dc-cli dedupe
//! ```
//!
//! Every write command logs its plan, waits `--confirm-delay` seconds, then
//! applies changes one by one with `--call-delay` milliseconds between calls.
//! The process exits non-zero if any change failed.
//!
//! # Environment Variables
//!
//! - `STRIPE_SECRET_KEY` - Stripe secret key (required)
//! - `STRIPE_API_BASE` - API base URL (default `https://api.stripe.com`)
//! - `STRIPE_API_VERSION` - Optional `Stripe-Version` pin
//! - `RUST_LOG` - Log filter (default `info`)

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod batch;
mod commands;

use batch::{BatchOptions, BatchRunner};

#[derive(Parser)]
#[command(name = "dc-cli")]
#[command(author, version, about = "Diecast Stripe catalog maintenance")]
struct Cli {
    /// Log the plan without applying it
    #[arg(long, global = true)]
    dry_run: bool,

    /// Seconds to wait between printing the plan and applying it
    #[arg(long, global = true, default_value_t = 5)]
    confirm_delay: u64,

    /// Milliseconds to wait between Stripe calls
    #[arg(long, global = true, default_value_t = 250)]
    call_delay: u64,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    const fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            dry_run: self.dry_run,
            confirm_delay: Duration::from_secs(self.confirm_delay),
            call_delay: Duration::from_millis(self.call_delay),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Report products missing images, prices, categories or slugs, and duplicates
    Audit,
    /// Set or append product images from a YAML mapping
    Images {
        /// Mapping file (list of `match` + `images`)
        #[arg(short, long)]
        mapping: PathBuf,

        /// Replace existing images instead of appending
        #[arg(long)]
        replace: bool,
    },
    /// Create new default prices from a YAML mapping
    Prices {
        /// Mapping file (list of `match` + `unit_amount` + optional `currency`)
        #[arg(short, long)]
        mapping: PathBuf,
    },
    /// Infer category, brand, scale and year metadata from names
    Categorize {
        /// Replace existing values that differ from the inferred ones
        #[arg(long)]
        overwrite: bool,
    },
    /// Write unique `metadata.slug` values
    Slugs,
    /// Archive duplicate products, keeping the best of each group
    Dedupe,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let runner = BatchRunner::new(cli.batch_options());
    let client = commands::stripe_client()?;

    let summary = match cli.command {
        Commands::Audit => {
            commands::audit::run(&runner, &client).await?;
            return Ok(());
        }
        Commands::Images { mapping, replace } => {
            commands::images::run(&runner, &client, &mapping, replace).await?
        }
        Commands::Prices { mapping } => commands::prices::run(&runner, &client, &mapping).await?,
        Commands::Categorize { overwrite } => {
            commands::categorize::run(&runner, &client, overwrite).await?
        }
        Commands::Slugs => commands::slugs::run(&runner, &client).await?,
        Commands::Dedupe => commands::dedupe::run(&runner, &client).await?,
    };

    if runner.options().dry_run {
        tracing::info!(planned = summary.planned, "Dry run complete");
    } else {
        tracing::info!(succeeded = summary.succeeded, "All changes applied");
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "dc-cli",
            "images",
            "--mapping",
            "images.yaml",
            "--dry-run",
            "--call-delay",
            "0",
        ])
        .unwrap();

        let options = cli.batch_options();
        assert!(options.dry_run);
        assert_eq!(options.call_delay, Duration::ZERO);
        assert_eq!(options.confirm_delay, Duration::from_secs(5));
        assert!(matches!(cli.command, Commands::Images { replace: false, .. }));
    }
}
