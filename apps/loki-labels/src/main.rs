mod config;
mod logging;
mod loki;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use oidc_auth::AuthenticatedFetcher;

use crate::config::AppConfig;

/// List Loki label names using OIDC client-credentials authentication
#[derive(Parser)]
#[command(name = "loki-labels")]
#[command(about = "List Loki label names using OIDC client-credentials authentication")]
#[command(version)]
struct Cli {
    /// Log verbosity level (-v debug, -vv trace); `RUST_LOG` takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print effective configuration (secret redacted) and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let error = format!("{e:#}");
            tracing::error!(%error, "loki-labels failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let config = AppConfig::from_env()?;

    if cli.print_config {
        println!("{config}");
        return Ok(());
    }

    let fetcher = AuthenticatedFetcher::new(config.oauth_client_config(), config.http_client_config())
        .await
        .context("failed to set up authenticated client")?;

    tracing::info!("Getting labels from Loki at {}", config.loki);
    loki::report_labels(&fetcher, &config.loki, &mut std::io::stdout()).await
}
