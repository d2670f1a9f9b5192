//! Punctuality - Main Entry Point

use clap::Parser;
use punctuality::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "punctuality=info".into()),
        )
        .init();

    cli::run(Cli::parse()).await
}
