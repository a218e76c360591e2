mod app;
mod app_data;
mod cli;
mod config;
mod download;
mod media;
mod notification;
mod permission;
mod picsum;
mod platform;
mod state;
mod task;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging. Logs go to stderr so JSON output stays parseable.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "photofeed=info,warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = cli::Cli::parse();
    tracing::debug!("Starting photofeed {}", env!("CARGO_PKG_VERSION"));

    cli::run(cli).await
}
