use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ripple::cli;
use ripple::node;
use ripple::settings::{self, LogFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse args and env vars
    let args = cli::Cli::parse();

    // stdout carries the protocol, so logs go to stderr
    let registry = tracing_subscriber::registry().with(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "ripple=info".into()),
    );
    match args.log_format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }

    let settings = args
        .into_settings()
        .context("invalid command line configuration")?;

    info!(
        "Starting {} {}",
        settings::APP_NAME,
        settings::APP_VERSION
    );
    let transport = node::build_transport(&settings);
    transport
        .run(tokio::io::stdin(), tokio::io::stdout())
        .await
        .context("transport failed")?;

    Ok(())
}
