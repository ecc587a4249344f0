#![forbid(unsafe_code)]

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};
use vt_server::config::{Cli, Config};

#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Config::load(Cli::parse()) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            std::process::exit(2);
        }
    };
    if let Err(err) = vt_server::serve(config).await {
        tracing::error!(error = %err, "server failed");
        std::process::exit(1);
    }
}
