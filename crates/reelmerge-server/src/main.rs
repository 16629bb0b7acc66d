use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use reelmerge::config::ReelmergeConfig;
use reelmerge_server::ReelmergeServer;

/// Chunked video upload and merge service
#[derive(Debug, Parser)]
#[command(name = "reelmerge-server", version, about)]
struct Cli {
    /// Configuration file (defaults to ./reelmerge.toml when present)
    #[arg(long, env = "REELMERGE_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overriding the configured one
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _ = reelmerge::logging::init_logging();

    let mut config = match &cli.config {
        Some(path) => ReelmergeConfig::from_file(path)?,
        None => ReelmergeConfig::load()?,
    };
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }

    ReelmergeServer::start(config).await
}
