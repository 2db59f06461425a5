//! news-digest server - daily IT news summary by email
//!
//! The application logic is contained in lib.rs, and this file is responsible
//! for parsing arguments, logging setup and handling top-level errors.

use clap::Parser;
use news_digest::{server, Config, DigestService};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "news-digest")]
#[command(author, version, about = "Summarise IT news feeds and mail the digest", long_about = None)]
struct Cli {
    /// Path to digest.toml (defaults to ./digest.toml, then ~/.config/news-digest/)
    #[arg(short, long, env = "DIGEST_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "news_digest=debug,tower_http=debug,info"
    } else {
        "news_digest=info,tower_http=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    for name in config.missing_credentials() {
        tracing::warn!(variable = name, "credential not set; the dependent step will fall back");
    }
    tracing::info!(
        feeds = config.feeds.urls.len(),
        model = %config.model.name,
        relay = %config.mail.smtp_host,
        "configuration loaded"
    );

    let port = config.server.port;
    let service = Arc::new(DigestService::new(Arc::new(config))?);
    server::run_server(service, port).await?;

    Ok(())
}
