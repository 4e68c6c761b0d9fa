use anyhow::Result;
use axum::Router;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};
use heritage_core::IndexConfig;
use heritage_server::{build_app, ServerConfig};
use tokio::net::TcpListener;

#[derive(Parser)]
struct Args {
    /// Index file path
    #[arg(long, default_value = "./data/index.bin")]
    index: PathBuf,
    /// Normalized site records used to rebuild a missing index
    #[arg(long, default_value = "./data/sites.json")]
    sites: PathBuf,
    /// Host to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 5000)]
    port: u16,
    /// Listing fetched when a rebuild asks for the fetcher
    #[arg(long, default_value = heritage_fetcher::DEFAULT_JSON_URL)]
    fetch_url: String,
    /// Maximum vocabulary size for rebuilt indexes
    #[arg(long, default_value_t = heritage_core::index::DEFAULT_MAX_FEATURES)]
    max_features: usize,
    /// Apply English stemming to terms
    #[arg(long, default_value_t = false)]
    stem: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let config = ServerConfig {
        admin_token: std::env::var("ADMIN_TOKEN").ok(),
        cors_allow_origin: std::env::var("CORS_ALLOW_ORIGIN").ok(),
        fetch_url: args.fetch_url,
        index_config: IndexConfig { max_features: args.max_features, stem: args.stem, ..IndexConfig::default() },
        ..ServerConfig::new(args.index, args.sites)
    };
    let app: Router = build_app(config)?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
