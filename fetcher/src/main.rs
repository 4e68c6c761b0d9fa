use anyhow::Result;
use clap::Parser;
use heritage_core::document::sample_sites;
use heritage_fetcher::{write_sites, Fetcher, DEFAULT_JSON_URL, DEFAULT_USER_AGENT};
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "fetcher")]
#[command(about = "Fetch and normalize UNESCO World Heritage site records")]
struct Cli {
    /// JSON listing endpoint
    #[arg(long, default_value = DEFAULT_JSON_URL)]
    url: String,
    /// Output JSON file path
    #[arg(long, default_value = "./data/sites.json")]
    out: String,
    /// Keep at most this many records
    #[arg(long)]
    max_sites: Option<usize>,
    /// Request timeout seconds
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,
    /// User-Agent string sent with the request
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    user_agent: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Cli::parse();

    let fetcher = Fetcher::new(&args.user_agent, Duration::from_secs(args.timeout_secs))?
        .with_max_sites(args.max_sites);

    let sites = match fetcher.fetch(&args.url).await {
        Ok(sites) => {
            tracing::info!(count = sites.len(), url = %args.url, "fetched sites");
            sites
        }
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "fetch failed, falling back to sample data");
            sample_sites()
        }
    };

    write_sites(Path::new(&args.out), &sites)?;
    tracing::info!(count = sites.len(), out = %args.out, "saved sites");
    Ok(())
}
