//! Download the UNESCO World Heritage listing and turn it into canonical
//! [`Document`] records. Shared by the `fetcher` binary and the server's
//! rebuild endpoint.

use anyhow::{anyhow, Context, Result};
use heritage_core::document::documents_from_json;
use heritage_core::Document;
use reqwest::Client;
use scraper::Html;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_JSON_URL: &str = "https://whc.unesco.org/en/list/json/";
pub const DEFAULT_USER_AGENT: &str = "heritage-fetcher/0.1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct Fetcher {
    client: Client,
    max_sites: Option<usize>,
}

impl Fetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent.to_string())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(timeout)
            .build()?;
        Ok(Self { client, max_sites: None })
    }

    /// Keep at most `max` records from each listing.
    pub fn with_max_sites(mut self, max: Option<usize>) -> Self {
        self.max_sites = max;
        self
    }

    /// Fetch `url` and normalize its records. An empty listing is an error.
    pub async fn fetch(&self, url: &str) -> Result<Vec<Document>> {
        let resp = self.client.get(url).send().await?.error_for_status()?;
        let bytes = resp.bytes().await?;
        let json: serde_json::Value = serde_json::from_slice(&bytes).context("response is not JSON")?;
        let mut sites = clean_documents(documents_from_json(json));
        if sites.is_empty() {
            return Err(anyhow!("no site records in response from {url}"));
        }
        if let Some(max) = self.max_sites {
            sites.truncate(max);
        }
        tracing::debug!(url, count = sites.len(), "fetched site listing");
        Ok(sites)
    }
}

/// Listing descriptions arrive as HTML fragments; keep their text only.
pub fn clean_documents(docs: Vec<Document>) -> Vec<Document> {
    docs.into_iter()
        .map(|mut d| {
            d.name = strip_html(&d.name);
            d.description = strip_html(&d.description);
            d
        })
        .collect()
}

pub fn strip_html(text: &str) -> String {
    if !text.contains('<') && !text.contains('&') {
        return text.trim().to_string();
    }
    let fragment = Html::parse_fragment(text);
    fragment
        .root_element()
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Write records as pretty JSON, creating parent directories.
pub fn write_sites(path: &Path, sites: &[Document]) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let mut out = BufWriter::new(File::create(path).with_context(|| format!("creating {}", path.display()))?);
    serde_json::to_writer_pretty(&mut out, sites)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}
