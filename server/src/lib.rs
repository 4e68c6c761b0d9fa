use anyhow::{Context, Result};
use axum::{extract::{Path, Query, State}, http::HeaderMap, routing::get, Json, Router};
use heritage_core::document::{documents_from_json, sample_sites};
use heritage_core::{persist, Document, GeoPlanner, IndexConfig, IndexHandle, InvertedIndex, SearchHit};
use heritage_fetcher::Fetcher;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

pub mod http;

use crate::http::{cors_layer, require_admin, ApiError};

pub const MAX_K: usize = 100;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub index_path: PathBuf,
    pub sites_path: PathBuf,
    pub admin_token: Option<String>,
    /// Comma-separated origins; any origin is allowed when unset.
    pub cors_allow_origin: Option<String>,
    /// Listing fetched by `/rebuild?use_fetcher=1`.
    pub fetch_url: String,
    pub fetch_timeout: Duration,
    pub index_config: IndexConfig,
}

impl ServerConfig {
    pub fn new(index_path: impl Into<PathBuf>, sites_path: impl Into<PathBuf>) -> Self {
        Self {
            index_path: index_path.into(),
            sites_path: sites_path.into(),
            admin_token: None,
            cors_allow_origin: None,
            fetch_url: heritage_fetcher::DEFAULT_JSON_URL.to_string(),
            fetch_timeout: heritage_fetcher::DEFAULT_TIMEOUT,
            index_config: IndexConfig::default(),
        }
    }
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 5 }

/// `/rebuild` parameters as sent in the query string.
#[derive(Deserialize, Default)]
pub struct RebuildQuery {
    /// Local file path or remote URL holding site records.
    #[serde(alias = "json_path")]
    pub json_url: Option<String>,
    pub use_fetcher: Option<String>,
}

/// `/rebuild` parameters as sent in a JSON body.
#[derive(Deserialize, Default)]
pub struct RebuildBody {
    #[serde(alias = "json_path")]
    pub json_url: Option<String>,
    #[serde(default)]
    pub use_fetcher: Value,
}

#[derive(Debug, PartialEq, Eq)]
pub enum RebuildSource {
    File(PathBuf),
    Url(String),
    Fetcher,
}

fn flag_set(text: &str) -> bool {
    matches!(text, "1" | "true" | "True")
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => flag_set(s),
        _ => false,
    }
}

impl RebuildSource {
    /// A `json_url` wins over `use_fetcher`; the query string wins over the
    /// body. A `json_url` naming an existing file is read from disk.
    pub fn select(query: &RebuildQuery, body: &RebuildBody) -> Option<Self> {
        let json_url = query
            .json_url
            .as_deref()
            .or(body.json_url.as_deref())
            .filter(|s| !s.trim().is_empty());
        if let Some(target) = json_url {
            let path = std::path::Path::new(target);
            return Some(if path.exists() {
                RebuildSource::File(path.to_path_buf())
            } else {
                RebuildSource::Url(target.to_string())
            });
        }
        let use_fetcher = query.use_fetcher.as_deref().is_some_and(flag_set) || truthy(&body.use_fetcher);
        use_fetcher.then_some(RebuildSource::Fetcher)
    }
}

#[derive(Serialize)]
pub struct RebuildResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

#[derive(Clone)]
pub struct AppState {
    pub index: Arc<IndexHandle>,
    pub planner: GeoPlanner,
    pub fetcher: Fetcher,
    pub fetch_url: Arc<String>,
    pub index_path: Arc<PathBuf>,
    pub sites_path: Arc<PathBuf>,
    pub admin_token: Option<String>,
    pub cors_allow_origin: Option<String>,
}

fn read_sites(path: &std::path::Path) -> Result<Vec<Document>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value: Value = serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(documents_from_json(value))
}

/// Load the saved index. Only when that fails are the saved site records
/// (or the built-in samples) indexed and written back.
pub fn build_state(config: ServerConfig) -> Result<AppState> {
    let index = Arc::new(IndexHandle::with_config(config.index_config));
    let snapshot = match index.load(&config.index_path) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            tracing::info!(path = %config.index_path.display(), error = %err, "building index from site records");
            let docs = if config.sites_path.exists() {
                read_sites(&config.sites_path)?
            } else {
                sample_sites()
            };
            let snapshot = index.fit(docs);
            index
                .save(&config.index_path)
                .with_context(|| format!("preparing index at {}", config.index_path.display()))?;
            snapshot
        }
    };
    tracing::info!(num_docs = snapshot.len(), built_at = %snapshot.built_at, "index ready");

    Ok(AppState {
        index,
        planner: GeoPlanner::default(),
        fetcher: Fetcher::new(heritage_fetcher::DEFAULT_USER_AGENT, config.fetch_timeout)?,
        fetch_url: Arc::new(config.fetch_url),
        index_path: Arc::new(config.index_path),
        sites_path: Arc::new(config.sites_path),
        admin_token: config.admin_token,
        cors_allow_origin: config.cors_allow_origin,
    })
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(state.cors_allow_origin.as_deref());
    Router::new()
        .route("/health", get(health_handler))
        .route("/search", get(search_handler))
        .route("/doc/:id", get(doc_handler))
        .route("/rebuild", get(rebuild_handler).post(rebuild_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub fn build_app(config: ServerConfig) -> Result<Router> {
    Ok(router(build_state(config)?))
}

pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    match state.index.snapshot() {
        Ok(index) => Json(json!({ "status": "ok", "docs": index.len(), "built_at": index.built_at })),
        Err(_) => Json(json!({ "status": "not ready" })),
    }
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Result<Json<Vec<SearchHit>>, ApiError> {
    let q = match params.q {
        Some(q) if !q.trim().is_empty() => q,
        _ => return Err(ApiError::bad_request("missing query parameter 'q'")),
    };
    let k = params.k.clamp(1, MAX_K);
    let results = state.index.search_geo(&state.planner, &q, k)?;
    tracing::debug!(query = %q, k, hits = results.len(), "search");
    Ok(Json(results))
}

pub async fn doc_handler(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Document>, ApiError> {
    let index = state.index.snapshot()?;
    match index.find(&id) {
        Some(doc) => Ok(Json(doc.clone())),
        None => Err(ApiError::not_found("not found")),
    }
}

/// Re-index from a local file, a remote listing, or the configured UNESCO
/// endpoint, then swap the new snapshot in. Searches keep using the
/// previous snapshot until the swap, and keep it if anything fails.
pub async fn rebuild_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RebuildQuery>,
    body: Option<Json<RebuildBody>>,
) -> Result<Json<RebuildResponse>, ApiError> {
    require_admin(state.admin_token.as_deref(), &headers)?;
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let Some(source) = RebuildSource::select(&query, &body) else {
        return Ok(Json(RebuildResponse { status: "nothing to do", count: None }));
    };

    let docs = match source {
        RebuildSource::File(path) => tokio::task::spawn_blocking(move || read_sites(&path))
            .await
            .map_err(ApiError::internal)?,
        RebuildSource::Url(url) => state.fetcher.fetch(&url).await,
        RebuildSource::Fetcher => state.fetcher.fetch(&state.fetch_url).await,
    }
    .map_err(ApiError::internal)?;

    let config = state.index.config().clone();
    let index_path = state.index_path.clone();
    let sites_path = state.sites_path.clone();
    let rebuilt = tokio::task::spawn_blocking(move || -> Result<InvertedIndex> {
        let index = InvertedIndex::fit(docs, config);
        persist::save(&index, &index_path)?;
        heritage_fetcher::write_sites(&sites_path, &index.docs)?;
        Ok(index)
    })
    .await
    .map_err(ApiError::internal)?
    .map_err(ApiError::internal)?;

    let count = rebuilt.len();
    state.index.replace(rebuilt);
    tracing::info!(count, "index rebuilt");
    Ok(Json(RebuildResponse { status: "rebuilt", count: Some(count) }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(json_url: Option<&str>, use_fetcher: Option<&str>) -> RebuildQuery {
        RebuildQuery { json_url: json_url.map(str::to_string), use_fetcher: use_fetcher.map(str::to_string) }
    }

    #[test]
    fn rebuild_source_selection() {
        let none = RebuildBody::default();
        assert_eq!(RebuildSource::select(&query(None, None), &none), None);
        assert_eq!(RebuildSource::select(&query(None, Some("0")), &none), None);
        assert_eq!(RebuildSource::select(&query(None, Some("True")), &none), Some(RebuildSource::Fetcher));
        assert_eq!(
            RebuildSource::select(&query(Some("http://example.org/list.json"), Some("1")), &none),
            Some(RebuildSource::Url("http://example.org/list.json".into()))
        );

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("sites.json");
        std::fs::write(&file, "[]").unwrap();
        let body = RebuildBody { json_url: Some(file.display().to_string()), use_fetcher: Value::Null };
        assert_eq!(RebuildSource::select(&query(None, None), &body), Some(RebuildSource::File(file)));

        for flag in [json!(true), json!(1), json!("1")] {
            let body = RebuildBody { json_url: None, use_fetcher: flag };
            assert_eq!(RebuildSource::select(&query(None, None), &body), Some(RebuildSource::Fetcher));
        }
        for flag in [json!(false), json!(0), json!("no")] {
            let body = RebuildBody { json_url: None, use_fetcher: flag };
            assert_eq!(RebuildSource::select(&query(None, None), &body), None);
        }
    }
}
