use crate::error::{IndexError, Result};
use crate::index::{IndexConfig, InvertedIndex, SearchHit};
use crate::persist;
use crate::query::GeoPlanner;
use crate::Document;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;

/// Owner of the current index snapshot.
///
/// Writers build a complete [`InvertedIndex`] off to the side and swap it in
/// under a short write lock; readers clone the `Arc` and score without holding
/// the lock, so a rebuild never exposes a half-built index.
#[derive(Default)]
pub struct IndexHandle {
    current: RwLock<Option<Arc<InvertedIndex>>>,
    config: IndexConfig,
}

impl IndexHandle {
    pub fn new() -> Self { Self::default() }

    pub fn with_config(config: IndexConfig) -> Self {
        Self { current: RwLock::new(None), config }
    }

    /// Settings applied by every `fit` through this handle.
    pub fn config(&self) -> &IndexConfig { &self.config }

    /// The snapshot searches currently run against.
    pub fn snapshot(&self) -> Result<Arc<InvertedIndex>> {
        self.current.read().clone().ok_or(IndexError::NotFitted)
    }

    pub fn is_fitted(&self) -> bool { self.current.read().is_some() }

    pub fn replace(&self, index: InvertedIndex) -> Arc<InvertedIndex> {
        let index = Arc::new(index);
        *self.current.write() = Some(index.clone());
        index
    }

    pub fn fit(&self, docs: Vec<Document>) -> Arc<InvertedIndex> {
        self.replace(InvertedIndex::fit(docs, self.config.clone()))
    }

    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        Ok(self.snapshot()?.search(query, top_k))
    }

    /// Search with the trailing "in <place>" clause handled by `planner`.
    pub fn search_geo(&self, planner: &GeoPlanner, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        let index = self.snapshot()?;
        Ok(planner.search(&index, query, top_k))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let index = self.snapshot()?;
        persist::save(&index, path)
    }

    /// Replace the current snapshot with the one stored at `path`. On any
    /// failure the previous snapshot stays in place.
    pub fn load(&self, path: &Path) -> Result<Arc<InvertedIndex>> {
        let index = persist::load(path)?;
        Ok(self.replace(index))
    }

    /// Load `path`, or fit `docs` and save them there when loading fails.
    /// Without `docs` the load failure is returned unchanged.
    pub fn load_or_build(&self, path: &Path, docs: Option<Vec<Document>>) -> Result<Arc<InvertedIndex>> {
        match self.load(path) {
            Ok(index) => Ok(index),
            Err(err) => {
                let Some(docs) = docs else { return Err(err) };
                tracing::debug!(path = %path.display(), error = %err, "rebuilding index from documents");
                let index = InvertedIndex::fit(docs, self.config.clone());
                persist::save(&index, path)?;
                Ok(self.replace(index))
            }
        }
    }
}
