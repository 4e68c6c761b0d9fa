use crate::document::Document;
use crate::tokenizer::analyze;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub type TermId = u32;
pub type DocId = u32;

pub const DEFAULT_MAX_FEATURES: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Upper bound on vocabulary size.
    pub max_features: usize,
    /// Longest n-gram produced by the analyzer (1 = unigrams only).
    pub ngram_max: usize,
    pub stem: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { max_features: DEFAULT_MAX_FEATURES, ngram_max: 2, stem: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub weight: f32, // normalized tf-idf weight
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub name: String,
    pub description: String,
    pub score: f32,
}

/// A fitted, read-only TF-IDF index over a fixed document collection.
///
/// The weight matrix is stored column-major: `postings[term]` lists the
/// non-zero `(doc, weight)` entries of that dimension, sorted by doc. Every
/// document row has unit Euclidean length, so a dot product with a unit query
/// vector is the cosine similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct InvertedIndex {
    pub config: IndexConfig,
    pub dictionary: HashMap<String, TermId>,
    pub idf: Vec<f32>,
    pub postings: Vec<Vec<Posting>>,
    pub docs: Vec<Document>,
    pub built_at: String,
}

/// Drop earlier records whose id reappears later in the input.
fn dedup_last_wins(docs: Vec<Document>) -> Vec<Document> {
    let mut last: HashMap<&str, usize> = HashMap::new();
    for (i, d) in docs.iter().enumerate() {
        last.insert(d.id.as_str(), i);
    }
    if last.len() == docs.len() {
        return docs;
    }
    let keep: Vec<bool> = docs
        .iter()
        .enumerate()
        .map(|(i, d)| last.get(d.id.as_str()) == Some(&i))
        .collect();
    docs.into_iter()
        .zip(keep)
        .filter_map(|(d, k)| k.then_some(d))
        .collect()
}

fn smoothed_idf(num_docs: usize, df: u32) -> f32 {
    (((1.0 + num_docs as f64) / (1.0 + df as f64)).ln() + 1.0) as f32
}

fn normalize(weights: &mut [(TermId, f32)]) {
    let norm = weights.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
    if norm > 0.0 {
        for (_, w) in weights.iter_mut() {
            *w /= norm;
        }
    }
}

impl InvertedIndex {
    /// Build a fresh index. Never fails: an empty corpus, or one with no
    /// indexable text, yields an empty vocabulary and all-zero scores.
    pub fn fit(docs: Vec<Document>, config: IndexConfig) -> Self {
        let docs = dedup_last_wins(docs);
        let num_docs = docs.len();

        let term_counts: Vec<HashMap<String, u32>> = docs
            .iter()
            .map(|d| {
                let mut tf: HashMap<String, u32> = HashMap::new();
                for term in analyze([d.name.as_str(), d.description.as_str()], config.ngram_max, config.stem) {
                    *tf.entry(term).or_insert(0) += 1;
                }
                tf
            })
            .collect();

        // term -> (occurrences across the corpus, document frequency)
        let mut stats: HashMap<&str, (u64, u32)> = HashMap::new();
        for tf in &term_counts {
            for (term, count) in tf {
                let entry = stats.entry(term.as_str()).or_insert((0, 0));
                entry.0 += u64::from(*count);
                entry.1 += 1;
            }
        }

        let mut kept: Vec<(&str, u64, u32)> = stats.into_iter().map(|(t, (n, df))| (t, n, df)).collect();
        if kept.len() > config.max_features {
            kept.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
            kept.truncate(config.max_features);
        }
        kept.sort_by(|a, b| a.0.cmp(b.0));

        let mut dictionary: HashMap<String, TermId> = HashMap::with_capacity(kept.len());
        let mut idf: Vec<f32> = Vec::with_capacity(kept.len());
        for (tid, (term, _, df)) in kept.iter().enumerate() {
            dictionary.insert((*term).to_string(), tid as TermId);
            idf.push(smoothed_idf(num_docs, *df));
        }

        let mut postings: Vec<Vec<Posting>> = vec![Vec::new(); dictionary.len()];
        for (doc_id, tf) in term_counts.iter().enumerate() {
            let mut row: Vec<(TermId, f32)> = tf
                .iter()
                .filter_map(|(term, count)| {
                    let tid = *dictionary.get(term)?;
                    Some((tid, *count as f32 * idf[tid as usize]))
                })
                .collect();
            normalize(&mut row);
            for (tid, weight) in row {
                postings[tid as usize].push(Posting { doc_id: doc_id as DocId, weight });
            }
        }

        tracing::debug!(num_docs, num_terms = dictionary.len(), "fitted tf-idf index");
        Self {
            config,
            dictionary,
            idf,
            postings,
            docs,
            built_at: now_rfc3339(),
        }
    }

    pub fn len(&self) -> usize { self.docs.len() }

    pub fn is_empty(&self) -> bool { self.docs.is_empty() }

    pub fn num_terms(&self) -> usize { self.dictionary.len() }

    pub fn document(&self, doc_id: DocId) -> Option<&Document> {
        self.docs.get(doc_id as usize)
    }

    pub fn find(&self, id: &str) -> Option<&Document> {
        self.docs.iter().find(|d| d.id == id)
    }

    /// Project a query into the fitted vocabulary. Unknown terms are ignored.
    /// Keys are ordered so score accumulation is reproducible.
    pub fn query_vector(&self, query: &str) -> BTreeMap<TermId, f32> {
        let mut counts: BTreeMap<TermId, u32> = BTreeMap::new();
        for term in analyze([query], self.config.ngram_max, self.config.stem) {
            if let Some(&tid) = self.dictionary.get(&term) {
                *counts.entry(tid).or_insert(0) += 1;
            }
        }
        let mut weights: Vec<(TermId, f32)> = counts
            .into_iter()
            .map(|(tid, c)| (tid, c as f32 * self.idf[tid as usize]))
            .collect();
        normalize(&mut weights);
        weights.into_iter().collect()
    }

    /// Cosine similarity of every document against `query`, best first, at
    /// most `limit` entries. Equal scores keep fit order.
    pub fn rank(&self, query: &str, limit: usize) -> Vec<(DocId, f32)> {
        let q = self.query_vector(query);
        let mut scores = vec![0.0f32; self.docs.len()];
        for (tid, q_w) in &q {
            for p in &self.postings[*tid as usize] {
                scores[p.doc_id as usize] += p.weight * q_w;
            }
        }
        let mut scored: Vec<(DocId, f32)> = scores
            .into_iter()
            .enumerate()
            .map(|(i, s)| (i as DocId, s.clamp(0.0, 1.0)))
            .collect();
        // stable: ties stay in fit order
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        scored
    }

    pub fn search(&self, query: &str, top_k: usize) -> Vec<SearchHit> {
        self.rank(query, top_k)
            .into_iter()
            .filter_map(|(doc_id, score)| self.hit(doc_id, score))
            .collect()
    }

    pub(crate) fn hit(&self, doc_id: DocId, score: f32) -> Option<SearchHit> {
        let doc = self.document(doc_id)?;
        Some(SearchHit {
            id: doc.id.clone(),
            name: doc.name.clone(),
            description: doc.description.clone(),
            score,
        })
    }
}

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}
