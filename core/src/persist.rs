use crate::error::{IndexError, Result};
use crate::index::{IndexConfig, InvertedIndex, Posting, TermId};
use crate::{Continent, Document};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::Path;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub version: u32,
    pub num_docs: u32,
    pub num_terms: u32,
    pub created_at: String,
}

/// Document as stored inside the blob. bincode cannot carry a self-describing
/// `serde_json::Value`, so the raw payload travels as JSON text.
#[derive(Debug, Serialize, Deserialize)]
struct StoredDocument {
    id: String,
    name: String,
    description: String,
    country: Option<String>,
    continent: Option<Continent>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    raw: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexSnapshot {
    meta: SnapshotMeta,
    config: IndexConfig,
    dictionary: HashMap<String, TermId>,
    idf: Vec<f32>,
    postings: Vec<Vec<Posting>>,
    documents: Vec<StoredDocument>,
}

impl From<&Document> for StoredDocument {
    fn from(d: &Document) -> Self {
        Self {
            id: d.id.clone(),
            name: d.name.clone(),
            description: d.description.clone(),
            country: d.country.clone(),
            continent: d.continent,
            latitude: d.latitude,
            longitude: d.longitude,
            raw: d.raw.to_string(),
        }
    }
}

impl StoredDocument {
    fn into_document(self) -> std::result::Result<Document, serde_json::Error> {
        Ok(Document {
            raw: serde_json::from_str(&self.raw)?,
            id: self.id,
            name: self.name,
            description: self.description,
            country: self.country,
            continent: self.continent,
            latitude: self.latitude,
            longitude: self.longitude,
        })
    }
}

/// Serialize the index to a single blob at `path`. The blob is written to a
/// sibling temp file and renamed into place, so readers never observe a
/// half-written index.
pub fn save(index: &InvertedIndex, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    create_dir_all(dir).map_err(|e| IndexError::io(dir, e))?;

    let snapshot = IndexSnapshot {
        meta: SnapshotMeta {
            version: FORMAT_VERSION,
            num_docs: index.len() as u32,
            num_terms: index.num_terms() as u32,
            created_at: index.built_at.clone(),
        },
        config: index.config.clone(),
        dictionary: index.dictionary.clone(),
        idf: index.idf.clone(),
        postings: index.postings.clone(),
        documents: index.docs.iter().map(StoredDocument::from).collect(),
    };

    let tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| IndexError::io(dir, e))?;
    {
        let mut w = BufWriter::new(tmp.as_file());
        bincode::serialize_into(&mut w, &snapshot).map_err(|e| match *e {
            bincode::ErrorKind::Io(io) => IndexError::io(path, io),
            other => IndexError::corrupt(path, other.to_string()),
        })?;
        w.flush().map_err(|e| IndexError::io(path, e))?;
    }
    tmp.as_file().sync_all().map_err(|e| IndexError::io(path, e))?;
    tmp.persist(path).map_err(|e| IndexError::io(path, e.error))?;
    tracing::debug!(path = %path.display(), num_docs = snapshot.meta.num_docs, "saved index");
    Ok(())
}

/// Read a blob written by [`save`]. Nothing is returned unless the whole
/// snapshot decodes and passes validation.
pub fn load(path: &Path) -> Result<InvertedIndex> {
    let mut f = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(IndexError::NotFound { path: path.to_path_buf() })
        }
        Err(e) => return Err(IndexError::io(path, e)),
    };
    let mut buf = Vec::new();
    f.read_to_end(&mut buf).map_err(|e| IndexError::io(path, e))?;

    let snapshot: IndexSnapshot =
        bincode::deserialize(&buf).map_err(|e| IndexError::corrupt(path, e.to_string()))?;
    validate(&snapshot).map_err(|detail| IndexError::corrupt(path, detail))?;

    let docs = snapshot
        .documents
        .into_iter()
        .map(StoredDocument::into_document)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| IndexError::corrupt(path, format!("raw payload: {e}")))?;

    tracing::debug!(path = %path.display(), num_docs = docs.len(), "loaded index");
    Ok(InvertedIndex {
        config: snapshot.config,
        dictionary: snapshot.dictionary,
        idf: snapshot.idf,
        postings: snapshot.postings,
        docs,
        built_at: snapshot.meta.created_at,
    })
}

fn validate(s: &IndexSnapshot) -> std::result::Result<(), String> {
    if s.meta.version != FORMAT_VERSION {
        return Err(format!("unsupported format version {}", s.meta.version));
    }
    let num_terms = s.dictionary.len();
    let num_docs = s.documents.len();
    if s.meta.num_docs as usize != num_docs || s.meta.num_terms as usize != num_terms {
        return Err("header counts do not match contents".into());
    }
    if s.idf.len() != num_terms || s.postings.len() != num_terms {
        return Err(format!(
            "vocabulary of {num_terms} terms but {} idf values and {} posting lists",
            s.idf.len(),
            s.postings.len()
        ));
    }
    if s.dictionary.values().any(|&tid| tid as usize >= num_terms) {
        return Err("term id out of range".into());
    }
    if s.idf.iter().any(|v| !v.is_finite()) {
        return Err("non-finite idf value".into());
    }
    for plist in &s.postings {
        if plist.iter().any(|p| p.doc_id as usize >= num_docs) {
            return Err("posting refers to unknown document".into());
        }
        if plist.iter().any(|p| !p.weight.is_finite()) {
            return Err("non-finite posting weight".into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn raw_payload_survives_round_trip() {
        let mut doc = Document::new("1", "Angkor", "temples");
        doc.raw = json!({"link": "https://whc.unesco.org/en/list/668", "tags": [1, 2]});
        let idx = InvertedIndex::fit(vec![doc.clone()], IndexConfig::default());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/index.bin");
        save(&idx, &path).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.docs, vec![doc]);
    }

    #[test]
    fn inconsistent_snapshot_is_rejected() {
        let idx = InvertedIndex::fit(vec![Document::new("1", "temple", "")], IndexConfig::default());
        let mut snap = IndexSnapshot {
            meta: SnapshotMeta { version: FORMAT_VERSION, num_docs: 1, num_terms: 1, created_at: String::new() },
            config: idx.config.clone(),
            dictionary: idx.dictionary.clone(),
            idf: idx.idf.clone(),
            postings: idx.postings.clone(),
            documents: idx.docs.iter().map(StoredDocument::from).collect(),
        };
        assert!(validate(&snap).is_ok());

        snap.idf[0] = f32::INFINITY;
        assert_eq!(validate(&snap).unwrap_err(), "non-finite idf value");
        snap.idf[0] = idx.idf[0];

        snap.postings[0][0].weight = f32::NAN;
        assert_eq!(validate(&snap).unwrap_err(), "non-finite posting weight");
        snap.postings[0][0].weight = idx.postings[0][0].weight;

        snap.postings[0][0].doc_id = 5;
        assert_eq!(validate(&snap).unwrap_err(), "posting refers to unknown document");
        snap.meta.version = 99;
        assert!(validate(&snap).unwrap_err().contains("version"));
    }
}
