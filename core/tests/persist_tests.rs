use heritage_core::{Continent, Document, IndexError, IndexHandle};
use std::fs;
use tempfile::tempdir;

fn corpus() -> Vec<Document> {
    vec![
        Document::new("a", "Ancient Temple", "stone temple ruins and columns").with_continent(Continent::Asia),
        Document::new("b", "Modern Museum", "contemporary art and exhibitions").with_country("France"),
        Document::new("c", "Coastal Park", "sea cliffs and coastal biodiversity"),
        Document::new("d", "Temple Gardens", "gardens around an old temple"),
    ]
}

#[test]
fn round_trip_preserves_ranking() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data/index.bin");

    let built = IndexHandle::new();
    built.fit(corpus());
    built.save(&path).unwrap();

    let loaded = IndexHandle::new();
    loaded.load(&path).unwrap();

    for q in ["temple ruins", "temple", "art", "", "gardens temple", "volcano"] {
        for k in [1, 2, 4, 10] {
            assert_eq!(built.search(q, k).unwrap(), loaded.search(q, k).unwrap(), "query {q:?} k={k}");
        }
    }
    assert_eq!(built.snapshot().unwrap().docs, loaded.snapshot().unwrap().docs);
}

#[test]
fn missing_file_is_not_found() {
    let dir = tempdir().unwrap();
    let handle = IndexHandle::new();
    let err = handle.load(&dir.path().join("absent.bin")).unwrap_err();
    assert!(matches!(err, IndexError::NotFound { .. }));
    assert!(!handle.is_fitted());
}

#[test]
fn truncated_file_is_corrupt() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.bin");
    let handle = IndexHandle::new();
    handle.fit(corpus());
    handle.save(&path).unwrap();

    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    let fresh = IndexHandle::new();
    let err = fresh.load(&path).unwrap_err();
    assert!(matches!(err, IndexError::Corrupt { .. }));
    assert!(!fresh.is_fitted());
}

#[test]
fn save_overwrites_existing_blob() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.bin");
    let handle = IndexHandle::new();
    handle.fit(corpus());
    handle.save(&path).unwrap();
    handle.fit(vec![Document::new("z", "Volcano", "")]);
    handle.save(&path).unwrap();

    let loaded = IndexHandle::new();
    loaded.load(&path).unwrap();
    assert_eq!(loaded.snapshot().unwrap().len(), 1);
}

#[test]
fn load_or_build_falls_back_to_documents() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.bin");

    let handle = IndexHandle::new();
    handle.load_or_build(&path, Some(corpus())).unwrap();
    assert!(path.exists());
    assert_eq!(handle.search("temple ruins", 1).unwrap()[0].id, "a");

    // second call loads the saved blob and ignores the new documents
    let again = IndexHandle::new();
    again.load_or_build(&path, Some(vec![Document::new("z", "Volcano", "")])).unwrap();
    assert_eq!(again.snapshot().unwrap().len(), 4);
}

#[test]
fn load_or_build_without_documents_reraises() {
    let dir = tempdir().unwrap();
    let handle = IndexHandle::new();
    let err = handle.load_or_build(&dir.path().join("absent.bin"), None).unwrap_err();
    assert!(matches!(err, IndexError::NotFound { .. }));

    let corrupt = dir.path().join("corrupt.bin");
    fs::write(&corrupt, b"garbage").unwrap();
    let err = handle.load_or_build(&corrupt, None).unwrap_err();
    assert!(matches!(err, IndexError::Corrupt { .. }));
}

#[test]
fn load_or_build_rebuilds_over_corrupt_blob() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.bin");
    fs::write(&path, b"garbage").unwrap();
    let handle = IndexHandle::new();
    handle.load_or_build(&path, Some(corpus())).unwrap();

    let reloaded = IndexHandle::new();
    reloaded.load(&path).unwrap();
    assert_eq!(reloaded.snapshot().unwrap().len(), 4);
}
