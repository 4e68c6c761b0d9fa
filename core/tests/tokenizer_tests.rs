use heritage_core::tokenizer::{analyze, tokenize};

#[test]
fn it_normalizes_and_stems() {
    let words = tokenize("Running Runners RUN! The café's menu.", true);
    // Stemming to "run" should appear
    assert!(words.contains(&"run".to_string()));
    let words = tokenize("The café's menu.", false);
    assert_eq!(words, vec!["café", "menu"]);
}

#[test]
fn it_folds_compatibility_forms() {
    // NFKC turns the ligature into plain letters
    let words = tokenize("ﬁre-proof ﬂoor", false);
    assert!(words.contains(&"floor".to_string()));
}

#[test]
fn it_filters_stopwords() {
    let words = tokenize("The quick brown fox and the lazy dog", false);
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
    assert_eq!(words, vec!["quick", "brown", "fox", "lazy", "dog"]);
}

#[test]
fn bigrams_skip_removed_stopwords() {
    let terms = analyze(["ruins of the temple"], 2, false);
    assert_eq!(terms, vec!["ruins", "temple", "ruins temple"]);
}
