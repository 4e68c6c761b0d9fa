use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use heritage_core::document::{document_from_value, extract_records, sample_sites};
use heritage_core::{Document, IndexConfig, IndexHandle};
use tracing_subscriber::{EnvFilter, fmt};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and query the heritage site TF-IDF index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from input JSON/JSONL files or a directory
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index file
        #[arg(long, default_value = "./data/index.bin")]
        output: String,
        /// Maximum vocabulary size
        #[arg(long, default_value_t = heritage_core::index::DEFAULT_MAX_FEATURES)]
        max_features: usize,
        /// Apply English stemming to terms
        #[arg(long, default_value_t = false)]
        stem: bool,
    },
    /// Search an index file, or a site JSON file indexed on the fly
    Search {
        /// Query string, optionally ending in "in <place>"
        query: String,
        /// Saved index file
        #[arg(long, conflicts_with = "json")]
        index: Option<String>,
        /// Site JSON file; the built-in sample sites are used when neither source is given
        #[arg(long)]
        json: Option<String>,
        /// Number of results
        #[arg(short, default_value_t = 5)]
        k: usize,
        #[arg(long, default_value_t = false)]
        show_description: bool,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, max_features, stem } => {
            let config = IndexConfig { max_features, stem, ..IndexConfig::default() };
            build_index(&input, &output, config)
        }
        Commands::Search { query, index, json, k, show_description } => {
            search(&query, index.as_deref(), json.as_deref(), k, show_description)
        }
    }
}

fn build_index(input: &str, output: &str, config: IndexConfig) -> Result<()> {
    let docs = read_documents(Path::new(input))?;
    tracing::info!(num_docs = docs.len(), "ingested documents");

    let handle = IndexHandle::with_config(config);
    let index = handle.fit(docs);
    handle.save(Path::new(output)).with_context(|| format!("writing index to {output}"))?;

    tracing::info!(output, num_docs = index.len(), num_terms = index.num_terms(), "index build complete");
    Ok(())
}

fn search(query: &str, index: Option<&str>, json: Option<&str>, k: usize, show_description: bool) -> Result<()> {
    let handle = IndexHandle::new();
    match (index, json) {
        (Some(path), _) => {
            handle.load(Path::new(path)).with_context(|| format!("loading index from {path}"))?;
        }
        (None, Some(path)) => {
            handle.fit(read_documents(Path::new(path))?);
        }
        (None, None) => {
            handle.fit(sample_sites());
        }
    }

    let results = handle.search_geo(&Default::default(), query, k.max(1))?;
    for r in results {
        println!("[{:.4}] {} - {}", r.score, r.id, r.name);
        if show_description {
            println!("   {}", r.description);
        }
    }
    Ok(())
}

/// Collect documents from a file or every .json/.jsonl file below a directory,
/// in path order.
fn read_documents(input_path: &Path) -> Result<Vec<Document>> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input_path.is_dir() {
        for entry in WalkDir::new(input_path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input_path.is_file() {
        files.push(input_path.to_path_buf());
    } else {
        anyhow::bail!("input path {} does not exist", input_path.display());
    }

    let mut docs = Vec::new();
    for file in files {
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(&file, &mut docs)?;
        } else {
            read_json(&file, &mut docs)?;
        }
    }
    Ok(docs)
}

fn read_jsonl(file: &Path, docs: &mut Vec<Document>) -> Result<()> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let reader = BufReader::new(f);
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let raw: serde_json::Value = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}", file.display(), lineno + 1))?;
        let position = docs.len();
        docs.push(document_from_value(&raw, position));
    }
    Ok(())
}

fn read_json(file: &Path, docs: &mut Vec<Document>) -> Result<()> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let reader = BufReader::new(f);
    let json: serde_json::Value = serde_json::from_reader(reader)
        .with_context(|| format!("parsing {}", file.display()))?;
    for raw in extract_records(json) {
        let position = docs.len();
        docs.push(document_from_value(&raw, position));
    }
    Ok(())
}
