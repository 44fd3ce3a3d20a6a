//! Shared plumbing for the campusrag binaries.

use anyhow::{Context as _, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use campusrag_core::config::{Config, Settings};
use campusrag_core::traits::Embedder;
use campusrag_core::types::{CollectionId, Passage};
use campusrag_embed::get_default_embedder;
use campusrag_retrieval::CollectionRegistry;
use campusrag_vector::{passage_id, LanceStore};

/// Logs go to stderr; `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

pub fn load_settings() -> Result<Settings> {
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    Ok(config.settings()?)
}

pub fn embedder(settings: &Settings) -> Result<Arc<dyn Embedder>> { Ok(Arc::from(get_default_embedder(&settings.embedding)?)) }

/// Open the configured store and build the registry over its tables.
pub async fn open_registry(settings: &Settings, embedder: Arc<dyn Embedder>) -> Result<Arc<CollectionRegistry>> {
    let root = settings.store.root_path();
    let store = LanceStore::open(&root.to_string_lossy())
        .await
        .with_context(|| format!("opening store at {}", root.display()))?;
    let registry = CollectionRegistry::init(Arc::new(store), settings, Some(embedder)).await?;
    Ok(Arc::new(registry))
}

/// One pre-chunked passage line of a seed file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeedRecord {
    pub doc_id: String,
    pub text: String,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

/// Reads `<dir>/<collection>/*.jsonl`. Files are visited in name order so
/// insertion order (and with it score tie-breaks) is reproducible.
pub fn read_seed_dir(dir: &Path) -> Result<BTreeMap<CollectionId, Vec<SeedRecord>>> {
    let mut out: BTreeMap<CollectionId, Vec<SeedRecord>> = BTreeMap::new();
    for entry in WalkDir::new(dir).min_depth(2).max_depth(2).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("jsonl") { continue; }
        let Some(collection) = path.parent().and_then(|p| p.file_name()).and_then(|n| n.to_str()) else { continue };
        let id = CollectionId::from_name(collection);
        let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let records = out.entry(id).or_default();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() { continue; }
            let record: SeedRecord = serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid passage record", path.display(), line_no + 1))?;
            if record.text.trim().is_empty() { continue; }
            records.push(record);
        }
    }
    out.retain(|_, records| !records.is_empty());
    Ok(out)
}

/// Embed seed records into passages of `collection`.
pub fn build_passages(embedder: &dyn Embedder, collection: &CollectionId, records: Vec<SeedRecord>) -> Result<Vec<Passage>> {
    let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
    let vectors = embedder.embed_batch(&texts)?;
    anyhow::ensure!(vectors.len() == records.len(), "embedder returned {} vectors for {} texts", vectors.len(), records.len());
    Ok(records
        .into_iter()
        .zip(vectors)
        .map(|(r, vector)| Passage {
            id: r.id.unwrap_or_else(|| passage_id(collection, &r.doc_id, &r.text)),
            doc_id: r.doc_id,
            collection: collection.clone(),
            text: r.text,
            section: r.section,
            vector,
        })
        .collect())
}
