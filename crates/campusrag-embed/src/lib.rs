//! Deterministic feature-hashing embedder.
//!
//! Stands in for the external embedding model: every lower-cased word is
//! hashed into one of `dim` buckets and the bucket vector is L2-normalised,
//! so texts sharing vocabulary land close together under cosine similarity.
//! Output depends only on the input text, which keeps retrieval runs
//! reproducible.

use anyhow::Result;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use campusrag_core::config::EmbeddingSettings;
use campusrag_core::traits::Embedder;

pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for token in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            // Upper bits give a per-token weight in (0.5, 1.0].
            let val = 0.5 + 0.5 * (((h >> 32) as u32) as f32 / u32::MAX as f32);
            v[idx] += val;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

impl Embedder for HashingEmbedder {
    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Embedder used by the binaries, sized from configuration.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Box<dyn Embedder>> {
    if settings.dimension == 0 { anyhow::bail!("embedding dimension must be > 0"); }
    tracing::debug!(dim = settings.dimension, "using hashing embedder");
    Ok(Box::new(HashingEmbedder::new(settings.dimension)))
}

/// Cosine similarity; 0.0 when either side has zero norm or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() { return 0.0; }
    let (mut dot, mut na, mut nb) = (0f32, 0f32, 0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 { 0.0 } else { dot / (na.sqrt() * nb.sqrt()) }
}
