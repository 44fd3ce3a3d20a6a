//! Collaborator seams: embedding, per-collection nearest-neighbour search and
//! store discovery. The retrieval core treats all three as black boxes.

use async_trait::async_trait;
use std::sync::Arc;

use crate::types::{CollectionId, Passage};

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// One nearest-neighbour result. `ordinal` is the passage's insertion
/// position in its index and breaks score ties.
#[derive(Debug, Clone)]
pub struct IndexHit {
    pub passage: Passage,
    pub ordinal: u64,
    pub score: f32,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Top-`k` passages by similarity, higher score is better.
    async fn search(&self, query: &[f32], k: usize) -> anyhow::Result<Vec<IndexHit>>;
    /// Number of indexed passages.
    async fn count(&self) -> anyhow::Result<usize>;
}

pub struct DiscoveredCollection {
    pub id: CollectionId,
    pub index: Arc<dyn VectorIndex>,
}

/// Lists the persisted per-collection stores present right now.
#[async_trait]
pub trait CollectionSource: Send + Sync {
    async fn discover(&self) -> anyhow::Result<Vec<DiscoveredCollection>>;
}
