//! Exact in-memory index. Brute-force cosine over every passage, so results
//! are fully deterministic; suited to small knowledge bases and tests.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use campusrag_core::traits::{CollectionSource, DiscoveredCollection, IndexHit, VectorIndex};
use campusrag_core::types::{CollectionId, Passage};
use campusrag_embed::cosine_similarity;

pub struct InMemoryIndex {
    collection: CollectionId,
    passages: Vec<Passage>,
}

impl InMemoryIndex {
    pub fn new(collection: CollectionId) -> Self { Self { collection, passages: Vec::new() } }

    pub fn from_passages(collection: CollectionId, passages: impl IntoIterator<Item = Passage>) -> Self {
        let mut index = Self::new(collection);
        for p in passages { index.insert(p); }
        index
    }

    /// Appends a passage; the passage is re-homed to this collection.
    pub fn insert(&mut self, mut passage: Passage) {
        passage.collection = self.collection.clone();
        self.passages.push(passage);
    }

    pub fn collection(&self) -> &CollectionId { &self.collection }
    pub fn len(&self) -> usize { self.passages.len() }
    pub fn is_empty(&self) -> bool { self.passages.is_empty() }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<IndexHit>> {
        let mut hits: Vec<IndexHit> = self
            .passages
            .iter()
            .enumerate()
            .filter_map(|(ordinal, p)| {
                let score = cosine_similarity(query, &p.vector);
                score.is_finite().then(|| IndexHit { passage: p.clone(), ordinal: ordinal as u64, score })
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.ordinal.cmp(&b.ordinal)));
        hits.truncate(k);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> { Ok(self.passages.len()) }
}

/// Fixed set of pre-built indices, in registration order.
#[derive(Default)]
pub struct InMemorySource {
    collections: Vec<(CollectionId, Arc<dyn VectorIndex>)>,
}

impl InMemorySource {
    pub fn new() -> Self { Self::default() }

    pub fn with_index(mut self, index: InMemoryIndex) -> Self {
        let id = index.collection().clone();
        self.collections.push((id, Arc::new(index)));
        self
    }

    /// Registers any index implementation, e.g. a remote or scripted one.
    pub fn with_dyn(mut self, id: CollectionId, index: Arc<dyn VectorIndex>) -> Self {
        self.collections.push((id, index));
        self
    }
}

#[async_trait]
impl CollectionSource for InMemorySource {
    async fn discover(&self) -> Result<Vec<DiscoveredCollection>> {
        Ok(self
            .collections
            .iter()
            .map(|(id, index)| DiscoveredCollection { id: id.clone(), index: Arc::clone(index) })
            .collect())
    }
}
