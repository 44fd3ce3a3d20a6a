//! Per-collection top-k retrieval with timeout and a bounded retry.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use campusrag_core::config::RetrieverSettings;
use campusrag_core::traits::IndexHit;
use campusrag_core::types::{CollectionId, HealthStatus, ScoredPassage};

use crate::registry::Collection;

#[derive(Debug, Clone, PartialEq)]
pub enum RetrievalStatus {
    Responded,
    /// Not searched because the cached health says it is empty or down.
    Skipped(HealthStatus),
    TimedOut,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct CollectionRetrieval {
    pub id: CollectionId,
    pub status: RetrievalStatus,
    pub passages: Vec<ScoredPassage>,
    pub attempts: u32,
}

#[derive(Debug, Clone)]
pub struct Retriever {
    settings: RetrieverSettings,
}

impl Retriever {
    pub fn new(settings: RetrieverSettings) -> Self { Self { settings } }

    pub fn k(&self) -> usize { self.settings.k }

    /// Applies the score threshold, orders by score (ties by insertion
    /// ordinal) and caps at `k`. Hits are attributed to `collection`.
    pub fn rank_hits(&self, collection: &CollectionId, hits: Vec<IndexHit>) -> Vec<ScoredPassage> {
        let mut hits: Vec<IndexHit> =
            hits.into_iter().filter(|h| h.score.is_finite() && h.score >= self.settings.min_score).collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.ordinal.cmp(&b.ordinal)));
        hits.truncate(self.settings.k);
        hits.into_iter()
            .enumerate()
            .map(|(rank, hit)| {
                let mut passage = hit.passage;
                if &passage.collection != collection {
                    debug!(expected = %collection, found = %passage.collection, "re-attributing passage to its index");
                    passage.collection = collection.clone();
                }
                ScoredPassage { passage: Arc::new(passage), score: hit.score, collection: collection.clone(), rank }
            })
            .collect()
    }

    /// Search one collection. Never errors: empty/unavailable collections,
    /// timeouts and persistent failures come back as a status.
    pub async fn retrieve(&self, collection: &Collection, health: HealthStatus, query: &[f32]) -> CollectionRetrieval {
        let id = collection.id.clone();
        if !health.is_searchable() {
            debug!(collection = %id, ?health, "skipping collection");
            return CollectionRetrieval { id, status: RetrievalStatus::Skipped(health), passages: Vec::new(), attempts: 0 };
        }
        let timeout = Duration::from_millis(self.settings.timeout_ms);
        let backoff = Duration::from_millis(self.settings.retry_backoff_ms);
        let mut attempts = 0;
        loop {
            attempts += 1;
            match tokio::time::timeout(timeout, collection.index.search(query, self.settings.k)).await {
                Ok(Ok(hits)) => {
                    let passages = self.rank_hits(&id, hits);
                    debug!(collection = %id, hits = passages.len(), attempts, "collection searched");
                    return CollectionRetrieval { id, status: RetrievalStatus::Responded, passages, attempts };
                }
                Ok(Err(e)) if attempts <= self.settings.max_retries => {
                    warn!(collection = %id, error = %e, attempt = attempts, "search failed, retrying");
                    tokio::time::sleep(backoff).await;
                }
                Ok(Err(e)) => {
                    warn!(collection = %id, error = %e, attempts, "search failed");
                    return CollectionRetrieval { id, status: RetrievalStatus::Failed(e.to_string()), passages: Vec::new(), attempts };
                }
                Err(_) => {
                    warn!(collection = %id, timeout_ms = self.settings.timeout_ms, "search timed out");
                    return CollectionRetrieval { id, status: RetrievalStatus::TimedOut, passages: Vec::new(), attempts };
                }
            }
        }
    }
}
