use anyhow::Result;
use arrow_array::{Array, Float32Array, Int64Array, RecordBatch, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use std::sync::Arc;

use campusrag_core::error::Error;
use campusrag_core::traits::{CollectionSource, DiscoveredCollection, IndexHit, VectorIndex};
use campusrag_core::types::{CollectionId, Passage};

use crate::table::list_collection_tables;

/// Nearest-neighbour search over one collection table.
///
/// Scores are `1 - cosine distance`. Results are re-sorted by
/// `(score desc, ordinal asc)` so equal scores keep insertion order whatever
/// order the engine streamed them in.
pub struct LanceCollectionIndex {
    table: Table,
    collection: CollectionId,
}

impl LanceCollectionIndex {
    pub async fn open(db: &Connection, collection: CollectionId) -> Result<Self> {
        let table = db.open_table(collection.name()).execute().await?;
        Ok(Self { table, collection })
    }

    fn rows_to_hits(&self, batch: &RecordBatch, hits: &mut Vec<IndexHit>) -> Result<()> {
        let ids = string_col(batch, "id")?;
        let doc_ids = string_col(batch, "doc_id")?;
        let sections = string_col(batch, "section")?;
        let contents = string_col(batch, "content")?;
        let ordinals = batch
            .column_by_name("ordinal")
            .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
            .ok_or_else(|| missing_column("ordinal"))?;
        let distances = batch
            .column_by_name("_distance")
            .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
            .ok_or_else(|| missing_column("_distance"))?;
        for i in 0..batch.num_rows() {
            let section = if sections.is_null(i) { None } else { Some(sections.value(i).to_string()) };
            hits.push(IndexHit {
                passage: Passage {
                    id: ids.value(i).to_string(),
                    doc_id: doc_ids.value(i).to_string(),
                    collection: self.collection.clone(),
                    text: contents.value(i).to_string(),
                    section,
                    vector: Vec::new(),
                },
                ordinal: u64::try_from(ordinals.value(i)).unwrap_or(u64::MAX),
                score: 1.0 - distances.value(i),
            });
        }
        Ok(())
    }
}

fn string_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| missing_column(name))
}

fn missing_column(name: &str) -> anyhow::Error { Error::Index(format!("{name} column missing or mistyped")).into() }

#[async_trait]
impl VectorIndex for LanceCollectionIndex {
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<IndexHit>> {
        if k == 0 { return Ok(Vec::new()); }
        let mut stream = self
            .table
            .vector_search(query.to_vec())?
            .distance_type(DistanceType::Cosine)
            .limit(k)
            .execute()
            .await?;
        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            self.rows_to_hits(&batch, &mut hits)?;
        }
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.ordinal.cmp(&b.ordinal)));
        hits.truncate(k);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> { Ok(self.table.count_rows(None).await?) }
}

/// Discovers collections as the tables of one LanceDB database.
pub struct LanceStore {
    db: Connection,
}

impl LanceStore {
    pub async fn open(uri: &str) -> Result<Self> {
        Ok(Self { db: crate::table::open_db(uri).await? })
    }

    pub fn connection(&self) -> &Connection { &self.db }
}

#[async_trait]
impl CollectionSource for LanceStore {
    async fn discover(&self) -> Result<Vec<DiscoveredCollection>> {
        let mut found = Vec::new();
        for name in list_collection_tables(&self.db).await? {
            let id = CollectionId::from_name(&name);
            match LanceCollectionIndex::open(&self.db, id.clone()).await {
                Ok(index) => found.push(DiscoveredCollection { id, index: Arc::new(index) }),
                Err(e) => tracing::warn!(table = %name, error = %e, "skipping unreadable collection table"),
            }
        }
        Ok(found)
    }
}
