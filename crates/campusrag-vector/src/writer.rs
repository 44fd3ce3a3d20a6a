use anyhow::{bail, Result};
use arrow_array::{FixedSizeListArray, Int64Array, RecordBatch, RecordBatchIterator, StringArray};
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::Connection;
use std::sync::Arc;

use campusrag_core::types::{CollectionId, Passage};

use crate::schema::build_passage_schema;
use crate::table::table_exists;

/// Stable passage id derived from its provenance and content.
pub fn passage_id(collection: &CollectionId, doc_id: &str, text: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(collection.name().as_bytes());
    hasher.update(&[0]);
    hasher.update(doc_id.as_bytes());
    hasher.update(&[0]);
    hasher.update(text.as_bytes());
    hasher.finalize().to_hex()[..16].to_string()
}

/// Write path used by the seeding tool and tests. Query traffic never
/// writes; see the registry's reload hook for picking up new tables.
pub struct LancePassageWriter {
    db: Connection,
    dim: usize,
    show_progress: bool,
}

impl LancePassageWriter {
    pub fn new(db: Connection, dim: usize) -> Self { Self { db, dim, show_progress: true } }

    pub fn quiet(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// Append passages to the collection's table, creating it on first use.
    /// Ordinals continue from the current row count so insertion order stays
    /// a valid tie-breaker across appends.
    pub async fn write(&self, collection: &CollectionId, passages: &[Passage]) -> Result<usize> {
        if passages.is_empty() { return Ok(0); }
        for p in passages {
            if p.vector.len() != self.dim { bail!("passage {} has dimension {}, expected {}", p.id, p.vector.len(), self.dim); }
            if &p.collection != collection { bail!("passage {} belongs to {}, not {}", p.id, p.collection, collection); }
        }
        let table_name = collection.name();
        let exists = table_exists(&self.db, table_name).await?;
        let mut next_ordinal = if exists { self.db.open_table(table_name).execute().await?.count_rows(None).await? as i64 } else { 0 };

        let pb = if self.show_progress { ProgressBar::new(passages.len() as u64) } else { ProgressBar::hidden() };
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} passages ({percent}%) {msg}")?
                .progress_chars("#>-"),
        );
        pb.set_message(table_name.to_string());

        let batch_size = 1000usize;
        let mut created = exists;
        for chunk in passages.chunks(batch_size) {
            let batch = self.to_record_batch(chunk, next_ordinal)?;
            let schema = batch.schema();
            let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
            if created {
                self.db.open_table(table_name).execute().await?.add(reader).execute().await?;
            } else {
                self.db.create_table(table_name, reader).execute().await?;
                created = true;
            }
            next_ordinal += chunk.len() as i64;
            pb.inc(chunk.len() as u64);
        }
        pb.finish_with_message(format!("{table_name} done"));
        tracing::info!(collection = %collection, passages = passages.len(), "wrote passages");
        Ok(passages.len())
    }

    fn to_record_batch(&self, passages: &[Passage], first_ordinal: i64) -> Result<RecordBatch> {
        let dim = i32::try_from(self.dim)?;
        let mut ids = Vec::with_capacity(passages.len());
        let mut doc_ids = Vec::with_capacity(passages.len());
        let mut sections: Vec<Option<String>> = Vec::with_capacity(passages.len());
        let mut contents = Vec::with_capacity(passages.len());
        let mut ordinals = Vec::with_capacity(passages.len());
        let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(passages.len());
        for (i, p) in passages.iter().enumerate() {
            ids.push(p.id.clone());
            doc_ids.push(p.doc_id.clone());
            sections.push(p.section.clone());
            contents.push(p.text.clone());
            ordinals.push(first_ordinal + i as i64);
            vectors.push(Some(p.vector.iter().map(|&x| Some(x)).collect()));
        }
        let batch = RecordBatch::try_new(
            build_passage_schema(dim),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(doc_ids)),
                Arc::new(StringArray::from(sections)),
                Arc::new(StringArray::from(contents)),
                Arc::new(Int64Array::from(ordinals)),
                Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), dim)),
            ],
        )?;
        Ok(batch)
    }
}
