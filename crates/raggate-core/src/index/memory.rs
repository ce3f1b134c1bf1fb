//! In-memory [`VectorIndex`] implementation for tests and small corpora.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`; similarity search
//! is a brute-force dot-product scan. Upserts overwrite a record in its
//! original position so insertion order (the tie-break order) survives
//! re-ingestion.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::access::RoleScope;
use crate::embedding::dot_product;
use crate::models::{IndexRecord, ScoredRecord};

use super::VectorIndex;

/// In-memory vector index.
#[derive(Default)]
pub struct InMemoryIndex {
    records: RwLock<Vec<IndexRecord>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, records: &[IndexRecord]) -> Result<()> {
        let mut stored = self.records.write().unwrap();
        for record in records {
            match stored.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => stored.push(record.clone()),
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        scope: &RoleScope,
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>> {
        let stored = self.records.read().unwrap();

        // Filter on scope first, then rank: a forbidden record must
        // never occupy a top-k slot.
        let mut mismatched = 0usize;
        let mut candidates: Vec<ScoredRecord> = stored
            .iter()
            .filter(|r| scope.permits(&r.access_group))
            .map(|r| {
                if r.embedding.len() != vector.len() {
                    mismatched += 1;
                }
                ScoredRecord {
                    id: r.id.clone(),
                    text: r.text.clone(),
                    score: dot_product(vector, &r.embedding),
                }
            })
            .collect();

        // Stale records from a run with a different embedding model
        // score zero instead of failing the query; surface them.
        if mismatched > 0 {
            tracing::warn!(
                mismatched,
                query_dims = vector.len(),
                "records with a different embedding dimensionality score zero; re-ingest the corpus"
            );
        }

        // Stable sort keeps insertion order for equal scores.
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(top_k);

        Ok(candidates)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().unwrap().len())
    }
}
