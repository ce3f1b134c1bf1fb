//! SQLite-backed [`VectorIndex`] implementation.
//!
//! Records are stored with their embeddings as little-endian f32 BLOBs.
//! Queries filter on the role scope in SQL, then score the surviving
//! rows by dot product and truncate to top-k, so the visibility filter
//! always runs before ranking truncation. Rows are read in rowid order
//! and sorted stably, so equal scores keep insertion order.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use raggate_core::access::RoleScope;
use raggate_core::embedding::{blob_to_vec, dot_product, vec_to_blob};
use raggate_core::index::VectorIndex;
use raggate_core::models::{IndexRecord, ScoredRecord};

/// SQLite implementation of the [`VectorIndex`] trait.
pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn upsert(&self, records: &[IndexRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO records (id, text, access_group, embedding)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    text = excluded.text,
                    access_group = excluded.access_group,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&record.id)
            .bind(&record.text)
            .bind(&record.access_group)
            .bind(vec_to_blob(&record.embedding))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        scope: &RoleScope,
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>> {
        let [role_group, general_group] = scope.allowed_groups();

        let rows = sqlx::query(
            r#"
            SELECT id, text, embedding FROM records
            WHERE access_group = ? OR access_group = ?
            ORDER BY rowid
            "#,
        )
        .bind(role_group)
        .bind(general_group)
        .fetch_all(&self.pool)
        .await?;

        let mut mismatched = 0usize;
        let mut candidates: Vec<ScoredRecord> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let embedding = blob_to_vec(&blob);
                if embedding.len() != vector.len() {
                    mismatched += 1;
                }
                ScoredRecord {
                    id: row.get("id"),
                    text: row.get("text"),
                    score: dot_product(vector, &embedding),
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

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(top_k);

        Ok(candidates)
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, migrate};
    use raggate_core::embedding::l2_normalize;

    async fn test_index() -> (tempfile::TempDir, SqliteIndex) {
        let tmp = tempfile::tempdir().unwrap();
        let pool = db::connect(&tmp.path().join("test.sqlite")).await.unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        (tmp, SqliteIndex::new(pool))
    }

    fn record(id: &str, group: &str, embedding: &[f32]) -> IndexRecord {
        IndexRecord {
            id: id.to_string(),
            text: format!("text of {}", id),
            embedding: l2_normalize(embedding),
            access_group: group.to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let (_tmp, index) = test_index().await;
        let batch = vec![
            record("a_part_1", "hr", &[1.0, 0.0]),
            record("a_part_2", "hr", &[0.0, 1.0]),
        ];
        index.upsert(&batch).await.unwrap();
        index.upsert(&batch).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_upsert_overwrites_content() {
        let (_tmp, index) = test_index().await;
        index
            .upsert(&[record("a_part_1", "hr", &[1.0, 0.0])])
            .await
            .unwrap();
        index
            .upsert(&[IndexRecord {
                id: "a_part_1".to_string(),
                text: "rewritten".to_string(),
                embedding: l2_normalize(&[1.0, 0.0]),
                access_group: "hr".to_string(),
            }])
            .await
            .unwrap();

        let scope = RoleScope::for_role("hr");
        let results = index.query(&[1.0, 0.0], &scope, 1).await.unwrap();
        assert_eq!(results[0].text, "rewritten");
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_scope_filter_precedes_truncation() {
        let (_tmp, index) = test_index().await;
        index
            .upsert(&[
                record("f1", "finance", &[1.0, 0.0]),
                record("f2", "finance", &[0.99, 0.1]),
                record("h1", "hr", &[0.5, 0.5]),
                record("g1", "general", &[0.1, 0.9]),
            ])
            .await
            .unwrap();

        let scope = RoleScope::for_role("hr");
        let results = index.query(&[1.0, 0.0], &scope, 2).await.unwrap();
        let ids: Vec<String> = results.into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["h1".to_string(), "g1".to_string()]);
    }

    #[tokio::test]
    async fn test_stale_dims_record_scores_zero_and_ranks_last() {
        let (_tmp, index) = test_index().await;
        index
            .upsert(&[
                record("stale", "general", &[1.0, 0.0, 0.0]),
                record("current", "general", &[1.0, 0.0]),
            ])
            .await
            .unwrap();

        let scope = RoleScope::for_role("anyone");
        let results = index.query(&[1.0, 0.0], &scope, 5).await.unwrap();

        assert_eq!(results[0].id, "current");
        let stale = results.iter().find(|r| r.id == "stale").unwrap();
        assert_eq!(stale.score, 0.0);
    }

    #[tokio::test]
    async fn test_foreign_role_records_invisible() {
        let (_tmp, index) = test_index().await;
        index
            .upsert(&[
                record("h1", "hr", &[1.0, 0.0]),
                record("g1", "general", &[0.5, 0.5]),
            ])
            .await
            .unwrap();

        let scope = RoleScope::for_role("engineering");
        let results = index.query(&[1.0, 0.0], &scope, 10).await.unwrap();
        let ids: Vec<String> = results.into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["g1".to_string()]);
    }
}
