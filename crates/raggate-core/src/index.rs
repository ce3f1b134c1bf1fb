//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait defines the storage operations the
//! ingestion and chat pipelines need, enabling pluggable backends
//! (SQLite in the app crate, in-memory here for tests).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`upsert`](VectorIndex::upsert) | Add-or-replace a batch of records, keyed by id |
//! | [`query`](VectorIndex::query) | Scope-filtered top-k similarity search |
//! | [`count`](VectorIndex::count) | Number of stored records |

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::access::RoleScope;
use crate::models::{IndexRecord, ScoredRecord};

/// Default number of records returned by a chat-pipeline query.
pub const DEFAULT_TOP_K: usize = 3;

/// Abstract vector store for Raggate.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Add or replace the given records in one batched call, keyed by
    /// id. Records with ids already present are overwritten in place,
    /// which is what makes re-ingestion idempotent.
    async fn upsert(&self, records: &[IndexRecord]) -> Result<()>;

    /// Return up to `top_k` records most similar to `vector`, restricted
    /// to records the `scope` permits.
    ///
    /// The visibility filter is applied before truncating to `top_k`,
    /// never after: a permitted low-rank record must not be displaced by
    /// a higher-rank record the scope forbids. Results are ordered by
    /// descending similarity; ties keep insertion order.
    async fn query(
        &self,
        vector: &[f32],
        scope: &RoleScope,
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>>;

    /// Number of records currently stored.
    async fn count(&self) -> Result<usize>;
}
