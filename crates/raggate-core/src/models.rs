//! Core data models used throughout Raggate.
//!
//! These types represent the files, chunks, and index records that flow
//! through the ingestion pipeline, and the responses produced by the
//! chat pipeline.

use serde::Serialize;

/// A file discovered under the corpus root, tagged with the access group
/// derived from its immediate parent directory. Discarded after chunking.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// File basename (e.g. `"policy.md"`).
    pub file_name: String,
    /// Basename of the file's immediate parent directory.
    pub access_group: String,
    /// Full text content.
    pub body: String,
}

/// A bounded, possibly overlapping piece of a source file prepared for
/// embedding.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// `"{file_name}_part_{seq}"`.
    pub id: String,
    pub file_name: String,
    /// 1-based and contiguous within a file, counting only non-empty
    /// chunks.
    pub seq: usize,
    pub text: String,
}

/// The persisted unit of the vector index.
///
/// Only created once embedding has succeeded for the chunk, so the index
/// never holds a chunk without a vector or a vector without text.
#[derive(Debug, Clone)]
pub struct IndexRecord {
    /// Globally unique within the index; re-ingesting overwrites.
    pub id: String,
    pub text: String,
    /// L2-normalized embedding vector.
    pub embedding: Vec<f32>,
    /// Visibility tag: a role name, or `"general"` for everyone.
    pub access_group: String,
}

/// A record returned from a scoped similarity query.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredRecord {
    pub id: String,
    pub text: String,
    /// Dot-product similarity (equal to cosine for unit vectors).
    pub score: f32,
}

/// A user account. Credential comparison happens behind the
/// `CredentialVerifier` seam in the app crate, never here.
#[derive(Debug, Clone)]
pub struct User {
    pub username: String,
    pub password: String,
    pub role: String,
}

/// One (question, answer) exchange in a user's conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatTurn {
    pub input: String,
    pub output: String,
}

/// The answer to a chat request, with provenance for citations.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    /// Ids of the index records that contributed context.
    pub source_ids: Vec<String>,
    /// Texts of the contributing records, same order as `source_ids`.
    pub source_texts: Vec<String>,
}

/// Outcome of an ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestStatus {
    /// The corpus contained no readable files. A no-op, not an error.
    NoFilesFound,
    /// Files were found but no chunk could be embedded.
    NoValidChunks,
    /// `stored` records were upserted into the index.
    Completed { stored: usize },
}

/// Counters reported after an ingestion run.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub status: IngestStatus,
    pub files_seen: usize,
    /// Files with empty bodies or no usable chunks.
    pub files_skipped: usize,
    pub chunks_embedded: usize,
    /// Chunks dropped because embedding failed.
    pub chunks_failed: usize,
}

impl IngestReport {
    /// Human-readable one-line summary of the run.
    pub fn message(&self) -> String {
        match self.status {
            IngestStatus::NoFilesFound => "No files found to process".to_string(),
            IngestStatus::NoValidChunks => "No valid documents were processed".to_string(),
            IngestStatus::Completed { stored } => {
                format!("Successfully processed {} document chunks", stored)
            }
        }
    }
}
