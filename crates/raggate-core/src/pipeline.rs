//! Ingestion and chat pipelines.
//!
//! Both pipelines operate entirely through the [`Embedder`],
//! [`VectorIndex`], and [`Generator`] traits, with no I/O of their own.
//! The calling application scans the corpus, constructs the providers,
//! and passes everything in.
//!
//! # Ingestion
//!
//! files → chunks → embeddings → one batched upsert. Failures are
//! absorbed at the smallest possible scope: a chunk whose embedding
//! fails is logged and dropped, never taking the rest of its file or the
//! run down with it. Chunk ids are deterministic, so re-running over an
//! unchanged corpus overwrites prior records instead of duplicating
//! them.
//!
//! # Chat
//!
//! embed → scope-filtered retrieval → load history → generate → append
//! history → answer with provenance. The steps run strictly in that
//! order within one request; unrelated requests interleave freely.

use anyhow::Result;

use crate::access::RoleScope;
use crate::chunk::chunk_file;
use crate::embedding::{l2_normalize, Embedder};
use crate::generate::{GenerationRequest, Generator};
use crate::index::VectorIndex;
use crate::memory::ConversationMemory;
use crate::models::{ChatResponse, IndexRecord, IngestReport, IngestStatus, SourceFile};

/// Chunker configuration for an ingestion run.
#[derive(Debug, Clone)]
pub struct ChunkingParams {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self {
            max_tokens: crate::chunk::DEFAULT_MAX_TOKENS,
            overlap_tokens: crate::chunk::DEFAULT_OVERLAP_TOKENS,
        }
    }
}

/// Run the ingestion pipeline over an already-scanned corpus.
///
/// Embedding is attempted per file batch for throughput; if the batch
/// call fails (or returns a malformed response), the file's chunks are
/// retried one at a time so that exactly the failing chunks are dropped.
/// The index is written in a single batched upsert at the end, and only
/// when at least one record was produced.
pub async fn run_ingest(
    files: &[SourceFile],
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
    chunking: &ChunkingParams,
) -> Result<IngestReport> {
    let mut report = IngestReport {
        status: IngestStatus::NoFilesFound,
        files_seen: 0,
        files_skipped: 0,
        chunks_embedded: 0,
        chunks_failed: 0,
    };

    if files.is_empty() {
        return Ok(report);
    }

    let mut records: Vec<IndexRecord> = Vec::new();

    for file in files {
        report.files_seen += 1;

        let chunks = chunk_file(file, chunking.max_tokens, chunking.overlap_tokens);
        if chunks.is_empty() {
            report.files_skipped += 1;
            continue;
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        match embedder.embed(&texts).await {
            Ok(vectors) if vectors.len() == chunks.len() => {
                for (chunk, vector) in chunks.iter().zip(vectors) {
                    records.push(IndexRecord {
                        id: chunk.id.clone(),
                        text: chunk.text.clone(),
                        embedding: l2_normalize(&vector),
                        access_group: file.access_group.clone(),
                    });
                    report.chunks_embedded += 1;
                }
            }
            outcome => {
                if let Err(e) = outcome {
                    tracing::warn!(
                        file = %file.file_name,
                        error = %e,
                        "batch embedding failed, retrying chunks individually"
                    );
                }
                for chunk in &chunks {
                    match embedder.embed_one(&chunk.text).await {
                        Ok(vector) => {
                            records.push(IndexRecord {
                                id: chunk.id.clone(),
                                text: chunk.text.clone(),
                                embedding: l2_normalize(&vector),
                                access_group: file.access_group.clone(),
                            });
                            report.chunks_embedded += 1;
                        }
                        Err(e) => {
                            tracing::warn!(
                                chunk = %chunk.id,
                                error = %e,
                                "skipping chunk: embedding failed"
                            );
                            report.chunks_failed += 1;
                        }
                    }
                }
            }
        }
    }

    if records.is_empty() {
        report.status = IngestStatus::NoValidChunks;
        return Ok(report);
    }

    index.upsert(&records).await?;
    report.status = IngestStatus::Completed {
        stored: records.len(),
    };
    Ok(report)
}

/// Inputs for a single chat-pipeline run.
#[derive(Debug, Clone)]
pub struct ChatRequest<'a> {
    pub question: &'a str,
    pub username: &'a str,
    /// The authenticated role, used to build the retrieval scope.
    pub role: &'a str,
    pub system_prompt: &'a str,
    pub top_k: usize,
}

/// Run the chat pipeline for one authenticated request.
///
/// Zero retrieved records is not an error: generation still runs with an
/// empty context list and the model falls back per its instructions.
pub async fn run_chat(
    req: &ChatRequest<'_>,
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
    memory: &ConversationMemory,
    generator: &dyn Generator,
) -> Result<ChatResponse> {
    let query_vec = l2_normalize(&embedder.embed_one(req.question).await?);

    let scope = RoleScope::for_role(req.role);
    let retrieved = index.query(&query_vec, &scope, req.top_k).await?;

    let history = memory.history(req.username);

    let generation = GenerationRequest {
        system_prompt: req.system_prompt.to_string(),
        history,
        contexts: retrieved.iter().map(|r| r.text.clone()).collect(),
        question: req.question.to_string(),
    };
    let answer = generator.generate(&generation).await?;

    memory.append(req.username, req.question, &answer);

    Ok(ChatResponse {
        answer,
        source_ids: retrieved.iter().map(|r| r.id.clone()).collect(),
        source_texts: retrieved.into_iter().map(|r| r.text).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::memory::InMemoryIndex;
    use anyhow::bail;
    use async_trait::async_trait;

    /// Deterministic embedder: hashes bytes into a small vector.
    /// Any text containing "UNEMBEDDABLE" fails.
    struct StubEmbedder;

    fn stub_vector(text: &str) -> Vec<f32> {
        let mut v = [0.0f32; 4];
        for (i, b) in text.bytes().enumerate() {
            v[i % 4] += b as f32;
        }
        v.to_vec()
    }

    #[async_trait]
    impl Embedder for StubEmbedder {
        fn model_name(&self) -> &str {
            "stub"
        }
        fn dims(&self) -> usize {
            4
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            texts
                .iter()
                .map(|t| {
                    if t.contains("UNEMBEDDABLE") {
                        bail!("embedding generation error for {:?}", &t[..20.min(t.len())]);
                    }
                    Ok(stub_vector(t))
                })
                .collect()
        }
    }

    /// Generator that reports how much context it was given.
    struct StubGenerator;

    #[async_trait]
    impl Generator for StubGenerator {
        async fn generate(&self, req: &GenerationRequest) -> Result<String> {
            Ok(format!(
                "answer using {} contexts after {} turns",
                req.contexts.len(),
                req.history.len()
            ))
        }
    }

    /// Embedder that returns a fixed query vector, for retrieval tests
    /// where the index is seeded with hand-built vectors.
    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        fn model_name(&self) -> &str {
            "fixed"
        }
        fn dims(&self) -> usize {
            self.0.len()
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| self.0.clone()).collect())
        }
    }

    fn file(name: &str, group: &str, body: &str) -> SourceFile {
        SourceFile {
            file_name: name.to_string(),
            access_group: group.to_string(),
            body: body.to_string(),
        }
    }

    fn seeded_record(id: &str, group: &str, embedding: Vec<f32>) -> IndexRecord {
        IndexRecord {
            id: id.to_string(),
            text: format!("text of {}", id),
            embedding: l2_normalize(&embedding),
            access_group: group.to_string(),
        }
    }

    #[tokio::test]
    async fn test_ingest_no_files() {
        let index = InMemoryIndex::new();
        let report = run_ingest(&[], &StubEmbedder, &index, &ChunkingParams::default())
            .await
            .unwrap();
        assert_eq!(report.status, IngestStatus::NoFilesFound);
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ingest_stores_chunks_with_group_tags() {
        let index = InMemoryIndex::new();
        let files = vec![
            file("policy.md", "hr", "no overtime pay"),
            file("faq.md", "general", "office hours 9-5"),
        ];
        let report = run_ingest(&files, &StubEmbedder, &index, &ChunkingParams::default())
            .await
            .unwrap();

        assert_eq!(report.status, IngestStatus::Completed { stored: 2 });
        assert_eq!(report.files_seen, 2);
        assert_eq!(index.count().await.unwrap(), 2);

        let scope = RoleScope::for_role("hr");
        let results = index
            .query(&l2_normalize(&stub_vector("no overtime pay")), &scope, 5)
            .await
            .unwrap();
        assert!(results.iter().any(|r| r.id == "policy.md_part_1"));
    }

    #[tokio::test]
    async fn test_ingest_empty_files_skipped() {
        let index = InMemoryIndex::new();
        let files = vec![
            file("blank.md", "general", "   \n"),
            file("faq.md", "general", "office hours 9-5"),
        ];
        let report = run_ingest(&files, &StubEmbedder, &index, &ChunkingParams::default())
            .await
            .unwrap();
        assert_eq!(report.files_skipped, 1);
        assert_eq!(report.status, IngestStatus::Completed { stored: 1 });
    }

    #[tokio::test]
    async fn test_ingest_failure_isolation() {
        let index = InMemoryIndex::new();
        // One bad chunk in the middle of a multi-chunk file: the batch
        // fails, the per-chunk retry keeps everything else.
        let body = format!(
            "{} UNEMBEDDABLE_SECTION {}",
            "alpha bravo charlie delta echo foxtrot golf hotel",
            "india juliett kilo lima mike november oscar papa"
        );
        let files = vec![file("mixed.md", "general", &body)];
        let params = ChunkingParams {
            max_tokens: 4,
            overlap_tokens: 0,
        };
        let report = run_ingest(&files, &StubEmbedder, &index, &params)
            .await
            .unwrap();

        assert_eq!(report.chunks_failed, 1);
        assert!(report.chunks_embedded > 0);
        assert_eq!(
            report.status,
            IngestStatus::Completed {
                stored: report.chunks_embedded
            }
        );
        assert_eq!(index.count().await.unwrap(), report.chunks_embedded);
    }

    #[tokio::test]
    async fn test_ingest_all_chunks_failing() {
        let index = InMemoryIndex::new();
        let files = vec![file("bad.md", "general", "UNEMBEDDABLE only content")];
        let report = run_ingest(&files, &StubEmbedder, &index, &ChunkingParams::default())
            .await
            .unwrap();
        assert_eq!(report.status, IngestStatus::NoValidChunks);
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ingest_idempotent() {
        let index = InMemoryIndex::new();
        let files = vec![
            file("policy.md", "hr", "no overtime pay"),
            file("faq.md", "general", "office hours 9-5"),
        ];
        let params = ChunkingParams::default();

        let first = run_ingest(&files, &StubEmbedder, &index, &params)
            .await
            .unwrap();
        let count_after_first = index.count().await.unwrap();
        let second = run_ingest(&files, &StubEmbedder, &index, &params)
            .await
            .unwrap();

        assert_eq!(first.status, second.status);
        assert_eq!(index.count().await.unwrap(), count_after_first);
    }

    #[tokio::test]
    async fn test_chat_retrieves_role_and_general_records() {
        let index = InMemoryIndex::new();
        index
            .upsert(&[
                seeded_record("hr_doc", "hr", vec![1.0, 0.0]),
                seeded_record("faq", "general", vec![0.9, 0.1]),
                seeded_record("eng_doc", "engineering", vec![0.95, 0.05]),
            ])
            .await
            .unwrap();

        let memory = ConversationMemory::default();
        let embedder = FixedEmbedder(vec![1.0, 0.0]);
        let req = ChatRequest {
            question: "what are the office hours?",
            username: "alice",
            role: "hr",
            system_prompt: "be helpful",
            top_k: 3,
        };
        let response = run_chat(&req, &embedder, &index, &memory, &StubGenerator)
            .await
            .unwrap();

        assert!(response.source_ids.contains(&"hr_doc".to_string()));
        assert!(response.source_ids.contains(&"faq".to_string()));
        assert!(
            !response.source_ids.contains(&"eng_doc".to_string()),
            "hr must never retrieve the engineering record"
        );
        assert_eq!(response.source_ids.len(), response.source_texts.len());
    }

    #[tokio::test]
    async fn test_chat_appends_memory_in_order() {
        let index = InMemoryIndex::new();
        let memory = ConversationMemory::default();
        let embedder = FixedEmbedder(vec![1.0, 0.0]);

        for (i, question) in ["first?", "second?", "third?"].iter().enumerate() {
            let req = ChatRequest {
                question,
                username: "alice",
                role: "hr",
                system_prompt: "be helpful",
                top_k: 3,
            };
            let response = run_chat(&req, &embedder, &index, &memory, &StubGenerator)
                .await
                .unwrap();
            assert!(response.answer.contains(&format!("after {} turns", i)));
        }

        let history = memory.history("alice");
        let inputs: Vec<&str> = history.iter().map(|t| t.input.as_str()).collect();
        assert_eq!(inputs, vec!["first?", "second?", "third?"]);
    }

    #[tokio::test]
    async fn test_chat_empty_retrieval_still_generates() {
        let index = InMemoryIndex::new();
        let memory = ConversationMemory::default();
        let embedder = FixedEmbedder(vec![1.0, 0.0]);
        let req = ChatRequest {
            question: "anything?",
            username: "bob",
            role: "engineering",
            system_prompt: "be helpful",
            top_k: 3,
        };
        let response = run_chat(&req, &embedder, &index, &memory, &StubGenerator)
            .await
            .unwrap();

        assert_eq!(response.answer, "answer using 0 contexts after 0 turns");
        assert!(response.source_ids.is_empty());
        assert!(response.source_texts.is_empty());
    }
}
