//! Ingestion orchestration.
//!
//! Wires the corpus scanner into the core ingestion pipeline: scan the
//! corpus root, then chunk, embed, and upsert through the configured
//! providers. Re-running ingestion over the same corpus is idempotent
//! because chunk ids are derived from file name and position.

use anyhow::Result;

use raggate_core::embedding::Embedder;
use raggate_core::index::VectorIndex;
use raggate_core::models::{IngestReport, IngestStatus};
use raggate_core::pipeline::{run_ingest, ChunkingParams};

use crate::config::Config;
use crate::corpus::{scan_corpus, CorpusError};
use crate::db;
use crate::embedding::create_embedder;
use crate::migrate;
use crate::sqlite_index::SqliteIndex;

/// Scan the corpus and run the ingestion pipeline against the given
/// providers. An empty corpus is a "nothing to do" report, not an error;
/// a missing corpus root is fatal.
pub async fn ingest_corpus(
    config: &Config,
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
) -> Result<IngestReport> {
    let files = match scan_corpus(&config.corpus.root) {
        Ok(files) => files,
        Err(CorpusError::Empty(root)) => {
            tracing::info!(root = %root.display(), "corpus root is empty");
            return Ok(IngestReport {
                status: IngestStatus::NoFilesFound,
                files_seen: 0,
                files_skipped: 0,
                chunks_embedded: 0,
                chunks_failed: 0,
            });
        }
        Err(e) => return Err(e.into()),
    };

    let chunking = ChunkingParams {
        max_tokens: config.chunking.max_tokens,
        overlap_tokens: config.chunking.overlap_tokens,
    };

    run_ingest(&files, embedder, index, &chunking).await
}

/// CLI entry point: connect, migrate, ingest, print a summary.
pub async fn run_ingest_command(config: &Config) -> Result<()> {
    let pool = db::connect(&config.db.path).await?;
    migrate::run_migrations(&pool).await?;

    let embedder = create_embedder(&config.embedding)?;
    let index = SqliteIndex::new(pool.clone());

    let report = ingest_corpus(config, embedder.as_ref(), &index).await?;

    println!("ingest {}", config.corpus.root.display());
    println!("  files seen: {}", report.files_seen);
    println!("  files skipped: {}", report.files_skipped);
    println!("  chunks embedded: {}", report.chunks_embedded);
    println!("  chunks failed: {}", report.chunks_failed);
    println!("  indexed records: {}", index.count().await?);
    println!("{}", report.message());

    pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_config, Config};
    use async_trait::async_trait;
    use std::fs;
    use std::path::Path;

    struct FakeEmbedder;

    #[async_trait]
    impl Embedder for FakeEmbedder {
        fn model_name(&self) -> &str {
            "fake"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    fn config_for(dir: &Path) -> Config {
        let body = format!(
            r#"
[db]
path = "{}/data/test.sqlite"

[corpus]
root = "{}/corpus"

[server]
bind = "127.0.0.1:0"
"#,
            dir.display(),
            dir.display()
        );
        let path = dir.join("raggate.toml");
        fs::write(&path, body).unwrap();
        load_config(&path).unwrap()
    }

    #[tokio::test]
    async fn test_empty_corpus_reports_no_files() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("corpus")).unwrap();
        let config = config_for(tmp.path());

        let pool = db::connect(&config.db.path).await.unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        let index = SqliteIndex::new(pool);

        let report = ingest_corpus(&config, &FakeEmbedder, &index).await.unwrap();
        assert!(matches!(report.status, IngestStatus::NoFilesFound));
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_corpus_root_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_for(tmp.path());

        let pool = db::connect(&config.db.path).await.unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        let index = SqliteIndex::new(pool);

        assert!(ingest_corpus(&config, &FakeEmbedder, &index).await.is_err());
    }

    #[tokio::test]
    async fn test_ingest_indexes_corpus_files() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("corpus/hr")).unwrap();
        fs::create_dir_all(tmp.path().join("corpus/general")).unwrap();
        fs::write(tmp.path().join("corpus/hr/policy.md"), "no overtime pay").unwrap();
        fs::write(tmp.path().join("corpus/general/faq.md"), "office hours 9-5").unwrap();
        let config = config_for(tmp.path());

        let pool = db::connect(&config.db.path).await.unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        let index = SqliteIndex::new(pool);

        let report = ingest_corpus(&config, &FakeEmbedder, &index).await.unwrap();
        assert!(matches!(report.status, IngestStatus::Completed { stored: 2 }));
        assert_eq!(index.count().await.unwrap(), 2);

        // Re-ingesting replaces rather than duplicates.
        ingest_corpus(&config, &FakeEmbedder, &index).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 2);
    }
}
