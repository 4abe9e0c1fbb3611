//! Ingestion orchestrator: walk → load → chunk → embed → store.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use repomind_llm::{LlmError, LlmProvider, with_deadline};

use crate::chunker::{Chunk, ChunkerConfig, chunk_text};
use crate::discovery::{DiscoveryConfig, canonical_root, discover_files, relative_path};
use crate::error::{IndexError, Result};
use crate::loader::{has_content, load_text};
use crate::store::{ChunkStore, IndexedDocument};

/// Indexer configuration.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub chunker: ChunkerConfig,
    pub discovery: DiscoveryConfig,
    /// Maximum chunks per embedding request.
    pub embed_batch_size: usize,
    pub embed_timeout: Duration,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            chunker: ChunkerConfig::default(),
            discovery: DiscoveryConfig::default(),
            embed_batch_size: 100,
            embed_timeout: Duration::from_secs(120),
        }
    }
}

impl IndexerConfig {
    /// # Errors
    ///
    /// Returns `IndexError::InvalidConfig` for bad chunk parameters or a zero batch size.
    pub fn validate(&self) -> Result<()> {
        self.chunker.validate()?;
        if self.embed_batch_size == 0 {
            return Err(IndexError::InvalidConfig(
                "embed_batch_size must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Summary of an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    /// Files that produced at least one chunk.
    pub total_files: usize,
    pub files_discovered: usize,
    /// Unreadable, binary or blank files.
    pub files_skipped: usize,
    pub total_chunks: usize,
    pub batches: usize,
    pub duration_ms: u64,
}

/// Ingests a checked-out repository into a [`ChunkStore`].
pub struct RepoIndexer<P: LlmProvider> {
    store: ChunkStore,
    provider: Arc<P>,
    config: IndexerConfig,
}

impl<P: LlmProvider> RepoIndexer<P> {
    #[must_use]
    pub fn new(store: ChunkStore, provider: Arc<P>, config: IndexerConfig) -> Self {
        Self {
            store,
            provider,
            config,
        }
    }

    /// Index every eligible file under `root`, tagging chunks with `repo_name`.
    ///
    /// Chunks are embedded and written in batches of `embed_batch_size`. Each
    /// batch is written only after its embeddings arrive intact, so a failed
    /// batch never reaches the store. Batches written before a failure stay.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig`, `InvalidRoot`, `Embedding` or `StoreWrite`.
    /// A provider without embedding support fails before any file is read.
    /// Unreadable files are skipped, not reported as errors.
    pub async fn index_repository(&self, root: &Path, repo_name: &str) -> Result<IndexReport> {
        let start = Instant::now();
        self.config.validate()?;
        if !self.provider.supports_embeddings() {
            return Err(IndexError::Embedding(LlmError::EmbedUnsupported {
                provider: self.provider.name(),
            }));
        }
        let root = canonical_root(root)?;
        let files = discover_files(&root, &self.config.discovery)?;

        let mut report = IndexReport {
            files_discovered: files.len(),
            ..IndexReport::default()
        };
        tracing::info!(repo = repo_name, files = files.len(), "indexing started");

        let batch_size = self.config.embed_batch_size;
        let mut pending: Vec<Chunk> = Vec::new();
        let mut dimension = None;

        for path in &files {
            let rel_path = relative_path(&root, path);
            let text = match load_text(path).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(file = %rel_path, "skipping file: {e}");
                    report.files_skipped += 1;
                    continue;
                }
            };
            if !has_content(&text) {
                tracing::debug!(file = %rel_path, "skipping blank file");
                report.files_skipped += 1;
                continue;
            }

            let chunks = chunk_text(&text, &rel_path, repo_name, &self.config.chunker)?;
            tracing::debug!(file = %rel_path, chunks = chunks.len());
            report.total_files += 1;
            pending.extend(chunks);

            while pending.len() >= batch_size {
                let batch: Vec<Chunk> = pending.drain(..batch_size).collect();
                self.write_batch(batch, &mut dimension, &mut report).await?;
            }
        }
        if !pending.is_empty() {
            self.write_batch(pending, &mut dimension, &mut report)
                .await?;
        }

        report.duration_ms = start.elapsed().as_millis().try_into().unwrap_or(u64::MAX);
        tracing::info!(
            repo = repo_name,
            files = report.total_files,
            skipped = report.files_skipped,
            chunks = report.total_chunks,
            batches = report.batches,
            duration_ms = report.duration_ms,
            "indexing finished"
        );
        Ok(report)
    }

    async fn write_batch(
        &self,
        batch: Vec<Chunk>,
        dimension: &mut Option<usize>,
        report: &mut IndexReport,
    ) -> Result<()> {
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
        let vectors = with_deadline(
            "embedding",
            self.config.embed_timeout,
            self.provider.embed_batch(&texts),
        )
        .await
        .and_then(|vectors| check_vectors(vectors, texts.len(), dimension))
        .map_err(|e| {
            tracing::error!(
                persisted = report.total_chunks,
                batch = report.batches + 1,
                "embedding failed, aborting ingestion: {e}"
            );
            IndexError::Embedding(e)
        })?;

        let count = batch.len();
        let documents = batch
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexedDocument {
                id: uuid::Uuid::new_v4().to_string(),
                text: chunk.content,
                metadata: chunk.metadata,
                vector,
            })
            .collect();

        self.store.upsert(documents).await.inspect_err(|e| {
            tracing::error!(persisted = report.total_chunks, "store write failed: {e}");
        })?;

        report.total_chunks += count;
        report.batches += 1;
        Ok(())
    }
}

/// Verify one non-empty vector per input, all of the run's dimensionality.
fn check_vectors(
    vectors: Vec<Vec<f32>>,
    expected: usize,
    dimension: &mut Option<usize>,
) -> std::result::Result<Vec<Vec<f32>>, LlmError> {
    if vectors.len() != expected {
        return Err(LlmError::EmbeddingMismatch {
            expected,
            actual: vectors.len(),
        });
    }
    let dim = *dimension.get_or_insert(vectors.first().map_or(0, Vec::len));
    if dim == 0 || vectors.iter().any(|v| v.len() != dim) {
        return Err(LlmError::Other(format!(
            "embedding vectors do not share dimensionality {dim}"
        )));
    }
    Ok(vectors)
}
