//! Request surface shared by the HTTP server and the CLI.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use repomind_index::{
    AnswerSynthesizer, ChunkStore, IndexError, IndexerConfig, QueryResult, RepoIndexer, Retriever,
};
use repomind_llm::LlmProvider;
use serde::{Deserialize, Serialize};

use crate::source::{RepoSource, SourceError, display_url};

pub const DEFAULT_N_RESULTS: usize = 5;
pub const MAX_N_RESULTS: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("failed to fetch repository: {0}")]
    Clone(#[from] SourceError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

impl ServiceError {
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Index(e) if e.is_rate_limited())
    }

    /// Caller-side mistakes, as opposed to failures of a collaborator.
    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::Clone(SourceError::InvalidUrl(_) | SourceError::NotADirectory { .. })
                | Self::Index(IndexError::InvalidConfig(_))
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResponse {
    pub message: String,
    pub repo_name: String,
    pub total_files: usize,
    pub total_chunks_processed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerResponse {
    pub ai_response: String,
    pub source_chunks: Vec<QueryResult>,
}

/// Ingest and answer, wired to one source, one store and one provider.
pub struct RepoService<P: LlmProvider> {
    source: Arc<dyn RepoSource>,
    indexer: RepoIndexer<P>,
    retriever: Retriever<P>,
    synthesizer: AnswerSynthesizer<P>,
    repos_dir: PathBuf,
    default_branch: String,
}

/// Explicit collaborators for [`RepoService::new`].
pub struct ServiceParts<P: LlmProvider> {
    pub source: Arc<dyn RepoSource>,
    pub store: ChunkStore,
    pub provider: Arc<P>,
    pub indexer: IndexerConfig,
    pub generation_timeout: std::time::Duration,
    pub response_language: Option<String>,
    pub repos_dir: PathBuf,
    pub default_branch: String,
}

impl<P: LlmProvider> RepoService<P> {
    #[must_use]
    pub fn new(parts: ServiceParts<P>) -> Self {
        let embed_timeout = parts.indexer.embed_timeout;
        Self {
            source: parts.source,
            retriever: Retriever::new(parts.store.clone(), Arc::clone(&parts.provider), embed_timeout),
            synthesizer: AnswerSynthesizer::new(Arc::clone(&parts.provider), parts.generation_timeout)
                .with_response_language(parts.response_language),
            indexer: RepoIndexer::new(parts.store, parts.provider, parts.indexer),
            repos_dir: parts.repos_dir,
            default_branch: parts.default_branch,
        }
    }

    /// Fetch `repo_url` into the checkout directory and index it as `repo_name`.
    ///
    /// # Errors
    ///
    /// `Validation` for an unusable name or URL, `Clone` when the source fails,
    /// `Index` for embedding or store failures.
    pub async fn ingest(
        &self,
        repo_url: &str,
        repo_name: &str,
        branch: Option<&str>,
    ) -> Result<IngestResponse, ServiceError> {
        let repo_name = repo_name.trim();
        validate_repo_name(repo_name)?;
        let repo_url = repo_url.trim();
        if repo_url.is_empty() {
            return Err(ServiceError::Validation("repo_url must not be empty".into()));
        }
        let branch = branch
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or(&self.default_branch);

        let start = Instant::now();
        let dest = self.repos_dir.join(repo_name);
        let checkout = self.source.fetch(repo_url, &dest, branch).await?;
        let report = self.indexer.index_repository(&checkout, repo_name).await?;

        tracing::info!(
            repo = repo_name,
            url = %display_url(repo_url),
            branch,
            files = report.total_files,
            chunks = report.total_chunks,
            elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "repository ingested"
        );

        Ok(IngestResponse {
            message: format!("Repository '{repo_name}' processed successfully."),
            repo_name: repo_name.to_owned(),
            total_files: report.total_files,
            total_chunks_processed: report.total_chunks,
        })
    }

    /// Answer `query_text` from the `n_results` nearest chunks, optionally scoped to one repo.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty question, a bad repo name or an out-of-range
    /// `n_results`; `Index` for embedding, store or generation failures.
    pub async fn answer(
        &self,
        query_text: &str,
        repo_name: Option<&str>,
        n_results: usize,
    ) -> Result<AnswerResponse, ServiceError> {
        let query_text = query_text.trim();
        if query_text.is_empty() {
            return Err(ServiceError::Validation("query_text must not be empty".into()));
        }
        if !(1..=MAX_N_RESULTS).contains(&n_results) {
            return Err(ServiceError::Validation(format!(
                "n_results must be between 1 and {MAX_N_RESULTS}"
            )));
        }
        let repo_name = repo_name.map(str::trim).filter(|r| !r.is_empty());
        if let Some(name) = repo_name {
            validate_repo_name(name)?;
        }

        let source_chunks = self
            .retriever
            .retrieve(query_text, repo_name, n_results)
            .await?;
        let ai_response = self.synthesizer.answer(query_text, &source_chunks).await?;

        tracing::info!(
            repo = repo_name.unwrap_or("*"),
            chunks = source_chunks.len(),
            "query answered"
        );
        Ok(AnswerResponse {
            ai_response,
            source_chunks,
        })
    }
}

/// A repository name becomes a directory under the checkout root, so it must
/// be one plain path component.
///
/// # Errors
///
/// Returns `ServiceError::Validation` describing the problem.
pub fn validate_repo_name(name: &str) -> Result<(), ServiceError> {
    if name.is_empty() {
        return Err(ServiceError::Validation("repo_name must not be empty".into()));
    }
    if name.len() > 100 {
        return Err(ServiceError::Validation(
            "repo_name must be at most 100 characters".into(),
        ));
    }
    if name == "." || name == ".." || name.starts_with('.') {
        return Err(ServiceError::Validation(format!(
            "repo_name must not start with a dot: {name}"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(ServiceError::Validation(format!(
            "repo_name may only contain letters, digits, '-', '_' and '.': {name}"
        )));
    }
    Ok(())
}
