//! Query-side retrieval: embed the question, fetch the nearest chunks.

use std::sync::Arc;
use std::time::Duration;

use repomind_llm::{LlmProvider, with_deadline};

use crate::error::{IndexError, Result};
use crate::store::{ChunkStore, QueryResult};

pub struct Retriever<P: LlmProvider> {
    store: ChunkStore,
    provider: Arc<P>,
    embed_timeout: Duration,
}

impl<P: LlmProvider> Retriever<P> {
    #[must_use]
    pub fn new(store: ChunkStore, provider: Arc<P>, embed_timeout: Duration) -> Self {
        Self {
            store,
            provider,
            embed_timeout,
        }
    }

    /// Up to `k` chunks nearest to `query`, ascending by distance.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Embedding` if the question cannot be embedded, or
    /// `IndexError::StoreQuery` if the search fails.
    pub async fn retrieve(
        &self,
        query: &str,
        repo_name: Option<&str>,
        k: usize,
    ) -> Result<Vec<QueryResult>> {
        let vector = with_deadline("embedding", self.embed_timeout, self.provider.embed(query))
            .await
            .map_err(IndexError::Embedding)?;
        let results = self.store.query(vector, k, repo_name).await?;
        tracing::debug!(
            repo = repo_name.unwrap_or("*"),
            requested = k,
            found = results.len(),
            "retrieved chunks"
        );
        Ok(results)
    }
}
