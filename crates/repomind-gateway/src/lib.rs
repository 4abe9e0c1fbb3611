//! HTTP request surface: repository ingestion and question answering with
//! optional bearer auth and a health endpoint.

mod error;
mod handlers;
mod router;
mod server;

pub use error::GatewayError;
pub use server::GatewayServer;

#[cfg(test)]
mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use repomind_core::{LocalSource, RepoService, ServiceParts};
    use repomind_index::{ChunkStore, IndexerConfig};
    use repomind_llm::AnyProvider;
    use repomind_llm::mock::MockProvider;
    use repomind_vectors::InMemoryVectorStore;

    pub(crate) fn service_with(
        provider: MockProvider,
    ) -> (Arc<RepoService<AnyProvider>>, tempfile::TempDir) {
        let work = tempfile::tempdir().unwrap();
        let service = RepoService::new(ServiceParts {
            source: Arc::new(LocalSource),
            store: ChunkStore::new(Arc::new(InMemoryVectorStore::new()), "chunks"),
            provider: Arc::new(AnyProvider::Mock(provider)),
            indexer: IndexerConfig::default(),
            generation_timeout: Duration::from_secs(5),
            response_language: None,
            repos_dir: work.path().to_path_buf(),
            default_branch: "main".into(),
        });
        (Arc::new(service), work)
    }

    pub(crate) fn fixture_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.go"), "package main\n\nfunc main() {}\n").unwrap();
        std::fs::write(dir.path().join("NOTES.txt"), "Deployment notes.\n").unwrap();
        dir
    }
}
