//! End-to-end ingest and answer through the service layer with an in-memory store.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use repomind_core::service::DEFAULT_N_RESULTS;
use repomind_core::{LocalSource, RepoService, ServiceError, ServiceParts};
use repomind_index::{ChunkStore, IndexerConfig};
use repomind_llm::mock::MockProvider;
use repomind_vectors::InMemoryVectorStore;

const COLLECTION: &str = "repomind_chunks";

fn service(
    provider: MockProvider,
    store: &Arc<InMemoryVectorStore>,
    repos_dir: &Path,
) -> RepoService<MockProvider> {
    RepoService::new(ServiceParts {
        source: Arc::new(LocalSource),
        store: ChunkStore::new(Arc::clone(store) as _, COLLECTION),
        provider: Arc::new(provider),
        indexer: IndexerConfig::default(),
        generation_timeout: Duration::from_secs(5),
        response_language: None,
        repos_dir: repos_dir.to_path_buf(),
        default_branch: "main".into(),
    })
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

#[tokio::test]
async fn ingest_counts_overlapping_chunks_and_skips_git_metadata() {
    let repo = tempfile::tempdir().unwrap();
    write(repo.path(), "small.py", &"a".repeat(500));
    write(repo.path(), "exact.rs", &"b".repeat(1000));
    write(repo.path(), "docs/large.md", &"c".repeat(2500));
    write(repo.path(), ".git/config", "[core]\n\tbare = false\n");
    write(repo.path(), ".git/HEAD", "ref: refs/heads/main\n");

    let work = tempfile::tempdir().unwrap();
    let store = Arc::new(InMemoryVectorStore::new());
    let svc = service(MockProvider::default(), &store, work.path());

    let report = svc
        .ingest(&repo.path().to_string_lossy(), "fixture", None)
        .await
        .unwrap();
    assert_eq!(report.total_files, 3);
    // 1 + 1 + 3 windows of 1000 chars with 200 overlap
    assert_eq!(report.total_chunks_processed, 5);

    let answer = svc.answer("what is here?", Some("fixture"), 50).await.unwrap();
    assert_eq!(answer.source_chunks.len(), 5);
    assert!(
        answer
            .source_chunks
            .iter()
            .all(|c| !c.metadata.file_path.starts_with(".git"))
    );
    let large: Vec<_> = answer
        .source_chunks
        .iter()
        .filter(|c| c.metadata.file_path == "docs/large.md")
        .collect();
    assert_eq!(large.len(), 3);
    assert!(large.iter().any(|c| c.metadata.start_char == 1600 && c.metadata.end_char == 2500));
}

#[tokio::test]
async fn failed_embedding_leaves_store_empty() {
    let repo = tempfile::tempdir().unwrap();
    write(repo.path(), "main.go", "package main\n\nfunc main() {}\n");
    let work = tempfile::tempdir().unwrap();
    let store = Arc::new(InMemoryVectorStore::new());

    let failing = service(MockProvider::default().failing_embed_after(0), &store, work.path());
    let err = failing
        .ingest(&repo.path().to_string_lossy(), "broken", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Index(_)));

    let healthy = service(MockProvider::default(), &store, work.path());
    let answer = healthy
        .answer("what does main do?", Some("broken"), DEFAULT_N_RESULTS)
        .await
        .unwrap();
    assert!(answer.source_chunks.is_empty());
}

#[tokio::test]
async fn answer_returns_at_most_available_chunks_nearest_first() {
    let repo = tempfile::tempdir().unwrap();
    let near = "def handler():\n    return 'near'\n";
    let far = "# Notes\nUnrelated prose.\n";
    write(repo.path(), "near.py", near);
    write(repo.path(), "far.md", far);

    let provider = MockProvider::with_responses(vec!["The handler returns 'near'.".into()])
        .with_text_embedding(near, vec![1.0, 0.0, 0.0])
        .with_text_embedding(far, vec![0.0, 1.0, 0.0])
        .with_text_embedding("what does handler return?", vec![0.9, 0.1, 0.0]);

    let work = tempfile::tempdir().unwrap();
    let store = Arc::new(InMemoryVectorStore::new());
    let svc = service(provider, &store, work.path());
    svc.ingest(&repo.path().to_string_lossy(), "two-docs", None)
        .await
        .unwrap();

    let answer = svc
        .answer("what does handler return?", Some("two-docs"), DEFAULT_N_RESULTS)
        .await
        .unwrap();
    assert_eq!(answer.ai_response, "The handler returns 'near'.");
    assert_eq!(answer.source_chunks.len(), 2);
    assert_eq!(answer.source_chunks[0].metadata.file_path, "near.py");
    assert!(answer.source_chunks[0].distance <= answer.source_chunks[1].distance);
}

#[tokio::test]
async fn repositories_are_isolated_by_name() {
    let first = tempfile::tempdir().unwrap();
    write(first.path(), "a.rs", "fn a() {}\n");
    let second = tempfile::tempdir().unwrap();
    write(second.path(), "b.rs", "fn b() {}\n");

    let work = tempfile::tempdir().unwrap();
    let store = Arc::new(InMemoryVectorStore::new());
    let svc = service(MockProvider::default(), &store, work.path());
    svc.ingest(&first.path().to_string_lossy(), "first", None)
        .await
        .unwrap();
    svc.ingest(&second.path().to_string_lossy(), "second", None)
        .await
        .unwrap();

    let scoped = svc.answer("which fn?", Some("second"), 10).await.unwrap();
    assert_eq!(scoped.source_chunks.len(), 1);
    assert_eq!(scoped.source_chunks[0].metadata.repo_name, "second");

    let all = svc.answer("which fn?", None, 10).await.unwrap();
    assert_eq!(all.source_chunks.len(), 2);
}
