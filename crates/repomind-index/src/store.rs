//! Chunk persistence and similarity search over a [`VectorStore`].

use std::collections::HashMap;
use std::sync::Arc;

use repomind_vectors::{VectorFilter, VectorPoint, VectorStore, VectorStoreError};
use tokio::sync::OnceCell;

use crate::chunker::ChunkMetadata;
use crate::error::{IndexError, Result};

const CONTENT_FIELD: &str = "content";
const REPO_FIELD: &str = "repo_name";

/// A chunk ready to be written: identity, text, metadata and vector travel together.
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    pub vector: Vec<f32>,
}

/// One retrieved chunk. `distance` is `1 - cosine similarity`; lower is closer.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct QueryResult {
    pub content: String,
    pub metadata: ChunkMetadata,
    pub distance: f32,
}

/// Chunk collection handle. Cloning shares the underlying store.
#[derive(Clone)]
pub struct ChunkStore {
    store: Arc<dyn VectorStore>,
    collection: String,
    ready: Arc<OnceCell<u64>>,
}

impl std::fmt::Debug for ChunkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkStore")
            .field("collection", &self.collection)
            .field("vector_size", &self.ready.get())
            .finish_non_exhaustive()
    }
}

impl ChunkStore {
    #[must_use]
    pub fn new(store: Arc<dyn VectorStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            ready: Arc::new(OnceCell::new()),
        }
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Write documents, creating the collection on first use.
    ///
    /// All documents must share one vector dimensionality.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::StoreWrite` if the store rejects the batch or the
    /// vectors disagree on dimensionality.
    pub async fn upsert(&self, documents: Vec<IndexedDocument>) -> Result<()> {
        let Some(first) = documents.first() else {
            return Ok(());
        };
        let dim = first.vector.len();
        if let Some(bad) = documents.iter().find(|d| d.vector.len() != dim) {
            return Err(IndexError::StoreWrite(VectorStoreError::Upsert(format!(
                "document {} has dimension {}, batch uses {dim}",
                bad.id,
                bad.vector.len()
            ))));
        }
        let vector_size = u64::try_from(dim)
            .map_err(|e| IndexError::StoreWrite(VectorStoreError::Upsert(e.to_string())))?;
        self.ensure_ready(vector_size).await?;

        let points = documents
            .into_iter()
            .map(document_to_point)
            .collect::<Result<Vec<_>>>()?;
        let count = points.len();
        self.store
            .upsert(&self.collection, points)
            .await
            .map_err(IndexError::StoreWrite)?;
        tracing::debug!(collection = %self.collection, count, "upserted chunks");
        Ok(())
    }

    async fn ensure_ready(&self, vector_size: u64) -> Result<()> {
        let created = *self
            .ready
            .get_or_try_init(|| async {
                self.store
                    .ensure_collection(&self.collection, vector_size)
                    .await?;
                self.store
                    .ensure_keyword_index(&self.collection, REPO_FIELD)
                    .await?;
                Ok::<_, VectorStoreError>(vector_size)
            })
            .await
            .map_err(IndexError::StoreWrite)?;
        if created != vector_size {
            return Err(IndexError::StoreWrite(VectorStoreError::Upsert(format!(
                "collection {} holds {created}-dimensional vectors, got {vector_size}",
                self.collection
            ))));
        }
        Ok(())
    }

    /// Nearest `k` chunks to `vector`, ascending by distance, optionally limited
    /// to one repository. A collection that was never written yields no results.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::StoreQuery` if the store cannot be queried.
    pub async fn query(
        &self,
        vector: Vec<f32>,
        k: usize,
        repo_name: Option<&str>,
    ) -> Result<Vec<QueryResult>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let exists = self
            .store
            .collection_exists(&self.collection)
            .await
            .map_err(IndexError::StoreQuery)?;
        if !exists {
            tracing::info!(collection = %self.collection, "collection not created yet");
            return Ok(Vec::new());
        }

        let filter = repo_name.map(|name| VectorFilter::text_eq(REPO_FIELD, name));
        let limit = u64::try_from(k).unwrap_or(u64::MAX);
        let hits = self
            .store
            .search(&self.collection, vector, limit, filter)
            .await
            .map_err(IndexError::StoreQuery)?;

        let mut results: Vec<QueryResult> = hits
            .into_iter()
            .filter_map(|hit| {
                let id = hit.id;
                match payload_to_result(hit.payload, hit.score) {
                    Ok(result) => Some(result),
                    Err(e) => {
                        tracing::warn!(%id, "skipping point with malformed payload: {e}");
                        None
                    }
                }
            })
            .collect();
        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        results.truncate(k);
        Ok(results)
    }
}

fn document_to_point(doc: IndexedDocument) -> Result<VectorPoint> {
    let serde_json::Value::Object(fields) = serde_json::to_value(&doc.metadata)
        .map_err(|e| IndexError::StoreWrite(VectorStoreError::Serialization(e.to_string())))?
    else {
        return Err(IndexError::StoreWrite(VectorStoreError::Serialization(
            "chunk metadata is not a JSON object".into(),
        )));
    };
    let mut payload: HashMap<String, serde_json::Value> = fields.into_iter().collect();
    payload.insert(CONTENT_FIELD.into(), serde_json::Value::String(doc.text));
    Ok(VectorPoint {
        id: doc.id,
        vector: doc.vector,
        payload,
    })
}

fn payload_to_result(
    mut payload: HashMap<String, serde_json::Value>,
    score: f32,
) -> std::result::Result<QueryResult, serde_json::Error> {
    let content = match payload.remove(CONTENT_FIELD) {
        Some(serde_json::Value::String(s)) => s,
        _ => String::new(),
    };
    let metadata: ChunkMetadata =
        serde_json::from_value(serde_json::Value::Object(payload.into_iter().collect()))?;
    Ok(QueryResult {
        content,
        metadata,
        distance: (1.0 - score).max(0.0),
    })
}

#[cfg(test)]
mod tests {
    use repomind_vectors::InMemoryVectorStore;

    use super::*;

    fn meta(repo: &str, path: &str, index: usize) -> ChunkMetadata {
        ChunkMetadata {
            file_path: path.into(),
            repo_name: repo.into(),
            language: "rust".into(),
            chunk_index: index,
            start_char: index * 800,
            end_char: index * 800 + 10,
        }
    }

    fn doc(id: &str, repo: &str, vector: Vec<f32>) -> IndexedDocument {
        IndexedDocument {
            id: id.into(),
            text: format!("text of {id}"),
            metadata: meta(repo, &format!("src/{id}.rs"), 0),
            vector,
        }
    }

    fn store() -> (Arc<InMemoryVectorStore>, ChunkStore) {
        let backend = Arc::new(InMemoryVectorStore::new());
        let chunks = ChunkStore::new(backend.clone(), "chunks");
        (backend, chunks)
    }

    #[tokio::test]
    async fn collection_created_lazily() {
        let (backend, chunks) = store();
        assert!(!backend.collection_exists("chunks").await.unwrap());
        chunks
            .upsert(vec![doc("a", "r", vec![1.0, 0.0])])
            .await
            .unwrap();
        assert!(backend.collection_exists("chunks").await.unwrap());
        assert_eq!(backend.len("chunks"), 1);
    }

    #[tokio::test]
    async fn empty_upsert_does_not_create_collection() {
        let (backend, chunks) = store();
        chunks.upsert(Vec::new()).await.unwrap();
        assert!(!backend.collection_exists("chunks").await.unwrap());
    }

    #[tokio::test]
    async fn query_before_any_write_is_empty() {
        let (_, chunks) = store();
        let results = chunks.query(vec![1.0, 0.0], 5, None).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn query_round_trips_metadata_and_orders_by_distance() {
        let (_, chunks) = store();
        chunks
            .upsert(vec![
                doc("far", "r", vec![0.0, 1.0]),
                doc("near", "r", vec![1.0, 0.1]),
            ])
            .await
            .unwrap();

        let results = chunks.query(vec![1.0, 0.0], 5, None).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "text of near");
        assert_eq!(results[0].metadata, meta("r", "src/near.rs", 0));
        assert!(results[0].distance < results[1].distance);
        assert!(results.iter().all(|r| r.distance >= 0.0));
    }

    #[tokio::test]
    async fn query_filters_by_repo() {
        let (_, chunks) = store();
        chunks
            .upsert(vec![
                doc("a", "alpha", vec![1.0, 0.0]),
                doc("b", "beta", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let results = chunks.query(vec![1.0, 0.0], 5, Some("beta")).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].metadata.repo_name, "beta");
    }

    #[tokio::test]
    async fn query_zero_k_is_empty() {
        let (_, chunks) = store();
        chunks
            .upsert(vec![doc("a", "r", vec![1.0, 0.0])])
            .await
            .unwrap();
        assert!(chunks.query(vec![1.0, 0.0], 0, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mixed_dimensions_rejected_before_write() {
        let (backend, chunks) = store();
        let err = chunks
            .upsert(vec![doc("a", "r", vec![1.0, 0.0]), doc("b", "r", vec![1.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::StoreWrite(_)));
        assert!(backend.is_empty("chunks"));
    }

    #[tokio::test]
    async fn dimension_change_between_batches_rejected() {
        let (_, chunks) = store();
        chunks
            .upsert(vec![doc("a", "r", vec![1.0, 0.0])])
            .await
            .unwrap();
        let err = chunks
            .upsert(vec![doc("b", "r", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::StoreWrite(_)));
    }

    #[test]
    fn payload_includes_content_and_metadata() {
        let point = document_to_point(doc("a", "r", vec![1.0])).unwrap();
        assert_eq!(point.payload["content"], "text of a");
        assert_eq!(point.payload["repo_name"], "r");
        assert_eq!(point.payload["chunk_index"], 0);
    }

    #[test]
    fn malformed_payload_is_error() {
        let payload = HashMap::from([("content".to_owned(), serde_json::json!("x"))]);
        assert!(payload_to_result(payload, 0.5).is_err());
    }

    #[test]
    fn opposite_vectors_have_distance_above_one() {
        let mut payload: HashMap<String, serde_json::Value> =
            match serde_json::to_value(meta("r", "a.rs", 0)).unwrap() {
                serde_json::Value::Object(m) => m.into_iter().collect(),
                _ => unreachable!(),
            };
        payload.insert("content".into(), serde_json::json!("x"));
        let result = payload_to_result(payload, -0.5).unwrap();
        assert!((result.distance - 1.5).abs() < f32::EPSILON);
    }
}
