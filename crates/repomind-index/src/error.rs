//! Error types for repomind-index.

use std::path::PathBuf;

use repomind_llm::LlmError;
use repomind_vectors::VectorStoreError;

/// Errors that abort an ingestion or query request.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Repository root is missing or not a directory.
    #[error("invalid repository root {}: {reason}", path.display())]
    InvalidRoot { path: PathBuf, reason: String },

    /// Chunking, batching or ignore-pattern parameters are unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The embedding provider failed, timed out, or returned misaligned vectors.
    #[error("embedding service error: {0}")]
    Embedding(#[source] LlmError),

    /// The vector store rejected a write.
    #[error("vector store write failed: {0}")]
    StoreWrite(#[source] VectorStoreError),

    /// The vector store could not answer a query.
    #[error("vector store query failed: {0}")]
    StoreQuery(#[source] VectorStoreError),

    /// The language model failed to produce an answer.
    #[error("answer generation failed: {0}")]
    Generation(#[source] LlmError),
}

impl IndexError {
    /// True when the failure is a provider rate limit, on either the embedding
    /// or the generation side.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::Embedding(e) | Self::Generation(e) => e.is_rate_limited(),
            _ => false,
        }
    }
}

/// A file that could not be turned into text. Never fatal: the file is skipped.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} looks like a binary file", path.display())]
    Binary { path: PathBuf },
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_detected_for_generation() {
        let err = IndexError::Generation(LlmError::RateLimited { provider: "openai" });
        assert!(err.is_rate_limited());
    }

    #[test]
    fn rate_limit_not_reported_for_store_errors() {
        let err = IndexError::StoreQuery(VectorStoreError::Search("down".into()));
        assert!(!err.is_rate_limited());
    }

    #[test]
    fn invalid_root_message_names_path() {
        let err = IndexError::InvalidRoot {
            path: PathBuf::from("/nope"),
            reason: "does not exist".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid repository root /nope: does not exist"
        );
    }
}
