//! Repository RAG pipeline.
//!
//! Ingestion walks a checkout, decodes each file, cuts it into overlapping
//! character windows, embeds the windows in bounded batches and stores them in
//! a vector collection. Queries embed the question, fetch the nearest chunks
//! (optionally restricted to one repository) and hand them to the language
//! model as labelled context.

pub mod chunker;
pub mod discovery;
pub mod error;
pub mod indexer;
pub mod languages;
pub mod loader;
pub mod retriever;
pub mod store;
pub mod synthesizer;

pub use chunker::{Chunk, ChunkMetadata, ChunkerConfig, chunk_text};
pub use error::{DecodeError, IndexError, Result};
pub use indexer::{IndexReport, IndexerConfig, RepoIndexer};
pub use retriever::Retriever;
pub use store::{ChunkStore, IndexedDocument, QueryResult};
pub use synthesizer::AnswerSynthesizer;
