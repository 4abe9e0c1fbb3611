//! Fixed-size overlapping character windows.
//!
//! Offsets and sizes count Unicode scalar values, so a window never splits a
//! character and `end_char - start_char` equals `content.chars().count()`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::languages::detect_language;

/// Chunker configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks.
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

impl ChunkerConfig {
    /// # Errors
    ///
    /// Returns `IndexError::InvalidConfig` unless `0 <= overlap < chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        let config = Self {
            chunk_size,
            overlap,
        };
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns `IndexError::InvalidConfig` unless `0 <= overlap < chunk_size`.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(IndexError::InvalidConfig(
                "chunk_size must be greater than zero".into(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(IndexError::InvalidConfig(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    /// Distance between the starts of consecutive chunks.
    #[must_use]
    pub fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }

    /// Number of chunks produced for a text of `len` characters.
    #[must_use]
    pub fn expected_chunks(&self, len: usize) -> usize {
        match len {
            0 => 0,
            l if l <= self.chunk_size => 1,
            l => 1 + (l - self.chunk_size).div_ceil(self.stride()),
        }
    }
}

/// Payload stored alongside every chunk vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub file_path: String,
    pub repo_name: String,
    pub language: String,
    pub chunk_index: usize,
    pub start_char: usize,
    pub end_char: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// Split `text` into overlapping windows tagged with file and repository metadata.
///
/// Windows start at `0, stride, 2*stride, ...`; the last window is the first
/// one that reaches the end of the text. Empty text yields no chunks.
///
/// # Errors
///
/// Returns `IndexError::InvalidConfig` if `config` is invalid.
pub fn chunk_text(
    text: &str,
    file_path: &str,
    repo_name: &str,
    config: &ChunkerConfig,
) -> Result<Vec<Chunk>> {
    config.validate()?;

    // Byte offset of every char boundary, plus the end of the string.
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let len = boundaries.len() - 1;
    let language = detect_language(Path::new(file_path)).id();

    let mut chunks = Vec::with_capacity(config.expected_chunks(len));
    let mut start = 0;
    while start < len {
        let end = (start + config.chunk_size).min(len);
        chunks.push(Chunk {
            content: text[boundaries[start]..boundaries[end]].to_owned(),
            metadata: ChunkMetadata {
                file_path: file_path.to_owned(),
                repo_name: repo_name.to_owned(),
                language: language.to_owned(),
                chunk_index: chunks.len(),
                start_char: start,
                end_char: end,
            },
        });
        if end == len {
            break;
        }
        start += config.stride();
    }

    Ok(chunks)
}
