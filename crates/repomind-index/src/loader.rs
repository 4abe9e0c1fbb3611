//! File content decoding with a single-byte fallback.

use std::path::Path;

use crate::error::DecodeError;

/// Read a file and decode it as UTF-8, falling back to ISO-8859-1.
///
/// Files containing NUL bytes are reported as binary.
///
/// # Errors
///
/// Returns a [`DecodeError`] when the file cannot be read or is binary. Callers
/// skip such files.
pub async fn load_text(path: &Path) -> Result<String, DecodeError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode(bytes, path)
}

/// Decode raw bytes. `path` is used for error reporting only.
///
/// # Errors
///
/// Returns `DecodeError::Binary` if the bytes contain a NUL.
pub fn decode(bytes: Vec<u8>, path: &Path) -> Result<String, DecodeError> {
    if bytes.contains(&0) {
        return Err(DecodeError::Binary {
            path: path.to_path_buf(),
        });
    }
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(e) => {
            tracing::debug!(path = %path.display(), "not valid UTF-8, decoding as latin-1");
            Ok(e.into_bytes().into_iter().map(char::from).collect())
        }
    }
}

/// Whether decoded text is worth chunking.
#[must_use]
pub fn has_content(text: &str) -> bool {
    !text.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_utf8() {
        let text = decode("héllo wörld".as_bytes().to_vec(), Path::new("a.txt")).unwrap();
        assert_eq!(text, "héllo wörld");
    }

    #[test]
    fn decode_falls_back_to_latin1() {
        // "café" in ISO-8859-1
        let bytes = vec![0x63, 0x61, 0x66, 0xE9];
        let text = decode(bytes, Path::new("legacy.c")).unwrap();
        assert_eq!(text, "café");
    }

    #[test]
    fn decode_rejects_nul_bytes() {
        let err = decode(vec![0x7F, 0x45, 0x4C, 0x46, 0x00, 0x01], Path::new("a.out")).unwrap_err();
        assert!(matches!(err, DecodeError::Binary { .. }));
        assert!(err.to_string().contains("a.out"));
    }

    #[test]
    fn has_content_rejects_whitespace() {
        assert!(!has_content(""));
        assert!(!has_content(" \n\t\r\n"));
        assert!(has_content("  x  "));
    }

    #[tokio::test]
    async fn load_text_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.go");
        std::fs::write(&path, "package main\n").unwrap();
        assert_eq!(load_text(&path).await.unwrap(), "package main\n");
    }

    #[tokio::test]
    async fn load_text_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_text(&dir.path().join("gone.rs")).await.unwrap_err();
        assert!(matches!(err, DecodeError::Io { .. }));
    }
}
