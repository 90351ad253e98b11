//! File intake: turn a source reference into PDF bytes, rejecting non-PDF input

use crate::error::{Error, Result};
use crate::source::CacheManager;
use base64::Engine;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// An input file accepted at intake. Immutable once created.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Display name: the path, the supplied file name, or a placeholder
    pub name: String,
    pub data: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// True when the bytes start with the `%PDF` marker
pub fn has_pdf_header(data: &[u8]) -> bool {
    data.len() >= 4 && &data[0..4] == b"%PDF"
}

/// True when the name carries a `.pdf` extension (any case)
pub fn has_pdf_extension<P: AsRef<Path>>(name: P) -> bool {
    name.as_ref()
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Resolve a file path to a source file
pub fn resolve_path<P: AsRef<Path>>(path: P) -> Result<SourceFile> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(Error::PdfNotFound {
            path: path.display().to_string(),
        });
    }

    if !has_pdf_extension(path) {
        return Err(Error::UnsupportedFile {
            name: path.display().to_string(),
        });
    }

    let data = std::fs::read(path).map_err(Error::Io)?;

    if !has_pdf_header(&data) {
        return Err(Error::InvalidPdf {
            reason: "Not a valid PDF file".to_string(),
        });
    }

    Ok(SourceFile::new(path.display().to_string(), data))
}

/// Resolve base64 encoded data to a source file.
///
/// `name` is the original file name, if the caller knows it; it must end in
/// `.pdf` when present.
pub fn resolve_base64(base64_data: &str, name: Option<&str>) -> Result<SourceFile> {
    if let Some(name) = name {
        if !has_pdf_extension(name) {
            return Err(Error::UnsupportedFile {
                name: name.to_string(),
            });
        }
    }

    let data = base64::engine::general_purpose::STANDARD.decode(base64_data.trim())?;

    if !has_pdf_header(&data) {
        return Err(Error::InvalidPdf {
            reason: "Decoded data is not a valid PDF file".to_string(),
        });
    }

    Ok(SourceFile::new(name.unwrap_or("<base64>"), data))
}

/// Resolve a cache key to the output stored under it
pub async fn resolve_cache(
    cache_key: &str,
    cache: &Arc<RwLock<CacheManager>>,
) -> Result<SourceFile> {
    let cache_guard = cache.read().await;
    let entry = cache_guard
        .get(cache_key)
        .ok_or_else(|| Error::CacheKeyNotFound {
            key: cache_key.to_string(),
        })?;

    // Archives are cached too, but they are not PDF input.
    if !has_pdf_header(&entry.data) {
        return Err(Error::UnsupportedFile {
            name: entry.file_name,
        });
    }

    Ok(SourceFile::new(entry.file_name, entry.data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_base64_not_pdf() {
        let result = resolve_base64("SGVsbG8gV29ybGQ=", None); // "Hello World"
        assert!(matches!(result, Err(Error::InvalidPdf { .. })));
    }

    #[test]
    fn test_resolve_base64_invalid_base64() {
        let result = resolve_base64("not valid base64!!!", None);
        assert!(matches!(result, Err(Error::Base64Decode(_))));
    }

    #[test]
    fn test_resolve_base64_rejects_foreign_name() {
        let result = resolve_base64("JVBERi0xLjQ=", Some("notes.txt"));
        assert!(matches!(result, Err(Error::UnsupportedFile { .. })));
    }

    #[test]
    fn test_resolve_base64_keeps_name() {
        let source = resolve_base64("JVBERi0xLjQ=", Some("report.PDF")).unwrap();
        assert_eq!(source.name, "report.PDF");
        assert_eq!(source.size(), 8);
    }

    #[test]
    fn test_resolve_path_not_found() {
        let result = resolve_path("/nonexistent/path/file.pdf");
        assert!(matches!(result, Err(Error::PdfNotFound { .. })));
    }

    #[test]
    fn test_resolve_path_rejects_renamed_text_file() {
        let dir = tempfile::tempdir().unwrap();

        let txt = dir.path().join("notes.txt");
        std::fs::write(&txt, b"%PDF-1.4 but really text").unwrap();
        assert!(matches!(
            resolve_path(&txt),
            Err(Error::UnsupportedFile { .. })
        ));

        let fake = dir.path().join("fake.pdf");
        std::fs::write(&fake, b"just some text").unwrap();
        assert!(matches!(resolve_path(&fake), Err(Error::InvalidPdf { .. })));
    }

    #[tokio::test]
    async fn test_resolve_cache_rejects_archives() {
        let cache = Arc::new(RwLock::new(CacheManager::new(4, 1024)));
        cache
            .write()
            .await
            .put("zip".to_string(), "doc_images.zip", b"PK\x03\x04".to_vec());
        cache
            .write()
            .await
            .put("pdf".to_string(), "doc_compressed.pdf", b"%PDF-1.7".to_vec());

        assert!(matches!(
            resolve_cache("zip", &cache).await,
            Err(Error::UnsupportedFile { .. })
        ));
        let source = resolve_cache("pdf", &cache).await.unwrap();
        assert_eq!(source.name, "doc_compressed.pdf");
        assert!(matches!(
            resolve_cache("missing", &cache).await,
            Err(Error::CacheKeyNotFound { .. })
        ));
    }
}
