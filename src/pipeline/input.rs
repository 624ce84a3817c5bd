//! Input resolution: normalise a user-supplied path or URL to a local file
//! and classify it.
//!
//! pdfium and the image decoders both want a file-system path, so URLs are
//! downloaded into a `TempDir` that lives as long as the [`ResolvedInput`].
//! PDFs are checked for the `%PDF` magic bytes up front so a mislabelled file
//! fails with a clear error instead of a pdfium parse failure.

use crate::error::ExtractError;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// Extensions accepted as image documents.
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "tiff", "tif"];

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// The two document families the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Image,
}

impl DocumentKind {
    /// Classify by extension, case-insensitively.
    pub fn from_path(path: &Path) -> Result<Self, ExtractError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Ok(DocumentKind::Pdf),
            e if IMAGE_EXTENSIONS.contains(&e) => Ok(DocumentKind::Image),
            _ => Err(ExtractError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension: if ext.is_empty() {
                    "(none)".to_string()
                } else {
                    format!(".{ext}")
                },
            }),
        }
    }

    /// Whether `path` has a supported extension.
    pub fn is_supported(path: &Path) -> bool {
        Self::from_path(path).is_ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Image => "image",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The resolved input: a local path or a downloaded temp file.
pub enum ResolvedInput {
    Local { path: PathBuf, kind: DocumentKind },
    /// The `TempDir` is held so the download survives until processing ends.
    Downloaded {
        path: PathBuf,
        kind: DocumentKind,
        _temp_dir: TempDir,
    },
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local { path, .. } | ResolvedInput::Downloaded { path, .. } => path,
        }
    }

    pub fn kind(&self) -> DocumentKind {
        match self {
            ResolvedInput::Local { kind, .. } | ResolvedInput::Downloaded { kind, .. } => *kind,
        }
    }
}

pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve `input` to a readable local document.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, ExtractError> {
    if input.trim().is_empty() {
        return Err(ExtractError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

fn resolve_local(path_str: &str) -> Result<ResolvedInput, ExtractError> {
    let path = PathBuf::from(path_str);

    if !path.is_file() {
        return Err(ExtractError::FileNotFound { path });
    }
    let kind = DocumentKind::from_path(&path)?;

    match std::fs::File::open(&path) {
        Ok(f) => {
            if kind == DocumentKind::Pdf {
                let mut head = Vec::with_capacity(PDF_MAGIC.len());
                if let Err(e) = f.take(PDF_MAGIC.len() as u64).read_to_end(&mut head) {
                    return Err(ExtractError::Internal(format!(
                        "Failed to read {}: {e}",
                        path.display()
                    )));
                }
                check_pdf_magic(&head, &path)?;
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ExtractError::PermissionDenied { path });
        }
        Err(_) => return Err(ExtractError::FileNotFound { path }),
    }

    debug!("Resolved local {}: {}", kind, path.display());
    Ok(ResolvedInput::Local { path, kind })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, ExtractError> {
    info!("Downloading document from: {}", url);
    let failed = |reason: String| ExtractError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ExtractError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let filename = filename_for(url, content_type.as_deref());
    let file_path_hint = PathBuf::from(&filename);
    let kind = DocumentKind::from_path(&file_path_hint)?;

    let temp_dir = TempDir::new().map_err(|e| ExtractError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;

    if kind == DocumentKind::Pdf {
        check_pdf_magic(&bytes, &file_path)?;
    }

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| ExtractError::Internal(format!("Failed to write temp file: {e}")))?;

    info!("Downloaded {} bytes to: {}", bytes.len(), file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        kind,
        _temp_dir: temp_dir,
    })
}

/// Fails unless `head` starts with `%PDF`. Files shorter than the magic
/// fail too; missing bytes show as zeros in the error.
fn check_pdf_magic(head: &[u8], path: &Path) -> Result<(), ExtractError> {
    if head.starts_with(PDF_MAGIC) {
        return Ok(());
    }
    let mut magic = [0u8; 4];
    let n = head.len().min(magic.len());
    magic[..n].copy_from_slice(&head[..n]);
    Err(ExtractError::NotAPdf {
        path: path.to_path_buf(),
        magic,
    })
}

/// Last URL path segment when it has an extension, else a name derived
/// from the `Content-Type` (PDF when unknown).
fn filename_for(url: &str, content_type: Option<&str>) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(last) = parsed.path_segments().and_then(|mut s| s.next_back()) {
            if !last.is_empty() && last.contains('.') {
                return last.to_string();
            }
        }
    }

    let ext = match content_type.map(|c| c.split(';').next().unwrap_or(c).trim()) {
        Some("image/png") => "png",
        Some("image/jpeg") => "jpg",
        Some("image/bmp") => "bmp",
        Some("image/tiff") => "tiff",
        _ => "pdf",
    };
    format!("downloaded.{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn kind_is_case_insensitive() {
        assert_eq!(DocumentKind::from_path(Path::new("a.PDF")).unwrap(), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_path(Path::new("b.JpEg")).unwrap(), DocumentKind::Image);
        assert_eq!(DocumentKind::from_path(Path::new("c.tif")).unwrap(), DocumentKind::Image);
    }

    #[test]
    fn unsupported_extension_is_named() {
        let err = DocumentKind::from_path(Path::new("notes.docx")).unwrap_err();
        match err {
            ExtractError::UnsupportedFormat { extension, .. } => assert_eq!(extension, ".docx"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!DocumentKind::is_supported(Path::new("README")));
    }

    #[test]
    fn filename_prefers_url_segment() {
        assert_eq!(filename_for("https://x.org/files/scan.png", None), "scan.png");
        assert_eq!(
            filename_for("https://x.org/get?id=3", Some("image/jpeg; charset=binary")),
            "downloaded.jpg"
        );
        assert_eq!(filename_for("https://x.org/", None), "downloaded.pdf");
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = resolve_input("/definitely/not/here.pdf", 5).await.err().unwrap();
        assert!(matches!(err, ExtractError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn fake_pdf_fails_magic_check() {
        let mut f = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        f.write_all(b"hello world").unwrap();
        let err = resolve_input(f.path().to_str().unwrap(), 5).await.err().unwrap();
        assert!(matches!(err, ExtractError::NotAPdf { magic, .. } if &magic == b"hell"));
    }

    #[tokio::test]
    async fn empty_pdf_fails_magic_check() {
        let f = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        let err = resolve_input(f.path().to_str().unwrap(), 5).await.err().unwrap();
        assert!(matches!(err, ExtractError::NotAPdf { magic, .. } if magic == [0; 4]));
    }

    #[tokio::test]
    async fn truncated_pdf_fails_magic_check() {
        let mut f = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        f.write_all(b"%P").unwrap();
        let err = resolve_input(f.path().to_str().unwrap(), 5).await.err().unwrap();
        assert!(matches!(err, ExtractError::NotAPdf { magic, .. } if magic == *b"%P\0\0"));
    }

    #[test]
    fn downloaded_bytes_use_same_magic_check() {
        let path = Path::new("downloaded.pdf");
        assert!(check_pdf_magic(b"%PDF-1.7\n", path).is_ok());
        assert!(matches!(
            check_pdf_magic(b"<h", path),
            Err(ExtractError::NotAPdf { magic, .. }) if magic == *b"<h\0\0"
        ));
        assert!(check_pdf_magic(b"", path).is_err());
    }

    #[tokio::test]
    async fn image_skips_magic_check() {
        let f = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        let resolved = resolve_input(f.path().to_str().unwrap(), 5).await.unwrap();
        assert_eq!(resolved.kind(), DocumentKind::Image);
    }
}
