//! Error types for the edgequake-doc2json library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExtractError`] — **Fatal**: the extraction cannot proceed at all
//!   (bad input file, unsupported format, credentials incomplete). Returned
//!   as `Err(ExtractError)` from the top-level `extract*` functions.
//!
//! * [`PageError`] — **Non-fatal**: a single page failed during page-by-page
//!   extraction (render glitch, transient API error) while the other pages
//!   are fine. Stored inside [`crate::output::PageExtraction`] so callers
//!   can inspect partial success.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-doc2json library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Document not found at '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is neither a usable file path nor an HTTP/HTTPS URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// File extension is not one of the supported document formats.
    #[error(
        "Unsupported file format '{extension}' for '{path}'\n\
Supported formats: PDF, JPG, JPEG, PNG, BMP, TIFF"
    )]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// The file has a `.pdf` extension but does not start with `%PDF`.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Document errors ───────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// An image file could not be decoded.
    #[error("Failed to decode image '{path}': {detail}")]
    ImageDecodeFailed { path: PathBuf, detail: String },

    /// Selected page numbers exceed the actual page count.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Credential errors ─────────────────────────────────────────────────
    /// Some of the variables a provider needs are unset or empty.
    #[error("{provider} configuration incomplete. Missing: {}", missing.join(", "))]
    ConfigIncomplete {
        provider: String,
        missing: Vec<String>,
    },

    /// The provider's API key variable is unset or empty.
    #[error("{provider} API key is required. Set {var} environment variable")]
    MissingApiKey { provider: String, var: String },

    /// Auto-detection found neither credential set.
    #[error(
        "No valid LLM configuration found.\n\
For OpenAI: OPENAI_API_KEY\n\
For Azure OpenAI: AZURE_OPENAI_API_KEY, AZURE_OPENAI_ENDPOINT, \
AZURE_OPENAI_DEPLOYMENT_NAME, AZURE_OPENAI_API_VERSION"
    )]
    NoProviderConfigured,

    /// The provider factory refused to build a client.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The LLM call failed (after any configured retries).
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    /// The LLM call did not answer within the configured timeout.
    #[error("LLM call timed out after {secs}s")]
    ApiTimeout { secs: u64 },

    /// A signature input was not supplied or has the wrong kind.
    #[error("Signature input '{field}' is missing or has the wrong kind (expected {expected})")]
    MissingInput { field: String, expected: String },

    /// The model's reply did not contain the expected output fields.
    #[error("Malformed LLM response: {detail}")]
    MalformedResponse { detail: String },

    /// A shorthand signature string could not be parsed.
    #[error("Invalid signature '{signature}': {detail}")]
    InvalidSignature { signature: String, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serialising a result to JSON failed.
    #[error("Failed to serialise result: {0}")]
    Serialise(#[from] serde_json::Error),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/dir/containing/libpdfium, or install pdfium \
system-wide so it can be found by the dynamic loader.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExtractError {
    /// True for errors raised while validating credentials, i.e. before
    /// any network call was attempted.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ExtractError::ConfigIncomplete { .. }
                | ExtractError::MissingApiKey { .. }
                | ExtractError::NoProviderConfigured
                | ExtractError::ProviderNotConfigured { .. }
                | ExtractError::InvalidConfig(_)
        )
    }
}

/// A non-fatal error for a single page.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Page rasterisation failed; the page has no image to send.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// LLM call failed after retries.
    #[error("Page {page}: LLM call failed after {retries} retries: {detail}")]
    LlmFailed {
        page: usize,
        retries: u32,
        detail: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_incomplete_lists_missing_vars() {
        let e = ExtractError::ConfigIncomplete {
            provider: "Azure OpenAI".into(),
            missing: vec![
                "AZURE_OPENAI_ENDPOINT".into(),
                "AZURE_OPENAI_API_VERSION".into(),
            ],
        };
        assert_eq!(
            e.to_string(),
            "Azure OpenAI configuration incomplete. Missing: AZURE_OPENAI_ENDPOINT, AZURE_OPENAI_API_VERSION"
        );
        assert!(e.is_config_error());
    }

    #[test]
    fn missing_api_key_names_variable() {
        let e = ExtractError::MissingApiKey {
            provider: "OpenAI".into(),
            var: "OPENAI_API_KEY".into(),
        };
        assert!(e.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn unsupported_format_display() {
        let e = ExtractError::UnsupportedFormat {
            path: PathBuf::from("notes.docx"),
            extension: ".docx".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains(".docx"), "got: {msg}");
        assert!(msg.contains("PNG"));
        assert!(!e.is_config_error());
    }

    #[test]
    fn page_error_serialises() {
        let e = PageError::LlmFailed {
            page: 2,
            retries: 0,
            detail: "rate limited".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("rate limited"));
        assert!(e.to_string().contains("Page 2"));
    }
}
