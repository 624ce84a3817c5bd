//! Configuration types for document extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`],
//! built via its [`ExtractionConfigBuilder`]. Credentials live in
//! [`crate::provider::ProviderConfig`]; this struct only references the
//! selected set (or a pre-built provider).

use crate::error::ExtractError;
use crate::progress::ProgressCallback;
use crate::provider::ProviderConfig;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Document-type hint meaning "decide from the content".
pub const AUTO_DOCUMENT_TYPE: &str = "auto";

/// Configuration for an extraction run.
///
/// # Example
/// ```rust
/// use edgequake_doc2json::{ExtractionConfig, ExtractionMethod};
///
/// let config = ExtractionConfig::builder()
///     .dpi(200)
///     .method(ExtractionMethod::ChainOfThought)
///     .document_type("invoice")
///     .build()
///     .unwrap();
/// assert_eq!(config.document_type, "invoice");
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Rendering DPI for PDF pages. Range: 72-400. Default: 150.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Selected credential set. Used when `provider` is None.
    pub provider_config: Option<ProviderConfig>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_config`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Extraction method for standard (whole-document) extraction. Default: Auto.
    pub method: ExtractionMethod,

    /// Document-type hint passed through as `schema_used`. `"auto"` lets the
    /// extractor pick `document` or `simple_document` from the text length.
    pub document_type: String,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per call. Default: 4096.
    pub max_tokens: usize,

    /// Retry attempts on a failed LLM call. Default: 0 (failures surface
    /// immediately).
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-LLM-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Page selection for PDFs. Default: all pages.
    pub pages: PageSelection,

    /// Adaptive-threshold rendered PDF pages before sending them. Default: true.
    pub enhance_images: bool,

    /// How many page images accompany a whole-document extraction. Default: 1.
    pub max_document_images: usize,

    /// Text length above which `Auto` picks chain-of-thought. Default: 1000.
    pub chain_of_thought_threshold: usize,

    /// When set, every prepared page image is also written here as
    /// `page_N.png`.
    pub page_image_dir: Option<PathBuf>,

    /// Progress events receiver.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            dpi: 150,
            max_rendered_pixels: 2000,
            provider_config: None,
            provider: None,
            method: ExtractionMethod::default(),
            document_type: AUTO_DOCUMENT_TYPE.to_string(),
            temperature: 0.1,
            max_tokens: 4096,
            max_retries: 0,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            download_timeout_secs: 120,
            password: None,
            pages: PageSelection::default(),
            enhance_images: true,
            max_document_images: 1,
            chain_of_thought_threshold: 1000,
            page_image_dir: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("provider_config", &self.provider_config)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("method", &self.method)
            .field("document_type", &self.document_type)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("pages", &self.pages)
            .field("enhance_images", &self.enhance_images)
            .field("max_document_images", &self.max_document_images)
            .field("page_image_dir", &self.page_image_dir)
            .finish()
    }
}

impl ExtractionConfig {
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Whether the document-type hint asks for auto-detection.
    pub fn detects_document_type(&self) -> bool {
        self.document_type.eq_ignore_ascii_case(AUTO_DOCUMENT_TYPE)
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    /// Checked against 72-400 in [`build`](Self::build).
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn provider_config(mut self, cfg: ProviderConfig) -> Self {
        self.config.provider_config = Some(cfg);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn method(mut self, method: ExtractionMethod) -> Self {
        self.config.method = method;
        self
    }

    pub fn document_type(mut self, hint: impl Into<String>) -> Self {
        self.config.document_type = hint.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn enhance_images(mut self, v: bool) -> Self {
        self.config.enhance_images = v;
        self
    }

    pub fn max_document_images(mut self, n: usize) -> Self {
        self.config.max_document_images = n;
        self
    }

    pub fn chain_of_thought_threshold(mut self, chars: usize) -> Self {
        self.config.chain_of_thought_threshold = chars;
        self
    }

    pub fn page_image_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.page_image_dir = Some(dir.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(ExtractError::InvalidConfig(format!(
                "DPI must be 72-400, got {}",
                c.dpi
            )));
        }
        if c.max_document_images == 0 {
            return Err(ExtractError::InvalidConfig(
                "max_document_images must be >= 1".into(),
            ));
        }
        if c.document_type.trim().is_empty() {
            return Err(ExtractError::InvalidConfig(
                "document type hint must not be empty (use \"auto\")".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How the whole-document signature is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Chain-of-thought for long documents, plain prediction otherwise.
    #[default]
    Auto,
    /// Single-shot prediction.
    Natural,
    /// Prediction preceded by a `reasoning` output field.
    ChainOfThought,
}

impl ExtractionMethod {
    /// Resolve `Auto` against the document's text length.
    pub fn resolve(self, text_len: usize, threshold: usize) -> ExtractionMethod {
        match self {
            ExtractionMethod::Auto if text_len > threshold => ExtractionMethod::ChainOfThought,
            ExtractionMethod::Auto => ExtractionMethod::Natural,
            other => other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Auto => "auto",
            ExtractionMethod::Natural => "natural",
            ExtractionMethod::ChainOfThought => "chain_of_thought",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Specifies which pages of a PDF to process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSelection {
    /// All pages (default).
    #[default]
    All,
    /// A single page (1-indexed).
    Single(usize),
    /// A contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    /// Parse the CLI form: `all`, `5`, `3-15`, or `1,3,5`.
    pub fn parse(s: &str) -> Result<Self, ExtractError> {
        let s = s.trim().to_lowercase();
        let bad = |detail: String| ExtractError::InvalidConfig(format!("pages: {detail}"));
        let page = |p: &str| -> Result<usize, ExtractError> {
            let n: usize = p
                .trim()
                .parse()
                .map_err(|_| bad(format!("invalid page number '{}'", p.trim())))?;
            if n < 1 {
                return Err(bad(format!("pages are 1-indexed (got {n})")));
            }
            Ok(n)
        };

        if s == "all" {
            return Ok(PageSelection::All);
        }
        if let Some((start, end)) = s.split_once('-') {
            let (start, end) = (page(start)?, page(end)?);
            if start > end {
                return Err(bad(format!("range {start}-{end}: start must be <= end")));
            }
            return Ok(PageSelection::Range(start, end));
        }
        if s.contains(',') {
            let pages = s.split(',').map(page).collect::<Result<Vec<_>, _>>()?;
            return Ok(PageSelection::Set(pages));
        }
        Ok(PageSelection::Single(page(&s)?))
    }
}
