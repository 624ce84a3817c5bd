//! # edgequake-doc2json
//!
//! Extract structured JSON from PDF documents and images using Vision
//! Language Models.
//!
//! Each document is turned into page images plus whatever text the PDF
//! carries, and a declarative prompt signature asks the model for one JSON
//! object. Results come back in a status envelope: `success`,
//! `document_type`, `extracted_data` and processing `metadata`.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / image
//!  │
//!  ├─ 1. Input     resolve local file or download from URL
//!  ├─ 2. Render    page text + page images via pdfium (spawn_blocking)
//!  ├─ 3. Enhance   grayscale + adaptive threshold on PDF pages
//!  ├─ 4. Encode    PNG → base64 ImageData
//!  ├─ 5. Predict   signature call to OpenAI or Azure OpenAI
//!  ├─ 6. Parse     model text → JSON (raw-text fallback)
//!  └─ 7. Output    envelope, or per-page results merged into one object
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_doc2json::{extract, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // OPENAI_API_KEY, or all four AZURE_OPENAI_* variables
//!     let config = ExtractionConfig::default();
//!     let output = extract("invoice.pdf", &config).await?;
//!     println!("{}", serde_json::to_string_pretty(&output.extracted_data)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Extraction Modes
//!
//! | Function | Model calls | Best for |
//! |----------|-------------|----------|
//! | [`extract`] | 1 | Single-page documents, forms, receipts |
//! | [`extract_page_by_page`] | 1 per page | Long reports, lab results |
//! | [`extract_with_comparison`] | both | Choosing a mode for a document family |
//! | [`batch::run_batch`] | per document | Folders of files |
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doc2json` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ```toml
//! edgequake-doc2json = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod signature;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{run_batch, BatchMode, BatchSummary};
pub use config::{ExtractionConfig, ExtractionConfigBuilder, ExtractionMethod, PageSelection};
pub use error::{ExtractError, PageError};
pub use extract::{
    extract, extract_full, extract_page_by_page, extract_sync, extract_to_file,
    extract_with_comparison, inspect, FullExtraction,
};
pub use output::{
    ComparisonOutput, DocumentMetadata, ExtractionOutput, ExtractionStats, PageByPageOutput,
    PageExtraction,
};
pub use pipeline::input::DocumentKind;
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use provider::{ProviderConfig, ProviderInfo};
pub use signature::{Prediction, Predictor, Signature};
pub use stream::extract_pages_stream;
