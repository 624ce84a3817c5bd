//! Pipeline stages for document-to-JSON extraction.
//!
//! ```text
//! input ──▶ render ──▶ enhance ──▶ encode ──▶ llm ──▶ parse ──▶ aggregate
//! (URL/path) (pdfium/   (threshold)  (base64)   (model)  (JSON)   (page-by-page)
//!            image)
//! ```
//!
//! 1. [`input`]     — canonicalise the path or URL and classify it as PDF or image
//! 2. [`render`]    — per-page text and images; pdfium runs in `spawn_blocking`
//! 3. [`enhance`]   — adaptive threshold on rendered PDF pages
//! 4. [`encode`]    — PNG + base64 `ImageData` for the multimodal request
//! 5. [`llm`]       — signature call with timeout and optional retry
//! 6. [`parse`]     — model text → JSON, with a raw-text fallback
//! 7. [`aggregate`] — merge page results into one object

pub mod aggregate;
pub mod encode;
pub mod enhance;
pub mod input;
pub mod llm;
pub mod parse;
pub mod render;
