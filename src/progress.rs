//! Progress-callback trait for document, page, and batch events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the extractor works. The library never prints; the CLI turns
//! these events into an indicatif progress bar.
//!
//! # Example
//!
//! ```rust
//! use edgequake_doc2json::{ExtractionProgressCallback, ExtractionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct PageCounter(AtomicUsize);
//!
//! impl ExtractionProgressCallback for PageCounter {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("page {page_num}/{total_pages} done");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(PageCounter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Receives extraction events. All methods default to no-ops.
///
/// Calls arrive sequentially from the task driving the extraction, but the
/// trait is `Send + Sync` so implementations can be shared with other tasks.
pub trait ExtractionProgressCallback: Send + Sync {
    /// A document has been resolved and is about to be prepared.
    fn on_document_start(&self, path: &Path) {
        let _ = path;
    }

    /// Pages are prepared; `total_pages` LLM calls follow in page-by-page mode.
    fn on_pages_ready(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Just before the LLM request for a page (1-indexed).
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    fn on_page_complete(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// The LLM answered for the document (standard or page-by-page).
    fn on_document_complete(&self, path: &Path) {
        let _ = path;
    }

    fn on_document_error(&self, path: &Path, error: &str) {
        let _ = (path, error);
    }

    /// A batch found `total_documents` files to process.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Before document `index` (1-indexed) of a batch.
    fn on_batch_document(&self, index: usize, total_documents: usize, path: &Path) {
        let _ = (index, total_documents, path);
    }

    fn on_batch_complete(&self, total_documents: usize, success_count: usize) {
        let _ = (total_documents, success_count);
    }
}

/// Used when no callback is configured.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// The type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
