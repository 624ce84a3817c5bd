//! Streaming page-by-page API: emit page results as they complete.
//!
//! Pages are processed one after another in page order, so results arrive
//! in order too. [`crate::extract::extract_page_by_page`] collects this
//! same stream; use it directly to show partial results or write pages
//! out as they finish.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::extract::{prepare, resolve_provider};
use crate::output::PageExtraction;
use crate::pipeline::llm;
use crate::pipeline::render::{PageContent, ProcessedDocument};
use edgequake_llm::LLMProvider;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of page results.
pub type PageStream<'a> = Pin<Box<dyn Stream<Item = PageExtraction> + Send + 'a>>;

/// Resolve, load and stream page results for `input`.
///
/// The document is fully prepared (rendered and enhanced) before the
/// stream is returned, with `on_document_start` and `on_pages_ready`
/// already fired; each item is one model call.
///
/// # Returns
/// - `Ok(PageStream)` — one [`PageExtraction`] per selected page
/// - `Err(ExtractError)` — fatal error (credentials, file not found, bad PDF, ...)
pub async fn extract_pages_stream(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<PageStream<'static>, ExtractError> {
    let input_str = input_str.as_ref();
    info!("Starting streaming page extraction: {}", input_str);

    let provider = resolve_provider(config)?;
    let doc = prepare(input_str, config).await?;

    let total = doc.pages.len();
    let config = config.clone();
    let s = stream::iter(doc.pages).then(move |page: PageContent| {
        let provider = Arc::clone(&provider);
        let cfg = config.clone();
        async move { process_with_events(&provider, &page, total, &cfg).await }
    });
    Ok(Box::pin(s))
}

/// Stream page results for an already prepared document.
pub fn document_pages_stream<'a>(
    provider: &'a Arc<dyn LLMProvider>,
    doc: &'a ProcessedDocument,
    config: &'a ExtractionConfig,
) -> PageStream<'a> {
    let total = doc.pages.len();
    Box::pin(
        stream::iter(doc.pages.iter())
            .then(move |page| process_with_events(provider, page, total, config)),
    )
}

async fn process_with_events(
    provider: &Arc<dyn LLMProvider>,
    page: &PageContent,
    total: usize,
    config: &ExtractionConfig,
) -> PageExtraction {
    if let Some(ref cb) = config.progress_callback {
        cb.on_page_start(page.page_number, total);
    }
    let result = llm::process_page(provider, page, config).await;
    if let Some(ref cb) = config.progress_callback {
        match &result.error {
            None => cb.on_page_complete(page.page_number, total),
            Some(e) => cb.on_page_error(page.page_number, total, &e.to_string()),
        }
    }
    result
}
