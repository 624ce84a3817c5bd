//! Extraction entry points.
//!
//! * [`extract`] — one signature call for the whole document
//! * [`extract_page_by_page`] — one call per page, merged afterwards
//! * [`extract_with_comparison`] — both, plus a field-coverage comparison
//! * [`extract_full`] — standard, then page-by-page for PDFs (batch mode)
//!
//! Credentials are resolved before the input is touched, so a missing or
//! incomplete configuration fails before any download or model call.

use crate::config::{ExtractionConfig, ExtractionMethod};
use crate::error::ExtractError;
use crate::output::{
    Comparison, ComparisonMetadata, ComparisonOutput, DocumentMetadata, ExtractionInfo,
    ExtractionMetadata, ExtractionOutput, ExtractionStats, FieldCoverage, PageByPageOutput,
    PageByPageResult, PageExtraction, ProcessingInfo, Report,
};
use crate::pipeline::input::{self, DocumentKind};
use crate::pipeline::render::{self, ProcessedDocument};
use crate::pipeline::{aggregate, encode, llm, parse};
use crate::prompts::{self, EXTRACTED_DATA};
use crate::provider::ProviderConfig;
use crate::signature::{Inputs, Predictor};
use crate::stream::document_pages_stream;
use edgequake_llm::{ImageData, LLMProvider};
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Text length above which an `auto` document type becomes `document`.
pub const SIMPLE_DOCUMENT_MAX_CHARS: usize = 100;

/// `on_document_error` message when neither comparison method succeeded.
pub const BOTH_METHODS_FAILED: &str = "Both extraction methods failed";

/// Extract structured data from a PDF or image with one model call.
///
/// # Arguments
/// * `input` — local path or HTTP/HTTPS URL
/// * `config` — extraction configuration
///
/// # Errors
/// Credentials, input and document errors, and a failed model call. Use
/// [`Report::from_result`] to turn an error into the failure envelope.
pub async fn extract(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let input_str = input_str.as_ref();
    info!("Starting extraction: {}", input_str);

    let provider = resolve_provider(config)?;
    let doc = prepare(input_str, config).await?;

    let result = run_standard(&provider, &doc, config, input_str, None, false).await;
    notify_document_result(config, &doc.path, result.as_ref().err());
    result
}

/// Extract each page with its own model call and merge the results.
///
/// A page that fails is recorded in `page_results` and left out of the
/// merge. When the document has no page image at all, a text-only
/// chain-of-thought extraction runs instead and
/// [`PageByPageOutput::Fallback`] is returned.
pub async fn extract_page_by_page(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<PageByPageOutput, ExtractError> {
    let input_str = input_str.as_ref();
    info!("Starting page-by-page extraction: {}", input_str);

    let provider = resolve_provider(config)?;
    let doc = prepare(input_str, config).await?;

    let result = run_page_by_page(&provider, &doc, config, input_str).await;
    notify_document_result(config, &doc.path, result.as_ref().err());
    result
}

/// Run both methods on the same prepared document and compare them.
///
/// Only credential and document errors are fatal; a failed method shows up
/// as a failure report inside the output.
pub async fn extract_with_comparison(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ComparisonOutput, ExtractError> {
    let input_str = input_str.as_ref();
    info!("Running comparison extraction: {}", input_str);

    let provider = resolve_provider(config)?;
    let doc = prepare(input_str, config).await?;
    let document_type = detect_document_type(config, doc.text_length());

    info!("Running standard extraction");
    let standard = Report::from_result(
        run_standard(&provider, &doc, config, input_str, None, false).await,
        input_str,
        &document_type,
    );
    info!("Running page-by-page extraction");
    let page_by_page = Report::from_result(
        run_page_by_page(&provider, &doc, config, input_str).await,
        input_str,
        &document_type,
    );

    let comparison = compare(&standard, &page_by_page);
    notify_comparison_result(config, &doc.path, &comparison);

    Ok(ComparisonOutput {
        success: true,
        file_path: input_str.to_string(),
        document_type,
        standard_extraction: standard,
        page_by_page_extraction: page_by_page,
        comparison,
        metadata: ComparisonMetadata {
            extraction_methods: vec!["standard".into(), "page_by_page".into()],
        },
    })
}

/// Result of [`extract_full`].
#[derive(Debug)]
pub struct FullExtraction {
    pub standard: ExtractionOutput,
    /// `None` for images; PDFs always get a page-by-page run.
    pub page_by_page: Option<Result<PageByPageOutput, ExtractError>>,
}

/// Standard extraction and, for PDFs, page-by-page extraction on the same
/// prepared document. The input is resolved and rendered once.
///
/// A failed standard extraction is fatal. A failed page-by-page run is
/// returned inside [`FullExtraction::page_by_page`] and the document still
/// counts as complete.
pub async fn extract_full(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<FullExtraction, ExtractError> {
    let input_str = input_str.as_ref();
    info!("Starting full extraction: {}", input_str);

    let provider = resolve_provider(config)?;
    let doc = prepare(input_str, config).await?;

    let standard = match run_standard(&provider, &doc, config, input_str, None, false).await {
        Ok(out) => out,
        Err(e) => {
            notify_document_result(config, &doc.path, Some(&e));
            return Err(e);
        }
    };
    let page_by_page = if doc.kind == DocumentKind::Pdf {
        info!("Running page-by-page extraction");
        Some(run_page_by_page(&provider, &doc, config, input_str).await)
    } else {
        None
    };

    notify_document_result(config, &doc.path, None);
    Ok(FullExtraction {
        standard,
        page_by_page,
    })
}

/// [`extract`], then write the JSON envelope to `output_path` atomically.
pub async fn extract_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let output = extract(input_str, config).await?;
    write_json(output_path.as_ref(), &output).await?;
    Ok(output)
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(extract(input_str, config))
}

/// Document metadata without any model call. Needs no credentials.
///
/// Uses `config.download_timeout_secs` for URLs and `config.password` for
/// encrypted PDFs; nothing else in `config` applies.
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<DocumentMetadata, ExtractError> {
    let resolved = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    render::extract_metadata(resolved.path(), resolved.kind(), config.password.as_deref()).await
}

/// Serialise `value` as pretty JSON and write it via a temp file + rename.
pub async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), ExtractError> {
    let json = serde_json::to_string_pretty(value)?;
    let write_err = |e| ExtractError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, json).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    debug!("Wrote {}", path.display());
    Ok(())
}

/// `"document"` / `"simple_document"` for the `auto` hint, otherwise the
/// hint itself.
pub fn detect_document_type(config: &ExtractionConfig, text_len: usize) -> String {
    if !config.detects_document_type() {
        return config.document_type.clone();
    }
    if text_len > SIMPLE_DOCUMENT_MAX_CHARS {
        "document".into()
    } else {
        "simple_document".into()
    }
}

/// Field coverage and recommendations for a standard and a page-by-page run.
pub fn compare(
    standard: &Report<ExtractionOutput>,
    page_by_page: &Report<PageByPageOutput>,
) -> Comparison {
    let mut comparison = Comparison {
        standard_success: standard.is_success(),
        page_by_page_success: page_by_page.is_success(),
        ..Default::default()
    };

    let (Some(std_out), Some(pbp_out)) = (standard.success(), page_by_page.success()) else {
        comparison
            .recommendations
            .push("One or both extraction methods failed".into());
        return comparison;
    };

    let std_fields = aggregate::field_paths(&std_out.extracted_data);
    let pbp_fields = aggregate::field_paths(pbp_out.data());
    let (common, standard_only, page_by_page_only) =
        aggregate::diff_paths(&std_fields, &pbp_fields);

    if pbp_fields.len() > std_fields.len() {
        comparison
            .recommendations
            .push("Page-by-page extraction found more fields".into());
    }
    if pbp_out.total_pages() > 1 {
        comparison
            .recommendations
            .push("Multi-page document detected - page-by-page extraction recommended".into());
    }

    comparison.field_coverage = Some(FieldCoverage {
        standard_fields: std_fields.len(),
        page_by_page_fields: pbp_fields.len(),
        common_fields: common.len(),
        standard_only,
        page_by_page_only,
    });
    comparison
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// The configured provider, from most to least specific: a pre-built
/// client, the selected credential set, then auto-detection over the
/// environment.
pub(crate) fn resolve_provider(
    config: &ExtractionConfig,
) -> Result<Arc<dyn LLMProvider>, ExtractError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }
    match config.provider_config {
        Some(ref selected) => selected.build(),
        None => ProviderConfig::auto_from_env()?.build(),
    }
}

/// Resolve and load `input_str`, firing `on_document_start` and
/// `on_pages_ready`.
pub(crate) async fn prepare(
    input_str: &str,
    config: &ExtractionConfig,
) -> Result<ProcessedDocument, ExtractError> {
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    if let Some(ref cb) = config.progress_callback {
        cb.on_document_start(resolved.path());
    }

    let loaded = render::load_document(resolved.path(), resolved.kind(), config).await;
    let doc = match loaded {
        Ok(doc) => doc,
        Err(e) => {
            if let Some(ref cb) = config.progress_callback {
                cb.on_document_error(resolved.path(), &e.to_string());
            }
            return Err(e);
        }
    };
    info!(
        "Prepared {} with {} page(s), {} chars of text, {} image(s)",
        doc.kind,
        doc.pages.len(),
        doc.text_length(),
        doc.image_count()
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_pages_ready(doc.pages.len());
    }
    Ok(doc)
}

/// Comparison still returns an envelope when both methods fail, but the
/// callback hears about it as an error.
fn notify_comparison_result(config: &ExtractionConfig, path: &Path, comparison: &Comparison) {
    let Some(ref cb) = config.progress_callback else {
        return;
    };
    if comparison.standard_success || comparison.page_by_page_success {
        cb.on_document_complete(path);
    } else {
        cb.on_document_error(path, BOTH_METHODS_FAILED);
    }
}

fn notify_document_result(config: &ExtractionConfig, path: &Path, error: Option<&ExtractError>) {
    if let Some(ref cb) = config.progress_callback {
        match error {
            None => cb.on_document_complete(path),
            Some(e) => cb.on_document_error(path, &e.to_string()),
        }
    }
}

/// Up to `max_document_images` page images, or the placeholder when the
/// document has none.
fn document_images(
    doc: &ProcessedDocument,
    config: &ExtractionConfig,
) -> Result<Vec<ImageData>, ExtractError> {
    let mut images = Vec::new();
    for (page_num, img) in doc.images().take(config.max_document_images) {
        match encode::encode_page(img) {
            Ok(data) => images.push(data),
            Err(e) => warn!("Failed to encode page {}: {}", page_num, e),
        }
    }
    if images.is_empty() {
        debug!("No page image available, sending placeholder");
        let placeholder = encode::encode_page(&encode::placeholder_image())
            .map_err(|e| ExtractError::Internal(format!("placeholder encoding failed: {e}")))?;
        images.push(placeholder);
    }
    Ok(images)
}

/// Whole-document extraction on a prepared document.
///
/// `method_override` replaces `config.method`; `text_only` drops the image
/// input entirely.
async fn run_standard(
    provider: &Arc<dyn LLMProvider>,
    doc: &ProcessedDocument,
    config: &ExtractionConfig,
    file_path: &str,
    method_override: Option<ExtractionMethod>,
    text_only: bool,
) -> Result<ExtractionOutput, ExtractError> {
    let start = Instant::now();
    let text_length = doc.text_length();
    let document_type = detect_document_type(config, text_length);
    let method = method_override
        .unwrap_or(config.method)
        .resolve(text_length, config.chain_of_thought_threshold);
    info!(
        "Extracting {} as '{}' using method: {}",
        file_path, document_type, method
    );

    let signature = if text_only {
        prompts::text_only_extraction()
    } else {
        prompts::document_extraction()
    };
    let predictor = match method {
        ExtractionMethod::ChainOfThought => Predictor::chain_of_thought(signature),
        _ => Predictor::predict(signature),
    };

    let mut inputs = Inputs::new().text("document_text", doc.text_content.as_str());
    if !text_only {
        inputs = inputs.images("document_image", document_images(doc, config)?);
    }

    let prediction = llm::run_predictor(provider, &predictor, &inputs, config, "Document").await?;
    let parsed = parse::parse_extracted_data(prediction.get(EXTRACTED_DATA).unwrap_or_default());

    Ok(ExtractionOutput {
        success: true,
        document_type: document_type.clone(),
        file_path: file_path.to_string(),
        extracted_data: parsed.value,
        reasoning: prediction.reasoning.clone(),
        metadata: ExtractionMetadata {
            processing_info: ProcessingInfo {
                document_type: doc.kind,
                total_pages: doc.pages.len(),
                text_length,
                has_images: doc.has_images(),
                extraction_method: None,
            },
            extraction_info: Some(ExtractionInfo {
                method: method.as_str().to_string(),
                schema_used: document_type,
            }),
        },
        stats: ExtractionStats {
            input_tokens: prediction.input_tokens as u64,
            output_tokens: prediction.output_tokens as u64,
            duration_ms: start.elapsed().as_millis() as u64,
        },
    })
}

async fn run_page_by_page(
    provider: &Arc<dyn LLMProvider>,
    doc: &ProcessedDocument,
    config: &ExtractionConfig,
    file_path: &str,
) -> Result<PageByPageOutput, ExtractError> {
    if !doc.has_images() {
        info!("No page images found, falling back to text-only extraction");
        return run_standard(
            provider,
            doc,
            config,
            file_path,
            Some(ExtractionMethod::ChainOfThought),
            true,
        )
        .await
        .map(PageByPageOutput::Fallback);
    }

    let start = Instant::now();
    let total_pages = doc.pages.len();
    info!("Extracting data from {} pages", total_pages);

    let page_results: Vec<PageExtraction> =
        document_pages_stream(provider, doc, config).collect().await;

    for page in &page_results {
        if page.success {
            info!("Page {}: ok (confidence: {:.2})", page.page_number, page.confidence);
        } else {
            warn!(
                "Page {}: failed: {}",
                page.page_number,
                page.error.as_ref().map(|e| e.to_string()).unwrap_or_default()
            );
        }
    }

    let aggregated_data = aggregate::aggregate_pages(&page_results);
    let stats = ExtractionStats {
        input_tokens: page_results.iter().map(|p| p.input_tokens).sum(),
        output_tokens: page_results.iter().map(|p| p.output_tokens).sum(),
        duration_ms: start.elapsed().as_millis() as u64,
    };

    Ok(PageByPageOutput::PageByPage(PageByPageResult {
        success: true,
        document_type: detect_document_type(config, doc.text_length()),
        file_path: file_path.to_string(),
        total_pages,
        page_results,
        aggregated_data,
        metadata: ExtractionMetadata {
            processing_info: ProcessingInfo {
                document_type: doc.kind,
                total_pages,
                text_length: doc.text_length(),
                has_images: true,
                extraction_method: Some("page_by_page".into()),
            },
            extraction_info: None,
        },
        stats,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::FailureReport;
    use crate::progress::ExtractionProgressCallback;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl ExtractionProgressCallback for Recorder {
        fn on_document_complete(&self, _path: &Path) {
            self.events.lock().unwrap().push("complete".into());
        }
        fn on_document_error(&self, _path: &Path, error: &str) {
            self.events.lock().unwrap().push(format!("error: {error}"));
        }
    }

    fn recorded(standard_success: bool, page_by_page_success: bool) -> Vec<String> {
        let recorder = Arc::new(Recorder::default());
        let config = ExtractionConfig::builder()
            .progress_callback(recorder.clone())
            .build()
            .unwrap();
        let comparison = Comparison {
            standard_success,
            page_by_page_success,
            ..Default::default()
        };
        notify_comparison_result(&config, Path::new("a.pdf"), &comparison);
        let events = recorder.events.lock().unwrap().clone();
        events
    }

    fn standard(data: serde_json::Value) -> Report<ExtractionOutput> {
        Report::Success(ExtractionOutput {
            success: true,
            document_type: "document".into(),
            file_path: "a.pdf".into(),
            extracted_data: data,
            reasoning: None,
            metadata: ExtractionMetadata {
                processing_info: ProcessingInfo {
                    document_type: DocumentKind::Pdf,
                    total_pages: 2,
                    text_length: 500,
                    has_images: true,
                    extraction_method: None,
                },
                extraction_info: None,
            },
            stats: ExtractionStats::default(),
        })
    }

    fn page_by_page(data: serde_json::Value, total_pages: usize) -> Report<PageByPageOutput> {
        Report::Success(PageByPageOutput::PageByPage(PageByPageResult {
            success: true,
            document_type: "document".into(),
            file_path: "a.pdf".into(),
            total_pages,
            page_results: vec![],
            aggregated_data: data,
            metadata: ExtractionMetadata {
                processing_info: ProcessingInfo {
                    document_type: DocumentKind::Pdf,
                    total_pages,
                    text_length: 500,
                    has_images: true,
                    extraction_method: Some("page_by_page".into()),
                },
                extraction_info: None,
            },
            stats: ExtractionStats::default(),
        }))
    }

    #[test]
    fn document_type_detection() {
        let auto = ExtractionConfig::default();
        assert_eq!(detect_document_type(&auto, 101), "document");
        assert_eq!(detect_document_type(&auto, 100), "simple_document");

        let hinted = ExtractionConfig::builder()
            .document_type("invoice")
            .build()
            .unwrap();
        assert_eq!(detect_document_type(&hinted, 0), "invoice");
    }

    #[test]
    fn comparison_counts_fields() {
        let cmp = compare(
            &standard(json!({"name": "A", "total": 3})),
            &page_by_page(json!({"name": "A", "items": [{"sku": "x"}]}), 2),
        );
        let cov = cmp.field_coverage.expect("coverage");
        assert_eq!(cov.standard_fields, 2);
        assert_eq!(cov.page_by_page_fields, 3);
        assert_eq!(cov.common_fields, 1);
        assert_eq!(cov.standard_only, vec!["total"]);
        assert_eq!(cov.page_by_page_only, vec!["items", "items[0].sku"]);
        assert_eq!(cmp.recommendations.len(), 2);
    }

    #[test]
    fn comparison_with_failure_has_no_coverage() {
        let failed: Report<PageByPageOutput> = Report::Failure(FailureReport {
            success: false,
            error: "boom".into(),
            file_path: "a.pdf".into(),
            document_type: "auto".into(),
        });
        let cmp = compare(&standard(json!({"a": 1})), &failed);
        assert!(cmp.standard_success);
        assert!(!cmp.page_by_page_success);
        assert!(cmp.field_coverage.is_none());
        assert_eq!(cmp.recommendations, vec!["One or both extraction methods failed"]);
    }

    #[test]
    fn single_page_equal_fields_gives_no_recommendation() {
        let cmp = compare(&standard(json!({"a": 1})), &page_by_page(json!({"a": 2}), 1));
        assert!(cmp.recommendations.is_empty());
    }

    #[test]
    fn comparison_with_both_methods_failed_reports_error() {
        assert_eq!(recorded(false, false), vec![format!("error: {BOTH_METHODS_FAILED}")]);
    }

    #[test]
    fn comparison_with_one_success_completes() {
        assert_eq!(recorded(true, false), vec!["complete"]);
        assert_eq!(recorded(false, true), vec!["complete"]);
    }

    #[tokio::test]
    async fn write_json_is_atomic_and_pretty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.json");
        write_json(&path, &json!({"ok": true})).await.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"ok\": true"));
        assert!(!path.with_extension("json.tmp").exists());
    }
}
