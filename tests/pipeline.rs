//! Offline pipeline tests.
//!
//! Inputs are generated PNG files (no pdfium needed) and the model is
//! `edgequake_llm::MockProvider`, so these run without credentials or
//! network access. The mock's reply carries no JSON, which exercises the
//! `raw_extraction` fallback on every call.

use edgequake_doc2json::batch::{self, output_path_for, BatchMode, OutputKind};
use edgequake_doc2json::pipeline::parse::RAW_EXTRACTION;
use edgequake_doc2json::{
    extract, extract_full, extract_page_by_page, extract_pages_stream, extract_to_file,
    extract_with_comparison, DocumentKind, ExtractError, ExtractionConfig,
    ExtractionProgressCallback, PageByPageOutput,
};
use edgequake_llm::{LLMProvider, MockProvider};
use futures::StreamExt;
use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn mock_config() -> ExtractionConfig {
    let provider: Arc<dyn LLMProvider> = Arc::new(MockProvider::new());
    ExtractionConfig::builder()
        .provider(provider)
        .build()
        .unwrap()
}

/// Write a small two-tone PNG to `dir/name`.
fn write_png(dir: &Path, name: &str) -> PathBuf {
    let img = RgbImage::from_fn(64, 32, |x, _| {
        if x < 32 {
            Rgb([255, 255, 255])
        } else {
            Rgb([20, 20, 20])
        }
    });
    let path = dir.join(name);
    img.save(&path).unwrap();
    path
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[derive(Default)]
struct Counter {
    starts: AtomicUsize,
    pages_ready: AtomicUsize,
    documents: AtomicUsize,
    pages_done: AtomicUsize,
    batch_docs: AtomicUsize,
}

impl ExtractionProgressCallback for Counter {
    fn on_document_start(&self, _path: &Path) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }
    fn on_pages_ready(&self, total_pages: usize) {
        self.pages_ready.fetch_add(total_pages, Ordering::SeqCst);
    }
    fn on_document_complete(&self, _path: &Path) {
        self.documents.fetch_add(1, Ordering::SeqCst);
    }
    fn on_page_complete(&self, _page_num: usize, _total_pages: usize) {
        self.pages_done.fetch_add(1, Ordering::SeqCst);
    }
    fn on_batch_document(&self, _index: usize, _total: usize, _path: &Path) {
        self.batch_docs.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Single document ──────────────────────────────────────────────────────────

#[tokio::test]
async fn image_extraction_returns_envelope() {
    let dir = tempfile::tempdir().unwrap();
    let png = write_png(dir.path(), "receipt.png");

    let out = extract(png.to_str().unwrap(), &mock_config()).await.unwrap();

    assert!(out.success);
    assert_eq!(out.document_type, "simple_document");
    assert!(out.extracted_data.is_object());
    assert!(out.extracted_data.get(RAW_EXTRACTION).is_some());

    let info = &out.metadata.processing_info;
    assert_eq!(info.document_type, DocumentKind::Image);
    assert_eq!(info.total_pages, 1);
    assert_eq!(info.text_length, 0);
    assert!(info.has_images);

    let extraction = out.metadata.extraction_info.as_ref().unwrap();
    assert_eq!(extraction.method, "natural");
    assert_eq!(extraction.schema_used, "simple_document");
}

#[tokio::test]
async fn document_type_hint_is_passed_through() {
    let dir = tempfile::tempdir().unwrap();
    let png = write_png(dir.path(), "invoice.png");
    let mut config = mock_config();
    config.document_type = "invoice".into();

    let out = extract(png.to_str().unwrap(), &config).await.unwrap();
    assert_eq!(out.document_type, "invoice");
    assert_eq!(out.metadata.extraction_info.unwrap().schema_used, "invoice");
}

#[tokio::test]
async fn envelope_serialises_required_keys() {
    let dir = tempfile::tempdir().unwrap();
    let png = write_png(dir.path(), "form.png");
    let target = dir.path().join("out/form.json");

    extract_to_file(png.to_str().unwrap(), &target, &mock_config())
        .await
        .unwrap();

    let v = read_json(&target);
    for key in ["success", "document_type", "extracted_data", "metadata"] {
        assert!(v.get(key).is_some(), "missing {key} in {v}");
    }
    assert_eq!(v["metadata"]["processing_info"]["document_type"], "image");
    assert!(!dir.path().join("out/form.json.tmp").exists());
}

#[tokio::test]
async fn missing_file_is_fatal() {
    let err = extract("/definitely/not/here.png", &mock_config())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::FileNotFound { .. }), "got {err:?}");
}

#[tokio::test]
async fn unsupported_extension_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "hello").unwrap();

    let err = extract(path.to_str().unwrap(), &mock_config())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::UnsupportedFormat { .. }), "got {err:?}");
}

#[tokio::test]
async fn empty_pdf_is_not_a_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.pdf");
    std::fs::write(&path, b"").unwrap();

    let err = extract(path.to_str().unwrap(), &mock_config())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::NotAPdf { .. }), "got {err:?}");
}

#[tokio::test]
async fn two_byte_pdf_is_not_a_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stub.pdf");
    std::fs::write(&path, b"%P").unwrap();

    let err = extract_page_by_page(path.to_str().unwrap(), &mock_config())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::NotAPdf { .. }), "got {err:?}");
}

#[tokio::test]
async fn undecodable_image_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.png");
    std::fs::write(&path, b"not an image at all").unwrap();

    let err = extract(path.to_str().unwrap(), &mock_config())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::ImageDecodeFailed { .. }), "got {err:?}");
}

// ── Page-by-page and comparison ──────────────────────────────────────────────

#[tokio::test]
async fn page_by_page_on_image_has_one_page() {
    let dir = tempfile::tempdir().unwrap();
    let png = write_png(dir.path(), "page.png");
    let counter = Arc::new(Counter::default());
    let mut config = mock_config();
    config.progress_callback = Some(counter.clone());

    let out = extract_page_by_page(png.to_str().unwrap(), &config)
        .await
        .unwrap();

    let PageByPageOutput::PageByPage(result) = out else {
        panic!("image input has a page image, expected page-by-page result");
    };
    assert!(result.success);
    assert_eq!(result.total_pages, 1);
    assert_eq!(result.successful_pages(), 1);
    assert_eq!(result.page_results[0].page_number, 1);
    assert!(result.page_results[0].error.is_none());
    assert!(result.aggregated_data.get(RAW_EXTRACTION).is_some());
    assert_eq!(
        result.metadata.processing_info.extraction_method.as_deref(),
        Some("page_by_page")
    );

    assert_eq!(counter.pages_done.load(Ordering::SeqCst), 1);
    assert_eq!(counter.documents.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn page_stream_yields_each_page() {
    let dir = tempfile::tempdir().unwrap();
    let png = write_png(dir.path(), "stream.png");
    let counter = Arc::new(Counter::default());
    let mut config = mock_config();
    config.progress_callback = Some(counter.clone());

    let stream = extract_pages_stream(png.to_str().unwrap(), &config)
        .await
        .unwrap();
    assert_eq!(counter.starts.load(Ordering::SeqCst), 1);
    assert_eq!(counter.pages_ready.load(Ordering::SeqCst), 1);

    let pages: Vec<_> = stream.collect().await;
    assert_eq!(pages.len(), 1);
    assert!(pages[0].success);
    assert_eq!(counter.pages_done.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn full_extraction_prepares_once() {
    let dir = tempfile::tempdir().unwrap();
    let png = write_png(dir.path(), "full.png");
    let counter = Arc::new(Counter::default());
    let mut config = mock_config();
    config.progress_callback = Some(counter.clone());

    let full = extract_full(png.to_str().unwrap(), &config).await.unwrap();

    assert!(full.standard.success);
    assert!(full.page_by_page.is_none(), "images get no page-by-page run");
    assert_eq!(counter.starts.load(Ordering::SeqCst), 1);
    assert_eq!(counter.documents.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn comparison_runs_both_methods() {
    let dir = tempfile::tempdir().unwrap();
    let png = write_png(dir.path(), "compare.png");
    let counter = Arc::new(Counter::default());
    let mut config = mock_config();
    config.progress_callback = Some(counter.clone());

    let out = extract_with_comparison(png.to_str().unwrap(), &config)
        .await
        .unwrap();

    // One preparation shared by both methods.
    assert_eq!(counter.starts.load(Ordering::SeqCst), 1);
    assert_eq!(counter.documents.load(Ordering::SeqCst), 1);

    assert!(out.success);
    assert!(out.standard_extraction.is_success());
    assert!(out.page_by_page_extraction.is_success());
    assert!(out.comparison.standard_success && out.comparison.page_by_page_success);
    assert_eq!(out.metadata.extraction_methods, vec!["standard", "page_by_page"]);

    let coverage = out.comparison.field_coverage.unwrap();
    assert_eq!(coverage.standard_fields, coverage.common_fields);
    assert!(coverage.standard_only.is_empty());
    // One page: no multi-page recommendation.
    assert!(!out
        .comparison
        .recommendations
        .iter()
        .any(|r| r.starts_with("Multi-page")));
}

// ── Batch ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn quick_batch_writes_extracted_files() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_png(dir.path(), "a.png");
    std::fs::create_dir_all(dir.path().join("nested")).unwrap();
    let b = write_png(&dir.path().join("nested"), "b.png");

    let summary = batch::run_batch(dir.path(), BatchMode::Quick, &mock_config())
        .await
        .unwrap();

    assert!(summary.success);
    assert_eq!(summary.total_documents, 2);
    assert_eq!(summary.processed_successfully, 2);
    assert_eq!(summary.success_rate, "100.0%");
    for doc in [&a, &b] {
        let out = output_path_for(doc, OutputKind::Quick);
        assert!(out.exists(), "missing {}", out.display());
        assert_eq!(read_json(&out)["success"], true);
    }
}

#[tokio::test]
async fn full_batch_records_failures_and_continues() {
    let dir = tempfile::tempdir().unwrap();
    let good = write_png(dir.path(), "good.png");
    write_png(dir.path(), "other.png");
    std::fs::write(dir.path().join("broken.png"), b"garbage").unwrap();

    let counter = Arc::new(Counter::default());
    let mut config = mock_config();
    config.progress_callback = Some(counter.clone());

    let summary = batch::run_batch(dir.path(), BatchMode::Full, &config)
        .await
        .unwrap();

    assert_eq!(summary.total_documents, 3);
    assert_eq!(summary.processed_successfully, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.success_rate, "66.7%");
    assert_eq!(counter.batch_docs.load(Ordering::SeqCst), 3);
    assert_eq!(counter.starts.load(Ordering::SeqCst), 3);

    let broken = summary
        .results
        .iter()
        .find(|r| r.file.ends_with("broken.png"))
        .unwrap();
    assert!(!broken.success);
    assert!(broken.error.is_some());

    // Images get no page-by-page pass.
    assert!(output_path_for(&good, OutputKind::Standard).exists());
    assert!(!output_path_for(&good, OutputKind::PageByPage).exists());

    let summary_file = dir.path().join("results/summary.json");
    summary.write_summary(&summary_file).await.unwrap();
    let v = read_json(&summary_file);
    assert_eq!(v["batch_info"]["total_documents"], 3);
    assert_eq!(v["results"].as_array().unwrap().len(), 3);
}
