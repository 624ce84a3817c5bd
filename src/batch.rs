//! Folder drivers: extract every supported document under a directory and
//! save the JSON next to each file.
//!
//! | mode | per document | output files |
//! |------|--------------|--------------|
//! | [`BatchMode::Full`] | standard, plus page-by-page for PDFs | `{stem}_extracted_data.json`, `{stem}_page_by_page_data.json` |
//! | [`BatchMode::Quick`] | standard only | `{stem}_extracted.json` |
//!
//! A failing document is recorded in the summary and the batch moves on.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::extract::{extract, extract_full, resolve_provider, write_json};
use crate::pipeline::input::DocumentKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Default summary file name, relative to the working directory.
pub const DEFAULT_SUMMARY_FILE: &str = "batch_processing_results.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchMode {
    #[default]
    Full,
    Quick,
}

/// Which result a saved file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Standard,
    PageByPage,
    Quick,
}

/// Where the result of `kind` for `document` is saved.
pub fn output_path_for(document: &Path, kind: OutputKind) -> PathBuf {
    let stem = document
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".into());
    let name = match kind {
        OutputKind::Standard => format!("{stem}_extracted_data.json"),
        OutputKind::PageByPage => format!("{stem}_page_by_page_data.json"),
        OutputKind::Quick => format!("{stem}_extracted.json"),
    };
    document.with_file_name(name)
}

/// Outcome for one document of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentOutcome {
    pub success: bool,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natural_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_by_page_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Page-by-page failed while the standard extraction succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_by_page_error: Option<String>,
}

impl DocumentOutcome {
    fn failed(file: &Path, error: String) -> Self {
        Self {
            success: false,
            file: file.display().to_string(),
            natural_output: None,
            page_by_page_output: None,
            document_type: None,
            error: Some(error),
            page_by_page_error: None,
        }
    }
}

/// Totals and per-document outcomes for a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    /// False only when there was nothing to process.
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data_folder: String,
    pub mode: BatchMode,
    pub total_documents: usize,
    pub processed_successfully: usize,
    pub failed: usize,
    pub success_rate: String,
    pub results: Vec<DocumentOutcome>,
}

/// The `batch_info` block of the summary file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchInfo {
    pub data_folder: String,
    pub total_documents: usize,
    pub processed_successfully: usize,
    pub failed: usize,
    pub success_rate: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResultsFile {
    pub batch_info: BatchInfo,
    pub results: Vec<DocumentOutcome>,
}

impl BatchSummary {
    fn from_results(folder: &Path, mode: BatchMode, results: Vec<DocumentOutcome>) -> Self {
        let total = results.len();
        let ok = results.iter().filter(|r| r.success).count();
        Self {
            success: true,
            message: None,
            data_folder: folder.display().to_string(),
            mode,
            total_documents: total,
            processed_successfully: ok,
            failed: total - ok,
            success_rate: success_rate(ok, total),
            results,
        }
    }

    fn empty(folder: &Path, mode: BatchMode) -> Self {
        Self {
            success: false,
            message: Some("No documents found".into()),
            ..Self::from_results(folder, mode, Vec::new())
        }
    }

    pub fn batch_info(&self) -> BatchInfo {
        BatchInfo {
            data_folder: self.data_folder.clone(),
            total_documents: self.total_documents,
            processed_successfully: self.processed_successfully,
            failed: self.failed,
            success_rate: self.success_rate.clone(),
        }
    }

    /// Write `{batch_info, results}` to `path`.
    pub async fn write_summary(&self, path: impl AsRef<Path>) -> Result<(), ExtractError> {
        let file = BatchResultsFile {
            batch_info: self.batch_info(),
            results: self.results.clone(),
        };
        write_json(path.as_ref(), &file).await?;
        info!("Batch results saved to: {}", path.as_ref().display());
        Ok(())
    }
}

/// `"{:.1}%"` of `ok / total`; `"0.0%"` for an empty batch.
pub fn success_rate(ok: usize, total: usize) -> String {
    let rate = if total == 0 {
        0.0
    } else {
        ok as f64 / total as f64 * 100.0
    };
    format!("{rate:.1}%")
}

/// Supported documents under `folder`, recursively, sorted by path.
///
/// Files this crate wrote itself (`*.json`) never match. A missing folder
/// yields an empty list.
pub fn find_documents(folder: impl AsRef<Path>) -> Vec<PathBuf> {
    let folder = folder.as_ref();
    if !folder.is_dir() {
        warn!("Data folder not found: {}", folder.display());
        return Vec::new();
    }

    let mut documents: Vec<PathBuf> = WalkDir::new(folder)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(err) => {
                warn!("Skipping unreadable entry: {}", err);
                None
            }
        })
        .filter(|e| e.file_type().is_file() && DocumentKind::is_supported(e.path()))
        .map(|e| e.into_path())
        .collect();
    documents.sort();

    info!("Found {} documents in {}", documents.len(), folder.display());
    documents
}

/// Process every document under `folder`.
///
/// # Errors
/// Only credential errors; document failures are recorded in the summary.
pub async fn run_batch(
    folder: impl AsRef<Path>,
    mode: BatchMode,
    config: &ExtractionConfig,
) -> Result<BatchSummary, ExtractError> {
    let folder = folder.as_ref();
    let documents = find_documents(folder);
    if documents.is_empty() {
        return Ok(BatchSummary::empty(folder, mode));
    }

    // One client for the whole batch.
    let mut config = config.clone();
    config.provider = Some(resolve_provider(&config)?);

    let total = documents.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }
    info!("Processing {} documents ({:?} mode)", total, mode);

    let mut results = Vec::with_capacity(total);
    for (i, doc) in documents.iter().enumerate() {
        if let Some(ref cb) = config.progress_callback {
            cb.on_batch_document(i + 1, total, doc);
        }
        info!("[{}/{}] Processing: {}", i + 1, total, doc.display());

        let outcome = process_document(doc, mode, &config).await;
        match outcome.error {
            None => info!("[{}/{}] Success", i + 1, total),
            Some(ref e) => warn!("[{}/{}] Failed: {}", i + 1, total, e),
        }
        results.push(outcome);
    }

    let summary = BatchSummary::from_results(folder, mode, results);
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(summary.total_documents, summary.processed_successfully);
    }
    info!(
        "Batch complete: {}/{} succeeded ({})",
        summary.processed_successfully, summary.total_documents, summary.success_rate
    );
    Ok(summary)
}

async fn process_document(doc: &Path, mode: BatchMode, config: &ExtractionConfig) -> DocumentOutcome {
    let input = doc.to_string_lossy().into_owned();

    let (output, page_by_page) = match mode {
        BatchMode::Quick => match extract(&input, config).await {
            Ok(o) => (o, None),
            Err(e) => return DocumentOutcome::failed(doc, e.to_string()),
        },
        BatchMode::Full => match extract_full(&input, config).await {
            Ok(full) => (full.standard, full.page_by_page),
            Err(e) => return DocumentOutcome::failed(doc, e.to_string()),
        },
    };
    let natural_path = output_path_for(
        doc,
        match mode {
            BatchMode::Full => OutputKind::Standard,
            BatchMode::Quick => OutputKind::Quick,
        },
    );
    if let Err(e) = write_json(&natural_path, &output).await {
        return DocumentOutcome::failed(doc, e.to_string());
    }

    let mut outcome = DocumentOutcome {
        success: true,
        file: doc.display().to_string(),
        natural_output: Some(natural_path.display().to_string()),
        page_by_page_output: None,
        document_type: Some(output.document_type),
        error: None,
        page_by_page_error: None,
    };

    if let Some(pages) = page_by_page {
        let page_path = output_path_for(doc, OutputKind::PageByPage);
        let written = match pages {
            Ok(pages) => write_json(&page_path, &pages).await,
            Err(e) => Err(e),
        };
        match written {
            Ok(()) => outcome.page_by_page_output = Some(page_path.display().to_string()),
            Err(e) => {
                warn!("Page-by-page extraction failed for {}: {}", doc.display(), e);
                outcome.page_by_page_error = Some(e.to_string());
            }
        }
    }
    outcome
}
