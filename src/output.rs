//! Result types returned by the extractors.
//!
//! Every type here serialises to the JSON written by the CLI and the batch
//! drivers, so field names are part of the output format.

use crate::error::{ExtractError, PageError};
use crate::pipeline::input::DocumentKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of a standard (whole-document) extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub success: bool,
    /// Detected or supplied document type (`document`, `simple_document`, or the hint).
    pub document_type: String,
    pub file_path: String,
    /// The model's answer. A JSON object when the model returned valid JSON,
    /// otherwise `{"raw_extraction": "<text>"}`.
    pub extracted_data: Value,
    /// Chain-of-thought reasoning, when that method ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub metadata: ExtractionMetadata,
    pub stats: ExtractionStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    pub processing_info: ProcessingInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_info: Option<ExtractionInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingInfo {
    /// `pdf` or `image`.
    pub document_type: DocumentKind,
    pub total_pages: usize,
    pub text_length: usize,
    pub has_images: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_method: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionInfo {
    /// `natural` or `chain_of_thought`.
    pub method: String,
    pub schema_used: String,
}

/// Token and timing totals for one extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration_ms: u64,
}

/// Outcome of the page signature for one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageExtraction {
    /// 1-indexed.
    pub page_number: usize,
    pub success: bool,
    /// Parsed page JSON, `{"raw_extraction": ...}`, or `{}` on failure.
    pub extracted_data: Value,
    /// 1.0 when the reply parsed as JSON, 0.8 for raw text, 0.0 on failure.
    pub confidence: f32,
    /// Length of the text sent for this page.
    pub text_length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<PageError>,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub duration_ms: u64,
}

/// Result of a page-by-page extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageByPageResult {
    pub success: bool,
    pub document_type: String,
    pub file_path: String,
    pub total_pages: usize,
    pub page_results: Vec<PageExtraction>,
    /// All successful pages merged, deduplicated and cleaned.
    pub aggregated_data: Value,
    pub metadata: ExtractionMetadata,
    pub stats: ExtractionStats,
}

impl PageByPageResult {
    pub fn successful_pages(&self) -> usize {
        self.page_results.iter().filter(|p| p.success).count()
    }
}

/// Page-by-page output, or the text-only standard extraction used when the
/// document produced no page images.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageByPageOutput {
    PageByPage(PageByPageResult),
    Fallback(ExtractionOutput),
}

impl PageByPageOutput {
    /// The merged page data, or the fallback's extracted data.
    pub fn data(&self) -> &Value {
        match self {
            PageByPageOutput::PageByPage(r) => &r.aggregated_data,
            PageByPageOutput::Fallback(r) => &r.extracted_data,
        }
    }

    pub fn total_pages(&self) -> usize {
        match self {
            PageByPageOutput::PageByPage(r) => r.total_pages,
            PageByPageOutput::Fallback(r) => r.metadata.processing_info.total_pages,
        }
    }

    pub fn stats(&self) -> &ExtractionStats {
        match self {
            PageByPageOutput::PageByPage(r) => &r.stats,
            PageByPageOutput::Fallback(r) => &r.stats,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, PageByPageOutput::Fallback(_))
    }
}

/// Envelope written when an extraction fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureReport {
    pub success: bool,
    pub error: String,
    pub file_path: String,
    pub document_type: String,
}

/// Success or failure envelope, serialised without a tag so both shapes
/// carry a top-level `success` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Report<T> {
    Success(T),
    Failure(FailureReport),
}

impl<T> Report<T> {
    /// Wrap an extraction result, turning an error into a failure envelope.
    pub fn from_result(
        result: Result<T, ExtractError>,
        file_path: impl Into<String>,
        document_type: impl Into<String>,
    ) -> Self {
        match result {
            Ok(value) => Report::Success(value),
            Err(e) => Report::Failure(FailureReport {
                success: false,
                error: e.to_string(),
                file_path: file_path.into(),
                document_type: document_type.into(),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Report::Success(_))
    }

    pub fn success(&self) -> Option<&T> {
        match self {
            Report::Success(v) => Some(v),
            Report::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Report::Success(_) => None,
            Report::Failure(f) => Some(&f.error),
        }
    }
}

/// Both extraction methods on one document, side by side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonOutput {
    pub success: bool,
    pub file_path: String,
    pub document_type: String,
    pub standard_extraction: Report<ExtractionOutput>,
    pub page_by_page_extraction: Report<PageByPageOutput>,
    pub comparison: Comparison,
    pub metadata: ComparisonMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonMetadata {
    pub extraction_methods: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Comparison {
    pub standard_success: bool,
    pub page_by_page_success: bool,
    /// Absent when either method failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_coverage: Option<FieldCoverage>,
    pub recommendations: Vec<String>,
}

/// Dotted field-path counts for the two results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldCoverage {
    pub standard_fields: usize,
    pub page_by_page_fields: usize,
    pub common_fields: usize,
    pub standard_only: Vec<String>,
    pub page_by_page_only: Vec<String>,
}

/// Document facts gathered without calling the model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub file_path: String,
    pub document_type: Option<DocumentKind>,
    pub page_count: usize,
    pub file_size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_version: Option<String>,
    /// Decoder format for image inputs (`Png`, `Jpeg`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_format: Option<String>,
    /// Colour type for image inputs (`Rgb8`, `L8`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn sample_output() -> ExtractionOutput {
        ExtractionOutput {
            success: true,
            document_type: "simple_document".into(),
            file_path: "scan.png".into(),
            extracted_data: json!({"total": "12.50"}),
            reasoning: None,
            metadata: ExtractionMetadata {
                processing_info: ProcessingInfo {
                    document_type: DocumentKind::Image,
                    total_pages: 1,
                    text_length: 0,
                    has_images: true,
                    extraction_method: None,
                },
                extraction_info: Some(ExtractionInfo {
                    method: "natural".into(),
                    schema_used: "simple_document".into(),
                }),
            },
            stats: ExtractionStats::default(),
        }
    }

    #[test]
    fn envelope_field_names() {
        let v = serde_json::to_value(sample_output()).unwrap();
        assert_eq!(v["success"], json!(true));
        assert_eq!(v["metadata"]["processing_info"]["document_type"], json!("image"));
        assert_eq!(v["metadata"]["extraction_info"]["schema_used"], json!("simple_document"));
        assert!(v.get("reasoning").is_none());
        assert!(v["metadata"]["processing_info"].get("extraction_method").is_none());
    }

    #[test]
    fn failure_report_is_untagged() {
        let report: Report<ExtractionOutput> = Report::from_result(
            Err(ExtractError::FileNotFound {
                path: PathBuf::from("missing.pdf"),
            }),
            "missing.pdf",
            "auto",
        );
        assert!(!report.is_success());
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["success"], json!(false));
        assert_eq!(v["file_path"], json!("missing.pdf"));
        assert!(v["error"].as_str().unwrap().contains("missing.pdf"));
    }

    #[test]
    fn success_report_round_trips_through_json() {
        let report = Report::Success(sample_output());
        let text = serde_json::to_string(&report).unwrap();
        let back: Report<ExtractionOutput> = serde_json::from_str(&text).unwrap();
        assert_eq!(back.success().map(|o| o.file_path.as_str()), Some("scan.png"));
    }

    #[test]
    fn fallback_exposes_extracted_data() {
        let out = PageByPageOutput::Fallback(sample_output());
        assert!(out.is_fallback());
        assert_eq!(out.data()["total"], json!("12.50"));
        assert_eq!(out.total_pages(), 1);
    }
}
